//! Bit-packed digital I/O mirrors.
//!
//! The executor publishes its synchronized digital inputs and outputs as
//! packed `u64` words. Channel N maps to word `N / 64`, bit `N % 64`.

use crate::consts::MAX_DIO;

/// Number of `u64` words in a digital mirror bank.
pub const DIO_WORDS: usize = MAX_DIO / 64;

/// Packed digital mirror (`MAX_DIO` channels).
pub type DioBank = [u64; DIO_WORDS];

/// Read channel `index`. Out-of-range channels read as `false`.
#[inline]
pub fn extract_bit(bank: &DioBank, index: usize) -> bool {
    let word = index / 64;
    if word < DIO_WORDS {
        (bank[word] >> (index % 64)) & 1 != 0
    } else {
        false
    }
}

/// Write channel `index`. Out-of-range channels are ignored.
#[inline]
pub fn set_bit(bank: &mut DioBank, index: usize, value: bool) {
    let word = index / 64;
    if word < DIO_WORDS {
        let mask = 1u64 << (index % 64);
        if value {
            bank[word] |= mask;
        } else {
            bank[word] &= !mask;
        }
    }
}

/// Expand a bank into one boolean per channel.
pub fn unpack(bank: &DioBank) -> [bool; MAX_DIO] {
    let mut out = [false; MAX_DIO];
    for (i, slot) in out.iter_mut().enumerate() {
        *slot = extract_bit(bank, i);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_extract() {
        let mut bank: DioBank = [0; DIO_WORDS];
        set_bit(&mut bank, 0, true);
        set_bit(&mut bank, 63, true);
        assert!(extract_bit(&bank, 0));
        assert!(extract_bit(&bank, 63));
        assert!(!extract_bit(&bank, 1));
        assert_eq!(bank[0], 1 | (1u64 << 63));

        set_bit(&mut bank, 0, false);
        assert!(!extract_bit(&bank, 0));
    }

    #[test]
    fn out_of_range_is_ignored() {
        let mut bank: DioBank = [0; DIO_WORDS];
        set_bit(&mut bank, MAX_DIO, true);
        assert_eq!(bank, [0; DIO_WORDS]);
        assert!(!extract_bit(&bank, MAX_DIO + 7));
    }

    #[test]
    fn unpack_matches_bits() {
        let mut bank: DioBank = [0; DIO_WORDS];
        set_bit(&mut bank, 5, true);
        let flat = unpack(&bank);
        assert_eq!(flat.iter().filter(|b| **b).count(), 1);
        assert!(flat[5]);
    }
}
