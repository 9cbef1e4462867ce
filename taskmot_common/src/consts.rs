//! Limits shared between the bridge and the real-time executor.
//!
//! Single source of truth for joint and I/O counts. The executor is built
//! against the same values; a mismatch is a configuration error on its side.

use static_assertions::const_assert;

/// Maximum number of joints the executor supports.
pub const MAX_JOINTS: usize = 9;

/// Number of synchronized digital I/O channels mirrored in status.
pub const MAX_DIO: usize = 64;

/// Number of synchronized analog I/O channels mirrored in status.
pub const MAX_AIO: usize = 16;

/// Maximum length of an executor error string.
pub const MAX_ERROR_LEN: usize = 256;

/// Client name used when opening the executor channel.
pub const CHANNEL_CLIENT_NAME: &str = "taskmot";

/// Joint sentinel: every joint (home, unhome).
pub const ALL_JOINTS: i32 = -1;

/// Joint sentinel: only joints configured with volatile home (unhome).
pub const VOLATILE_JOINTS: i32 = -2;

/// Default per-joint velocity ceiling until configuration sets one [units/s].
pub const DEFAULT_JOINT_MAX_VELOCITY: f64 = 1.0;

/// Default per-joint acceleration ceiling [units/s²].
pub const DEFAULT_JOINT_MAX_ACCELERATION: f64 = 1.0;

/// Default trajectory velocity ceiling until configuration sets one [units/s].
pub const DEFAULT_TRAJ_MAX_VELOCITY: f64 = 1.0;

/// Default configuration key section for the trajectory planner.
pub const TRAJ_SECTION: &str = "TRAJ";

/// Configuration key section read by the executor channel at open time.
pub const EMCMOT_SECTION: &str = "EMCMOT";

// Joint masks are decoded from the low nine bits.
const_assert!(MAX_JOINTS <= 9);
// Digital mirrors are packed in whole u64 words.
const_assert!(MAX_DIO % 64 == 0);

/// Section name for joint `n` (`JOINT_0`, `JOINT_1`, ...).
pub fn joint_section(joint: usize) -> String {
    format!("JOINT_{joint}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_are_consistent() {
        assert!(MAX_JOINTS > 0);
        assert!(MAX_AIO > 0 && MAX_AIO <= 32);
        assert!(ALL_JOINTS < 0 && VOLATILE_JOINTS < ALL_JOINTS);
    }

    #[test]
    fn joint_section_names() {
        assert_eq!(joint_section(0), "JOINT_0");
        assert_eq!(joint_section(8), "JOINT_8");
    }
}
