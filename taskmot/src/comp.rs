//! Screw / backlash compensation tables.
//!
//! A table file holds one entry per line, three whitespace-separated
//! numbers: the nominal position then either the forward and reverse
//! positions ([`CompType::Absolute`]) or trims relative to the nominal
//! ([`CompType::Trim`]). Blank lines and `#` comments are skipped.

use std::fs;
use std::path::Path;

use crate::error::{BridgeError, BridgeResult};

/// Interpretation of the second and third column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum CompType {
    /// Absolute forward and reverse positions.
    #[default]
    Absolute = 0,
    /// Offsets added to the nominal position.
    Trim = 1,
}

impl CompType {
    #[inline]
    pub const fn from_raw(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Absolute),
            1 => Some(Self::Trim),
            _ => None,
        }
    }
}

/// One table row, resolved to absolute positions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompEntry {
    pub nominal: f64,
    pub forward: f64,
    pub reverse: f64,
}

/// Parsed compensation table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompTable {
    entries: Vec<CompEntry>,
}

impl CompTable {
    /// Read and parse `path`.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Compensation`] if the file cannot be read or a line is
    /// malformed.
    pub fn load(path: &Path, comp_type: CompType) -> BridgeResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            BridgeError::Compensation(format!("{}: {e}", path.display()))
        })?;
        Self::parse(&content, comp_type)
            .map_err(|e| BridgeError::Compensation(format!("{}: {e}", path.display())))
    }

    /// Parse table text. The error string names the offending line.
    pub fn parse(content: &str, comp_type: CompType) -> Result<Self, String> {
        let mut entries = Vec::new();
        for (number, line) in content.lines().enumerate() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let values = line
                .split_whitespace()
                .map(str::parse::<f64>)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| format!("line {}: {e}", number + 1))?;
            let [nominal, second, third] = values[..] else {
                return Err(format!(
                    "line {}: expected 3 values, found {}",
                    number + 1,
                    values.len()
                ));
            };
            entries.push(match comp_type {
                CompType::Absolute => CompEntry {
                    nominal,
                    forward: second,
                    reverse: third,
                },
                CompType::Trim => CompEntry {
                    nominal,
                    forward: nominal + second,
                    reverse: nominal + third,
                },
            });
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[CompEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn absolute_table() {
        let t = CompTable::parse("0 0.01 -0.01\n# comment\n\n10 10.02 9.99\n", CompType::Absolute)
            .unwrap();
        assert_eq!(t.len(), 2);
        assert_eq!(t.entries()[1].forward, 10.02);
        assert_eq!(t.entries()[1].reverse, 9.99);
    }

    #[test]
    fn trim_table_resolves_to_absolute() {
        let t = CompTable::parse("10 0.5 -0.25", CompType::Trim).unwrap();
        let e = t.entries()[0];
        assert_eq!(e.nominal, 10.0);
        assert_eq!(e.forward, 10.5);
        assert_eq!(e.reverse, 9.75);
    }

    #[test]
    fn malformed_line_is_named() {
        let err = CompTable::parse("0 1 2\n5 6\n", CompType::Absolute).unwrap_err();
        assert!(err.contains("line 2"), "{err}");
        let err = CompTable::parse("0 x 2\n", CompType::Absolute).unwrap_err();
        assert!(err.contains("line 1"), "{err}");
    }

    #[test]
    fn load_from_disk() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "1 1.1 0.9").unwrap();
        let t = CompTable::load(file.path(), CompType::Absolute).unwrap();
        assert_eq!(t.len(), 1);

        let missing = CompTable::load(Path::new("/nonexistent/comp.tbl"), CompType::Trim);
        assert!(matches!(missing, Err(BridgeError::Compensation(_))));
    }

    #[test]
    fn raw_type() {
        assert_eq!(CompType::from_raw(1), Some(CompType::Trim));
        assert_eq!(CompType::from_raw(2), None);
    }
}
