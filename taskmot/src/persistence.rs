//! Joint position persistence across restarts.
//!
//! Plain text, one feedback position per line, one line per configured
//! joint, 17 significant digits. No header. The file exists only between a
//! halt and the next init; a missing path or missing file means "nothing
//! saved".

use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use taskmot_common::config::ConfigSource;
use taskmot_common::consts::TRAJ_SECTION;
use tracing::{debug, info};

use crate::error::{BridgeError, BridgeResult};

/// Position file handle. `path == None` disables persistence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PositionStore {
    path: Option<PathBuf>,
}

impl PositionStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: Some(path.as_ref().to_path_buf()),
        }
    }

    /// `[TRAJ] POSITION_FILE`; empty or absent disables persistence.
    pub fn from_source(source: &dyn ConfigSource) -> Self {
        Self {
            path: source
                .find_string(TRAJ_SECTION, "POSITION_FILE")
                .map(|p| PathBuf::from(p.trim())),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Read `joints` positions.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Persistence`] if the file cannot be read, holds a
    /// non-numeric token, or does not hold exactly `joints` values.
    pub fn load(&self, joints: usize) -> BridgeResult<Option<Vec<f64>>> {
        let Some(path) = &self.path else {
            return Ok(None);
        };
        debug!(path = %path.display(), "Loading joint positions");

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Position file does not exist, starting fresh");
                return Ok(None);
            }
            Err(e) => {
                return Err(BridgeError::Persistence(format!(
                    "Failed to read {}: {e}",
                    path.display()
                )));
            }
        };

        let positions = content
            .split_whitespace()
            .map(|token| {
                token.parse::<f64>().map_err(|_| {
                    BridgeError::Persistence(format!(
                        "Invalid position '{token}' in {}",
                        path.display()
                    ))
                })
            })
            .collect::<BridgeResult<Vec<f64>>>()?;

        if positions.len() != joints {
            return Err(BridgeError::Persistence(format!(
                "{} holds {} positions, expected {joints}",
                path.display(),
                positions.len()
            )));
        }
        info!(joints, path = %path.display(), "Loaded joint positions");
        Ok(Some(positions))
    }

    /// Replace the file with `positions`. Returns `false` when disabled.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Persistence`] on any filesystem failure.
    pub fn save(&self, positions: &[f64]) -> BridgeResult<bool> {
        let Some(path) = &self.path else {
            return Ok(false);
        };
        let fail = |what: &str, e: std::io::Error| {
            BridgeError::Persistence(format!("Failed to {what} {}: {e}", path.display()))
        };

        match fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(fail("remove", e)),
        }

        let mut writer = BufWriter::new(File::create(path).map_err(|e| fail("create", e))?);
        for pos in positions {
            writeln!(writer, "{pos:.16e}").map_err(|e| fail("write", e))?;
        }
        writer.flush().map_err(|e| fail("write", e))?;

        info!(joints = positions.len(), path = %path.display(), "Saved joint positions");
        Ok(true)
    }
}
