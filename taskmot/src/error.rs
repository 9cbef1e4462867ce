//! Error and outcome types for bridge operations.

use taskmot_common::config::ConfigError;
use thiserror::Error;

/// Transport failures reported by a [`MotionChannel`](crate::channel::MotionChannel).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChannelError {
    /// Operation attempted on a channel that is not open.
    #[error("Channel not open")]
    NotOpen,

    /// Opening the channel failed.
    #[error("Channel open failed: {0}")]
    OpenFailed(String),

    /// Command write failed.
    #[error("Command write failed: {0}")]
    WriteFailed(String),

    /// Snapshot read failed.
    #[error("Snapshot read failed: {0}")]
    ReadFailed(String),

    /// Closing the channel failed.
    #[error("Channel close failed: {0}")]
    Closed(String),
}

/// Errors returned by bridge operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BridgeError {
    /// Transport failure, propagated as-is.
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Configuration lookup or validation failure.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Position file unreadable, malformed or unwritable.
    #[error("Position persistence error: {0}")]
    Persistence(String),

    /// Compensation file unreadable or malformed.
    #[error("Compensation file error: {0}")]
    Compensation(String),

    /// Joint count and mask are inconsistent.
    #[error("Invalid joint count: joints={joints} mask={mask:#x}")]
    InvalidJointCount {
        /// Joint count after derivation.
        joints: usize,
        /// Mask as supplied.
        mask: u32,
    },

    /// Linear or angular units not strictly positive.
    #[error("Invalid units: linear={linear} angular={angular}")]
    InvalidUnits {
        /// Linear units per mm.
        linear: f64,
        /// Angular units per degree.
        angular: f64,
    },

    /// Joint index outside the configured range where a hard error is required.
    #[error("Joint {0} out of range")]
    InvalidJointRange(usize),

    /// Channel open/close failed during an init or halt transition.
    #[error("Lifecycle transition for {subsystem} failed: {source}")]
    Lifecycle {
        /// Subsystem whose transition failed.
        subsystem: String,
        /// Underlying transport error.
        source: ChannelError,
    },
}

/// Result alias used throughout the crate.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Outcome of an operation that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dispatch {
    /// Command written to the transport.
    Sent,
    /// Rejected by validation (index out of range, illegal enum value).
    /// The transport was not touched.
    NotApplicable,
    /// Dropped by the numeric guard. The transport was not touched.
    Dropped,
    /// Accepted; handled locally without a transport write.
    Local,
}

impl Dispatch {
    /// True if a command reached the transport.
    #[inline]
    pub const fn was_sent(&self) -> bool {
        matches!(self, Self::Sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_error_converts() {
        let e: BridgeError = ChannelError::NotOpen.into();
        assert_eq!(e, BridgeError::Channel(ChannelError::NotOpen));
        assert!(e.to_string().contains("not open"));
    }

    #[test]
    fn joint_count_message_shows_hex_mask() {
        let e = BridgeError::InvalidJointCount { joints: 2, mask: 0x1f };
        assert_eq!(e.to_string(), "Invalid joint count: joints=2 mask=0x1f");
    }

    #[test]
    fn dispatch_was_sent() {
        assert!(Dispatch::Sent.was_sent());
        assert!(!Dispatch::Dropped.was_sent());
        assert!(!Dispatch::NotApplicable.was_sent());
        assert!(!Dispatch::Local.was_sent());
    }
}
