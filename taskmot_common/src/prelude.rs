//! Prelude module for common re-exports.
//!
//! ```rust
//! use taskmot_common::prelude::*;
//! ```

// ─── Logging ────────────────────────────────────────────────────────
pub use crate::config::LogLevel;

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, ConfigSource, SharedConfig, TomlSource};

// ─── Limits ─────────────────────────────────────────────────────────
pub use crate::consts::{MAX_AIO, MAX_DIO, MAX_ERROR_LEN, MAX_JOINTS};

// ─── Commands ───────────────────────────────────────────────────────
pub use crate::command::{
    CircleMove, CommandKind, HomingParams, JointTarget, LineMove, MotionCommand, ProbeMove,
    RigidTapMove, TermCond, TrajMode,
};
pub use crate::pose::{Cartesian, Pose};

// ─── Flags ──────────────────────────────────────────────────────────
pub use crate::flags::{DebugFlags, EnableFlags, HomeFlags, JointFlags, MotionFlags};

// ─── Snapshots & Status ─────────────────────────────────────────────
pub use crate::snapshot::{
    ConfigSnapshot, DebugSnapshot, JointFeedback, KinematicsType, SpindleTelemetry,
    StatusSnapshot,
};
pub use crate::status::{
    ExecStatus, JointStatus, JointType, MotionStatus, SpindleStatus, TrajStatus,
};
