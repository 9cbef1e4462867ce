//! Task-to-motion common library.
//!
//! Shared types for the supervisory side of the motion bridge: the command
//! requests sent to the real-time executor, the raw snapshots it publishes,
//! and the derived status records handed to supervisory consumers.
//!
//! # Module Structure
//!
//! - [`consts`] - Joint and I/O limits shared with the executor
//! - [`config`] - Configuration loading and the key/section lookup collaborator
//! - [`pose`] - Nine-axis pose and cartesian vector types
//! - [`command`] - `MotionCommand` requests and their payload types
//! - [`flags`] - Bitflag groups decoded from executor status words
//! - [`snapshot`] - Raw status / config / debug snapshots
//! - [`status`] - Derived per-joint, trajectory, and aggregate status records
//! - [`io`] - Bit-packed digital I/O mirror helpers
//! - [`prelude`] - Common re-exports
//!
//! # Usage
//!
//! ```rust
//! use taskmot_common::prelude::*;
//!
//! let cmd = MotionCommand::JogCont { joint: 0, vel: 5.0 };
//! assert_eq!(cmd.kind(), CommandKind::JogCont);
//! ```

pub mod command;
pub mod config;
pub mod consts;
pub mod flags;
pub mod io;
pub mod pose;
pub mod prelude;
pub mod snapshot;
pub mod status;
