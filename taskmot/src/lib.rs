//! # Task-to-Motion Bridge
//!
//! Supervisory side of the motion controller. Translates motion intent
//! (moves, jogs, homing, spindle, mode switches, overrides) into
//! [`MotionCommand`](taskmot_common::command::MotionCommand) requests for the
//! real-time executor, and decodes the executor's snapshots into
//! [`MotionStatus`](taskmot_common::status::MotionStatus) every cycle.
//!
//! # Module Structure
//!
//! - [`bridge`] - `MotionBridge` facade, lifecycle entry points, submit path
//! - [`channel`] - `MotionChannel` trait (executor transport contract)
//! - [`lifecycle`] - Init bookkeeping and channel open/close gating
//! - [`encoder`] - One operation per command kind, with validation and clamping
//! - [`guard`] - Non-finite payload rejection
//! - [`decoder`] - Status decode state machine
//! - [`persistence`] - Joint position file load/save
//! - [`params`] - Joint/trajectory parameter loading from the config source
//! - [`comp`] - Joint compensation table files
//! - [`notify`] - Operator error notifications
//! - [`sim`] - In-process simulated executor
//! - [`config`] - Application configuration (`taskmot.toml`)
//! - [`supervisor`] - Bounded supervisory cycle used by the binary
//!
//! # Architecture
//!
//! ```text
//!  callers ──► MotionBridge ──► encoder ──► guard ──► MotionChannel ──► executor
//!                  │                                       │
//!                  ├── lifecycle (open/close gating) ──────┤
//!                  │                                       ▼
//!                  └────────────── decoder ◄──── status / config / debug / error
//! ```

pub mod bridge;
pub mod channel;
pub mod comp;
pub mod config;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod guard;
pub mod lifecycle;
pub mod notify;
pub mod params;
pub mod persistence;
pub mod sim;
pub mod supervisor;

pub use crate::bridge::{MotionBridge, SharedBridge};
pub use crate::channel::MotionChannel;
pub use crate::error::{BridgeError, BridgeResult, ChannelError, Dispatch};
pub use crate::sim::SimulatedExecutor;
