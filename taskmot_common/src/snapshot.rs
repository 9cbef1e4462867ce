//! Raw snapshots published by the executor.
//!
//! These are plain copies of executor-maintained state. The bridge never
//! mutates them; it reads one of each per cycle and derives the records in
//! [`crate::status`] from them.
//!
//! [`ConfigSnapshot`] is versioned separately: the executor bumps
//! `StatusSnapshot::config_num` whenever its configuration changes and the
//! bridge re-reads the config snapshot only then.

use serde::{Deserialize, Serialize};

use crate::command::CommandKind;
use crate::consts::{MAX_AIO, MAX_JOINTS};
use crate::flags::{EnableFlags, JointFlags, MotionFlags};
use crate::io::{DIO_WORDS, DioBank};
use crate::pose::Pose;

/// Per-joint feedback block.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct JointFeedback {
    /// Packed joint status word.
    pub flags: JointFlags,
    /// Commanded position [joint units].
    pub pos_cmd: f64,
    /// Feedback position [joint units].
    pub pos_fb: f64,
    /// Commanded velocity [joint units/s].
    pub vel_cmd: f64,
    /// Current following error.
    pub ferror: f64,
    /// Largest following error seen.
    pub ferror_high_mark: f64,
    /// Effective following-error limit at the current velocity.
    pub ferror_limit: f64,
    // Configuration echoes. Only trusted after a config generation change.
    pub backlash: f64,
    pub min_pos_limit: f64,
    pub max_pos_limit: f64,
    pub min_ferror: f64,
    pub max_ferror: f64,
    pub home_offset: f64,
}

/// Spindle telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SpindleTelemetry {
    /// Commanded speed [rpm]; zero when stopped.
    pub speed: f64,
    /// Constant-surface-speed factor.
    pub css_factor: f64,
    /// Spindle offset passed with the last `SpindleOn`.
    pub offset: f64,
    /// -1 reverse, 0 stopped, 1 forward.
    pub direction: i32,
    /// Brake engaged.
    pub brake: bool,
    /// Orient state machine state.
    pub orient_state: i32,
    /// Orient fault code, 0 if none.
    pub orient_fault: i32,
}

/// Whole status snapshot, read once per cycle.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// Incremented by the executor every servo cycle.
    pub heartbeat: u32,
    /// Kind of the last command consumed.
    pub command_echo: Option<CommandKind>,
    /// Serial number of the last command consumed.
    pub command_num_echo: u32,
    /// Configuration generation.
    pub config_num: u32,

    pub motion_flags: MotionFlags,
    /// Non-zero while limit override is active for any joint.
    pub override_limit_mask: u32,

    // ─── Queue ──────────────────────────────────────────────────────
    pub depth: u32,
    pub active_depth: u32,
    pub queue_full: bool,
    pub id: i32,
    pub motion_type: i32,
    pub distance_to_go: f64,
    pub dtg: Pose,
    pub current_vel: f64,
    pub paused: bool,

    // ─── Overrides ──────────────────────────────────────────────────
    pub feed_scale: f64,
    pub spindle_scale: f64,
    /// Override enables applied to free/teleop motion.
    pub enables_new: EnableFlags,
    /// Override enables travelling with queued segments.
    pub enables_queued: EnableFlags,

    // ─── Kinematic state ────────────────────────────────────────────
    pub carte_pos_cmd: Pose,
    pub carte_pos_fb: Pose,
    pub vel: f64,
    pub acc: f64,

    // ─── Probe ──────────────────────────────────────────────────────
    pub probed_pos: Pose,
    pub probe_val: i32,
    pub probing: bool,
    pub probe_tripped: bool,

    // ─── Spindle and I/O ────────────────────────────────────────────
    pub spindle: SpindleTelemetry,
    pub synch_di: DioBank,
    pub synch_do: DioBank,
    pub analog_input: [f64; MAX_AIO],
    pub analog_output: [f64; MAX_AIO],

    pub joints: [JointFeedback; MAX_JOINTS],
}

impl StatusSnapshot {
    /// Empty snapshot with zeroed mirrors.
    pub fn new() -> Self {
        Self {
            synch_di: [0; DIO_WORDS],
            synch_do: [0; DIO_WORDS],
            ..Default::default()
        }
    }
}

/// Kinematics model reported by the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum KinematicsType {
    /// Joints map one-to-one to axes.
    #[default]
    Identity = 1,
    ForwardOnly = 2,
    InverseOnly = 3,
    Both = 4,
}

impl KinematicsType {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Identity),
            2 => Some(Self::ForwardOnly),
            3 => Some(Self::InverseOnly),
            4 => Some(Self::Both),
            _ => None,
        }
    }
}

/// Executor configuration, versioned by `config_num`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    pub config_num: u32,
    /// Trajectory cycle time [s].
    pub traj_cycle_time: f64,
    pub kinematics_type: KinematicsType,
    /// Trajectory velocity ceiling [user units/s].
    pub limit_vel: f64,
    /// Executor debug level.
    pub debug: i32,
}

/// Extended executor debug data, read only when enabled.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DebugSnapshot {
    /// Servo cycles executed since start.
    pub cycle_count: u64,
    /// Servo cycles that overran their period.
    pub overruns: u32,
    /// Duration of the last servo cycle [s].
    pub last_cycle_time: f64,
    /// Longest servo cycle observed [s].
    pub max_cycle_time: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_snapshot_is_quiet() {
        let s = StatusSnapshot::new();
        assert_eq!(s.heartbeat, 0);
        assert!(s.command_echo.is_none());
        assert!(s.motion_flags.is_empty());
        assert!(s.joints.iter().all(|j| j.flags.is_empty()));
    }

    #[test]
    fn kinematics_from_u8() {
        assert_eq!(KinematicsType::from_u8(1), Some(KinematicsType::Identity));
        assert_eq!(KinematicsType::from_u8(4), Some(KinematicsType::Both));
        assert!(KinematicsType::from_u8(0).is_none());
    }

    #[test]
    fn snapshot_serializes() {
        let mut s = StatusSnapshot::new();
        s.command_echo = Some(CommandKind::Home);
        s.joints[1].flags = JointFlags::HOMED | JointFlags::INPOS;
        let json = serde_json::to_string(&s).unwrap();
        let back: StatusSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }
}
