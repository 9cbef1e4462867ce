//! Derived status records handed to supervisory consumers.
//!
//! Recomputed every cycle by the decoder from the latest snapshots. Flag
//! words are decoded into named booleans here once, so consumers never test
//! raw executor bits.

use heapless::Vec as HVec;
use serde::{Deserialize, Serialize};

use crate::command::{CommandKind, TrajMode};
use crate::consts::{MAX_AIO, MAX_JOINTS};
use crate::io::{DIO_WORDS, DioBank, extract_bit};
use crate::pose::Pose;
use crate::snapshot::KinematicsType;

/// Tri-state execution status shared by joints, trajectory and aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum ExecStatus {
    /// Idle, nothing pending.
    #[default]
    Done = 1,
    /// Motion in progress.
    Exec = 2,
    /// Fault reported.
    Error = 3,
}

impl ExecStatus {
    /// Combine several statuses: any `Error` wins, then any `Exec`, else `Done`.
    pub fn aggregate<I: IntoIterator<Item = ExecStatus>>(statuses: I) -> Self {
        let mut exec = false;
        for s in statuses {
            match s {
                Self::Error => return Self::Error,
                Self::Exec => exec = true,
                Self::Done => {}
            }
        }
        if exec { Self::Exec } else { Self::Done }
    }
}

/// Joint kinematic type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum JointType {
    #[default]
    Linear = 1,
    Angular = 2,
}

impl JointType {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Linear),
            2 => Some(Self::Angular),
            _ => None,
        }
    }

    /// Parse a configuration value (`LINEAR` / `ANGULAR`, case-insensitive).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "LINEAR" => Some(Self::Linear),
            "ANGULAR" => Some(Self::Angular),
            _ => None,
        }
    }
}

/// Per-joint record.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct JointStatus {
    pub joint_type: JointType,
    pub units: f64,

    // Configuration mirrors, refreshed on config generation change.
    pub backlash: f64,
    pub min_position_limit: f64,
    pub max_position_limit: f64,
    pub min_ferror: f64,
    pub max_ferror: f64,
    pub home_offset: f64,

    /// Commanded position.
    pub output: f64,
    /// Feedback position.
    pub input: f64,
    pub velocity: f64,
    pub ferror_current: f64,
    pub ferror_high_mark: f64,

    pub homing: bool,
    pub homed: bool,
    pub fault: bool,
    pub enabled: bool,
    pub inpos: bool,
    /// Always `false`: soft limits are applied upstream of the executor.
    pub min_soft_limit: bool,
    /// Always `false`.
    pub max_soft_limit: bool,
    pub min_hard_limit: bool,
    pub max_hard_limit: bool,
    /// Limit override active (one flag for all joints).
    pub override_limits: bool,

    pub status: ExecStatus,
}

/// Trajectory record.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TrajStatus {
    /// Configured joint count.
    pub joints: usize,
    /// Active-joint bitmask.
    pub joint_mask: u16,
    pub linear_units: f64,
    pub angular_units: f64,
    pub mode: TrajMode,
    pub enabled: bool,
    pub inpos: bool,

    pub queue: u32,
    pub active_queue: u32,
    pub queue_full: bool,
    pub id: i32,
    pub motion_type: i32,
    pub distance_to_go: f64,
    pub dtg: Pose,
    pub current_vel: f64,
    pub paused: bool,
    pub scale: f64,
    pub spindle_scale: f64,

    /// Commanded pose.
    pub position: Pose,
    /// Feedback pose.
    pub actual_position: Pose,
    pub velocity: f64,
    pub acceleration: f64,
    pub max_acceleration: f64,

    pub probed_position: Pose,
    pub probeval: i32,
    pub probing: bool,
    pub probe_tripped: bool,

    pub feed_override_enabled: bool,
    pub spindle_override_enabled: bool,
    pub adaptive_feed_enabled: bool,
    pub feed_hold_enabled: bool,

    // From the config snapshot, refreshed on generation change.
    pub cycle_time: f64,
    pub kinematics_type: KinematicsType,
    pub max_velocity: f64,

    pub status: ExecStatus,
}

/// Spindle record.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SpindleStatus {
    /// Spindle turning (speed non-zero).
    pub enabled: bool,
    pub speed: f64,
    pub brake: bool,
    pub direction: i32,
    pub orient_state: i32,
    pub orient_fault: i32,
}

/// Aggregate record produced by one update cycle.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MotionStatus {
    pub heartbeat: u32,
    /// Kind of the last command the executor consumed.
    pub command_type: Option<CommandKind>,
    pub echo_serial_number: u32,
    /// Executor debug level.
    pub debug: i32,

    /// One record per configured joint.
    pub joints: HVec<JointStatus, MAX_JOINTS>,
    pub traj: TrajStatus,
    pub spindle: SpindleStatus,

    pub synch_di: DioBank,
    pub synch_do: DioBank,
    pub analog_input: [f64; MAX_AIO],
    pub analog_output: [f64; MAX_AIO],

    pub status: ExecStatus,
}

impl MotionStatus {
    /// Empty record with no joints.
    pub fn new() -> Self {
        Self {
            synch_di: [0; DIO_WORDS],
            synch_do: [0; DIO_WORDS],
            ..Default::default()
        }
    }

    /// Synchronized digital input `index`.
    #[inline]
    pub fn digital_in(&self, index: usize) -> bool {
        extract_bit(&self.synch_di, index)
    }

    /// Synchronized digital output `index`.
    #[inline]
    pub fn digital_out(&self, index: usize) -> bool {
        extract_bit(&self.synch_do, index)
    }

    pub fn joint(&self, index: usize) -> Option<&JointStatus> {
        self.joints.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_priority() {
        use ExecStatus::*;
        assert_eq!(ExecStatus::aggregate([Done, Done]), Done);
        assert_eq!(ExecStatus::aggregate([Done, Exec, Done]), Exec);
        assert_eq!(ExecStatus::aggregate([Exec, Error, Done]), Error);
        assert_eq!(ExecStatus::aggregate([Error, Exec]), Error);
        assert_eq!(ExecStatus::aggregate(std::iter::empty()), Done);
    }

    #[test]
    fn joint_type_parse() {
        assert_eq!(JointType::parse("LINEAR"), Some(JointType::Linear));
        assert_eq!(JointType::parse(" angular "), Some(JointType::Angular));
        assert!(JointType::parse("ROTARY").is_none());
        assert_eq!(JointType::from_u8(2), Some(JointType::Angular));
    }

    #[test]
    fn io_accessors() {
        let mut status = MotionStatus::new();
        crate::io::set_bit(&mut status.synch_do, 3, true);
        assert!(status.digital_out(3));
        assert!(!status.digital_in(3));
        assert!(status.joint(0).is_none());
    }
}
