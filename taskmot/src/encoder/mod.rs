//! Command encoder.
//!
//! One bridge operation per command kind. Every operation follows the same
//! shape:
//!
//! 1. validate the target (joint index or sentinel, enum legality)
//! 2. run the numeric guard over the float arguments
//! 3. clamp velocities, accelerations and scale factors
//! 4. update local state if the operation keeps any
//! 5. build one [`MotionCommand`](taskmot_common::command::MotionCommand)
//!    and submit it
//!
//! Validation failures return [`Dispatch::NotApplicable`](crate::error::Dispatch)
//! and non-finite input returns [`Dispatch::Dropped`](crate::error::Dispatch);
//! neither touches the transport.
//!
//! Operations are split by target: [`joint`], [`traj`], and [`motion`]
//! (spindle, I/O, executor debug).

pub mod joint;
pub mod motion;
pub mod traj;

use taskmot_common::consts::{
    DEFAULT_JOINT_MAX_ACCELERATION, DEFAULT_JOINT_MAX_VELOCITY, DEFAULT_TRAJ_MAX_VELOCITY,
    MAX_JOINTS,
};
use taskmot_common::flags::DebugFlags;
use taskmot_common::status::JointType;
use tracing::debug;

use crate::error::Dispatch;

pub use joint::HomingRequest;

/// Local state the executor does not keep for us.
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderState {
    pub(crate) joint_type: [JointType; MAX_JOINTS],
    pub(crate) joint_units: [f64; MAX_JOINTS],
    pub(crate) joint_max_velocity: [f64; MAX_JOINTS],
    pub(crate) joint_max_acceleration: [f64; MAX_JOINTS],
    // The executor takes limits as a pair; the other bound comes from here.
    pub(crate) saved_min_limit: [f64; MAX_JOINTS],
    pub(crate) saved_max_limit: [f64; MAX_JOINTS],

    pub(crate) traj_joints: usize,
    pub(crate) traj_joint_mask: u16,
    pub(crate) linear_units: f64,
    pub(crate) angular_units: f64,
    pub(crate) traj_max_velocity: f64,
    pub(crate) traj_max_acceleration: f64,
    pub(crate) motion_id: i32,

    pub(crate) debug: DebugFlags,
}

impl Default for EncoderState {
    fn default() -> Self {
        Self {
            joint_type: [JointType::Linear; MAX_JOINTS],
            joint_units: [1.0; MAX_JOINTS],
            joint_max_velocity: [DEFAULT_JOINT_MAX_VELOCITY; MAX_JOINTS],
            joint_max_acceleration: [DEFAULT_JOINT_MAX_ACCELERATION; MAX_JOINTS],
            saved_min_limit: [0.0; MAX_JOINTS],
            saved_max_limit: [0.0; MAX_JOINTS],
            traj_joints: 0,
            traj_joint_mask: 0,
            linear_units: 1.0,
            angular_units: 1.0,
            traj_max_velocity: DEFAULT_TRAJ_MAX_VELOCITY,
            traj_max_acceleration: f64::MAX,
            motion_id: 0,
            debug: DebugFlags::empty(),
        }
    }
}

impl EncoderState {
    /// Configured joint count.
    pub fn traj_joints(&self) -> usize {
        self.traj_joints
    }

    /// Active-joint bitmask.
    pub fn traj_joint_mask(&self) -> u16 {
        self.traj_joint_mask
    }

    pub fn linear_units(&self) -> f64 {
        self.linear_units
    }

    pub fn angular_units(&self) -> f64 {
        self.angular_units
    }

    pub fn traj_max_velocity(&self) -> f64 {
        self.traj_max_velocity
    }

    pub fn traj_max_acceleration(&self) -> f64 {
        self.traj_max_acceleration
    }

    /// Motion id applied to subsequent moves.
    pub fn motion_id(&self) -> i32 {
        self.motion_id
    }

    pub fn debug_flags(&self) -> DebugFlags {
        self.debug
    }

    pub fn joint_type(&self, joint: usize) -> Option<JointType> {
        self.joint_type.get(joint).copied()
    }

    pub fn joint_units(&self, joint: usize) -> Option<f64> {
        self.joint_units.get(joint).copied()
    }

    pub fn joint_max_velocity(&self, joint: usize) -> Option<f64> {
        self.joint_max_velocity.get(joint).copied()
    }

    pub fn joint_max_acceleration(&self, joint: usize) -> Option<f64> {
        self.joint_max_acceleration.get(joint).copied()
    }

    /// Saved `(min, max)` position limits.
    pub fn saved_limits(&self, joint: usize) -> Option<(f64, f64)> {
        Some((
            *self.saved_min_limit.get(joint)?,
            *self.saved_max_limit.get(joint)?,
        ))
    }
}

/// Clamp to `[0, max]`. NaN passes through for the guard to catch.
#[inline]
pub(crate) fn clamp_non_negative(value: f64, max: f64) -> f64 {
    if value < 0.0 {
        0.0
    } else if value > max {
        max
    } else {
        value
    }
}

/// Clamp to `[-max, max]`, preserving sign.
#[inline]
pub(crate) fn clamp_symmetric(value: f64, max: f64) -> f64 {
    if value > max {
        max
    } else if value < -max {
        -max
    } else {
        value
    }
}

/// Negative factors become zero.
#[inline]
pub(crate) fn floor_zero(value: f64) -> f64 {
    if value < 0.0 { 0.0 } else { value }
}

/// Numeric-guard rejection raised before any local state is touched.
pub(crate) fn dropped(op: &'static str) -> Dispatch {
    debug!(op, "Dropping operation with non-finite argument");
    Dispatch::Dropped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps() {
        assert_eq!(clamp_non_negative(-3.0, 10.0), 0.0);
        assert_eq!(clamp_non_negative(15.0, 10.0), 10.0);
        assert_eq!(clamp_non_negative(4.0, 10.0), 4.0);
        assert_eq!(clamp_symmetric(-15.0, 10.0), -10.0);
        assert_eq!(clamp_symmetric(15.0, 10.0), 10.0);
        assert_eq!(clamp_symmetric(-4.0, 10.0), -4.0);
        assert_eq!(floor_zero(-0.5), 0.0);
        assert_eq!(floor_zero(1.5), 1.5);
        assert!(clamp_symmetric(f64::NAN, 1.0).is_nan());
    }

    #[test]
    fn default_state() {
        let s = EncoderState::default();
        assert_eq!(s.traj_joints(), 0);
        assert_eq!(s.traj_max_acceleration(), f64::MAX);
        assert_eq!(s.joint_max_velocity(0), Some(DEFAULT_JOINT_MAX_VELOCITY));
        assert_eq!(s.joint_max_velocity(MAX_JOINTS), None);
        assert_eq!(s.saved_limits(3), Some((0.0, 0.0)));
    }
}
