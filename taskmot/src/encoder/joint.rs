//! Joint-level operations.

use std::path::Path;

use taskmot_common::command::{HomingParams, JointTarget, MotionCommand};
use taskmot_common::consts::MAX_JOINTS;
use taskmot_common::flags::HomeFlags;
use taskmot_common::status::JointType;
use tracing::debug;

use super::{clamp_symmetric, dropped, floor_zero};
use crate::bridge::MotionBridge;
use crate::channel::MotionChannel;
use crate::comp::{CompTable, CompType};
use crate::error::{BridgeResult, Dispatch};
use crate::guard::all_finite;

/// Homing parameters with the option flags still separate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HomingRequest {
    pub home: f64,
    pub offset: f64,
    pub final_vel: f64,
    pub search_vel: f64,
    pub latch_vel: f64,
    pub use_index: bool,
    pub ignore_limits: bool,
    pub is_shared: bool,
    pub sequence: i32,
    pub volatile_home: bool,
    /// Unlock the indexer before homing.
    pub locking_indexer: bool,
}

impl Default for HomingRequest {
    fn default() -> Self {
        Self {
            home: 0.0,
            offset: 0.0,
            final_vel: -1.0,
            search_vel: 0.0,
            latch_vel: 0.0,
            use_index: false,
            ignore_limits: false,
            is_shared: false,
            sequence: -1,
            volatile_home: false,
            locking_indexer: false,
        }
    }
}

impl HomingRequest {
    /// Wire form: options composed into one flag set.
    pub fn compose(&self) -> HomingParams {
        HomingParams {
            home: self.home,
            offset: self.offset,
            final_vel: self.final_vel,
            search_vel: self.search_vel,
            latch_vel: self.latch_vel,
            flags: HomeFlags::compose(
                self.use_index,
                self.ignore_limits,
                self.is_shared,
                self.locking_indexer,
            ),
            sequence: self.sequence,
            volatile_home: self.volatile_home,
        }
    }
}

#[inline]
fn in_range(joint: usize) -> bool {
    joint < MAX_JOINTS
}

impl<C: MotionChannel> MotionBridge<C> {
    // ─── Local parameters ───────────────────────────────────────────

    /// Record the joint's kinematic type (reported in status only).
    pub fn set_joint_type(&mut self, joint: usize, joint_type: JointType) -> Dispatch {
        if !in_range(joint) {
            return Dispatch::NotApplicable;
        }
        self.encoder.joint_type[joint] = joint_type;
        Dispatch::Local
    }

    /// Record the joint's units (reported in status only).
    pub fn set_units(&mut self, joint: usize, units: f64) -> Dispatch {
        if !in_range(joint) {
            return Dispatch::NotApplicable;
        }
        if !units.is_finite() {
            return dropped("set_units");
        }
        self.encoder.joint_units[joint] = units;
        Dispatch::Local
    }

    // ─── Executor parameters ────────────────────────────────────────

    pub fn set_backlash(&mut self, joint: usize, backlash: f64) -> BridgeResult<Dispatch> {
        if !in_range(joint) {
            return Ok(Dispatch::NotApplicable);
        }
        self.submit(MotionCommand::SetBacklash { joint, backlash })
    }

    /// Set the lower soft limit. The upper bound is re-sent from the saved value.
    pub fn set_min_position_limit(&mut self, joint: usize, limit: f64) -> BridgeResult<Dispatch> {
        if !in_range(joint) {
            return Ok(Dispatch::NotApplicable);
        }
        if !limit.is_finite() {
            return Ok(dropped("set_min_position_limit"));
        }
        self.encoder.saved_min_limit[joint] = limit;
        let max = self.encoder.saved_max_limit[joint];
        self.submit(MotionCommand::SetPositionLimits { joint, min: limit, max })
    }

    /// Set the upper soft limit. The lower bound is re-sent from the saved value.
    pub fn set_max_position_limit(&mut self, joint: usize, limit: f64) -> BridgeResult<Dispatch> {
        if !in_range(joint) {
            return Ok(Dispatch::NotApplicable);
        }
        if !limit.is_finite() {
            return Ok(dropped("set_max_position_limit"));
        }
        self.encoder.saved_max_limit[joint] = limit;
        let min = self.encoder.saved_min_limit[joint];
        self.submit(MotionCommand::SetPositionLimits { joint, min, max: limit })
    }

    pub fn set_motor_offset(&mut self, joint: usize, offset: f64) -> BridgeResult<Dispatch> {
        if !in_range(joint) {
            return Ok(Dispatch::NotApplicable);
        }
        self.submit(MotionCommand::SetMotorOffset { joint, offset })
    }

    /// Following-error limit at maximum velocity.
    pub fn set_max_ferror(&mut self, joint: usize, ferror: f64) -> BridgeResult<Dispatch> {
        if !in_range(joint) {
            return Ok(Dispatch::NotApplicable);
        }
        self.submit(MotionCommand::SetMaxFerror { joint, ferror })
    }

    /// Following-error limit at zero velocity.
    pub fn set_min_ferror(&mut self, joint: usize, ferror: f64) -> BridgeResult<Dispatch> {
        if !in_range(joint) {
            return Ok(Dispatch::NotApplicable);
        }
        self.submit(MotionCommand::SetMinFerror { joint, ferror })
    }

    pub fn set_homing_params(
        &mut self,
        joint: usize,
        request: &HomingRequest,
    ) -> BridgeResult<Dispatch> {
        if !in_range(joint) {
            return Ok(Dispatch::NotApplicable);
        }
        self.submit(MotionCommand::SetHomingParams {
            joint,
            params: request.compose(),
        })
    }

    /// Set the joint velocity ceiling. Negative values become zero; jogs are
    /// clamped against the stored value.
    pub fn set_max_velocity(&mut self, joint: usize, vel: f64) -> BridgeResult<Dispatch> {
        if !in_range(joint) {
            return Ok(Dispatch::NotApplicable);
        }
        if !vel.is_finite() {
            return Ok(dropped("set_max_velocity"));
        }
        let vel = floor_zero(vel);
        self.encoder.joint_max_velocity[joint] = vel;
        self.submit(MotionCommand::SetJointVelLimit { joint, vel })
    }

    /// Set the joint acceleration ceiling. Negative values become zero.
    pub fn set_max_acceleration(&mut self, joint: usize, acc: f64) -> BridgeResult<Dispatch> {
        if !in_range(joint) {
            return Ok(Dispatch::NotApplicable);
        }
        if !acc.is_finite() {
            return Ok(dropped("set_max_acceleration"));
        }
        let acc = floor_zero(acc);
        self.encoder.joint_max_acceleration[joint] = acc;
        self.submit(MotionCommand::SetJointAccLimit { joint, acc })
    }

    // ─── Joint control ──────────────────────────────────────────────

    pub fn joint_abort(&mut self, joint: usize) -> BridgeResult<Dispatch> {
        if !in_range(joint) {
            return Ok(Dispatch::NotApplicable);
        }
        self.submit(MotionCommand::JointAbort { joint })
    }

    pub fn joint_activate(&mut self, joint: usize) -> BridgeResult<Dispatch> {
        if !in_range(joint) {
            return Ok(Dispatch::NotApplicable);
        }
        self.submit(MotionCommand::ActivateJoint { joint })
    }

    pub fn joint_deactivate(&mut self, joint: usize) -> BridgeResult<Dispatch> {
        if !in_range(joint) {
            return Ok(Dispatch::NotApplicable);
        }
        self.submit(MotionCommand::DeactivateJoint { joint })
    }

    /// Override hard limits on `joint`. A negative index resumes normal
    /// limit checking.
    pub fn joint_override_limits(&mut self, joint: i32) -> BridgeResult<Dispatch> {
        let target = match joint {
            j if j >= MAX_JOINTS as i32 => return Ok(Dispatch::NotApplicable),
            j if j < 0 => JointTarget::None,
            j => JointTarget::Joint(j as usize),
        };
        self.submit(MotionCommand::OverrideLimits { joint: target })
    }

    /// Enable the joint amplifier.
    pub fn joint_enable(&mut self, joint: usize) -> BridgeResult<Dispatch> {
        if !in_range(joint) {
            return Ok(Dispatch::NotApplicable);
        }
        self.submit(MotionCommand::EnableAmplifier { joint })
    }

    /// Disable the joint amplifier.
    pub fn joint_disable(&mut self, joint: usize) -> BridgeResult<Dispatch> {
        if !in_range(joint) {
            return Ok(Dispatch::NotApplicable);
        }
        self.submit(MotionCommand::DisableAmplifier { joint })
    }

    /// Home `joint`; `-1` homes all joints in sequence order.
    pub fn joint_home(&mut self, joint: i32) -> BridgeResult<Dispatch> {
        let target = match joint {
            -1 => JointTarget::All,
            j if (0..MAX_JOINTS as i32).contains(&j) => JointTarget::Joint(j as usize),
            _ => return Ok(Dispatch::NotApplicable),
        };
        self.submit(MotionCommand::Home { joint: target })
    }

    /// Unhome `joint`; `-1` unhomes all, `-2` only volatile-home joints.
    pub fn joint_unhome(&mut self, joint: i32) -> BridgeResult<Dispatch> {
        let target = match joint {
            -2 => JointTarget::Volatile,
            -1 => JointTarget::All,
            j if (0..MAX_JOINTS as i32).contains(&j) => JointTarget::Joint(j as usize),
            _ => return Ok(Dispatch::NotApplicable),
        };
        self.submit(MotionCommand::Unhome { joint: target })
    }

    // ─── Jogging ────────────────────────────────────────────────────

    fn jog_velocity(&self, joint: usize, vel: f64) -> f64 {
        clamp_symmetric(vel, self.encoder.joint_max_velocity[joint])
    }

    /// Jog continuously at `vel`, clamped to the joint ceiling.
    pub fn jog_cont(&mut self, joint: usize, vel: f64) -> BridgeResult<Dispatch> {
        if !in_range(joint) {
            return Ok(Dispatch::NotApplicable);
        }
        if !vel.is_finite() {
            return Ok(dropped("jog_cont"));
        }
        let vel = self.jog_velocity(joint, vel);
        self.submit(MotionCommand::JogCont { joint, vel })
    }

    /// Jog by `incr` at `vel`.
    pub fn jog_incr(&mut self, joint: usize, incr: f64, vel: f64) -> BridgeResult<Dispatch> {
        if !in_range(joint) {
            return Ok(Dispatch::NotApplicable);
        }
        if !all_finite(&[incr, vel]) {
            return Ok(dropped("jog_incr"));
        }
        let vel = self.jog_velocity(joint, vel);
        self.submit(MotionCommand::JogIncr { joint, incr, vel })
    }

    /// Jog to absolute position `pos` at `vel`.
    pub fn jog_abs(&mut self, joint: usize, pos: f64, vel: f64) -> BridgeResult<Dispatch> {
        if !in_range(joint) {
            return Ok(Dispatch::NotApplicable);
        }
        if !all_finite(&[pos, vel]) {
            return Ok(dropped("jog_abs"));
        }
        let vel = self.jog_velocity(joint, vel);
        self.submit(MotionCommand::JogAbs { joint, pos, vel })
    }

    /// Stop a jog.
    pub fn jog_stop(&mut self, joint: usize) -> BridgeResult<Dispatch> {
        self.joint_abort(joint)
    }

    // ─── Compensation ───────────────────────────────────────────────

    /// Load a compensation table and send each entry.
    ///
    /// Entries are sent in file order; the first transport failure stops the
    /// upload.
    pub fn joint_load_comp(
        &mut self,
        joint: usize,
        path: &Path,
        comp_type: CompType,
    ) -> BridgeResult<Dispatch> {
        if !in_range(joint) {
            return Ok(Dispatch::NotApplicable);
        }
        let table = CompTable::load(path, comp_type)?;
        let mut skipped = 0usize;
        for entry in table.entries() {
            if !all_finite(&[entry.nominal, entry.forward, entry.reverse]) {
                skipped += 1;
                continue;
            }
            self.submit(MotionCommand::SetJointComp {
                joint,
                nominal: entry.nominal,
                forward: entry.forward,
                reverse: entry.reverse,
            })?;
        }
        debug!(
            joint,
            entries = table.len(),
            skipped,
            path = %path.display(),
            "Compensation table loaded"
        );
        Ok(if table.is_empty() {
            Dispatch::Local
        } else {
            Dispatch::Sent
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn homing_request_composes_flags() {
        let req = HomingRequest {
            use_index: true,
            locking_indexer: true,
            ..Default::default()
        };
        let p = req.compose();
        assert_eq!(p.flags, HomeFlags::USE_INDEX | HomeFlags::UNLOCK_FIRST);
        assert_eq!(p.sequence, -1);
        assert_eq!(p.final_vel, -1.0);
    }
}
