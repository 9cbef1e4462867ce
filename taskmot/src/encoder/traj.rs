//! Trajectory-level operations.

use taskmot_common::command::{
    CircleMove, LineMove, MotionCommand, ProbeMove, RigidTapMove, TermCond, TrajMode,
};
use taskmot_common::consts::MAX_JOINTS;
use taskmot_common::flags::DebugFlags;
use taskmot_common::pose::{Cartesian, Pose};
use tracing::{info, warn};

use super::{clamp_non_negative, dropped, floor_zero};
use crate::bridge::MotionBridge;
use crate::channel::MotionChannel;
use crate::error::{BridgeError, BridgeResult, Dispatch};
use crate::guard::{all_finite, pose_is_finite};

/// Bits of the joint mask considered when deriving a joint count.
const DERIVE_MASK: u32 = (1 << MAX_JOINTS) - 1;

/// Resolve the effective joint count.
///
/// A zero `joints` is derived from the highest set bit of `mask` (low nine
/// bits only). The result must lie in `1..=MAX_JOINTS` and cover every bit
/// of `mask`.
pub fn derive_joint_count(joints: usize, mask: u32) -> Option<usize> {
    let joints = if joints == 0 {
        let low = mask & DERIVE_MASK;
        (u32::BITS - low.leading_zeros()) as usize
    } else {
        joints
    };
    if joints == 0 || joints > MAX_JOINTS || u64::from(mask) >= (1u64 << joints) {
        return None;
    }
    Some(joints)
}

/// Circular move arguments.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ArcGeometry {
    pub end: Pose,
    pub center: Cartesian,
    pub normal: Cartesian,
    /// Additional full turns.
    pub turn: i32,
}

impl<C: MotionChannel> MotionBridge<C> {
    // ─── Configuration ──────────────────────────────────────────────

    /// Set the joint count and active mask. `joints == 0` derives the count
    /// from the mask.
    ///
    /// # Errors
    ///
    /// `InvalidJointCount` if the derived count is out of range or too small
    /// for the mask.
    pub fn traj_set_joints(&mut self, joints: usize, mask: u32) -> BridgeResult<Dispatch> {
        let Some(count) = derive_joint_count(joints, mask) else {
            warn!(joints, mask = format_args!("{mask:#x}"), "Rejecting joint count");
            return Err(BridgeError::InvalidJointCount { joints, mask });
        };
        self.encoder.traj_joints = count;
        self.encoder.traj_joint_mask = mask as u16;
        self.submit(MotionCommand::SetNumJoints { joints: count })
    }

    /// Record user units. Both must be strictly positive.
    pub fn traj_set_units(&mut self, linear: f64, angular: f64) -> BridgeResult<Dispatch> {
        if !(linear > 0.0 && angular > 0.0) || !linear.is_finite() || !angular.is_finite() {
            return Err(BridgeError::InvalidUnits { linear, angular });
        }
        self.encoder.linear_units = linear;
        self.encoder.angular_units = angular;
        Ok(Dispatch::Local)
    }

    pub fn traj_set_mode(&mut self, mode: TrajMode) -> BridgeResult<Dispatch> {
        let command = match mode {
            TrajMode::Free => MotionCommand::Free,
            TrajMode::Coord => MotionCommand::Coord,
            TrajMode::Teleop => MotionCommand::Teleop,
        };
        self.submit(command)
    }

    /// Mode switch from a raw mode number. Anything but free, coord or
    /// teleop is not applicable.
    pub fn traj_set_mode_raw(&mut self, mode: i32) -> BridgeResult<Dispatch> {
        match u8::try_from(mode).ok().and_then(TrajMode::from_u8) {
            Some(mode) => self.traj_set_mode(mode),
            None => Ok(Dispatch::NotApplicable),
        }
    }

    /// Requested and ceiling velocity, each clamped to `[0, traj max]`.
    pub fn traj_set_velocity(&mut self, vel: f64, ini_maxvel: f64) -> BridgeResult<Dispatch> {
        if !all_finite(&[vel, ini_maxvel]) {
            return Ok(dropped("traj_set_velocity"));
        }
        let max = self.encoder.traj_max_velocity;
        self.submit(MotionCommand::SetVel {
            vel: clamp_non_negative(vel, max),
            ini_maxvel: clamp_non_negative(ini_maxvel, max),
        })
    }

    /// Acceleration clamped to `[0, traj max acceleration]`.
    pub fn traj_set_acceleration(&mut self, acc: f64) -> BridgeResult<Dispatch> {
        if !acc.is_finite() {
            return Ok(dropped("traj_set_acceleration"));
        }
        let acc = clamp_non_negative(acc, self.encoder.traj_max_acceleration);
        self.submit(MotionCommand::SetAcc { acc })
    }

    /// Store and send the trajectory velocity ceiling.
    pub fn traj_set_max_velocity(&mut self, vel: f64) -> BridgeResult<Dispatch> {
        if !vel.is_finite() {
            return Ok(dropped("traj_set_max_velocity"));
        }
        let vel = floor_zero(vel);
        self.encoder.traj_max_velocity = vel;
        self.submit(MotionCommand::SetVelLimit { vel })
    }

    /// Store the acceleration ceiling. The executor has no such limit.
    pub fn traj_set_max_acceleration(&mut self, acc: f64) -> Dispatch {
        if !acc.is_finite() {
            return dropped("traj_set_max_acceleration");
        }
        self.encoder.traj_max_acceleration = floor_zero(acc);
        Dispatch::Local
    }

    pub fn traj_set_home(&mut self, home: Pose) -> BridgeResult<Dispatch> {
        self.submit(MotionCommand::SetWorldHome { pose: home })
    }

    /// Feed override factor; negative becomes zero.
    pub fn traj_set_scale(&mut self, scale: f64) -> BridgeResult<Dispatch> {
        if !scale.is_finite() {
            return Ok(dropped("traj_set_scale"));
        }
        self.submit(MotionCommand::FeedScale {
            scale: floor_zero(scale),
        })
    }

    /// Spindle override factor; negative becomes zero.
    pub fn traj_set_spindle_scale(&mut self, scale: f64) -> BridgeResult<Dispatch> {
        if !scale.is_finite() {
            return Ok(dropped("traj_set_spindle_scale"));
        }
        self.submit(MotionCommand::SpindleScale {
            scale: floor_zero(scale),
        })
    }

    pub fn traj_set_fo_enable(&mut self, mode: u8) -> BridgeResult<Dispatch> {
        self.submit(MotionCommand::FsEnable { mode })
    }

    pub fn traj_set_fh_enable(&mut self, mode: u8) -> BridgeResult<Dispatch> {
        self.submit(MotionCommand::FhEnable { mode })
    }

    pub fn traj_set_so_enable(&mut self, mode: u8) -> BridgeResult<Dispatch> {
        self.submit(MotionCommand::SsEnable { mode })
    }

    pub fn traj_set_af_enable(&mut self, enable: bool) -> BridgeResult<Dispatch> {
        self.submit(MotionCommand::AfEnable { enable })
    }

    /// Tag subsequent moves with `id`.
    pub fn traj_set_motion_id(&mut self, id: i32) -> Dispatch {
        if self.encoder.debug.contains(DebugFlags::MOTION_TIME) && id != self.encoder.motion_id {
            info!(id, "Outgoing motion id");
        }
        self.encoder.motion_id = id;
        Dispatch::Local
    }

    pub fn linear_units(&self) -> f64 {
        self.encoder.linear_units
    }

    pub fn angular_units(&self) -> f64 {
        self.encoder.angular_units
    }

    // ─── Control ────────────────────────────────────────────────────

    pub fn traj_enable(&mut self) -> BridgeResult<Dispatch> {
        self.submit(MotionCommand::Enable)
    }

    pub fn traj_disable(&mut self) -> BridgeResult<Dispatch> {
        self.submit(MotionCommand::Disable)
    }

    pub fn traj_abort(&mut self) -> BridgeResult<Dispatch> {
        self.submit(MotionCommand::Abort)
    }

    pub fn traj_pause(&mut self) -> BridgeResult<Dispatch> {
        self.submit(MotionCommand::Pause)
    }

    pub fn traj_step(&mut self) -> BridgeResult<Dispatch> {
        self.submit(MotionCommand::Step)
    }

    pub fn traj_resume(&mut self) -> BridgeResult<Dispatch> {
        self.submit(MotionCommand::Resume)
    }

    /// Dwell is timed by the task sequencer; nothing to send.
    pub fn traj_delay(&mut self, _delay: f64) -> Dispatch {
        Dispatch::Local
    }

    pub fn traj_set_offset(&mut self, tool_offset: Pose) -> BridgeResult<Dispatch> {
        self.submit(MotionCommand::SetOffset { tool_offset })
    }

    /// Feed per revolution for spindle-synchronized motion; `0` ends sync.
    pub fn traj_set_spindle_sync(
        &mut self,
        fpr: f64,
        wait_for_index: bool,
    ) -> BridgeResult<Dispatch> {
        self.submit(MotionCommand::SetSpindleSync {
            fpr,
            wait_for_index,
        })
    }

    /// Raw `cond` other than stop blends.
    pub fn traj_set_term_cond(&mut self, cond: i32, tolerance: f64) -> BridgeResult<Dispatch> {
        self.submit(MotionCommand::SetTermCond {
            cond: TermCond::from_raw(cond),
            tolerance,
        })
    }

    // ─── Moves ──────────────────────────────────────────────────────

    /// Queue a straight coordinated move.
    pub fn traj_linear_move(
        &mut self,
        end: Pose,
        motion_type: i32,
        vel: f64,
        ini_maxvel: f64,
        acc: f64,
        indexrotary: i32,
    ) -> BridgeResult<Dispatch> {
        if !pose_is_finite(&end) {
            return Ok(dropped("traj_linear_move"));
        }
        self.submit(MotionCommand::SetLine(LineMove {
            end,
            id: self.encoder.motion_id,
            motion_type,
            vel,
            ini_maxvel,
            acc,
            indexrotary,
        }))
    }

    /// Queue a circular or helical move.
    pub fn traj_circular_move(
        &mut self,
        arc: ArcGeometry,
        motion_type: i32,
        vel: f64,
        ini_maxvel: f64,
        acc: f64,
    ) -> BridgeResult<Dispatch> {
        if !pose_is_finite(&arc.end) || !arc.center.is_finite() || !arc.normal.is_finite() {
            return Ok(dropped("traj_circular_move"));
        }
        self.submit(MotionCommand::SetCircle(CircleMove {
            end: arc.end,
            center: arc.center,
            normal: arc.normal,
            turn: arc.turn,
            motion_type,
            id: self.encoder.motion_id,
            vel,
            ini_maxvel,
            acc,
        }))
    }

    pub fn traj_clear_probe_tripped_flag(&mut self) -> BridgeResult<Dispatch> {
        self.submit(MotionCommand::ClearProbeFlags)
    }

    /// Queue a probing move.
    pub fn traj_probe(
        &mut self,
        pos: Pose,
        motion_type: i32,
        vel: f64,
        ini_maxvel: f64,
        acc: f64,
        probe_type: u8,
    ) -> BridgeResult<Dispatch> {
        if !pose_is_finite(&pos) {
            return Ok(dropped("traj_probe"));
        }
        self.submit(MotionCommand::Probe(ProbeMove {
            pos,
            id: self.encoder.motion_id,
            motion_type,
            vel,
            ini_maxvel,
            acc,
            probe_type,
        }))
    }

    /// Queue a rigid tapping move. Only the translation is used.
    pub fn traj_rigid_tap(
        &mut self,
        pos: Pose,
        vel: f64,
        ini_maxvel: f64,
        acc: f64,
    ) -> BridgeResult<Dispatch> {
        if !pos.tran.is_finite() {
            return Ok(dropped("traj_rigid_tap"));
        }
        self.submit(MotionCommand::RigidTap(RigidTapMove {
            pos: pos.tran,
            id: self.encoder.motion_id,
            vel,
            ini_maxvel,
            acc,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_from_mask() {
        assert_eq!(derive_joint_count(0, 0b0001_0110), Some(5));
        assert_eq!(derive_joint_count(0, 0b1_0000_0000), Some(9));
        assert_eq!(derive_joint_count(0, 0b1), Some(1));
        assert_eq!(derive_joint_count(3, 0b111), Some(3));
    }

    #[test]
    fn reject_inconsistent() {
        assert_eq!(derive_joint_count(0, 0), None);
        assert_eq!(derive_joint_count(2, 0b111), None);
        assert_eq!(derive_joint_count(MAX_JOINTS + 1, 0), None);
        // Bit 9 is ignored for derivation and then fails the mask check.
        assert_eq!(derive_joint_count(0, 0x200), None);
        assert_eq!(derive_joint_count(0, 0x201), None);
    }

    #[test]
    fn count_without_mask_bits_is_fine() {
        assert_eq!(derive_joint_count(4, 0), Some(4));
    }
}
