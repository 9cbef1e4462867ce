//! Status decode state machine.
//!
//! One [`StatusDecoder::update`] per supervisory cycle:
//!
//! 1. read the status snapshot (failure aborts the cycle)
//! 2. re-read the config snapshot if its generation changed
//! 3. read the debug snapshot if enabled
//! 4. forward a pending executor error to the operator
//! 5. decode joints, then the trajectory
//! 6. fold heartbeat, echoes, spindle and I/O into the aggregate
//!
//! Nothing is committed until every read has succeeded, so a failed cycle
//! leaves the previous state intact.
//!
//! # Classification
//!
//! | Record | `Error` | `Done` | otherwise |
//! |--------|---------|--------|-----------|
//! | joint | `ERROR` bit | `INPOS` bit | `Exec` |
//! | trajectory | motion `ERROR` bit | `INPOS` and empty queue | `Exec` |
//! | aggregate | any `Error` | all `Done` | `Exec` |
//!
//! Mode bits are not exclusive in the raw word: teleop wins over coord,
//! coord over free.

use std::time::Instant;

use heapless::Vec as HVec;
use taskmot_common::command::TrajMode;
use taskmot_common::consts::MAX_JOINTS;
use taskmot_common::flags::{DebugFlags, EnableFlags, JointFlags, MotionFlags};
use taskmot_common::snapshot::{ConfigSnapshot, DebugSnapshot, StatusSnapshot};
use taskmot_common::status::{
    ExecStatus, JointStatus, MotionStatus, SpindleStatus, TrajStatus,
};
use tracing::{error, info};

use crate::channel::MotionChannel;
use crate::encoder::EncoderState;
use crate::error::BridgeResult;
use crate::notify::OperatorNotifier;

/// Decoder state carried between cycles.
#[derive(Debug, Clone)]
pub struct StatusDecoder {
    status: StatusSnapshot,
    config: ConfigSnapshot,
    debug: DebugSnapshot,
    config_seen: bool,
    fresh_config: bool,
    debug_info: bool,
    // Joint records from the previous cycle: config mirrors and last status.
    joints: [JointStatus; MAX_JOINTS],
    timer: MotionTimer,
}

impl Default for StatusDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusDecoder {
    pub fn new() -> Self {
        Self {
            status: StatusSnapshot::new(),
            config: ConfigSnapshot::default(),
            debug: DebugSnapshot::default(),
            config_seen: false,
            fresh_config: false,
            debug_info: false,
            joints: [JointStatus::default(); MAX_JOINTS],
            timer: MotionTimer::default(),
        }
    }

    /// Read the extended debug snapshot each cycle.
    pub fn set_debug_info(&mut self, enabled: bool) {
        self.debug_info = enabled;
    }

    pub fn debug_info(&self) -> bool {
        self.debug_info
    }

    /// Status snapshot of the last successful cycle.
    pub fn last_snapshot(&self) -> &StatusSnapshot {
        &self.status
    }

    pub fn config_snapshot(&self) -> &ConfigSnapshot {
        &self.config
    }

    pub fn debug_snapshot(&self) -> &DebugSnapshot {
        &self.debug
    }

    /// Forget the config snapshot and the joint config mirrors so the next
    /// update re-reads them whatever the generation counter says.
    pub fn reset_config(&mut self) {
        self.config = ConfigSnapshot::default();
        self.config_seen = false;
        self.fresh_config = false;
        self.joints = [JointStatus::default(); MAX_JOINTS];
    }

    /// The last cycle picked up a new config generation.
    pub fn fresh_config(&self) -> bool {
        self.fresh_config
    }

    /// Run one decode cycle.
    ///
    /// # Errors
    ///
    /// Status, config or debug read failure. The previous state is kept.
    pub fn update<C: MotionChannel + ?Sized>(
        &mut self,
        channel: &mut C,
        encoder: &EncoderState,
        notifier: &dyn OperatorNotifier,
    ) -> BridgeResult<MotionStatus> {
        let status = channel.read_status()?;

        let fresh = !self.config_seen || status.config_num != self.config.config_num;
        let config = if fresh {
            Some(channel.read_config()?)
        } else {
            None
        };

        let debug = if self.debug_info {
            Some(channel.read_debug()?)
        } else {
            None
        };

        if let Ok(Some(message)) = channel.read_error() {
            notifier.operator_error(&message);
        }

        // Commit.
        self.status = status;
        self.fresh_config = fresh;
        if let Some(config) = config {
            self.config = config;
            self.config_seen = true;
        }
        if let Some(debug) = debug {
            self.debug = debug;
        }

        let joints = self.decode_joints(encoder);
        let traj = self.decode_traj(encoder);
        Ok(self.aggregate(joints, traj))
    }

    fn decode_joints(&mut self, encoder: &EncoderState) -> HVec<JointStatus, MAX_JOINTS> {
        let mut out = HVec::new();
        let count = encoder.traj_joints().min(MAX_JOINTS);
        let override_limits = self.status.override_limit_mask != 0;

        for (index, (prev, fb)) in self
            .joints
            .iter_mut()
            .zip(self.status.joints.iter())
            .take(count)
            .enumerate()
        {
            let flags = fb.flags;
            prev.joint_type = encoder.joint_type(index).unwrap_or_default();
            prev.units = encoder.joint_units(index).unwrap_or(1.0);
            if self.fresh_config {
                prev.backlash = fb.backlash;
                prev.min_position_limit = fb.min_pos_limit;
                prev.max_position_limit = fb.max_pos_limit;
                prev.min_ferror = fb.min_ferror;
                prev.max_ferror = fb.max_ferror;
                prev.home_offset = fb.home_offset;
            }
            prev.output = fb.pos_cmd;
            prev.input = fb.pos_fb;
            prev.velocity = fb.vel_cmd;
            prev.ferror_current = fb.ferror;
            prev.ferror_high_mark = fb.ferror_high_mark;

            prev.homing = flags.contains(JointFlags::HOMING);
            prev.homed = flags.contains(JointFlags::HOMED);
            prev.fault = flags.contains(JointFlags::FAULT);
            prev.enabled = flags.contains(JointFlags::ENABLE);
            prev.inpos = flags.contains(JointFlags::INPOS);
            prev.min_soft_limit = false;
            prev.max_soft_limit = false;
            prev.min_hard_limit = flags.contains(JointFlags::MIN_HARD_LIMIT);
            prev.max_hard_limit = flags.contains(JointFlags::MAX_HARD_LIMIT);
            prev.override_limits = override_limits;

            prev.status = if flags.contains(JointFlags::ERROR) {
                if prev.status != ExecStatus::Error {
                    error!(
                        joint = index,
                        command = self.status.command_num_echo,
                        "Error on joint"
                    );
                }
                ExecStatus::Error
            } else if flags.contains(JointFlags::INPOS) {
                ExecStatus::Done
            } else {
                ExecStatus::Exec
            };

            // Capacity equals MAX_JOINTS and count is bounded by it.
            let _ = out.push(*prev);
        }
        out
    }

    fn decode_traj(&mut self, encoder: &EncoderState) -> TrajStatus {
        let s = &self.status;
        let motion = s.motion_flags;

        let mode = if motion.contains(MotionFlags::TELEOP) {
            TrajMode::Teleop
        } else if motion.contains(MotionFlags::COORD) {
            TrajMode::Coord
        } else {
            TrajMode::Free
        };

        let enables = if motion.contains(MotionFlags::COORD) {
            s.enables_queued
        } else {
            s.enables_new
        };

        let inpos = motion.contains(MotionFlags::INPOS);
        let status = if motion.contains(MotionFlags::ERROR) {
            ExecStatus::Error
        } else if inpos && s.depth == 0 {
            ExecStatus::Done
        } else {
            ExecStatus::Exec
        };

        if encoder.debug_flags().contains(DebugFlags::MOTION_TIME) {
            self.timer.observe(s.id, status);
        }

        TrajStatus {
            joints: encoder.traj_joints(),
            joint_mask: encoder.traj_joint_mask(),
            linear_units: encoder.linear_units(),
            angular_units: encoder.angular_units(),
            mode,
            enabled: motion.contains(MotionFlags::ENABLE) && encoder.traj_joints() > 0,
            inpos,
            queue: s.depth,
            active_queue: s.active_depth,
            queue_full: s.queue_full,
            id: s.id,
            motion_type: s.motion_type,
            distance_to_go: s.distance_to_go,
            dtg: s.dtg,
            current_vel: s.current_vel,
            paused: s.paused,
            scale: s.feed_scale,
            spindle_scale: s.spindle_scale,
            position: s.carte_pos_cmd,
            actual_position: s.carte_pos_fb,
            velocity: s.vel,
            acceleration: s.acc,
            max_acceleration: encoder.traj_max_acceleration(),
            probed_position: s.probed_pos,
            probeval: s.probe_val,
            probing: s.probing,
            probe_tripped: s.probe_tripped,
            feed_override_enabled: enables.contains(EnableFlags::FEED_OVERRIDE),
            spindle_override_enabled: enables.contains(EnableFlags::SPINDLE_OVERRIDE),
            adaptive_feed_enabled: enables.contains(EnableFlags::ADAPTIVE_FEED),
            feed_hold_enabled: enables.contains(EnableFlags::FEED_HOLD),
            cycle_time: self.config.traj_cycle_time,
            kinematics_type: self.config.kinematics_type,
            max_velocity: self.config.limit_vel,
            status,
        }
    }

    fn aggregate(&self, joints: HVec<JointStatus, MAX_JOINTS>, traj: TrajStatus) -> MotionStatus {
        let s = &self.status;
        let status = ExecStatus::aggregate(
            joints
                .iter()
                .map(|j| j.status)
                .chain(std::iter::once(traj.status)),
        );
        MotionStatus {
            heartbeat: s.heartbeat,
            command_type: s.command_echo,
            echo_serial_number: s.command_num_echo,
            debug: self.config.debug,
            joints,
            traj,
            spindle: SpindleStatus {
                enabled: s.spindle.speed != 0.0,
                speed: s.spindle.speed,
                brake: s.spindle.brake,
                direction: s.spindle.direction,
                orient_state: s.spindle.orient_state,
                orient_fault: s.spindle.orient_fault,
            },
            synch_di: s.synch_di,
            synch_do: s.synch_do,
            analog_input: s.analog_input,
            analog_output: s.analog_output,
            status,
        }
    }
}

/// Motion-id duration logging.
#[derive(Debug, Clone)]
struct MotionTimer {
    last_id: i32,
    last_id_printed: i32,
    last_status: ExecStatus,
    since: Instant,
}

impl Default for MotionTimer {
    fn default() -> Self {
        Self {
            last_id: 0,
            last_id_printed: 0,
            last_status: ExecStatus::Done,
            since: Instant::now(),
        }
    }
}

impl MotionTimer {
    fn observe(&mut self, id: i32, status: ExecStatus) {
        if id != self.last_id {
            if self.last_id != self.last_id_printed {
                self.report(self.last_id);
                self.last_id_printed = self.last_id;
            }
            self.last_id = id;
            self.since = Instant::now();
        }
        if status == ExecStatus::Done
            && self.last_status != ExecStatus::Done
            && id != self.last_id_printed
        {
            self.report(self.last_id);
            self.last_id = id;
            self.last_id_printed = id;
            self.since = Instant::now();
        }
        self.last_status = status;
    }

    fn report(&self, id: i32) {
        info!(
            id,
            seconds = self.since.elapsed().as_secs_f64(),
            "Motion id completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timer_reports_once_per_id() {
        let mut t = MotionTimer::default();
        t.observe(1, ExecStatus::Exec);
        assert_eq!(t.last_id, 1);
        t.observe(1, ExecStatus::Done);
        assert_eq!(t.last_id_printed, 1);
        // Already printed; switching ids does not print again.
        t.observe(2, ExecStatus::Exec);
        assert_eq!(t.last_id_printed, 1);
        assert_eq!(t.last_id, 2);
        t.observe(3, ExecStatus::Exec);
        assert_eq!(t.last_id_printed, 2);
    }

    #[test]
    fn fresh_decoder_has_no_config() {
        let d = StatusDecoder::new();
        assert!(!d.fresh_config());
        assert!(!d.debug_info());
        assert_eq!(d.last_snapshot().heartbeat, 0);
    }
}
