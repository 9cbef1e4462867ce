//! `MotionBridge` facade.
//!
//! Owns the channel link, the encoder's local state and the status decoder.
//! Command operations live in [`crate::encoder`]; this module holds the
//! submit path, subsystem init/halt, and the motion-level entry points that
//! combine them.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::Mutex;
use taskmot_common::command::MotionCommand;
use taskmot_common::config::ConfigSource;
use taskmot_common::consts::MAX_JOINTS;
use taskmot_common::flags::DebugFlags;
use taskmot_common::status::MotionStatus;
use tracing::{debug, info, trace, warn};

use crate::channel::MotionChannel;
use crate::decoder::StatusDecoder;
use crate::encoder::EncoderState;
use crate::error::{BridgeError, BridgeResult, Dispatch};
use crate::guard;
use crate::lifecycle::{Link, LifecycleTracker, Subsystem};
use crate::notify::{OperatorNotifier, TracingNotifier};
use crate::params::{JointParams, TrajParams};
use crate::persistence::PositionStore;

/// Configuration collaborator shared by every subsystem.
pub type SharedSource = Arc<dyn ConfigSource + Send + Sync>;

/// Single mutual-exclusion domain for multi-threaded supervisory callers.
pub type SharedBridge<C> = Arc<Mutex<MotionBridge<C>>>;

/// Supervisory bridge to the executor.
pub struct MotionBridge<C> {
    pub(crate) link: Link<C>,
    pub(crate) config: SharedSource,
    pub(crate) encoder: EncoderState,
    pub(crate) decoder: StatusDecoder,
    pub(crate) notifier: Arc<dyn OperatorNotifier>,
    initialized: bool,
}

impl<C: MotionChannel> MotionBridge<C> {
    /// Create a bridge over `channel`. Nothing is opened until the first init.
    pub fn new(channel: C, config: SharedSource) -> Self {
        Self {
            link: Link::new(channel),
            config,
            encoder: EncoderState::default(),
            decoder: StatusDecoder::new(),
            notifier: Arc::new(TracingNotifier),
            initialized: false,
        }
    }

    /// Replace the operator notifier.
    pub fn with_notifier(mut self, notifier: Arc<dyn OperatorNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Wrap in the shared mutex.
    pub fn into_shared(self) -> SharedBridge<C> {
        Arc::new(Mutex::new(self))
    }

    // ─── Submit path ────────────────────────────────────────────────

    /// Gate on the numeric guard, then write.
    pub(crate) fn submit(&mut self, command: MotionCommand) -> BridgeResult<Dispatch> {
        if !guard::admit(&command) {
            debug!(kind = ?command.kind(), "Dropping command with non-finite payload");
            return Ok(Dispatch::Dropped);
        }
        self.link.channel_mut().write_command(&command)?;
        if self.encoder.debug.contains(DebugFlags::COMMANDS) {
            debug!(?command, "Command sent");
        } else {
            trace!(kind = ?command.kind(), "Command sent");
        }
        Ok(Dispatch::Sent)
    }

    // ─── Subsystem lifecycle ────────────────────────────────────────

    /// Initialize joint `joint`: open the channel if needed, then load and
    /// apply its parameters.
    ///
    /// # Errors
    ///
    /// Open failure, malformed parameters, or a transport failure while
    /// applying them. In every case the joint is left uninitialized (unless
    /// it already was) and the channel closed if nothing else holds it.
    pub fn joint_init(&mut self, joint: usize) -> BridgeResult<Dispatch> {
        if joint >= MAX_JOINTS {
            return Ok(Dispatch::NotApplicable);
        }
        let mut guard = InitGuard::enter(self, Subsystem::Joint(joint))?;
        let params = JointParams::from_source(guard.config.as_ref(), joint)?;
        guard.apply_joint_params(joint, &params)?;
        guard.commit();
        Ok(Dispatch::Sent)
    }

    /// Clear joint `joint`, closing the channel if nothing remains.
    pub fn joint_halt(&mut self, joint: usize) -> BridgeResult<Dispatch> {
        if joint >= MAX_JOINTS {
            return Ok(Dispatch::NotApplicable);
        }
        self.leave(Subsystem::Joint(joint))
    }

    /// Initialize the trajectory planner.
    pub fn traj_init(&mut self) -> BridgeResult<Dispatch> {
        let mut guard = InitGuard::enter(self, Subsystem::Traj)?;
        let params = TrajParams::from_source(guard.config.as_ref())?;
        guard.apply_traj_params(&params)?;
        guard.commit();
        Ok(Dispatch::Sent)
    }

    /// Clear the trajectory planner.
    pub fn traj_halt(&mut self) -> BridgeResult<Dispatch> {
        self.leave(Subsystem::Traj)
    }

    fn leave(&mut self, sub: Subsystem) -> BridgeResult<Dispatch> {
        self.link
            .leave(sub)
            .map_err(|source| BridgeError::Lifecycle {
                subsystem: sub.to_string(),
                source,
            })?;
        Ok(Dispatch::Local)
    }

    // ─── Motion level ───────────────────────────────────────────────

    /// Trajectory first (it fixes the joint count), then every configured
    /// joint, then the saved positions.
    ///
    /// Every step runs even if an earlier one failed; the first error is
    /// returned.
    pub fn motion_init(&mut self) -> BridgeResult<()> {
        let mut first = None;
        keep_first(&mut first, "traj init", self.traj_init());
        for joint in 0..self.encoder.traj_joints() {
            keep_first(&mut first, "joint init", self.joint_init(joint));
        }
        keep_first(&mut first, "position load", self.position_load());

        self.initialized = first.is_none();
        match first {
            None => {
                info!(joints = self.encoder.traj_joints(), "Motion initialized");
                Ok(())
            }
            Some(e) => Err(e),
        }
    }

    /// Halt every joint, disable and halt the trajectory, save positions.
    pub fn motion_halt(&mut self) -> BridgeResult<()> {
        let mut first = None;
        for joint in 0..MAX_JOINTS {
            keep_first(&mut first, "joint halt", self.joint_halt(joint));
        }
        keep_first(&mut first, "traj disable", self.traj_disable());
        keep_first(&mut first, "traj halt", self.traj_halt());
        keep_first(&mut first, "position save", self.position_save());
        self.initialized = false;
        match first {
            None => {
                info!("Motion halted");
                Ok(())
            }
            Some(e) => Err(e),
        }
    }

    /// Abort every joint and the trajectory.
    ///
    /// Joint aborts succeed as a group if at least one reached the executor.
    pub fn motion_abort(&mut self) -> BridgeResult<()> {
        let mut joint_err = None;
        let mut any_ok = false;
        for joint in 0..MAX_JOINTS {
            match self.joint_abort(joint) {
                Ok(_) => any_ok = true,
                Err(e) => {
                    joint_err.get_or_insert(e);
                }
            }
        }
        self.traj_abort()?;
        match (any_ok, joint_err) {
            (false, Some(e)) => Err(e),
            _ => Ok(()),
        }
    }

    // ─── Status ─────────────────────────────────────────────────────

    /// Run one decode cycle.
    pub fn update(&mut self) -> BridgeResult<MotionStatus> {
        self.decoder.update(
            self.link.channel_mut(),
            &self.encoder,
            self.notifier.as_ref(),
        )
    }

    // ─── Persistence ────────────────────────────────────────────────

    /// Apply saved joint positions as motor offsets.
    ///
    /// `Local` when no position file is configured or present.
    pub fn position_load(&mut self) -> BridgeResult<Dispatch> {
        let store = PositionStore::from_source(self.config.as_ref());
        let Some(positions) = store.load(self.encoder.traj_joints())? else {
            return Ok(Dispatch::Local);
        };
        let mut first = None;
        for (joint, pos) in positions.iter().enumerate() {
            if let Err(e) = self.set_motor_offset(joint, -pos) {
                first.get_or_insert(e);
            }
        }
        match first {
            None => Ok(Dispatch::Sent),
            Some(e) => Err(e),
        }
    }

    /// Write the last known feedback positions to the position file.
    pub fn position_save(&mut self) -> BridgeResult<Dispatch> {
        let store = PositionStore::from_source(self.config.as_ref());
        let joints = self.encoder.traj_joints();
        let positions: Vec<f64> = self
            .decoder
            .last_snapshot()
            .joints
            .iter()
            .take(joints)
            .map(|j| j.pos_fb)
            .collect();
        store.save(&positions)?;
        Ok(Dispatch::Local)
    }

    // ─── Diagnostics ────────────────────────────────────────────────

    /// Select supervisory debug output.
    pub fn set_debug_flags(&mut self, flags: DebugFlags) {
        self.encoder.debug = flags;
    }

    /// Toggle the extended debug snapshot read in each update.
    pub fn set_debug_info(&mut self, enabled: bool) {
        self.decoder.set_debug_info(enabled);
    }

    // ─── Accessors ──────────────────────────────────────────────────

    /// All of `motion_init` succeeded and no halt since.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn encoder(&self) -> &EncoderState {
        &self.encoder
    }

    pub fn decoder(&self) -> &StatusDecoder {
        &self.decoder
    }

    pub fn tracker(&self) -> &LifecycleTracker {
        self.link.tracker()
    }

    pub fn channel(&self) -> &C {
        self.link.channel()
    }

    pub fn channel_mut(&mut self) -> &mut C {
        self.link.channel_mut()
    }

    pub fn config(&self) -> &SharedSource {
        &self.config
    }

    /// Release the channel, closing it if still open.
    pub fn into_channel(self) -> C {
        self.link.into_channel()
    }
}

fn keep_first(first: &mut Option<BridgeError>, step: &str, result: BridgeResult<Dispatch>) {
    if let Err(e) = result {
        warn!(step, error = %e, "Motion step failed");
        first.get_or_insert(e);
    }
}

/// Scoped subsystem init.
///
/// Entering marks the subsystem active (opening the channel if needed).
/// Dropping without [`commit`](Self::commit) undoes that, so an early `?`
/// return during parameter loading cannot leave a half-initialized flag or
/// an orphaned open channel.
struct InitGuard<'a, C: MotionChannel> {
    bridge: &'a mut MotionBridge<C>,
    sub: Subsystem,
    was_active: bool,
    committed: bool,
}

impl<'a, C: MotionChannel> InitGuard<'a, C> {
    fn enter(bridge: &'a mut MotionBridge<C>, sub: Subsystem) -> BridgeResult<Self> {
        let entry = bridge
            .link
            .enter(sub, bridge.config.as_ref())
            .map_err(|source| BridgeError::Lifecycle {
                subsystem: sub.to_string(),
                source,
            })?;
        if entry.opened {
            bridge.decoder.reset_config();
        }
        Ok(Self {
            bridge,
            sub,
            was_active: entry.was_active,
            committed: false,
        })
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl<C: MotionChannel> Deref for InitGuard<'_, C> {
    type Target = MotionBridge<C>;

    fn deref(&self) -> &Self::Target {
        self.bridge
    }
}

impl<C: MotionChannel> DerefMut for InitGuard<'_, C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.bridge
    }
}

impl<C: MotionChannel> Drop for InitGuard<'_, C> {
    fn drop(&mut self) {
        if self.committed || self.was_active {
            return;
        }
        warn!(subsystem = %self.sub, "Init failed, rolling back");
        if let Err(e) = self.bridge.link.leave(self.sub) {
            warn!(subsystem = %self.sub, error = %e, "Rollback close failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimulatedExecutor;
    use taskmot_common::config::TomlSource;

    fn bridge(toml: &str) -> (MotionBridge<SimulatedExecutor>, SimulatedExecutor) {
        let sim = SimulatedExecutor::new();
        let source = TomlSource::from_toml_str(toml).unwrap();
        (MotionBridge::new(sim.clone(), Arc::new(source)), sim)
    }

    #[test]
    fn joint_init_out_of_range_touches_nothing() {
        let (mut b, sim) = bridge("");
        assert_eq!(b.joint_init(MAX_JOINTS).unwrap(), Dispatch::NotApplicable);
        assert_eq!(b.joint_halt(MAX_JOINTS + 3).unwrap(), Dispatch::NotApplicable);
        assert!(!sim.is_open());
        assert_eq!(b.tracker().opens(), 0);
    }

    #[test]
    fn bad_joint_params_roll_back_init() {
        let (mut b, sim) = bridge(
            r#"
[JOINT_1]
MAX_VELOCITY = "fast"
"#,
        );
        assert!(matches!(b.joint_init(1), Err(BridgeError::Config(_))));
        assert!(!b.tracker().is_active(Subsystem::Joint(1)));
        assert!(!sim.is_open());
        assert_eq!(b.tracker().opens(), b.tracker().closes());
    }

    #[test]
    fn failed_reinit_keeps_existing_flag() {
        let (mut b, sim) = bridge("[TRAJ]\nJOINTS = 2\n");
        b.traj_init().unwrap();
        sim.fail_writes(true);
        assert!(b.traj_init().is_err());
        sim.fail_writes(false);
        assert!(b.tracker().is_active(Subsystem::Traj));
        assert!(sim.is_open());
    }

    #[test]
    fn shared_bridge_locks() {
        let (b, _sim) = bridge("[TRAJ]\nJOINTS = 1\n");
        let shared = b.into_shared();
        let s2 = Arc::clone(&shared);
        std::thread::spawn(move || {
            s2.lock().traj_init().unwrap();
        })
        .join()
        .unwrap();
        assert!(shared.lock().tracker().is_active(Subsystem::Traj));
    }
}
