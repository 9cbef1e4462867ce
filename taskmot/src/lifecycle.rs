//! Init bookkeeping and channel open/close gating.
//!
//! Joints and the trajectory planner are initialized independently, in any
//! order, by different callers. They share one channel: it is opened on the
//! first transition from "nothing active" to "something active" and closed
//! on the last transition back.
//!
//! [`Link`] owns the channel together with its [`LifecycleTracker`], so the
//! channel cannot be opened or closed except through these transitions.

use std::fmt;

use taskmot_common::config::ConfigSource;
use taskmot_common::consts::{CHANNEL_CLIENT_NAME, MAX_JOINTS};
use tracing::{debug, info, warn};

use crate::channel::MotionChannel;
use crate::error::ChannelError;

/// A subsystem that holds the channel open while initialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subsystem {
    Joint(usize),
    Traj,
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Joint(j) => write!(f, "joint {j}"),
            Self::Traj => write!(f, "traj"),
        }
    }
}

/// Per-subsystem initialized flags plus open/close counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LifecycleTracker {
    joints: [bool; MAX_JOINTS],
    traj: bool,
    opens: u64,
    closes: u64,
}

impl LifecycleTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Any joint or the trajectory initialized.
    pub fn any_active(&self) -> bool {
        self.traj || self.joints.iter().any(|j| *j)
    }

    /// Whether `sub` is initialized. Out-of-range joints never are.
    pub fn is_active(&self, sub: Subsystem) -> bool {
        match sub {
            Subsystem::Joint(j) => self.joints.get(j).copied().unwrap_or(false),
            Subsystem::Traj => self.traj,
        }
    }

    fn set(&mut self, sub: Subsystem, value: bool) {
        match sub {
            Subsystem::Joint(j) => {
                if let Some(flag) = self.joints.get_mut(j) {
                    *flag = value;
                }
            }
            Subsystem::Traj => self.traj = value,
        }
    }

    /// Number of successful channel opens.
    pub fn opens(&self) -> u64 {
        self.opens
    }

    /// Number of channel closes (including failed ones).
    pub fn closes(&self) -> u64 {
        self.closes
    }

    /// Channel is open iff something is active.
    pub fn channel_open(&self) -> bool {
        self.opens > self.closes
    }
}

/// Result of [`Link::enter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    /// `sub` was already active before the call.
    pub was_active: bool,
    /// This call opened the channel.
    pub opened: bool,
}

/// Channel plus lifecycle bookkeeping.
pub struct Link<C> {
    channel: C,
    tracker: LifecycleTracker,
}

impl<C: MotionChannel> Link<C> {
    pub fn new(channel: C) -> Self {
        Self {
            channel,
            tracker: LifecycleTracker::new(),
        }
    }

    /// Mark `sub` initialized, opening the channel if nothing was active.
    ///
    /// # Errors
    ///
    /// If configure or open fails the flag stays clear and the channel stays
    /// closed.
    pub fn enter(
        &mut self,
        sub: Subsystem,
        config: &dyn ConfigSource,
    ) -> Result<Entry, ChannelError> {
        if matches!(sub, Subsystem::Joint(j) if j >= MAX_JOINTS) {
            return Ok(Entry {
                was_active: false,
                opened: false,
            });
        }
        let was_active = self.tracker.is_active(sub);
        let mut opened = false;
        if !self.tracker.any_active() {
            self.channel.configure(config)?;
            self.channel.open(CHANNEL_CLIENT_NAME)?;
            self.tracker.opens += 1;
            opened = true;
            info!(client = CHANNEL_CLIENT_NAME, by = %sub, "Executor channel opened");
        }
        self.tracker.set(sub, true);
        debug!(subsystem = %sub, "Subsystem initialized");
        Ok(Entry { was_active, opened })
    }

    /// Clear `sub`, closing the channel if nothing remains active.
    ///
    /// # Errors
    ///
    /// A failed close still leaves the flag clear and the channel counted as
    /// closed; the error is returned for reporting.
    pub fn leave(&mut self, sub: Subsystem) -> Result<(), ChannelError> {
        let was_open = self.tracker.any_active();
        self.tracker.set(sub, false);
        if was_open && !self.tracker.any_active() {
            self.tracker.closes += 1;
            match self.channel.close() {
                Ok(()) => info!(by = %sub, "Executor channel closed"),
                Err(e) => {
                    warn!(by = %sub, error = %e, "Executor channel close failed");
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    pub fn tracker(&self) -> &LifecycleTracker {
        &self.tracker
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    /// Give back the channel. It is closed first if still open.
    pub fn into_channel(mut self) -> C {
        if self.tracker.channel_open() {
            if let Err(e) = self.channel.close() {
                warn!(error = %e, "Executor channel close failed on release");
            }
        }
        self.channel
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimulatedExecutor;
    use taskmot_common::config::TomlSource;

    fn link() -> (Link<SimulatedExecutor>, SimulatedExecutor) {
        let sim = SimulatedExecutor::new();
        (Link::new(sim.clone()), sim)
    }

    #[test]
    fn opens_on_first_and_closes_on_last() {
        let (mut link, sim) = link();
        let cfg = TomlSource::default();

        let e = link.enter(Subsystem::Joint(0), &cfg).unwrap();
        assert!(e.opened && !e.was_active);
        assert!(sim.is_open());

        let e = link.enter(Subsystem::Traj, &cfg).unwrap();
        assert!(!e.opened);

        link.leave(Subsystem::Joint(0)).unwrap();
        assert!(sim.is_open());
        link.leave(Subsystem::Traj).unwrap();
        assert!(!sim.is_open());
        assert_eq!(link.tracker().opens(), 1);
        assert_eq!(link.tracker().closes(), 1);
    }

    #[test]
    fn repeated_calls_are_idempotent() {
        let (mut link, _sim) = link();
        let cfg = TomlSource::default();
        link.enter(Subsystem::Traj, &cfg).unwrap();
        let e = link.enter(Subsystem::Traj, &cfg).unwrap();
        assert!(e.was_active && !e.opened);
        link.leave(Subsystem::Traj).unwrap();
        link.leave(Subsystem::Traj).unwrap();
        link.leave(Subsystem::Joint(4)).unwrap();
        assert_eq!(link.tracker().opens(), 1);
        assert_eq!(link.tracker().closes(), 1);
    }

    #[test]
    fn failed_open_keeps_flag_clear() {
        let (mut link, sim) = link();
        sim.fail_next_open();
        let err = link.enter(Subsystem::Joint(2), &TomlSource::default());
        assert!(matches!(err, Err(ChannelError::OpenFailed(_))));
        assert!(!link.tracker().is_active(Subsystem::Joint(2)));
        assert!(!link.tracker().any_active());
        assert_eq!(link.tracker().opens(), 0);

        // Retry succeeds.
        link.enter(Subsystem::Joint(2), &TomlSource::default()).unwrap();
        assert!(sim.is_open());
    }

    #[test]
    fn failed_close_still_clears_flag() {
        let (mut link, sim) = link();
        link.enter(Subsystem::Traj, &TomlSource::default()).unwrap();
        sim.fail_next_close();
        assert!(link.leave(Subsystem::Traj).is_err());
        assert!(!link.tracker().any_active());
        assert!(!link.tracker().channel_open());
    }

    #[test]
    fn out_of_range_joint_is_never_active() {
        let t = LifecycleTracker::new();
        assert!(!t.is_active(Subsystem::Joint(MAX_JOINTS)));
    }
}
