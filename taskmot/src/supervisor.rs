//! Supervisory cycle driver.
//!
//! Runs one bridge decode per cycle at a fixed period, optionally ticking an
//! in-process executor first, and logs status transitions. Staleness and
//! retry policy live here, on the caller side of the bridge.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use taskmot_common::command::TrajMode;
use taskmot_common::status::{ExecStatus, MotionStatus};
use tracing::{debug, info, warn};

use crate::bridge::SharedBridge;
use crate::channel::MotionChannel;
use crate::error::BridgeResult;

/// Consecutive failed updates tolerated before the loop gives up.
pub const MAX_UPDATE_FAILURES: u32 = 10;

/// Cycles with an unchanged heartbeat before a stall is reported.
pub const HEARTBEAT_STALL_CYCLES: u32 = 100;

/// Timing statistics for loop monitoring.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TimingStats {
    /// Number of cycles executed
    pub cycle_count: u64,
    /// Cycles that exceeded the period
    pub timing_violations: u64,
    /// Maximum observed cycle time [µs]
    pub max_cycle_time_us: u64,
    /// Sum of cycle times [µs]
    pub total_cycle_time_us: u64,
}

impl TimingStats {
    pub fn average_cycle_time_us(&self) -> u64 {
        self.total_cycle_time_us.checked_div(self.cycle_count).unwrap_or(0)
    }
}

type ExecutorTick = Box<dyn FnMut(Duration) + Send>;

/// Fixed-period loop around a shared bridge.
pub struct Supervisor<C> {
    bridge: SharedBridge<C>,
    cycle_time: Duration,
    running: Arc<AtomicBool>,
    stats: TimingStats,
    tick: Option<ExecutorTick>,
    last: Option<MotionStatus>,
    failures: u32,
    stalled_cycles: u32,
}

impl<C: MotionChannel> Supervisor<C> {
    pub fn new(bridge: SharedBridge<C>, cycle_time: Duration) -> Self {
        Self {
            bridge,
            cycle_time,
            running: Arc::new(AtomicBool::new(false)),
            stats: TimingStats::default(),
            tick: None,
            last: None,
            failures: 0,
            stalled_cycles: 0,
        }
    }

    /// Advance an in-process executor by the measured period before each
    /// decode.
    pub fn with_executor_tick(mut self, tick: impl FnMut(Duration) + Send + 'static) -> Self {
        self.tick = Some(Box::new(tick));
        self
    }

    /// Run until the running flag is cleared or `max_cycles` elapse.
    ///
    /// # Errors
    ///
    /// The last update error after [`MAX_UPDATE_FAILURES`] consecutive
    /// failures.
    pub fn run(&mut self, max_cycles: Option<u64>) -> BridgeResult<()> {
        info!(
            cycle_time_us = self.cycle_time.as_micros() as u64,
            max_cycles, "Starting supervisory loop"
        );
        self.running.store(true, Ordering::SeqCst);

        let mut last_cycle = Instant::now();
        let mut cycles = 0u64;
        while self.running.load(Ordering::SeqCst) && max_cycles.is_none_or(|max| cycles < max) {
            let cycle_start = Instant::now();
            let dt = cycle_start.duration_since(last_cycle).max(self.cycle_time);
            last_cycle = cycle_start;
            cycles += 1;

            if let Some(tick) = self.tick.as_mut() {
                tick(dt);
            }
            if let Err(e) = self.cycle() {
                self.running.store(false, Ordering::SeqCst);
                return Err(e);
            }

            let cycle_time_us = cycle_start.elapsed().as_micros() as u64;
            self.record(cycle_time_us);

            let elapsed = cycle_start.elapsed();
            if elapsed < self.cycle_time {
                std::thread::sleep(self.cycle_time - elapsed);
            }
        }

        self.running.store(false, Ordering::SeqCst);
        info!(
            cycles = self.stats.cycle_count,
            violations = self.stats.timing_violations,
            "Supervisory loop stopped"
        );
        Ok(())
    }

    /// One decode; tolerates isolated failures.
    fn cycle(&mut self) -> BridgeResult<()> {
        let result = self.bridge.lock().update();
        match result {
            Ok(status) => {
                self.failures = 0;
                self.observe(status);
                Ok(())
            }
            Err(e) => {
                self.failures += 1;
                warn!(failures = self.failures, error = %e, "Status update failed");
                if self.failures >= MAX_UPDATE_FAILURES {
                    return Err(e);
                }
                Ok(())
            }
        }
    }

    fn observe(&mut self, status: MotionStatus) {
        if let Some(prev) = &self.last {
            if prev.status != status.status {
                info!(from = ?prev.status, to = ?status.status, "Motion status changed");
            }
            if prev.traj.mode != status.traj.mode {
                info!(mode = mode_name(status.traj.mode), "Trajectory mode changed");
            }
            for (index, (was, now)) in prev.joints.iter().zip(status.joints.iter()).enumerate() {
                if !was.homed && now.homed {
                    info!(joint = index, "Joint homed");
                }
            }
            if status.heartbeat == prev.heartbeat {
                self.stalled_cycles += 1;
                if self.stalled_cycles == HEARTBEAT_STALL_CYCLES {
                    warn!(heartbeat = status.heartbeat, "Executor heartbeat stalled");
                }
            } else {
                self.stalled_cycles = 0;
            }
        }
        if status.status == ExecStatus::Error && self.last.is_none() {
            warn!(echo = status.echo_serial_number, "Executor reports an error at startup");
        }
        self.last = Some(status);
    }

    fn record(&mut self, cycle_time_us: u64) {
        let stats = &mut self.stats;
        stats.cycle_count += 1;
        stats.total_cycle_time_us += cycle_time_us;
        stats.max_cycle_time_us = stats.max_cycle_time_us.max(cycle_time_us);

        if cycle_time_us > self.cycle_time.as_micros() as u64 {
            stats.timing_violations += 1;
            if stats.timing_violations <= 10 || stats.timing_violations % 1000 == 0 {
                warn!(
                    violation = stats.timing_violations,
                    cycle_time_us,
                    target_us = self.cycle_time.as_micros() as u64,
                    "Timing violation"
                );
            }
        }

        if stats.cycle_count % 1000 == 0 {
            debug!(
                cycles = stats.cycle_count,
                avg_us = stats.average_cycle_time_us(),
                max_us = stats.max_cycle_time_us,
                violations = stats.timing_violations,
                "Supervisory loop"
            );
        }
    }

    /// Get the running flag for signal handlers.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn stats(&self) -> TimingStats {
        self.stats
    }

    /// Status of the last successful cycle.
    pub fn last_status(&self) -> Option<&MotionStatus> {
        self.last.as_ref()
    }

    pub fn bridge(&self) -> &SharedBridge<C> {
        &self.bridge
    }
}

fn mode_name(mode: TrajMode) -> &'static str {
    match mode {
        TrajMode::Free => "free",
        TrajMode::Coord => "coord",
        TrajMode::Teleop => "teleop",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::MotionBridge;
    use crate::sim::SimulatedExecutor;
    use taskmot_common::config::TomlSource;

    fn supervisor() -> (Supervisor<SimulatedExecutor>, SimulatedExecutor) {
        let sim = SimulatedExecutor::new();
        let source = TomlSource::from_toml_str("[TRAJ]\nJOINTS = 2\n").unwrap();
        let mut bridge = MotionBridge::new(sim.clone(), Arc::new(source));
        bridge.motion_init().unwrap();
        let ticker = sim.clone();
        let sup = Supervisor::new(bridge.into_shared(), Duration::from_micros(100))
            .with_executor_tick(move |dt| ticker.step(dt));
        (sup, sim)
    }

    #[test]
    fn runs_bounded_cycles() {
        let (mut sup, sim) = supervisor();
        sup.run(Some(5)).unwrap();
        assert_eq!(sup.stats().cycle_count, 5);
        assert_eq!(sup.last_status().map(|s| s.heartbeat), Some(sim.snapshot().heartbeat));
        assert!(!sup.running_flag().load(Ordering::SeqCst));
    }

    #[test]
    fn gives_up_after_repeated_failures() {
        let (mut sup, sim) = supervisor();
        sim.fail_reads(true);
        assert!(sup.run(Some(100)).is_err());
        assert_eq!(sup.stats().cycle_count, u64::from(MAX_UPDATE_FAILURES - 1));
    }

    #[test]
    fn isolated_failure_is_tolerated() {
        let (mut sup, sim) = supervisor();
        sim.fail_reads(true);
        sup.run(Some(2)).unwrap();
        sim.fail_reads(false);
        sup.run(Some(2)).unwrap();
        assert!(sup.last_status().is_some());
    }

    #[test]
    fn average_handles_zero_cycles() {
        assert_eq!(TimingStats::default().average_cycle_time_us(), 0);
    }
}
