//! Spindle, I/O and executor debug operations.

use taskmot_common::command::MotionCommand;
use taskmot_common::consts::{MAX_AIO, MAX_DIO};

use crate::bridge::MotionBridge;
use crate::channel::MotionChannel;
use crate::error::{BridgeResult, Dispatch};

impl<C: MotionChannel> MotionBridge<C> {
    // ─── Spindle ────────────────────────────────────────────────────

    /// Start the spindle. Negative `speed` runs in reverse.
    pub fn spindle_on(
        &mut self,
        speed: f64,
        css_factor: f64,
        offset: f64,
    ) -> BridgeResult<Dispatch> {
        self.submit(MotionCommand::SpindleOn {
            speed,
            css_factor,
            offset,
        })
    }

    pub fn spindle_off(&mut self) -> BridgeResult<Dispatch> {
        self.submit(MotionCommand::SpindleOff)
    }

    pub fn spindle_abort(&mut self) -> BridgeResult<Dispatch> {
        self.spindle_off()
    }

    /// Change speed of a turning spindle. A stopped spindle stays stopped.
    pub fn spindle_speed(
        &mut self,
        speed: f64,
        css_factor: f64,
        offset: f64,
    ) -> BridgeResult<Dispatch> {
        if self.decoder.last_snapshot().spindle.speed == 0.0 {
            return Ok(Dispatch::Local);
        }
        self.spindle_on(speed, css_factor, offset)
    }

    pub fn spindle_orient(&mut self, orientation: f64, mode: i32) -> BridgeResult<Dispatch> {
        self.submit(MotionCommand::SpindleOrient { orientation, mode })
    }

    pub fn spindle_brake_release(&mut self) -> BridgeResult<Dispatch> {
        self.submit(MotionCommand::SpindleBrakeRelease)
    }

    pub fn spindle_brake_engage(&mut self) -> BridgeResult<Dispatch> {
        self.submit(MotionCommand::SpindleBrakeEngage)
    }

    pub fn spindle_increase(&mut self) -> BridgeResult<Dispatch> {
        self.submit(MotionCommand::SpindleIncrease)
    }

    pub fn spindle_decrease(&mut self) -> BridgeResult<Dispatch> {
        self.submit(MotionCommand::SpindleDecrease)
    }

    /// Constant speed is the executor's default; nothing to send.
    pub fn spindle_constant(&mut self) -> Dispatch {
        Dispatch::Local
    }

    // ─── I/O ────────────────────────────────────────────────────────

    /// Analog output `index`: `start` at motion start, `end` at motion end,
    /// or `start` immediately when `now`.
    pub fn motion_set_aout(
        &mut self,
        index: u8,
        start: f64,
        end: f64,
        now: bool,
    ) -> BridgeResult<Dispatch> {
        if usize::from(index) >= MAX_AIO {
            return Ok(Dispatch::NotApplicable);
        }
        self.submit(MotionCommand::SetAout {
            index,
            start,
            end,
            now,
        })
    }

    /// Digital output counterpart of [`motion_set_aout`](Self::motion_set_aout).
    pub fn motion_set_dout(
        &mut self,
        index: u8,
        start: bool,
        end: bool,
        now: bool,
    ) -> BridgeResult<Dispatch> {
        if usize::from(index) >= MAX_DIO {
            return Ok(Dispatch::NotApplicable);
        }
        self.submit(MotionCommand::SetDout {
            index,
            start,
            end,
            now,
        })
    }

    // ─── Executor debug ─────────────────────────────────────────────

    /// Set the executor's own debug level.
    pub fn motion_set_debug(&mut self, level: i32) -> BridgeResult<Dispatch> {
        self.submit(MotionCommand::SetDebug { level })
    }
}
