//! Bitflag groups exchanged with the executor.
//!
//! The executor publishes packed status words; each group is decoded once
//! into a typed set here instead of testing raw bits at every call site.
//! Bit values match the executor's status layout and must not be renumbered.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Per-joint status word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct JointFlags: u16 {
        /// Amplifier enabled.
        const ENABLE          = 0x0001;
        /// Joint active (participates in motion).
        const ACTIVE          = 0x0002;
        /// Joint in position.
        const INPOS           = 0x0004;
        /// Joint error (following error, fault, limit).
        const ERROR           = 0x0008;
        /// Positive soft limit hit.
        const MAX_SOFT_LIMIT  = 0x0010;
        /// Negative soft limit hit.
        const MIN_SOFT_LIMIT  = 0x0020;
        /// Positive hard limit switch active.
        const MAX_HARD_LIMIT  = 0x0040;
        /// Negative hard limit switch active.
        const MIN_HARD_LIMIT  = 0x0080;
        /// Home switch active.
        const HOME_SWITCH     = 0x0100;
        /// Homing sequence in progress.
        const HOMING          = 0x0200;
        /// Joint homed.
        const HOMED           = 0x0400;
        /// Following error exceeded.
        const FERROR          = 0x0800;
        /// Amplifier fault.
        const FAULT           = 0x1000;
    }
}

impl Default for JointFlags {
    fn default() -> Self {
        Self::empty()
    }
}

bitflags! {
    /// Whole-motion status word.
    ///
    /// `TELEOP` and `COORD` are not mutually exclusive in the raw word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct MotionFlags: u16 {
        /// Motion enabled.
        const ENABLE = 0x0001;
        /// Trajectory in position.
        const INPOS  = 0x0002;
        /// Coordinated mode.
        const COORD  = 0x0004;
        /// Motion error.
        const ERROR  = 0x0008;
        /// Teleoperated mode.
        const TELEOP = 0x0010;
    }
}

impl Default for MotionFlags {
    fn default() -> Self {
        Self::empty()
    }
}

bitflags! {
    /// Override-enable set. The executor keeps a `new` copy for free/teleop
    /// motion and a `queued` copy that travels with queued segments.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct EnableFlags: u8 {
        /// Feed override enabled.
        const FEED_OVERRIDE    = 0x01;
        /// Spindle override enabled.
        const SPINDLE_OVERRIDE = 0x02;
        /// Feed hold enabled.
        const FEED_HOLD        = 0x04;
        /// Adaptive feed enabled.
        const ADAPTIVE_FEED    = 0x08;
    }
}

impl Default for EnableFlags {
    fn default() -> Self {
        Self::empty()
    }
}

bitflags! {
    /// Homing option flags, composed from individual options before submission.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct HomeFlags: u8 {
        /// Ignore limit switches while homing.
        const IGNORE_LIMITS = 0x01;
        /// Latch on encoder index.
        const USE_INDEX     = 0x02;
        /// Home switch shared with other joints.
        const IS_SHARED     = 0x04;
        /// Unlock a locking indexer before homing.
        const UNLOCK_FIRST  = 0x08;
    }
}

impl Default for HomeFlags {
    fn default() -> Self {
        Self::empty()
    }
}

impl HomeFlags {
    /// Compose the flag word from individual options.
    pub fn compose(
        use_index: bool,
        ignore_limits: bool,
        is_shared: bool,
        unlock_first: bool,
    ) -> Self {
        let mut flags = Self::empty();
        flags.set(Self::USE_INDEX, use_index);
        flags.set(Self::IGNORE_LIMITS, ignore_limits);
        flags.set(Self::IS_SHARED, is_shared);
        flags.set(Self::UNLOCK_FIRST, unlock_first);
        flags
    }
}

bitflags! {
    /// Supervisory debug selection (local diagnostics only).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct DebugFlags: u32 {
        /// Configuration loading.
        const CONFIG      = 0x0000_0002;
        /// Command traffic.
        const COMMANDS    = 0x0000_0040;
        /// Motion-id timing.
        const MOTION_TIME = 0x0000_0100;
    }
}

impl Default for DebugFlags {
    fn default() -> Self {
        Self::empty()
    }
}
