//! Command requests sent to the real-time executor.
//!
//! Every supervisory intent becomes one [`MotionCommand`] value, built fresh
//! per call and handed to the channel by reference. There is no shared
//! mutable command buffer: a request is immutable once constructed.
//!
//! [`CommandKind`] is the compact `u8` tag the executor echoes back in its
//! status snapshot (`command_echo`).

use serde::{Deserialize, Serialize};

use crate::flags::HomeFlags;
use crate::pose::{Cartesian, Pose};

macro_rules! command_kinds {
    ($($(#[$doc:meta])* $name:ident = $val:expr,)+) => {
        /// Command tag, echoed by the executor after it consumes a command.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[repr(u8)]
        pub enum CommandKind {
            $($(#[$doc])* $name = $val,)+
        }

        impl CommandKind {
            /// Every kind, in tag order.
            pub const ALL: &'static [CommandKind] = &[$(CommandKind::$name,)+];

            /// Convert from raw `u8`. Returns `None` for unknown tags.
            #[inline]
            pub const fn from_u8(value: u8) -> Option<Self> {
                match value {
                    $($val => Some(Self::$name),)+
                    _ => None,
                }
            }
        }
    };
}

command_kinds! {
    /// Joint soft position limits (sent as a min/max pair).
    SetPositionLimits = 1,
    SetBacklash = 2,
    SetMotorOffset = 3,
    SetMaxFerror = 4,
    SetMinFerror = 5,
    SetHomingParams = 6,
    SetJointVelLimit = 7,
    SetJointAccLimit = 8,
    /// One entry of a joint compensation table.
    SetJointComp = 9,
    JointAbort = 10,
    ActivateJoint = 11,
    DeactivateJoint = 12,
    OverrideLimits = 13,
    EnableAmplifier = 14,
    DisableAmplifier = 15,
    Home = 16,
    Unhome = 17,
    JogCont = 18,
    JogIncr = 19,
    JogAbs = 20,
    SetNumJoints = 21,
    /// Switch to free (joint) mode.
    Free = 22,
    /// Switch to coordinated mode.
    Coord = 23,
    /// Switch to teleoperated mode.
    Teleop = 24,
    SetVel = 25,
    SetAcc = 26,
    SetVelLimit = 27,
    SetWorldHome = 28,
    FeedScale = 29,
    SpindleScale = 30,
    FsEnable = 31,
    FhEnable = 32,
    SsEnable = 33,
    AfEnable = 34,
    Enable = 35,
    Disable = 36,
    Abort = 37,
    Pause = 38,
    Step = 39,
    Resume = 40,
    SetOffset = 41,
    SetSpindleSync = 42,
    SetTermCond = 43,
    SetLine = 44,
    SetCircle = 45,
    ClearProbeFlags = 46,
    Probe = 47,
    RigidTap = 48,
    SetDebug = 49,
    SetAout = 50,
    SetDout = 51,
    SpindleOn = 52,
    SpindleOff = 53,
    SpindleBrakeRelease = 54,
    SpindleBrakeEngage = 55,
    SpindleIncrease = 56,
    SpindleDecrease = 57,
    SpindleOrient = 58,
}

/// Joint addressed by a joint-level command.
///
/// Homing and unhoming accept sentinels in addition to a concrete index;
/// limit override uses [`JointTarget::None`] to resume normal limit checking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JointTarget {
    /// A concrete joint index in `0..MAX_JOINTS`.
    Joint(usize),
    /// Every joint (`-1`).
    All,
    /// Joints configured with volatile home (`-2`, unhome only).
    Volatile,
    /// No joint (override-limits release).
    None,
}

impl JointTarget {
    /// Raw index as understood by the executor.
    pub const fn to_raw(&self) -> i32 {
        match self {
            Self::Joint(j) => *j as i32,
            Self::All => crate::consts::ALL_JOINTS,
            Self::Volatile => crate::consts::VOLATILE_JOINTS,
            Self::None => -1,
        }
    }
}

/// Trajectory mode.
///
/// Exactly three modes are legal; raw values outside `1..=3` are rejected
/// before reaching the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum TrajMode {
    /// Independent joint motion.
    #[default]
    Free = 1,
    /// Coordinated, queued motion.
    Coord = 2,
    /// Teleoperated cartesian jogging.
    Teleop = 3,
}

impl TrajMode {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Free),
            2 => Some(Self::Coord),
            3 => Some(Self::Teleop),
            _ => None,
        }
    }
}

/// Segment termination condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum TermCond {
    /// Exact stop at the end of each segment.
    Stop = 1,
    /// Blend into the next segment within a tolerance.
    #[default]
    Blend = 2,
}

impl TermCond {
    /// Anything other than `Stop` blends.
    #[inline]
    pub const fn from_raw(value: i32) -> Self {
        if value == Self::Stop as i32 {
            Self::Stop
        } else {
            Self::Blend
        }
    }
}

/// Homing parameters for one joint.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HomingParams {
    /// Position to move to after homing completes.
    pub home: f64,
    /// Position of the home switch / index in joint coordinates.
    pub offset: f64,
    /// Velocity of the final move to `home` (negative = rapid).
    pub final_vel: f64,
    /// Switch search velocity.
    pub search_vel: f64,
    /// Latch velocity.
    pub latch_vel: f64,
    /// Composed option flags.
    pub flags: HomeFlags,
    /// Homing sequence group.
    pub sequence: i32,
    /// Unhome this joint on estop/machine-off.
    pub volatile_home: bool,
}

impl HomingParams {
    fn is_finite(&self) -> bool {
        [self.home, self.offset, self.final_vel, self.search_vel, self.latch_vel]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// Straight-line coordinated move.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LineMove {
    pub end: Pose,
    /// Motion id tag (see `traj_set_motion_id`).
    pub id: i32,
    /// Motion type (feed, traverse, ...), passed through.
    pub motion_type: i32,
    pub vel: f64,
    pub ini_maxvel: f64,
    pub acc: f64,
    /// Rotary axis to unlock for this move, or -1.
    pub indexrotary: i32,
}

/// Circular/helical coordinated move.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CircleMove {
    pub end: Pose,
    pub center: Cartesian,
    pub normal: Cartesian,
    /// Number of full turns in addition to the partial arc.
    pub turn: i32,
    pub motion_type: i32,
    pub id: i32,
    pub vel: f64,
    pub ini_maxvel: f64,
    pub acc: f64,
}

/// Straight probing move.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ProbeMove {
    pub pos: Pose,
    pub id: i32,
    pub motion_type: i32,
    pub vel: f64,
    pub ini_maxvel: f64,
    pub acc: f64,
    /// Probe variant (toward/away, error on no contact).
    pub probe_type: u8,
}

/// Spindle-synchronized tapping move (translation only).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RigidTapMove {
    pub pos: Cartesian,
    pub id: i32,
    pub vel: f64,
    pub ini_maxvel: f64,
    pub acc: f64,
}

/// One request to the executor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MotionCommand {
    SetPositionLimits { joint: usize, min: f64, max: f64 },
    SetBacklash { joint: usize, backlash: f64 },
    SetMotorOffset { joint: usize, offset: f64 },
    SetMaxFerror { joint: usize, ferror: f64 },
    SetMinFerror { joint: usize, ferror: f64 },
    SetHomingParams { joint: usize, params: HomingParams },
    SetJointVelLimit { joint: usize, vel: f64 },
    SetJointAccLimit { joint: usize, acc: f64 },
    SetJointComp { joint: usize, nominal: f64, forward: f64, reverse: f64 },
    JointAbort { joint: usize },
    ActivateJoint { joint: usize },
    DeactivateJoint { joint: usize },
    OverrideLimits { joint: JointTarget },
    EnableAmplifier { joint: usize },
    DisableAmplifier { joint: usize },
    Home { joint: JointTarget },
    Unhome { joint: JointTarget },
    JogCont { joint: usize, vel: f64 },
    JogIncr { joint: usize, incr: f64, vel: f64 },
    JogAbs { joint: usize, pos: f64, vel: f64 },
    SetNumJoints { joints: usize },
    Free,
    Coord,
    Teleop,
    SetVel { vel: f64, ini_maxvel: f64 },
    SetAcc { acc: f64 },
    SetVelLimit { vel: f64 },
    SetWorldHome { pose: Pose },
    FeedScale { scale: f64 },
    SpindleScale { scale: f64 },
    FsEnable { mode: u8 },
    FhEnable { mode: u8 },
    SsEnable { mode: u8 },
    AfEnable { enable: bool },
    Enable,
    Disable,
    Abort,
    Pause,
    Step,
    Resume,
    SetOffset { tool_offset: Pose },
    SetSpindleSync { fpr: f64, wait_for_index: bool },
    SetTermCond { cond: TermCond, tolerance: f64 },
    SetLine(LineMove),
    SetCircle(CircleMove),
    ClearProbeFlags,
    Probe(ProbeMove),
    RigidTap(RigidTapMove),
    SetDebug { level: i32 },
    SetAout { index: u8, start: f64, end: f64, now: bool },
    SetDout { index: u8, start: bool, end: bool, now: bool },
    SpindleOn { speed: f64, css_factor: f64, offset: f64 },
    SpindleOff,
    SpindleBrakeRelease,
    SpindleBrakeEngage,
    SpindleIncrease,
    SpindleDecrease,
    SpindleOrient { orientation: f64, mode: i32 },
}

impl MotionCommand {
    /// Echo tag of this request.
    pub const fn kind(&self) -> CommandKind {
        use MotionCommand as C;
        match self {
            C::SetPositionLimits { .. } => CommandKind::SetPositionLimits,
            C::SetBacklash { .. } => CommandKind::SetBacklash,
            C::SetMotorOffset { .. } => CommandKind::SetMotorOffset,
            C::SetMaxFerror { .. } => CommandKind::SetMaxFerror,
            C::SetMinFerror { .. } => CommandKind::SetMinFerror,
            C::SetHomingParams { .. } => CommandKind::SetHomingParams,
            C::SetJointVelLimit { .. } => CommandKind::SetJointVelLimit,
            C::SetJointAccLimit { .. } => CommandKind::SetJointAccLimit,
            C::SetJointComp { .. } => CommandKind::SetJointComp,
            C::JointAbort { .. } => CommandKind::JointAbort,
            C::ActivateJoint { .. } => CommandKind::ActivateJoint,
            C::DeactivateJoint { .. } => CommandKind::DeactivateJoint,
            C::OverrideLimits { .. } => CommandKind::OverrideLimits,
            C::EnableAmplifier { .. } => CommandKind::EnableAmplifier,
            C::DisableAmplifier { .. } => CommandKind::DisableAmplifier,
            C::Home { .. } => CommandKind::Home,
            C::Unhome { .. } => CommandKind::Unhome,
            C::JogCont { .. } => CommandKind::JogCont,
            C::JogIncr { .. } => CommandKind::JogIncr,
            C::JogAbs { .. } => CommandKind::JogAbs,
            C::SetNumJoints { .. } => CommandKind::SetNumJoints,
            C::Free => CommandKind::Free,
            C::Coord => CommandKind::Coord,
            C::Teleop => CommandKind::Teleop,
            C::SetVel { .. } => CommandKind::SetVel,
            C::SetAcc { .. } => CommandKind::SetAcc,
            C::SetVelLimit { .. } => CommandKind::SetVelLimit,
            C::SetWorldHome { .. } => CommandKind::SetWorldHome,
            C::FeedScale { .. } => CommandKind::FeedScale,
            C::SpindleScale { .. } => CommandKind::SpindleScale,
            C::FsEnable { .. } => CommandKind::FsEnable,
            C::FhEnable { .. } => CommandKind::FhEnable,
            C::SsEnable { .. } => CommandKind::SsEnable,
            C::AfEnable { .. } => CommandKind::AfEnable,
            C::Enable => CommandKind::Enable,
            C::Disable => CommandKind::Disable,
            C::Abort => CommandKind::Abort,
            C::Pause => CommandKind::Pause,
            C::Step => CommandKind::Step,
            C::Resume => CommandKind::Resume,
            C::SetOffset { .. } => CommandKind::SetOffset,
            C::SetSpindleSync { .. } => CommandKind::SetSpindleSync,
            C::SetTermCond { .. } => CommandKind::SetTermCond,
            C::SetLine(_) => CommandKind::SetLine,
            C::SetCircle(_) => CommandKind::SetCircle,
            C::ClearProbeFlags => CommandKind::ClearProbeFlags,
            C::Probe(_) => CommandKind::Probe,
            C::RigidTap(_) => CommandKind::RigidTap,
            C::SetDebug { .. } => CommandKind::SetDebug,
            C::SetAout { .. } => CommandKind::SetAout,
            C::SetDout { .. } => CommandKind::SetDout,
            C::SpindleOn { .. } => CommandKind::SpindleOn,
            C::SpindleOff => CommandKind::SpindleOff,
            C::SpindleBrakeRelease => CommandKind::SpindleBrakeRelease,
            C::SpindleBrakeEngage => CommandKind::SpindleBrakeEngage,
            C::SpindleIncrease => CommandKind::SpindleIncrease,
            C::SpindleDecrease => CommandKind::SpindleDecrease,
            C::SpindleOrient { .. } => CommandKind::SpindleOrient,
        }
    }

    /// Concrete joint index addressed by this request, if any.
    pub const fn joint(&self) -> Option<usize> {
        use MotionCommand as C;
        match self {
            C::SetPositionLimits { joint, .. }
            | C::SetBacklash { joint, .. }
            | C::SetMotorOffset { joint, .. }
            | C::SetMaxFerror { joint, .. }
            | C::SetMinFerror { joint, .. }
            | C::SetHomingParams { joint, .. }
            | C::SetJointVelLimit { joint, .. }
            | C::SetJointAccLimit { joint, .. }
            | C::SetJointComp { joint, .. }
            | C::JointAbort { joint }
            | C::ActivateJoint { joint }
            | C::DeactivateJoint { joint }
            | C::EnableAmplifier { joint }
            | C::DisableAmplifier { joint }
            | C::JogCont { joint, .. }
            | C::JogIncr { joint, .. }
            | C::JogAbs { joint, .. } => Some(*joint),
            C::OverrideLimits { joint } | C::Home { joint } | C::Unhome { joint } => match joint {
                JointTarget::Joint(j) => Some(*j),
                _ => None,
            },
            _ => None,
        }
    }

    /// True if every floating-point field of the payload is finite.
    pub fn is_finite(&self) -> bool {
        use MotionCommand as C;
        let all = |vals: &[f64]| vals.iter().all(|v| v.is_finite());
        match self {
            C::SetPositionLimits { min, max, .. } => all(&[*min, *max]),
            C::SetBacklash { backlash, .. } => backlash.is_finite(),
            C::SetMotorOffset { offset, .. } => offset.is_finite(),
            C::SetMaxFerror { ferror, .. } | C::SetMinFerror { ferror, .. } => ferror.is_finite(),
            C::SetHomingParams { params, .. } => params.is_finite(),
            C::SetJointVelLimit { vel, .. } | C::JogCont { vel, .. } => vel.is_finite(),
            C::SetJointAccLimit { acc, .. } => acc.is_finite(),
            C::SetJointComp {
                nominal,
                forward,
                reverse,
                ..
            } => all(&[*nominal, *forward, *reverse]),
            C::JogIncr { incr, vel, .. } => all(&[*incr, *vel]),
            C::JogAbs { pos, vel, .. } => all(&[*pos, *vel]),
            C::SetVel { vel, ini_maxvel } => all(&[*vel, *ini_maxvel]),
            C::SetAcc { acc } => acc.is_finite(),
            C::SetVelLimit { vel } => vel.is_finite(),
            C::SetWorldHome { pose } => pose.is_finite(),
            C::FeedScale { scale } | C::SpindleScale { scale } => scale.is_finite(),
            C::SetOffset { tool_offset } => tool_offset.is_finite(),
            C::SetSpindleSync { fpr, .. } => fpr.is_finite(),
            C::SetTermCond { tolerance, .. } => tolerance.is_finite(),
            C::SetLine(m) => m.end.is_finite() && all(&[m.vel, m.ini_maxvel, m.acc]),
            C::SetCircle(m) => {
                m.end.is_finite()
                    && m.center.is_finite()
                    && m.normal.is_finite()
                    && all(&[m.vel, m.ini_maxvel, m.acc])
            }
            C::Probe(m) => m.pos.is_finite() && all(&[m.vel, m.ini_maxvel, m.acc]),
            C::RigidTap(m) => m.pos.is_finite() && all(&[m.vel, m.ini_maxvel, m.acc]),
            C::SetAout { start, end, .. } => all(&[*start, *end]),
            C::SpindleOn { speed, css_factor, offset } => all(&[*speed, *css_factor, *offset]),
            C::SpindleOrient { orientation, .. } => orientation.is_finite(),
            _ => true,
        }
    }
}
