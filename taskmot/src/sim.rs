//! In-process simulated executor.
//!
//! [`SimulatedExecutor`] implements [`MotionChannel`] over a small executor
//! model: amplifier enables, free/coord/teleop modes, jogs, homing, a
//! bounded motion queue with identity kinematics, overrides, spindle and
//! I/O. Handles are cheap clones sharing one state, so a test or a stepping
//! thread can inspect and drive the executor while the bridge owns its own
//! handle.
//!
//! Configuration-bearing commands (limits, ferror bounds, homing, velocity
//! ceilings, debug level) bump the config generation the way the real
//! executor does, so the decoder's refresh path is exercised.

use std::sync::Arc;
use std::time::Duration;

use heapless::{Deque, String as HString};
use parking_lot::Mutex;
use taskmot_common::command::{HomingParams, JointTarget, MotionCommand, TermCond, TrajMode};
use taskmot_common::config::ConfigSource;
use taskmot_common::consts::{EMCMOT_SECTION, MAX_AIO, MAX_DIO, MAX_ERROR_LEN, MAX_JOINTS};
use taskmot_common::flags::{EnableFlags, JointFlags, MotionFlags};
use taskmot_common::io::set_bit;
use taskmot_common::pose::Pose;
use taskmot_common::snapshot::{
    ConfigSnapshot, DebugSnapshot, JointFeedback, KinematicsType, StatusSnapshot,
};
use tracing::{debug, trace};

use crate::channel::MotionChannel;
use crate::error::ChannelError;

/// Queued moves the executor accepts before reporting queue-full.
pub const QUEUE_DEPTH: usize = 32;
/// Pending executor error messages kept before the oldest is dropped.
pub const ERROR_QUEUE_DEPTH: usize = 8;
/// Speed change of one spindle increase/decrease step.
pub const SPINDLE_INCREMENT: f64 = 100.0;

const POSITION_EPSILON: f64 = 1e-9;
const DEFAULT_SERVO_PERIOD_NS: f64 = 1_000_000.0;

type ErrorText = HString<MAX_ERROR_LEN>;

fn error_text(message: &str) -> ErrorText {
    let mut text = ErrorText::new();
    for c in message.chars() {
        if text.push(c).is_err() {
            break;
        }
    }
    text
}

/// Move toward `target` by at most `speed * dt`. Returns the new position.
fn approach(pos: f64, target: f64, speed: f64, dt: f64) -> f64 {
    let step = speed.abs() * dt;
    let delta = target - pos;
    if delta.abs() <= step {
        target
    } else {
        pos + step.copysign(delta)
    }
}

// ─── Model ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct SimJoint {
    active: bool,
    enabled: bool,
    homing: bool,
    homed: bool,
    fault: bool,
    pos: f64,
    target: f64,
    /// Continuous jog velocity, `None` when not jogging continuously.
    jog_vel: Option<f64>,
    speed: f64,
    vel_cmd: f64,
    motor_offset: f64,
    max_vel: f64,
    max_acc: f64,
    min_limit: f64,
    max_limit: f64,
    backlash: f64,
    min_ferror: f64,
    max_ferror: f64,
    homing_params: HomingParams,
    comp_entries: usize,
}

impl Default for SimJoint {
    fn default() -> Self {
        Self {
            active: false,
            enabled: false,
            homing: false,
            homed: false,
            fault: false,
            pos: 0.0,
            target: 0.0,
            jog_vel: None,
            speed: 0.0,
            vel_cmd: 0.0,
            motor_offset: 0.0,
            max_vel: 1.0,
            max_acc: 1.0,
            min_limit: -1e99,
            max_limit: 1e99,
            backlash: 0.0,
            min_ferror: 0.01,
            max_ferror: 1.0,
            homing_params: HomingParams {
                home: 0.0,
                offset: 0.0,
                final_vel: -1.0,
                search_vel: 0.0,
                latch_vel: 0.0,
                flags: Default::default(),
                sequence: -1,
                volatile_home: false,
            },
            comp_entries: 0,
        }
    }
}

impl SimJoint {
    fn idle(&self) -> bool {
        self.jog_vel.is_none() && !self.homing && (self.target - self.pos).abs() <= POSITION_EPSILON
    }

    fn stop(&mut self) {
        self.jog_vel = None;
        self.target = self.pos;
        self.vel_cmd = 0.0;
        self.homing = false;
    }

    fn step(&mut self, dt: f64, override_limits: bool) {
        let start = self.pos;
        if let Some(vel) = self.jog_vel {
            self.pos += vel * dt;
            self.target = self.pos;
        } else if self.homing {
            let p = &self.homing_params;
            let speed = if p.search_vel != 0.0 { p.search_vel } else { self.max_vel };
            self.pos = approach(self.pos, p.home, speed, dt);
            self.target = self.pos;
            if (self.pos - p.home).abs() <= POSITION_EPSILON {
                self.homing = false;
                self.homed = true;
            }
        } else {
            self.pos = approach(self.pos, self.target, self.speed, dt);
        }
        if !override_limits && !self.homing {
            let clamped = self.pos.clamp(self.min_limit, self.max_limit);
            if clamped != self.pos {
                self.pos = clamped;
                self.stop();
            }
        }
        self.vel_cmd = if dt > 0.0 { (self.pos - start) / dt } else { 0.0 };
    }

    fn flags(&self, override_limits: bool) -> JointFlags {
        let mut flags = JointFlags::empty();
        flags.set(JointFlags::ACTIVE, self.active);
        flags.set(JointFlags::ENABLE, self.enabled);
        flags.set(JointFlags::INPOS, self.idle());
        flags.set(JointFlags::HOMING, self.homing);
        flags.set(JointFlags::HOMED, self.homed);
        flags.set(JointFlags::FAULT, self.fault);
        flags.set(JointFlags::ERROR, self.fault);
        if !override_limits {
            flags.set(JointFlags::MIN_HARD_LIMIT, self.pos <= self.min_limit);
            flags.set(JointFlags::MAX_HARD_LIMIT, self.pos >= self.max_limit);
        }
        flags
    }
}

#[derive(Debug, Clone, Copy)]
struct QueuedMove {
    id: i32,
    motion_type: i32,
    target: Pose,
    vel: f64,
    probe: bool,
}

#[derive(Debug)]
struct SimState {
    name: Option<String>,
    opens: u64,
    closes: u64,
    fail_next_open: bool,
    fail_next_close: bool,
    fail_writes: bool,
    fail_reads: bool,
    history: Vec<MotionCommand>,

    status: StatusSnapshot,
    config: ConfigSnapshot,
    debug: DebugSnapshot,
    errors: Deque<ErrorText, ERROR_QUEUE_DEPTH>,

    joints: [SimJoint; MAX_JOINTS],
    num_joints: usize,
    enabled: bool,
    mode: TrajMode,
    queue: Deque<QueuedMove, QUEUE_DEPTH>,
    active: Option<QueuedMove>,
    paused: bool,
    step_once: bool,
    vel: f64,
    ini_maxvel: f64,
    acc: f64,
    position: Pose,
    world_home: Pose,
    tool_offset: Pose,
    term_cond: TermCond,
    tolerance: f64,
    spindle_sync: f64,
}

impl Default for SimState {
    fn default() -> Self {
        let mut status = StatusSnapshot::new();
        status.feed_scale = 1.0;
        status.spindle_scale = 1.0;
        status.spindle.brake = true;
        Self {
            name: None,
            opens: 0,
            closes: 0,
            fail_next_open: false,
            fail_next_close: false,
            fail_writes: false,
            fail_reads: false,
            history: Vec::new(),
            status,
            config: ConfigSnapshot {
                config_num: 1,
                traj_cycle_time: DEFAULT_SERVO_PERIOD_NS * 1e-9,
                kinematics_type: KinematicsType::Identity,
                limit_vel: 1.0,
                debug: 0,
            },
            debug: DebugSnapshot::default(),
            errors: Deque::new(),
            joints: [SimJoint::default(); MAX_JOINTS],
            num_joints: 0,
            enabled: false,
            mode: TrajMode::Free,
            queue: Deque::new(),
            active: None,
            paused: false,
            step_once: false,
            vel: 0.0,
            ini_maxvel: 0.0,
            acc: 0.0,
            position: Pose::default(),
            world_home: Pose::default(),
            tool_offset: Pose::default(),
            term_cond: TermCond::default(),
            tolerance: 0.0,
            spindle_sync: 0.0,
        }
    }
}

impl SimState {
    fn is_open(&self) -> bool {
        self.name.is_some()
    }

    fn push_error(&mut self, message: &str) {
        if self.errors.is_full() {
            self.errors.pop_front();
        }
        let _ = self.errors.push_back(error_text(message));
    }

    fn bump_config(&mut self) {
        self.config.config_num = self.config.config_num.wrapping_add(1);
    }

    fn override_limits(&self) -> bool {
        self.status.override_limit_mask != 0
    }

    fn targets(&self, joint: JointTarget) -> impl Iterator<Item = usize> + '_ {
        (0..MAX_JOINTS).filter(move |&j| match joint {
            JointTarget::Joint(n) => n == j,
            JointTarget::All => j < self.num_joints,
            JointTarget::Volatile => self.joints[j].homing_params.volatile_home,
            JointTarget::None => false,
        })
    }

    fn can_jog(&self, joint: usize) -> bool {
        self.enabled && self.mode == TrajMode::Free && self.joints[joint].enabled
    }

    fn enqueue(&mut self, queued: QueuedMove) {
        if !self.enabled || self.mode != TrajMode::Coord {
            self.push_error("Move ignored: not in coordinated mode");
            return;
        }
        if self.queue.push_back(queued).is_err() {
            self.push_error("Move ignored: motion queue full");
        }
    }

    fn set_enables(&mut self, flag: EnableFlags, on: bool) {
        self.status.enables_new.set(flag, on);
        self.status.enables_queued.set(flag, on);
    }

    fn abort_motion(&mut self) {
        self.queue.clear();
        self.active = None;
        self.paused = false;
        for joint in &mut self.joints {
            joint.stop();
        }
    }

    fn apply(&mut self, command: &MotionCommand) {
        use MotionCommand as C;
        match *command {
            C::SetPositionLimits { joint, min, max } => {
                self.joints[joint].min_limit = min;
                self.joints[joint].max_limit = max;
                self.bump_config();
            }
            C::SetBacklash { joint, backlash } => {
                self.joints[joint].backlash = backlash;
                self.bump_config();
            }
            C::SetMotorOffset { joint, offset } => {
                let j = &mut self.joints[joint];
                let shift = j.motor_offset - offset;
                j.pos += shift;
                j.target += shift;
                j.motor_offset = offset;
            }
            C::SetMaxFerror { joint, ferror } => {
                self.joints[joint].max_ferror = ferror;
                self.bump_config();
            }
            C::SetMinFerror { joint, ferror } => {
                self.joints[joint].min_ferror = ferror;
                self.bump_config();
            }
            C::SetHomingParams { joint, params } => {
                self.joints[joint].homing_params = params;
                self.bump_config();
            }
            C::SetJointVelLimit { joint, vel } => {
                self.joints[joint].max_vel = vel;
                self.bump_config();
            }
            C::SetJointAccLimit { joint, acc } => {
                self.joints[joint].max_acc = acc;
                self.bump_config();
            }
            C::SetJointComp { joint, .. } => self.joints[joint].comp_entries += 1,
            C::JointAbort { joint } => self.joints[joint].stop(),
            C::ActivateJoint { joint } => self.joints[joint].active = true,
            C::DeactivateJoint { joint } => self.joints[joint].active = false,
            C::OverrideLimits { joint } => match joint {
                JointTarget::Joint(j) => self.status.override_limit_mask |= 1 << j,
                JointTarget::All => self.status.override_limit_mask = u32::MAX,
                _ => self.status.override_limit_mask = 0,
            },
            C::EnableAmplifier { joint } => self.joints[joint].enabled = true,
            C::DisableAmplifier { joint } => {
                let j = &mut self.joints[joint];
                j.enabled = false;
                j.stop();
            }
            C::Home { joint } => {
                if !self.enabled {
                    self.push_error("Home ignored: motion not enabled");
                    return;
                }
                let selected: Vec<usize> = self.targets(joint).collect();
                for j in selected {
                    let sim = &mut self.joints[j];
                    sim.jog_vel = None;
                    sim.homed = false;
                    sim.homing = true;
                }
            }
            C::Unhome { joint } => {
                let selected: Vec<usize> = self.targets(joint).collect();
                for j in selected {
                    self.joints[j].homed = false;
                }
            }
            C::JogCont { joint, vel } => {
                if self.can_jog(joint) {
                    self.joints[joint].jog_vel = Some(vel);
                }
            }
            C::JogIncr { joint, incr, vel } => {
                if self.can_jog(joint) {
                    let j = &mut self.joints[joint];
                    j.jog_vel = None;
                    j.target = j.pos + incr;
                    j.speed = vel.abs();
                }
            }
            C::JogAbs { joint, pos, vel } => {
                if self.can_jog(joint) {
                    let j = &mut self.joints[joint];
                    j.jog_vel = None;
                    j.target = pos;
                    j.speed = vel.abs();
                }
            }
            C::SetNumJoints { joints } => self.num_joints = joints.min(MAX_JOINTS),
            C::Free => self.mode = TrajMode::Free,
            C::Coord => self.mode = TrajMode::Coord,
            C::Teleop => self.mode = TrajMode::Teleop,
            C::SetVel { vel, ini_maxvel } => {
                self.vel = vel;
                self.ini_maxvel = ini_maxvel;
            }
            C::SetAcc { acc } => self.acc = acc,
            C::SetVelLimit { vel } => {
                self.config.limit_vel = vel;
                self.bump_config();
            }
            C::SetWorldHome { pose } => self.world_home = pose,
            C::FeedScale { scale } => self.status.feed_scale = scale,
            C::SpindleScale { scale } => self.status.spindle_scale = scale,
            C::FsEnable { mode } => self.set_enables(EnableFlags::FEED_OVERRIDE, mode != 0),
            C::FhEnable { mode } => self.set_enables(EnableFlags::FEED_HOLD, mode != 0),
            C::SsEnable { mode } => self.set_enables(EnableFlags::SPINDLE_OVERRIDE, mode != 0),
            C::AfEnable { enable } => self.set_enables(EnableFlags::ADAPTIVE_FEED, enable),
            C::Enable => self.enabled = true,
            C::Disable => {
                self.enabled = false;
                self.abort_motion();
            }
            C::Abort => self.abort_motion(),
            C::Pause => self.paused = true,
            C::Resume => {
                self.paused = false;
                self.step_once = false;
            }
            C::Step => {
                self.paused = false;
                self.step_once = true;
            }
            C::SetOffset { tool_offset } => self.tool_offset = tool_offset,
            C::SetSpindleSync { fpr, .. } => self.spindle_sync = fpr,
            C::SetTermCond { cond, tolerance } => {
                self.term_cond = cond;
                self.tolerance = tolerance;
            }
            C::SetLine(m) => self.enqueue(QueuedMove {
                id: m.id,
                motion_type: m.motion_type,
                target: m.end,
                vel: m.vel,
                probe: false,
            }),
            C::SetCircle(m) => self.enqueue(QueuedMove {
                id: m.id,
                motion_type: m.motion_type,
                target: m.end,
                vel: m.vel,
                probe: false,
            }),
            C::Probe(m) => {
                self.status.probing = true;
                self.enqueue(QueuedMove {
                    id: m.id,
                    motion_type: m.motion_type,
                    target: m.pos,
                    vel: m.vel,
                    probe: true,
                });
            }
            C::RigidTap(m) => {
                let mut target = self.position;
                target.tran = m.pos;
                self.enqueue(QueuedMove {
                    id: m.id,
                    motion_type: 0,
                    target,
                    vel: m.vel,
                    probe: false,
                });
            }
            C::ClearProbeFlags => {
                self.status.probe_tripped = false;
                self.status.probing = false;
            }
            C::SetDebug { level } => {
                self.config.debug = level;
                self.bump_config();
            }
            C::SetAout { index, start, end, now } => {
                if let Some(out) = self.status.analog_output.get_mut(usize::from(index)) {
                    *out = if now { start } else { end };
                }
            }
            C::SetDout { index, start, end, now } => {
                let index = usize::from(index);
                if index < MAX_DIO {
                    set_bit(&mut self.status.synch_do, index, if now { start } else { end });
                }
            }
            C::SpindleOn { speed, css_factor, offset } => {
                let s = &mut self.status.spindle;
                s.speed = speed;
                s.css_factor = css_factor;
                s.offset = offset;
                s.direction = if speed > 0.0 { 1 } else if speed < 0.0 { -1 } else { 0 };
                s.brake = false;
                s.orient_state = 0;
            }
            C::SpindleOff => {
                let s = &mut self.status.spindle;
                s.speed = 0.0;
                s.direction = 0;
                s.brake = true;
            }
            C::SpindleBrakeRelease => self.status.spindle.brake = false,
            C::SpindleBrakeEngage => self.status.spindle.brake = true,
            C::SpindleIncrease => {
                let s = &mut self.status.spindle;
                if s.speed > 0.0 {
                    s.speed += SPINDLE_INCREMENT;
                } else if s.speed < 0.0 {
                    s.speed -= SPINDLE_INCREMENT;
                }
            }
            C::SpindleDecrease => {
                let s = &mut self.status.spindle;
                if s.speed > SPINDLE_INCREMENT {
                    s.speed -= SPINDLE_INCREMENT;
                } else if s.speed < -SPINDLE_INCREMENT {
                    s.speed += SPINDLE_INCREMENT;
                }
            }
            C::SpindleOrient { .. } => {
                let s = &mut self.status.spindle;
                s.speed = 0.0;
                s.direction = 0;
                s.orient_state = 1;
            }
        }
    }

    fn step(&mut self, dt: Duration) {
        let dt_s = dt.as_secs_f64();
        self.status.heartbeat = self.status.heartbeat.wrapping_add(1);
        self.debug.cycle_count += 1;
        self.debug.last_cycle_time = dt_s;
        if dt_s > self.debug.max_cycle_time {
            self.debug.max_cycle_time = dt_s;
        }
        if dt_s > self.config.traj_cycle_time * 2.0 {
            self.debug.overruns += 1;
        }

        if self.status.spindle.orient_state == 1 {
            self.status.spindle.orient_state = 2;
        }

        if self.enabled && self.mode == TrajMode::Coord {
            self.step_queue();
        }
        let override_limits = self.override_limits();
        let enabled = self.enabled;
        for joint in &mut self.joints {
            if enabled && joint.enabled && !joint.fault {
                joint.step(dt_s, override_limits);
            } else {
                joint.vel_cmd = 0.0;
            }
        }
        self.publish();
    }

    fn step_queue(&mut self) {
        let n = self.num_joints;
        if let Some(m) = self.active {
            if self.joints.iter().take(n).all(SimJoint::idle) {
                self.position = m.target;
                if m.probe {
                    self.status.probing = false;
                    self.status.probe_tripped = true;
                    self.status.probed_pos = m.target;
                    self.status.probe_val = 1;
                }
                self.active = None;
                if std::mem::take(&mut self.step_once) {
                    self.paused = true;
                }
            }
        }
        if self.active.is_some() || self.paused || self.joints.iter().take(n).any(|j| j.homing) {
            return;
        }
        self.active = self.queue.pop_front();
        if let Some(m) = &self.active {
            let mut speed = (m.vel * self.status.feed_scale).min(self.config.limit_vel);
            if self.ini_maxvel > 0.0 {
                speed = speed.min(self.ini_maxvel);
            }
            let speed = speed.max(0.0);
            for (joint, target) in self.joints.iter_mut().zip(m.target.components()).take(n) {
                joint.jog_vel = None;
                joint.target = target;
                joint.speed = speed.min(joint.max_vel);
            }
        }
    }

    fn joint_pose(&self) -> Pose {
        let mut values = [0.0; Pose::COMPONENTS];
        for (value, joint) in values.iter_mut().zip(&self.joints).take(self.num_joints) {
            *value = joint.pos;
        }
        Pose::from_components(&values).unwrap_or_default()
    }

    fn publish(&mut self) {
        let override_limits = self.override_limits();
        for (fb, joint) in self.status.joints.iter_mut().zip(&self.joints) {
            *fb = JointFeedback {
                flags: joint.flags(override_limits),
                pos_cmd: joint.target,
                pos_fb: joint.pos,
                vel_cmd: joint.vel_cmd,
                ferror: 0.0,
                ferror_high_mark: 0.0,
                ferror_limit: joint.max_ferror,
                backlash: joint.backlash,
                min_pos_limit: joint.min_limit,
                max_pos_limit: joint.max_limit,
                min_ferror: joint.min_ferror,
                max_ferror: joint.max_ferror,
                home_offset: joint.homing_params.offset,
            };
        }

        let n = self.num_joints;
        let joints_idle = self.joints.iter().take(n).all(SimJoint::idle);
        let fault = self.joints.iter().take(n).any(|j| j.fault);
        let inpos = self.active.is_none() && self.queue.is_empty() && joints_idle;

        let mut motion = MotionFlags::empty();
        motion.set(MotionFlags::ENABLE, self.enabled);
        motion.set(MotionFlags::INPOS, inpos);
        motion.set(MotionFlags::COORD, self.mode == TrajMode::Coord);
        motion.set(MotionFlags::TELEOP, self.mode == TrajMode::Teleop);
        motion.set(MotionFlags::ERROR, fault);

        let pose = self.joint_pose();
        let s = &mut self.status;
        s.motion_flags = motion;
        s.config_num = self.config.config_num;
        s.depth = (self.queue.len() + usize::from(self.active.is_some())) as u32;
        s.active_depth = u32::from(self.active.is_some());
        s.queue_full = self.queue.is_full();
        s.id = self.active.map_or(s.id, |m| m.id);
        s.motion_type = self.active.map_or(0, |m| m.motion_type);
        s.paused = self.paused;
        s.carte_pos_cmd = self.active.map_or(pose, |m| m.target);
        s.carte_pos_fb = pose;
        s.vel = self.vel;
        s.acc = self.acc;

        let target = self.active.map_or(pose, |m| m.target).components();
        let here = pose.components();
        let mut dtg = [0.0; Pose::COMPONENTS];
        for (d, (t, h)) in dtg.iter_mut().zip(target.iter().zip(here.iter())) {
            *d = t - h;
        }
        s.dtg = Pose::from_components(&dtg).unwrap_or_default();
        s.distance_to_go = dtg.iter().map(|d| d * d).sum::<f64>().sqrt();
        s.current_vel = self
            .joints
            .iter()
            .take(n)
            .map(|j| j.vel_cmd * j.vel_cmd)
            .sum::<f64>()
            .sqrt();

        // Digital inputs loop back the outputs; analog inputs likewise.
        s.synch_di = s.synch_do;
        let outputs: [f64; MAX_AIO] = s.analog_output;
        s.analog_input = outputs;
    }
}

// ─── Handle ─────────────────────────────────────────────────────────

/// Shared handle to a simulated executor.
#[derive(Debug, Clone, Default)]
pub struct SimulatedExecutor {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the executor model by one servo period.
    pub fn step(&self, dt: Duration) {
        self.state.lock().step(dt);
    }

    /// Currently open.
    pub fn is_open(&self) -> bool {
        self.state.lock().is_open()
    }

    /// Client name of the current open.
    pub fn client_name(&self) -> Option<String> {
        self.state.lock().name.clone()
    }

    pub fn open_count(&self) -> u64 {
        self.state.lock().opens
    }

    pub fn close_count(&self) -> u64 {
        self.state.lock().closes
    }

    /// Every command accepted so far, in order.
    pub fn commands(&self) -> Vec<MotionCommand> {
        self.state.lock().history.clone()
    }

    pub fn command_count(&self) -> usize {
        self.state.lock().history.len()
    }

    pub fn clear_commands(&self) {
        self.state.lock().history.clear();
    }

    /// Current published status.
    pub fn snapshot(&self) -> StatusSnapshot {
        self.state.lock().status.clone()
    }

    pub fn config_snapshot(&self) -> ConfigSnapshot {
        self.state.lock().config
    }

    /// Compensation entries received for `joint`.
    pub fn comp_entries(&self, joint: usize) -> usize {
        self.state
            .lock()
            .joints
            .get(joint)
            .map_or(0, |j| j.comp_entries)
    }

    /// Velocity and acceleration ceilings of `joint`.
    pub fn joint_ceilings(&self, joint: usize) -> Option<(f64, f64)> {
        self.state
            .lock()
            .joints
            .get(joint)
            .map(|j| (j.max_vel, j.max_acc))
    }

    pub fn world_home(&self) -> Pose {
        self.state.lock().world_home
    }

    pub fn tool_offset(&self) -> Pose {
        self.state.lock().tool_offset
    }

    /// Termination condition and blend tolerance.
    pub fn term_cond(&self) -> (TermCond, f64) {
        let state = self.state.lock();
        (state.term_cond, state.tolerance)
    }

    /// Feed per revolution of spindle-synchronized motion, 0 when unsynced.
    pub fn spindle_sync(&self) -> f64 {
        self.state.lock().spindle_sync
    }

    // ─── Fault injection ────────────────────────────────────────────

    pub fn fail_next_open(&self) {
        self.state.lock().fail_next_open = true;
    }

    pub fn fail_next_close(&self) {
        self.state.lock().fail_next_close = true;
    }

    pub fn fail_writes(&self, fail: bool) {
        self.state.lock().fail_writes = fail;
    }

    pub fn fail_reads(&self, fail: bool) {
        self.state.lock().fail_reads = fail;
    }

    /// Queue an executor error message (truncated to `MAX_ERROR_LEN` bytes).
    pub fn push_error(&self, message: &str) {
        self.state.lock().push_error(message);
    }

    /// Put `joint` into amplifier fault.
    pub fn inject_joint_fault(&self, joint: usize) {
        let mut state = self.state.lock();
        if let Some(j) = state.joints.get_mut(joint) {
            j.fault = true;
            j.stop();
            state.push_error(&format!("Joint {joint} amplifier fault"));
            state.publish();
        }
    }

    pub fn clear_joint_fault(&self, joint: usize) {
        let mut state = self.state.lock();
        if let Some(j) = state.joints.get_mut(joint) {
            j.fault = false;
            state.publish();
        }
    }
}

impl MotionChannel for SimulatedExecutor {
    fn configure(&mut self, config: &dyn ConfigSource) -> Result<(), ChannelError> {
        let period_ns = config
            .find_f64(EMCMOT_SECTION, "SERVO_PERIOD")
            .map_err(|e| ChannelError::OpenFailed(e.to_string()))?
            .unwrap_or(DEFAULT_SERVO_PERIOD_NS);
        let kinematics = match config
            .find_i64(EMCMOT_SECTION, "KINEMATICS")
            .map_err(|e| ChannelError::OpenFailed(e.to_string()))?
        {
            None => KinematicsType::Identity,
            Some(raw) => u8::try_from(raw)
                .ok()
                .and_then(KinematicsType::from_u8)
                .ok_or_else(|| ChannelError::OpenFailed(format!("Unknown kinematics type {raw}")))?,
        };
        let mut state = self.state.lock();
        state.config.traj_cycle_time = period_ns * 1e-9;
        state.config.kinematics_type = kinematics;
        debug!(period_ns, ?kinematics, "Simulated executor configured");
        Ok(())
    }

    fn open(&mut self, name: &str) -> Result<(), ChannelError> {
        let mut state = self.state.lock();
        if std::mem::take(&mut state.fail_next_open) {
            return Err(ChannelError::OpenFailed(format!("{name}: injected failure")));
        }
        state.name = Some(name.to_string());
        state.opens += 1;
        state.publish();
        Ok(())
    }

    fn close(&mut self) -> Result<(), ChannelError> {
        let mut state = self.state.lock();
        state.name = None;
        state.closes += 1;
        if std::mem::take(&mut state.fail_next_close) {
            return Err(ChannelError::Closed("injected failure".to_string()));
        }
        Ok(())
    }

    fn write_command(&mut self, command: &MotionCommand) -> Result<(), ChannelError> {
        let mut state = self.state.lock();
        if !state.is_open() {
            return Err(ChannelError::NotOpen);
        }
        if state.fail_writes {
            return Err(ChannelError::WriteFailed(format!(
                "{:?}: injected failure",
                command.kind()
            )));
        }
        trace!(kind = ?command.kind(), "Simulated executor command");
        state.apply(command);
        state.history.push(*command);
        state.status.command_echo = Some(command.kind());
        state.status.command_num_echo = state.status.command_num_echo.wrapping_add(1);
        state.publish();
        Ok(())
    }

    fn read_status(&mut self) -> Result<StatusSnapshot, ChannelError> {
        let state = self.state.lock();
        if !state.is_open() {
            return Err(ChannelError::NotOpen);
        }
        if state.fail_reads {
            return Err(ChannelError::ReadFailed("injected failure".to_string()));
        }
        Ok(state.status.clone())
    }

    fn read_config(&mut self) -> Result<ConfigSnapshot, ChannelError> {
        let state = self.state.lock();
        if !state.is_open() {
            return Err(ChannelError::NotOpen);
        }
        if state.fail_reads {
            return Err(ChannelError::ReadFailed("injected failure".to_string()));
        }
        Ok(state.config)
    }

    fn read_debug(&mut self) -> Result<DebugSnapshot, ChannelError> {
        let state = self.state.lock();
        if !state.is_open() {
            return Err(ChannelError::NotOpen);
        }
        Ok(state.debug)
    }

    fn read_error(&mut self) -> Result<Option<String>, ChannelError> {
        let mut state = self.state.lock();
        if !state.is_open() {
            return Err(ChannelError::NotOpen);
        }
        if state.fail_reads {
            return Err(ChannelError::ReadFailed("injected failure".to_string()));
        }
        Ok(state.errors.pop_front().map(|text| text.as_str().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskmot_common::command::LineMove;
    use taskmot_common::config::TomlSource;

    const DT: Duration = Duration::from_millis(1);

    fn open_sim() -> SimulatedExecutor {
        let mut sim = SimulatedExecutor::new();
        sim.open("test").unwrap();
        sim
    }

    fn send(sim: &mut SimulatedExecutor, command: MotionCommand) {
        sim.write_command(&command).unwrap();
    }

    #[test]
    fn closed_channel_rejects_io() {
        let mut sim = SimulatedExecutor::new();
        assert_eq!(sim.write_command(&MotionCommand::Enable), Err(ChannelError::NotOpen));
        assert_eq!(sim.read_status(), Err(ChannelError::NotOpen));
    }

    #[test]
    fn echoes_serial_and_kind() {
        let mut sim = open_sim();
        send(&mut sim, MotionCommand::Enable);
        send(&mut sim, MotionCommand::Coord);
        let s = sim.read_status().unwrap();
        assert_eq!(s.command_num_echo, 2);
        assert_eq!(s.command_echo, Some(MotionCommand::Coord.kind()));
        assert!(s.motion_flags.contains(MotionFlags::ENABLE | MotionFlags::COORD));
    }

    #[test]
    fn config_commands_bump_generation() {
        let mut sim = open_sim();
        let before = sim.config_snapshot().config_num;
        send(&mut sim, MotionCommand::SetBacklash { joint: 0, backlash: 0.1 });
        send(&mut sim, MotionCommand::Enable);
        assert_eq!(sim.config_snapshot().config_num, before + 1);
        assert_eq!(sim.snapshot().config_num, before + 1);
    }

    #[test]
    fn jog_moves_joint() {
        let mut sim = open_sim();
        send(&mut sim, MotionCommand::SetNumJoints { joints: 1 });
        send(&mut sim, MotionCommand::Enable);
        send(&mut sim, MotionCommand::EnableAmplifier { joint: 0 });
        send(&mut sim, MotionCommand::JogIncr { joint: 0, incr: 0.002, vel: 1.0 });
        sim.step(DT);
        assert!(!sim.snapshot().joints[0].flags.contains(JointFlags::INPOS));
        sim.step(DT);
        let s = sim.snapshot();
        assert!((s.joints[0].pos_fb - 0.002).abs() < 1e-12);
        assert!(s.joints[0].flags.contains(JointFlags::INPOS));
    }

    #[test]
    fn queued_line_completes() {
        let mut sim = open_sim();
        for command in [
            MotionCommand::SetNumJoints { joints: 3 },
            MotionCommand::SetVelLimit { vel: 10.0 },
            MotionCommand::Enable,
            MotionCommand::Coord,
        ] {
            send(&mut sim, command);
        }
        for joint in 0..3 {
            send(&mut sim, MotionCommand::EnableAmplifier { joint });
            send(&mut sim, MotionCommand::SetJointVelLimit { joint, vel: 10.0 });
        }
        send(
            &mut sim,
            MotionCommand::SetLine(LineMove {
                end: Pose::from_xyz(0.01, 0.0, 0.0),
                id: 7,
                motion_type: 1,
                vel: 10.0,
                ini_maxvel: 10.0,
                acc: 100.0,
                indexrotary: -1,
            }),
        );
        assert_eq!(sim.snapshot().depth, 1);
        sim.step(DT);
        assert_eq!(sim.snapshot().id, 7);
        sim.step(DT);
        let s = sim.snapshot();
        assert_eq!(s.depth, 0);
        assert!(s.motion_flags.contains(MotionFlags::INPOS));
        assert!((s.carte_pos_fb.tran.x - 0.01).abs() < 1e-12);
    }

    #[test]
    fn move_outside_coord_is_reported() {
        let mut sim = open_sim();
        send(&mut sim, MotionCommand::SetLine(LineMove::default()));
        assert_eq!(sim.snapshot().depth, 0);
        let err = sim.read_error().unwrap().unwrap();
        assert!(err.contains("coordinated"));
        assert_eq!(sim.read_error().unwrap(), None);
    }

    #[test]
    fn error_queue_truncates_and_drops_oldest() {
        let mut sim = open_sim();
        sim.push_error(&"x".repeat(MAX_ERROR_LEN + 10));
        assert_eq!(sim.read_error().unwrap().unwrap().len(), MAX_ERROR_LEN);
        for i in 0..ERROR_QUEUE_DEPTH + 2 {
            sim.push_error(&format!("e{i}"));
        }
        assert_eq!(sim.read_error().unwrap().as_deref(), Some("e2"));
    }

    #[test]
    fn motor_offset_shifts_position() {
        let mut sim = open_sim();
        send(&mut sim, MotionCommand::SetMotorOffset { joint: 1, offset: -2.5 });
        assert_eq!(sim.snapshot().joints[1].pos_fb, 2.5);
    }

    #[test]
    fn homing_completes() {
        let mut sim = open_sim();
        send(&mut sim, MotionCommand::SetNumJoints { joints: 1 });
        send(&mut sim, MotionCommand::Enable);
        send(&mut sim, MotionCommand::EnableAmplifier { joint: 0 });
        send(&mut sim, MotionCommand::Home { joint: JointTarget::All });
        assert!(sim.snapshot().joints[0].flags.contains(JointFlags::HOMING));
        sim.step(DT);
        let flags = sim.snapshot().joints[0].flags;
        assert!(flags.contains(JointFlags::HOMED));
        assert!(!flags.contains(JointFlags::HOMING));
    }

    #[test]
    fn fault_sets_error_bits() {
        let sim = open_sim();
        sim.inject_joint_fault(0);
        let mut handle = sim.clone();
        let s = handle.read_status().unwrap();
        assert!(s.joints[0].flags.contains(JointFlags::ERROR | JointFlags::FAULT));
        assert!(handle.read_error().unwrap().is_some());
        sim.clear_joint_fault(0);
        assert!(!sim.snapshot().joints[0].flags.contains(JointFlags::ERROR));
    }

    #[test]
    fn spindle_and_io() {
        let mut sim = open_sim();
        send(&mut sim, MotionCommand::SpindleOn { speed: 500.0, css_factor: 0.0, offset: 0.0 });
        send(&mut sim, MotionCommand::SpindleIncrease);
        send(&mut sim, MotionCommand::SetDout { index: 5, start: true, end: false, now: true });
        send(&mut sim, MotionCommand::SetAout { index: 2, start: 1.5, end: 3.0, now: false });
        let s = sim.snapshot();
        assert_eq!(s.spindle.speed, 600.0);
        assert_eq!(s.spindle.direction, 1);
        assert!(!s.spindle.brake);
        assert!(taskmot_common::io::extract_bit(&s.synch_di, 5));
        assert_eq!(s.analog_input[2], 3.0);
    }

    #[test]
    fn configure_reads_servo_period() {
        let mut sim = SimulatedExecutor::new();
        let src =
            TomlSource::from_toml_str("[EMCMOT]\nSERVO_PERIOD = 500000\nKINEMATICS = 4\n").unwrap();
        sim.configure(&src).unwrap();
        let c = sim.config_snapshot();
        assert!((c.traj_cycle_time - 0.0005).abs() < 1e-12);
        assert_eq!(c.kinematics_type, KinematicsType::Both);

        let bad = TomlSource::from_toml_str("[EMCMOT]\nKINEMATICS = 9\n").unwrap();
        assert!(matches!(sim.configure(&bad), Err(ChannelError::OpenFailed(_))));
    }

    #[test]
    fn injected_open_failure_is_one_shot() {
        let mut sim = SimulatedExecutor::new();
        sim.fail_next_open();
        assert!(sim.open("x").is_err());
        assert!(!sim.is_open());
        sim.open("x").unwrap();
        assert_eq!(sim.client_name().as_deref(), Some("x"));
        assert_eq!(sim.open_count(), 1);
    }
}
