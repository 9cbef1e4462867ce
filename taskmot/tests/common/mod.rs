//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use taskmot::bridge::MotionBridge;
use taskmot::channel::MotionChannel;
use taskmot::error::ChannelError;
use taskmot_common::command::MotionCommand;
use taskmot_common::config::TomlSource;
use taskmot_common::snapshot::{ConfigSnapshot, DebugSnapshot, StatusSnapshot};

/// Call counters and scripted replies behind a [`RecordingChannel`].
#[derive(Debug, Default)]
pub struct Recording {
    pub open: bool,
    pub opens: u64,
    pub closes: u64,
    pub configures: u64,
    pub status_reads: u64,
    pub config_reads: u64,
    pub debug_reads: u64,
    pub error_reads: u64,
    pub commands: Vec<MotionCommand>,
    pub status: StatusSnapshot,
    pub config: ConfigSnapshot,
    pub debug: DebugSnapshot,
    pub errors: VecDeque<String>,
    pub fail_open: bool,
    pub fail_writes: bool,
    pub fail_status: bool,
    pub fail_config: bool,
    pub fail_error_read: bool,
}

/// Transport double that records every call. Clones share one recording.
#[derive(Debug, Clone, Default)]
pub struct RecordingChannel {
    inner: Arc<Mutex<Recording>>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        let channel = Self::default();
        channel.inner.lock().status = StatusSnapshot::new();
        channel
    }

    /// Run `f` with the recording locked.
    pub fn with<R>(&self, f: impl FnOnce(&mut Recording) -> R) -> R {
        f(&mut self.inner.lock())
    }

    pub fn commands(&self) -> Vec<MotionCommand> {
        self.inner.lock().commands.clone()
    }

    pub fn writes(&self) -> usize {
        self.inner.lock().commands.len()
    }

    pub fn clear_commands(&self) {
        self.inner.lock().commands.clear();
    }

    pub fn last_command(&self) -> Option<MotionCommand> {
        self.inner.lock().commands.last().cloned()
    }

    pub fn is_open(&self) -> bool {
        self.inner.lock().open
    }

    /// Replace the status snapshot returned by `read_status`.
    pub fn set_status(&self, status: StatusSnapshot) {
        self.inner.lock().status = status;
    }

    /// Replace the config snapshot and publish its generation in the status.
    pub fn set_config(&self, config: ConfigSnapshot) {
        let mut rec = self.inner.lock();
        rec.status.config_num = config.config_num;
        rec.config = config;
    }

    pub fn push_error(&self, message: &str) {
        self.inner.lock().errors.push_back(message.to_string());
    }
}

impl MotionChannel for RecordingChannel {
    fn configure(
        &mut self,
        _config: &dyn taskmot_common::config::ConfigSource,
    ) -> Result<(), ChannelError> {
        self.inner.lock().configures += 1;
        Ok(())
    }

    fn open(&mut self, _name: &str) -> Result<(), ChannelError> {
        let mut rec = self.inner.lock();
        if rec.fail_open {
            return Err(ChannelError::OpenFailed("scripted".into()));
        }
        rec.open = true;
        rec.opens += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), ChannelError> {
        let mut rec = self.inner.lock();
        rec.open = false;
        rec.closes += 1;
        Ok(())
    }

    fn write_command(&mut self, command: &MotionCommand) -> Result<(), ChannelError> {
        let mut rec = self.inner.lock();
        if !rec.open {
            return Err(ChannelError::NotOpen);
        }
        if rec.fail_writes {
            return Err(ChannelError::WriteFailed("scripted".into()));
        }
        rec.commands.push(command.clone());
        Ok(())
    }

    fn read_status(&mut self) -> Result<StatusSnapshot, ChannelError> {
        let mut rec = self.inner.lock();
        rec.status_reads += 1;
        if rec.fail_status {
            return Err(ChannelError::ReadFailed("scripted".into()));
        }
        Ok(rec.status.clone())
    }

    fn read_config(&mut self) -> Result<ConfigSnapshot, ChannelError> {
        let mut rec = self.inner.lock();
        rec.config_reads += 1;
        if rec.fail_config {
            return Err(ChannelError::ReadFailed("scripted".into()));
        }
        Ok(rec.config)
    }

    fn read_debug(&mut self) -> Result<DebugSnapshot, ChannelError> {
        let mut rec = self.inner.lock();
        rec.debug_reads += 1;
        Ok(rec.debug)
    }

    fn read_error(&mut self) -> Result<Option<String>, ChannelError> {
        let mut rec = self.inner.lock();
        rec.error_reads += 1;
        if rec.fail_error_read {
            return Err(ChannelError::ReadFailed("scripted".into()));
        }
        Ok(rec.errors.pop_front())
    }
}

/// Machine config with three joints.
pub const THREE_JOINTS: &str = r#"
[TRAJ]
JOINTS = 3
MAX_VELOCITY = 100.0
MAX_ACCELERATION = 500.0

[JOINT_0]
MAX_VELOCITY = 20.0

[JOINT_1]
MAX_VELOCITY = 20.0

[JOINT_2]
MAX_VELOCITY = 10.0
"#;

/// Build a bridge over a fresh recording channel.
pub fn bridge_with(toml: &str) -> (MotionBridge<RecordingChannel>, RecordingChannel) {
    let channel = RecordingChannel::new();
    let source = TomlSource::from_toml_str(toml).expect("test config should parse");
    (MotionBridge::new(channel.clone(), Arc::new(source)), channel)
}

/// Bridge with the trajectory and every joint initialized and the command
/// log cleared.
pub fn ready_bridge() -> (MotionBridge<RecordingChannel>, RecordingChannel) {
    let (mut bridge, channel) = bridge_with(THREE_JOINTS);
    bridge.motion_init().expect("motion init should succeed");
    channel.clear_commands();
    (bridge, channel)
}
