//! Executor transport contract.
//!
//! The bridge talks to the real-time executor only through this trait. The
//! wire or shared-memory layout behind it belongs to the executor; the bridge
//! depends on the field set of the snapshot types alone.
//!
//! # Lifecycle
//!
//! 1. `configure()` - once, before the first `open()` of a busy interval
//! 2. `open()` - on the first subsystem init
//! 3. `write_command()` / `read_*()` - any number of times while open
//! 4. `close()` - when the last subsystem halts

use taskmot_common::command::MotionCommand;
use taskmot_common::config::ConfigSource;
use taskmot_common::snapshot::{ConfigSnapshot, DebugSnapshot, StatusSnapshot};

use crate::error::ChannelError;

/// Bidirectional channel to the executor.
pub trait MotionChannel: Send {
    /// Load channel-level parameters before opening. Default: nothing to load.
    fn configure(&mut self, _config: &dyn ConfigSource) -> Result<(), ChannelError> {
        Ok(())
    }

    /// Attach to the executor as client `name`.
    fn open(&mut self, name: &str) -> Result<(), ChannelError>;

    /// Detach from the executor.
    fn close(&mut self) -> Result<(), ChannelError>;

    /// Deliver one command. Delivered once this returns `Ok`.
    fn write_command(&mut self, command: &MotionCommand) -> Result<(), ChannelError>;

    /// Latest status snapshot.
    fn read_status(&mut self) -> Result<StatusSnapshot, ChannelError>;

    /// Latest configuration snapshot.
    fn read_config(&mut self) -> Result<ConfigSnapshot, ChannelError>;

    /// Extended debug snapshot.
    fn read_debug(&mut self) -> Result<DebugSnapshot, ChannelError>;

    /// Pending executor error string. `Ok(None)` and `Err(_)` both mean
    /// "no pending error" to the decoder.
    fn read_error(&mut self) -> Result<Option<String>, ChannelError>;
}

impl<C: MotionChannel + ?Sized> MotionChannel for Box<C> {
    fn configure(&mut self, config: &dyn ConfigSource) -> Result<(), ChannelError> {
        (**self).configure(config)
    }

    fn open(&mut self, name: &str) -> Result<(), ChannelError> {
        (**self).open(name)
    }

    fn close(&mut self) -> Result<(), ChannelError> {
        (**self).close()
    }

    fn write_command(&mut self, command: &MotionCommand) -> Result<(), ChannelError> {
        (**self).write_command(command)
    }

    fn read_status(&mut self) -> Result<StatusSnapshot, ChannelError> {
        (**self).read_status()
    }

    fn read_config(&mut self) -> Result<ConfigSnapshot, ChannelError> {
        (**self).read_config()
    }

    fn read_debug(&mut self) -> Result<DebugSnapshot, ChannelError> {
        (**self).read_debug()
    }

    fn read_error(&mut self) -> Result<Option<String>, ChannelError> {
        (**self).read_error()
    }
}
