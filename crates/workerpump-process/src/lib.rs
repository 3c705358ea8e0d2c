//! Worker subprocess ownership and raw byte transport.
//!
//! This is the lowest layer of workerpump. A [`ProcessChannel`] spawns the
//! worker with all three standard streams piped, switches the parent ends to
//! non-blocking mode and moves bytes between them and three buffers:
//! - input queued for the worker's stdin
//! - output read from the worker's stdout
//! - diagnostics read from the worker's stderr
//!
//! A pump never blocks. Callers that want to wait for activity use
//! [`ProcessChannel::wait_ready`] with an explicit timeout.

pub mod config;
pub mod error;

#[cfg(unix)]
pub mod channel;
#[cfg(unix)]
mod sys;

pub use config::{ProcessConfig, DEFAULT_PROGRAM, DEFAULT_QUIT_COMMAND, DEFAULT_TERMINATE_TIMEOUT};
pub use error::{ProcessError, Result};

#[cfg(unix)]
pub use channel::{ProcessChannel, PumpStats};
