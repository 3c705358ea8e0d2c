use std::path::PathBuf;
use std::time::Duration;

/// Errors that can occur while owning a worker process.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// The worker executable could not be found or started.
    #[error("failed to spawn worker {program}: {source}")]
    Spawn {
        program: PathBuf,
        source: std::io::Error,
    },

    /// An I/O error occurred on one of the worker's pipes.
    #[error("worker I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The worker did not exit within the termination window.
    #[error("worker did not exit within {timeout:?} after the quit command")]
    Termination { timeout: Duration },
}

pub type Result<T> = std::result::Result<T, ProcessError>;
