use workerpump_process::ProcessError;

/// Errors that can occur while driving a worker.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Process-level error (spawn, pipe I/O or termination).
    #[error("process error: {0}")]
    Process(#[from] ProcessError),
}

impl DispatchError {
    /// True when the worker could not be confirmed terminated on shutdown.
    pub fn is_termination(&self) -> bool {
        matches!(self, Self::Process(ProcessError::Termination { .. }))
    }

    /// True when the worker could not be started.
    pub fn is_spawn(&self) -> bool {
        matches!(self, Self::Process(ProcessError::Spawn { .. }))
    }
}

pub type Result<T> = std::result::Result<T, DispatchError>;
