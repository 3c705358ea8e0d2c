use std::fmt;
use std::io;

use workerpump_dispatch::DispatchError;
use workerpump_process::ProcessError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const SPAWN_FAILED: i32 = 3;
pub const WORKER_FAILED: i32 = 4;
pub const PERMISSION_DENIED: i32 = 50;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn process_error(context: &str, err: ProcessError) -> CliError {
    let code = match &err {
        ProcessError::Spawn { source, .. } if source.kind() == io::ErrorKind::PermissionDenied => {
            PERMISSION_DENIED
        }
        ProcessError::Spawn { .. } => SPAWN_FAILED,
        ProcessError::Io(_) => FAILURE,
        ProcessError::Termination { .. } => TIMEOUT,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn dispatch_error(context: &str, err: DispatchError) -> CliError {
    match err {
        DispatchError::Process(err) => process_error(context, err),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use super::*;

    #[test]
    fn spawn_failure_maps_to_spawn_code() {
        let err = DispatchError::Process(ProcessError::Spawn {
            program: PathBuf::from("./worker"),
            source: io::Error::from(io::ErrorKind::NotFound),
        });
        let cli = dispatch_error("spawn failed", err);
        assert_eq!(cli.code, SPAWN_FAILED);
        assert!(cli.message.starts_with("spawn failed: failed to spawn worker ./worker"));
    }

    #[test]
    fn termination_failure_maps_to_timeout() {
        let err = ProcessError::Termination {
            timeout: Duration::from_secs(5),
        };
        assert_eq!(process_error("shutdown failed", err).code, TIMEOUT);
    }

    #[test]
    fn non_executable_worker_maps_to_permission_denied() {
        let err = ProcessError::Spawn {
            program: PathBuf::from("./worker.txt"),
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        };
        assert_eq!(process_error("spawn failed", err).code, PERMISSION_DENIED);
    }

    #[test]
    fn pipe_failure_maps_to_failure() {
        let err = DispatchError::Process(ProcessError::Io(io::Error::other("poll failed")));
        let cli = dispatch_error("pump failed", err);
        assert_eq!(cli.code, FAILURE);
        assert!(cli.message.starts_with("pump failed: "));
    }
}
