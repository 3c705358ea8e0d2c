use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

/// Worker executable used when none is configured.
pub const DEFAULT_PROGRAM: &str = "./worker";

/// Command line sent to the worker to ask it to exit.
pub const DEFAULT_QUIT_COMMAND: &str = "quit";

/// How long `terminate` waits for the worker to exit.
pub const DEFAULT_TERMINATE_TIMEOUT: Duration = Duration::from_secs(5);

/// How the worker process is launched and shut down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessConfig {
    /// Path to the worker executable. Default: `./worker`.
    pub program: PathBuf,
    /// Extra arguments passed to the worker.
    pub args: Vec<OsString>,
    /// Line written to the worker's stdin on shutdown. Default: `quit`.
    pub quit_command: String,
    /// Upper bound on the wait for exit after the quit command. Default: 5s.
    pub terminate_timeout: Duration,
}

impl ProcessConfig {
    /// Configuration for `program` with all other settings at their defaults.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_quit_command(mut self, quit_command: impl Into<String>) -> Self {
        self.quit_command = quit_command.into();
        self
    }

    pub fn with_terminate_timeout(mut self, timeout: Duration) -> Self {
        self.terminate_timeout = timeout;
        self
    }
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from(DEFAULT_PROGRAM),
            args: Vec::new(),
            quit_command: DEFAULT_QUIT_COMMAND.to_string(),
            terminate_timeout: DEFAULT_TERMINATE_TIMEOUT,
        }
    }
}
