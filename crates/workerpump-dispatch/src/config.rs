use std::path::PathBuf;
use std::time::Duration;

use workerpump_process::ProcessConfig;

/// Default upper bound on how long `run_until_exit` sleeps on pipe readiness
/// after a cycle that moved no bytes.
pub const DEFAULT_IDLE_WAIT: Duration = Duration::from_millis(10);

/// Dispatcher configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// How the worker is launched and shut down.
    pub process: ProcessConfig,
    /// Readiness wait between idle cycles of `run_until_exit`.
    ///
    /// `None` polls continuously without waiting. Default: 10ms.
    pub idle_wait: Option<Duration>,
}

impl DispatcherConfig {
    /// Configuration for `program` with all other settings at their defaults.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            process: ProcessConfig::new(program),
            ..Self::default()
        }
    }

    pub fn with_process(mut self, process: ProcessConfig) -> Self {
        self.process = process;
        self
    }

    pub fn with_idle_wait(mut self, idle_wait: Option<Duration>) -> Self {
        self.idle_wait = idle_wait;
        self
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            process: ProcessConfig::default(),
            idle_wait: Some(DEFAULT_IDLE_WAIT),
        }
    }
}
