use clap::ValueEnum;
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Target the dispatcher logs worker stderr under.
pub const WORKER_STDERR_TARGET: &str = "workerpump::stderr";

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// Whether worker stderr is echoed, independent of `--log-level`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum WorkerStderr {
    #[default]
    Show,
    Hide,
}

impl WorkerStderr {
    fn as_filter(self) -> LevelFilter {
        match self {
            WorkerStderr::Show => LevelFilter::WARN,
            WorkerStderr::Hide => LevelFilter::OFF,
        }
    }
}

fn filter(level: LogLevel, worker_stderr: WorkerStderr) -> Targets {
    Targets::new()
        .with_default(level.as_filter())
        .with_target(WORKER_STDERR_TARGET, worker_stderr.as_filter())
}

/// Send logs to stderr; stdout carries only event output.
pub fn init_logging(format: LogFormat, level: LogLevel, worker_stderr: WorkerStderr) {
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(true);
    let registry = tracing_subscriber::registry().with(filter(level, worker_stderr));

    match format {
        LogFormat::Text => {
            let _ = registry.with(layer).try_init();
        }
        LogFormat::Json => {
            let _ = registry.with(layer.json()).try_init();
        }
    }
}
