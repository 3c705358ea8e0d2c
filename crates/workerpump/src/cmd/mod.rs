use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod run;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Spawn a worker, send commands and print its events until it exits.
    Run(RunArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Run(args) => run::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Worker executable.
    #[arg(
        long = "exec",
        value_name = "PATH",
        env = "WORKERPUMP_EXECUTABLE",
        default_value = "./worker"
    )]
    pub executable: PathBuf,
    /// Argument passed to the worker (repeatable).
    #[arg(long = "arg", value_name = "ARG", allow_hyphen_values = true)]
    pub args: Vec<String>,
    /// Command line to queue before pumping (repeatable, sent in order).
    #[arg(long, short = 's', value_name = "LINE")]
    pub send: Vec<String>,
    /// Shut the worker down after printing N events.
    #[arg(long)]
    pub count: Option<usize>,
    /// Command sent to ask the worker to exit.
    #[arg(long, env = "WORKERPUMP_QUIT_COMMAND", default_value = "quit")]
    pub quit_command: String,
    /// How long to wait for the worker to exit after the quit command (e.g. 5s, 500ms).
    #[arg(long, env = "WORKERPUMP_TERMINATE_TIMEOUT", default_value = "5s")]
    pub terminate_timeout: String,
    /// Longest wait for pipe activity between idle pump cycles (e.g. 10ms).
    #[arg(
        long,
        env = "WORKERPUMP_IDLE_WAIT",
        default_value = "10ms",
        conflicts_with = "busy_poll"
    )]
    pub idle_wait: String,
    /// Pump continuously instead of waiting for pipe activity.
    #[arg(long)]
    pub busy_poll: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
