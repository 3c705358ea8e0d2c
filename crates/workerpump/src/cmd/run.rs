use std::cell::Cell;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use workerpump_dispatch::{Dispatcher, DispatcherConfig};
use workerpump_process::ProcessConfig;

use crate::cmd::RunArgs;
use crate::exit::{dispatch_error, CliError, CliResult, SUCCESS, USAGE, WORKER_FAILED};
use crate::output::{print_event, OutputFormat};

pub fn run(args: RunArgs, format: OutputFormat) -> CliResult<i32> {
    let config = build_config(&args)?;
    let idle_wait = config.idle_wait;

    let mut dispatcher =
        Dispatcher::spawn(config).map_err(|err| dispatch_error("spawn failed", err))?;
    let pid = dispatcher.pid();

    // One pump can dispatch several events, so the limit is enforced per event.
    let limit = args.count;
    let printed = Rc::new(Cell::new(0usize));
    let counter = Rc::clone(&printed);
    dispatcher.register_default(move |d: &mut Dispatcher| {
        if limit.is_some_and(|count| counter.get() >= count) {
            return;
        }
        if let Some(event) = d.current_event() {
            print_event(event, pid, format);
            counter.set(counter.get().saturating_add(1));
        }
    });
    let limit_reached = |printed: usize| limit.is_some_and(|count| printed >= count);

    for line in &args.send {
        dispatcher.queue(line);
    }

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    while running.load(Ordering::SeqCst) {
        let alive = dispatcher
            .pump_once()
            .map_err(|err| dispatch_error("pump failed", err))?;
        if !alive {
            if !limit_reached(printed.get()) {
                if let Some(event) = dispatcher.current_event() {
                    print_event(event, pid, format);
                }
            }
            return Ok(exit_code_for(&mut dispatcher));
        }

        if limit_reached(printed.get()) {
            tracing::debug!(printed = printed.get(), "event count reached");
            break;
        }

        if let Some(wait) = idle_wait {
            dispatcher
                .wait_ready(wait)
                .map_err(|err| dispatch_error("wait failed", err))?;
        }
    }

    let status = dispatcher
        .shutdown()
        .map_err(|err| dispatch_error("shutdown failed", err))?;
    tracing::info!(%status, "worker shut down");
    Ok(SUCCESS)
}

fn build_config(args: &RunArgs) -> CliResult<DispatcherConfig> {
    let terminate_timeout = parse_duration(&args.terminate_timeout)?;
    let idle_wait = if args.busy_poll {
        None
    } else {
        Some(parse_duration(&args.idle_wait)?)
    };

    let process = ProcessConfig::new(&args.executable)
        .with_args(&args.args)
        .with_quit_command(args.quit_command.clone())
        .with_terminate_timeout(terminate_timeout);

    Ok(DispatcherConfig::default()
        .with_process(process)
        .with_idle_wait(idle_wait))
}

fn exit_code_for(dispatcher: &mut Dispatcher) -> i32 {
    match dispatcher.exit_status() {
        Some(status) if !status.success() => WORKER_FAILED,
        _ => SUCCESS,
    }
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}

fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else if let Some(num) = input.strip_suffix('m') {
        (num, "m")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value.saturating_mul(60))),
        _ => Err(CliError::new(
            USAGE,
            format!("unsupported duration unit: {unit}"),
        )),
    }
}
