use std::collections::VecDeque;
use std::fmt::Display;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use tracing::{debug, info, trace, warn};
use workerpump_frame::{encode_command, Event, FrameParser};
use workerpump_process::{ProcessChannel, PumpStats};

use crate::config::DispatcherConfig;
use crate::error::Result;
use crate::table::{HandlerKey, HandlerTable};

type StderrHook = Box<dyn FnMut(&str)>;

/// Drives a worker process and routes its events to registered handlers.
///
/// Handlers receive the dispatcher itself, so they can read the current event
/// and queue further commands. A handler may also pump: that moves bytes, but
/// the events it parses are queued behind the ones already read and are
/// dispatched, in order, after the running handler returns.
pub struct Dispatcher {
    channel: ProcessChannel,
    handlers: HandlerTable<Dispatcher>,
    stderr_hook: Option<StderrHook>,
    parser: FrameParser,
    pending: VecDeque<Event>,
    dispatching: bool,
    current: Option<Event>,
    events_dispatched: u64,
    config: DispatcherConfig,
}

impl Dispatcher {
    /// Spawn `program` with default settings.
    pub fn new(program: impl Into<PathBuf>) -> Result<Self> {
        Self::spawn(DispatcherConfig::new(program))
    }

    /// Spawn the configured worker.
    pub fn spawn(config: DispatcherConfig) -> Result<Self> {
        let channel = ProcessChannel::spawn(config.process.clone())?;
        Ok(Self {
            channel,
            handlers: HandlerTable::new(),
            stderr_hook: None,
            parser: FrameParser::new(),
            pending: VecDeque::new(),
            dispatching: false,
            current: None,
            events_dispatched: 0,
            config,
        })
    }

    /// Register a handler for one event code, replacing any previous one.
    pub fn register<F>(&mut self, code: u16, handler: F)
    where
        F: FnMut(&mut Dispatcher) + 'static,
    {
        self.handlers.register(HandlerKey::Code(code), handler);
    }

    /// Register the fallback handler for codes without their own handler.
    pub fn register_default<F>(&mut self, handler: F)
    where
        F: FnMut(&mut Dispatcher) + 'static,
    {
        self.handlers.register(HandlerKey::Default, handler);
    }

    /// Remove the handler for `code`. Returns whether one was registered.
    pub fn unregister(&mut self, code: u16) -> bool {
        self.handlers.unregister(HandlerKey::Code(code)).is_some()
    }

    /// Remove the default handler. Returns whether one was registered.
    pub fn unregister_default(&mut self) -> bool {
        self.handlers.unregister(HandlerKey::Default).is_some()
    }

    /// Receive worker stderr text after it has been logged.
    pub fn on_stderr<F>(&mut self, hook: F)
    where
        F: FnMut(&str) + 'static,
    {
        self.stderr_hook = Some(Box::new(hook));
    }

    /// Queue `command` followed by its space-separated parameters.
    ///
    /// Only buffers; the line reaches the worker on a later pump.
    pub fn queue_command<I, P>(&mut self, command: &str, params: I)
    where
        I: IntoIterator<Item = P>,
        P: Display,
    {
        encode_command(command, params, self.channel.input_mut());
        trace!(command, pending = self.channel.input_pending(), "queued command");
    }

    /// Queue a command without parameters.
    pub fn queue(&mut self, command: &str) {
        self.queue_command(command, std::iter::empty::<&str>());
    }

    /// Run one non-blocking cycle: write, read, parse and dispatch.
    ///
    /// Returns `Ok(false)` once the worker is gone; the current event is then
    /// the reserved child-died event.
    pub fn pump_once(&mut self) -> Result<bool> {
        Ok(self.cycle()?.is_some())
    }

    /// Pump until the worker exits.
    ///
    /// After a cycle that moved no bytes this waits for pipe readiness for at
    /// most the configured idle wait; with no idle wait it polls continuously.
    /// Called from a handler, events read meanwhile are held until that
    /// handler returns.
    pub fn run_until_exit(&mut self) -> Result<()> {
        while let Some(stats) = self.cycle()? {
            if !stats.is_idle() {
                continue;
            }
            if let Some(idle_wait) = self.config.idle_wait {
                self.channel.wait_ready(idle_wait)?;
            }
        }
        Ok(())
    }

    /// Block until the worker's pipes have something to move or `timeout` elapses.
    pub fn wait_ready(&self, timeout: Duration) -> Result<bool> {
        Ok(self.channel.wait_ready(timeout)?)
    }

    /// Send the quit command and wait for the worker to exit.
    ///
    /// Commands still queued are written before the quit command. Fails with
    /// a termination error if the worker outlives the configured window.
    pub fn shutdown(&mut self) -> Result<ExitStatus> {
        Ok(self.channel.terminate()?)
    }

    /// The event being dispatched, or the last one dispatched.
    ///
    /// Only meaningful inside a handler for the event that invoked it; later
    /// pumps overwrite it.
    pub fn current_event(&self) -> Option<&Event> {
        self.current.as_ref()
    }

    pub fn current_event_code(&self) -> Option<u16> {
        self.current.as_ref().map(|event| event.code)
    }

    pub fn current_event_payload(&self) -> Option<&str> {
        self.current.as_ref().map(|event| event.payload.as_str())
    }

    /// Number of events that reached a handler.
    pub fn events_dispatched(&self) -> u64 {
        self.events_dispatched
    }

    pub fn pid(&self) -> u32 {
        self.channel.pid()
    }

    pub fn exit_status(&mut self) -> Option<ExitStatus> {
        self.channel.exit_status()
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub fn channel(&self) -> &ProcessChannel {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut ProcessChannel {
        &mut self.channel
    }

    /// Returns `None` once the worker is gone.
    fn cycle(&mut self) -> Result<Option<PumpStats>> {
        // An exited worker has its remaining output drained by the liveness check.
        let alive = self.channel.is_alive();
        let stats = if alive {
            self.channel.pump_nonblocking()?
        } else {
            PumpStats::default()
        };

        let stderr = self.channel.take_stderr();
        if !stderr.is_empty() {
            let text = String::from_utf8_lossy(&stderr);
            warn!(target: "workerpump::stderr", pid = self.channel.pid(), "{}", text.trim_end());
            if let Some(hook) = self.stderr_hook.as_mut() {
                hook(&text);
            }
        }

        let output = self.channel.output_mut().split();
        if !output.is_empty() {
            self.pending.extend(self.parser.feed(&output));
        }
        if !self.dispatching {
            self.dispatching = true;
            while let Some(event) = self.pending.pop_front() {
                self.dispatch(event);
            }
            self.dispatching = false;
        } else if !self.pending.is_empty() {
            trace!(
                deferred = self.pending.len(),
                "holding events until the running handler returns"
            );
        }

        if !alive {
            if !self.current.as_ref().is_some_and(Event::is_child_died) {
                info!(status = ?self.channel.exit_status(), "worker exited");
            }
            self.current = Some(Event::child_died());
            return Ok(None);
        }
        Ok(Some(stats))
    }

    fn dispatch(&mut self, event: Event) {
        let code = event.code;
        self.current = Some(event);

        let Some(key) = self.handlers.resolve(code) else {
            debug!(code, "no handler for event");
            return;
        };
        let Some(mut handler) = self.handlers.take(key) else {
            return;
        };
        trace!(code, %key, "dispatching event");
        handler(self);
        self.handlers.restore(key, handler);
        self.events_dispatched += 1;
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("channel", &self.channel)
            .field("handlers", &self.handlers)
            .field("pending", &self.pending.len())
            .field("current", &self.current)
            .field("events_dispatched", &self.events_dispatched)
            .finish()
    }
}
