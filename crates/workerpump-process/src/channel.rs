use std::io::{ErrorKind, Read, Write};
use std::os::fd::AsRawFd;
use std::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use bytes::{Buf, BytesMut};
use tracing::{debug, info, warn};

use crate::config::ProcessConfig;
use crate::error::{ProcessError, Result};
use crate::sys;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;
const TERMINATE_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Byte counts moved by a single pump.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpStats {
    /// Bytes written to the worker's stdin.
    pub written: usize,
    /// Bytes read from the worker's stdout.
    pub read: usize,
    /// Bytes read from the worker's stderr.
    pub stderr_read: usize,
}

impl PumpStats {
    /// True when the pump moved no bytes in either direction.
    pub fn is_idle(&self) -> bool {
        self.written == 0 && self.read == 0 && self.stderr_read == 0
    }
}

/// Owns a spawned worker process and the buffers for its three pipes.
///
/// All parent-side pipe ends are non-blocking, so [`pump_nonblocking`]
/// returns as soon as nothing more can be moved.
///
/// [`pump_nonblocking`]: ProcessChannel::pump_nonblocking
pub struct ProcessChannel {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: ChildStdout,
    stderr: ChildStderr,
    input: BytesMut,
    output: BytesMut,
    errors: BytesMut,
    stdout_eof: bool,
    stderr_eof: bool,
    exit_status: Option<ExitStatus>,
    config: ProcessConfig,
}

impl ProcessChannel {
    /// Spawn the configured worker with stdin, stdout and stderr piped.
    pub fn spawn(config: ProcessConfig) -> Result<Self> {
        let mut child = Command::new(&config.program)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                program: config.program.clone(),
                source,
            })?;

        let pipes = (child.stdin.take(), child.stdout.take(), child.stderr.take());
        let (stdin, stdout, stderr) = match pipes {
            (Some(stdin), Some(stdout), Some(stderr)) => (stdin, stdout, stderr),
            _ => {
                abandon(&mut child);
                return Err(ProcessError::Io(std::io::Error::other(
                    "worker stdio pipes were not captured",
                )));
            }
        };

        let nonblocking = sys::set_nonblocking(stdin.as_raw_fd())
            .and_then(|()| sys::set_nonblocking(stdout.as_raw_fd()))
            .and_then(|()| sys::set_nonblocking(stderr.as_raw_fd()));
        if let Err(err) = nonblocking {
            abandon(&mut child);
            return Err(ProcessError::Io(err));
        }

        info!(program = ?config.program, pid = child.id(), "spawned worker");

        Ok(Self {
            child,
            stdin: Some(stdin),
            stdout,
            stderr,
            input: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            output: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            errors: BytesMut::new(),
            stdout_eof: false,
            stderr_eof: false,
            exit_status: None,
            config,
        })
    }

    /// Whether the worker process is still running.
    ///
    /// Never waits. When the exit is first observed, everything already
    /// sitting in the stdout and stderr pipes is drained into the buffers, so
    /// output written just before exiting stays available. Descendants that
    /// inherited stdout do not keep the worker alive.
    pub fn is_alive(&mut self) -> bool {
        if self.exit_status.is_some() {
            return false;
        }
        match self.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                self.record_exit(status);
                false
            }
            Err(err) => {
                warn!(error = %err, "failed to query worker status");
                false
            }
        }
    }

    /// Move as many bytes as possible without blocking.
    ///
    /// Drains the input buffer into the worker's stdin until the pipe is full,
    /// then appends whatever is currently readable on stdout and stderr to the
    /// output and error buffers.
    pub fn pump_nonblocking(&mut self) -> Result<PumpStats> {
        let mut stats = PumpStats {
            written: self.write_pending()?,
            ..PumpStats::default()
        };

        if !self.stdout_eof {
            stats.read = read_available(&mut self.stdout, &mut self.output, &mut self.stdout_eof)?;
        }
        if !self.stderr_eof {
            stats.stderr_read =
                read_available(&mut self.stderr, &mut self.errors, &mut self.stderr_eof)?;
        }

        if !stats.is_idle() {
            debug!(
                written = stats.written,
                read = stats.read,
                stderr_read = stats.stderr_read,
                "pumped worker pipes"
            );
        }
        Ok(stats)
    }

    /// Block until a pipe has something to move or `timeout` elapses.
    ///
    /// Returns `Ok(true)` when at least one pipe is ready. With no open pipe
    /// left to watch nothing can become ready, so this sleeps for `timeout`
    /// and returns `Ok(false)`.
    pub fn wait_ready(&self, timeout: Duration) -> Result<bool> {
        let mut fds = Vec::with_capacity(3);
        if !self.stdout_eof {
            fds.push(sys::pollfd(self.stdout.as_raw_fd(), libc::POLLIN));
        }
        if !self.stderr_eof {
            fds.push(sys::pollfd(self.stderr.as_raw_fd(), libc::POLLIN));
        }
        if let Some(stdin) = &self.stdin {
            if !self.input.is_empty() {
                fds.push(sys::pollfd(stdin.as_raw_fd(), libc::POLLOUT));
            }
        }
        if fds.is_empty() {
            std::thread::sleep(timeout);
            return Ok(false);
        }
        Ok(sys::poll(&mut fds, timeout)?)
    }

    /// Ask the worker to exit and wait for it within the configured window.
    ///
    /// Sends the quit command, closes the worker's stdin and polls for exit.
    /// The worker is never killed here; if it is still running when the
    /// window closes this returns [`ProcessError::Termination`].
    pub fn terminate(&mut self) -> Result<ExitStatus> {
        if let Some(status) = self.exit_status {
            return Ok(status);
        }

        let timeout = self.config.terminate_timeout;
        let deadline = Instant::now() + timeout;

        let quit = format!("{}\n", self.config.quit_command);
        self.queue_input(quit.as_bytes());
        debug!(command = %self.config.quit_command, "sending quit command");

        while self.stdin.is_some() && !self.input.is_empty() {
            self.pump_nonblocking()?;
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            if !self.input.is_empty() {
                self.wait_ready(remaining.min(TERMINATE_POLL_INTERVAL))?;
            }
        }
        self.stdin = None;

        loop {
            if let Some(status) = self.child.try_wait()? {
                self.record_exit(status);
                info!(%status, "worker terminated");
                return Ok(status);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn!(?timeout, pid = self.child.id(), "worker did not exit");
                return Err(ProcessError::Termination { timeout });
            }
            // Keep draining so a chatty worker cannot stall on a full pipe.
            self.pump_nonblocking()?;
            std::thread::sleep(remaining.min(TERMINATE_POLL_INTERVAL));
        }
    }

    /// Append raw bytes to the stdin buffer. Nothing is written until the next pump.
    pub fn queue_input(&mut self, bytes: &[u8]) {
        self.input.extend_from_slice(bytes);
    }

    /// Mutable access to the stdin buffer, for encoders that write in place.
    pub fn input_mut(&mut self) -> &mut BytesMut {
        &mut self.input
    }

    /// Bytes queued for stdin and not yet written.
    pub fn input_pending(&self) -> usize {
        self.input.len()
    }

    /// Bytes read from stdout that have not been consumed yet.
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    /// Mutable access to the stdout buffer; consumers split complete frames off the front.
    pub fn output_mut(&mut self) -> &mut BytesMut {
        &mut self.output
    }

    /// Take everything read from stderr so far, leaving the buffer empty.
    pub fn take_stderr(&mut self) -> BytesMut {
        self.errors.split()
    }

    /// OS process id of the worker.
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Exit status of the worker, or `None` while it is still running.
    pub fn exit_status(&mut self) -> Option<ExitStatus> {
        self.reap();
        self.exit_status
    }

    /// The configuration this channel was spawned with.
    pub fn config(&self) -> &ProcessConfig {
        &self.config
    }

    fn write_pending(&mut self) -> Result<usize> {
        if self.input.is_empty() {
            return Ok(0);
        }
        let Some(stdin) = self.stdin.as_mut() else {
            warn!(bytes = self.input.len(), "worker stdin closed; discarding queued input");
            self.input.clear();
            return Ok(0);
        };

        let mut written = 0usize;
        while !self.input.is_empty() {
            match stdin.write(&self.input) {
                Ok(0) => break,
                Ok(n) => {
                    self.input.advance(n);
                    written += n;
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => break,
                Err(err) if err.kind() == ErrorKind::BrokenPipe => {
                    warn!(
                        bytes = self.input.len(),
                        "worker closed its stdin; discarding queued input"
                    );
                    self.input.clear();
                    self.stdin = None;
                    break;
                }
                Err(err) => return Err(ProcessError::Io(err)),
            }
        }
        Ok(written)
    }

    fn reap(&mut self) {
        if self.exit_status.is_some() {
            return;
        }
        match self.child.try_wait() {
            Ok(Some(status)) => self.record_exit(status),
            Ok(None) => {}
            Err(err) => warn!(error = %err, "failed to reap worker"),
        }
    }

    fn record_exit(&mut self, status: ExitStatus) {
        if self.exit_status.is_none() {
            debug!(%status, pid = self.child.id(), "worker exited");
            self.exit_status = Some(status);
            self.drain_exited();
        }
    }

    // The worker is gone, so whatever it wrote is already in the pipes.
    // Read it without waiting for EOF, which a descendant may hold off.
    fn drain_exited(&mut self) {
        let drained = read_available(&mut self.stdout, &mut self.output, &mut self.stdout_eof)
            .and_then(|read| {
                read_available(&mut self.stderr, &mut self.errors, &mut self.stderr_eof)
                    .map(|stderr_read| (read, stderr_read))
            });
        match drained {
            Ok((read, stderr_read)) if read + stderr_read > 0 => {
                debug!(read, stderr_read, "drained output of exited worker");
            }
            Ok(_) => {}
            Err(err) => warn!(error = %err, "failed to drain exited worker"),
        }
    }
}

impl Drop for ProcessChannel {
    fn drop(&mut self) {
        if self.exit_status.is_some() {
            return;
        }
        if let Ok(None) = self.child.try_wait() {
            debug!(pid = self.child.id(), "killing worker still running at drop");
            abandon(&mut self.child);
        }
    }
}

impl std::fmt::Debug for ProcessChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessChannel")
            .field("program", &self.config.program)
            .field("pid", &self.child.id())
            .field("input_pending", &self.input.len())
            .field("output_buffered", &self.output.len())
            .field("stdout_eof", &self.stdout_eof)
            .field("exit_status", &self.exit_status)
            .finish()
    }
}

fn read_available<R: Read>(src: &mut R, dst: &mut BytesMut, eof: &mut bool) -> Result<usize> {
    let mut total = 0usize;
    let mut chunk = [0u8; READ_CHUNK_SIZE];
    loop {
        match src.read(&mut chunk) {
            Ok(0) => {
                *eof = true;
                return Ok(total);
            }
            Ok(n) => {
                dst.extend_from_slice(&chunk[..n]);
                total += n;
            }
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if err.kind() == ErrorKind::WouldBlock => return Ok(total),
            Err(err) => return Err(ProcessError::Io(err)),
        }
    }
}

fn abandon(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn sh(script: &str) -> ProcessConfig {
        ProcessConfig::new("/bin/sh").with_args(["-c", script])
    }

    fn pump_until(
        channel: &mut ProcessChannel,
        timeout: Duration,
        mut done: impl FnMut(&ProcessChannel) -> bool,
    ) {
        let deadline = Instant::now() + timeout;
        loop {
            channel.pump_nonblocking().unwrap();
            if done(channel) {
                return;
            }
            assert!(Instant::now() < deadline, "condition not met before timeout");
            channel.wait_ready(Duration::from_millis(20)).unwrap();
        }
    }

    #[test]
    fn spawn_missing_executable_fails() {
        let err = ProcessChannel::spawn(ProcessConfig::new("/nonexistent/workerpump-worker"))
            .unwrap_err();
        match err {
            ProcessError::Spawn { program, source } => {
                assert_eq!(program, PathBuf::from("/nonexistent/workerpump-worker"));
                assert_eq!(source.kind(), ErrorKind::NotFound);
            }
            other => panic!("expected spawn error, got {other:?}"),
        }
    }

    #[test]
    fn echoes_queued_input() {
        let mut channel = ProcessChannel::spawn(ProcessConfig::new("/bin/cat")).unwrap();
        channel.queue_input(b"200 hello\n");
        assert_eq!(channel.input_pending(), 10);

        pump_until(&mut channel, Duration::from_secs(5), |c| {
            c.output() == b"200 hello\n"
        });
        assert_eq!(channel.input_pending(), 0);
        assert!(channel.is_alive());
    }

    #[test]
    fn pump_returns_promptly_when_idle() {
        let mut channel = ProcessChannel::spawn(ProcessConfig::new("/bin/cat")).unwrap();

        let start = Instant::now();
        let stats = channel.pump_nonblocking().unwrap();
        assert!(stats.is_idle());
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn wait_ready_times_out_on_idle_worker() {
        let channel = ProcessChannel::spawn(ProcessConfig::new("/bin/cat")).unwrap();
        let ready = channel.wait_ready(Duration::from_millis(20)).unwrap();
        assert!(!ready);
    }

    #[test]
    fn stderr_is_collected_separately() {
        let mut channel = ProcessChannel::spawn(sh("echo oops >&2; cat")).unwrap();

        let mut collected = Vec::new();
        let deadline = Instant::now() + Duration::from_secs(5);
        while collected != b"oops\n" {
            assert!(Instant::now() < deadline, "stderr never arrived");
            channel.pump_nonblocking().unwrap();
            collected.extend_from_slice(&channel.take_stderr());
            channel.wait_ready(Duration::from_millis(20)).unwrap();
        }

        assert!(channel.output().is_empty());
        assert!(channel.take_stderr().is_empty());
    }

    #[test]
    fn output_written_before_exit_is_drained() {
        let mut channel = ProcessChannel::spawn(sh("printf '200 bye\\n'")).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while channel.is_alive() {
            assert!(Instant::now() < deadline, "worker never reported dead");
            channel.pump_nonblocking().unwrap();
            channel.wait_ready(Duration::from_millis(20)).unwrap();
        }

        assert_eq!(channel.output(), b"200 bye\n");
        assert!(channel.exit_status().is_some_and(|s| s.success()));
        assert!(!channel.is_alive());
    }

    #[test]
    fn descendant_holding_stdout_does_not_keep_worker_alive() {
        let mut channel =
            ProcessChannel::spawn(sh("sleep 3 & printf '200 bye\\n'; exit 0")).unwrap();

        let start = Instant::now();
        while channel.is_alive() {
            assert!(
                start.elapsed() < Duration::from_secs(2),
                "exit hidden behind the descendant's open stdout"
            );
            channel.pump_nonblocking().unwrap();
            channel.wait_ready(Duration::from_millis(20)).unwrap();
        }

        assert_eq!(channel.output(), b"200 bye\n");
        assert!(channel.exit_status().is_some_and(|s| s.success()));
    }

    #[test]
    fn wait_ready_sleeps_when_no_pipe_is_open() {
        let mut channel = ProcessChannel::spawn(ProcessConfig::new("/bin/true")).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while channel.is_alive() {
            assert!(Instant::now() < deadline, "worker never reported dead");
            channel.pump_nonblocking().unwrap();
            channel.wait_ready(Duration::from_millis(20)).unwrap();
        }
        let ready = channel.wait_ready(Duration::from_millis(20)).unwrap();
        assert!(!ready);
    }

    #[test]
    fn input_for_exited_worker_is_discarded() {
        let mut channel = ProcessChannel::spawn(ProcessConfig::new("/bin/true")).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while channel.is_alive() {
            assert!(Instant::now() < deadline, "worker never reported dead");
            channel.pump_nonblocking().unwrap();
            channel.wait_ready(Duration::from_millis(20)).unwrap();
        }

        channel.queue_input(b"status\n");
        channel.pump_nonblocking().unwrap();
        assert_eq!(channel.input_pending(), 0);
    }

    #[test]
    fn terminate_sends_quit_and_reaps() {
        let script = "while read line; do [ \"$line\" = quit ] && exit 0; done; exit 3";
        let mut channel = ProcessChannel::spawn(sh(script)).unwrap();

        let status = channel.terminate().unwrap();
        assert!(status.success());
        assert_eq!(channel.exit_status(), Some(status));
    }

    #[test]
    fn terminate_uses_configured_quit_command() {
        let script = "while read line; do [ \"$line\" = bye ] && exit 0; done; exit 3";
        let mut channel =
            ProcessChannel::spawn(sh(script).with_quit_command("bye")).unwrap();

        let status = channel.terminate().unwrap();
        assert!(status.success());
    }

    #[test]
    fn terminate_fails_when_worker_ignores_quit() {
        let config = sh("exec sleep 30").with_terminate_timeout(Duration::from_millis(100));
        let mut channel = ProcessChannel::spawn(config).unwrap();

        let err = channel.terminate().unwrap_err();
        assert!(matches!(
            err,
            ProcessError::Termination { timeout } if timeout == Duration::from_millis(100)
        ));
        assert!(channel.exit_status().is_none());
    }

    #[test]
    fn terminate_after_exit_returns_recorded_status() {
        let mut channel = ProcessChannel::spawn(sh("exit 7")).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while channel.is_alive() {
            assert!(Instant::now() < deadline, "worker never reported dead");
            channel.pump_nonblocking().unwrap();
            channel.wait_ready(Duration::from_millis(20)).unwrap();
        }

        let status = channel.terminate().unwrap();
        assert_eq!(status.code(), Some(7));
    }

    #[test]
    fn large_input_is_written_across_pumps() {
        let mut channel = ProcessChannel::spawn(ProcessConfig::new("/bin/cat")).unwrap();
        let line = format!("200 {}\n", "x".repeat(255));
        for _ in 0..1024 {
            channel.queue_input(line.as_bytes());
        }
        let expected = line.len() * 1024;

        let mut received = 0usize;
        let deadline = Instant::now() + Duration::from_secs(10);
        while received < expected {
            assert!(Instant::now() < deadline, "echo never completed");
            channel.pump_nonblocking().unwrap();
            received += channel.output_mut().split().len();
            channel.wait_ready(Duration::from_millis(20)).unwrap();
        }
        assert_eq!(received, expected);
        assert_eq!(channel.input_pending(), 0);
    }
}
