//! Drive a long-lived, line-oriented worker process from a single thread.
//!
//! workerpump spawns a worker with piped stdio, pumps bytes without blocking,
//! splits stdout into newline-terminated frames of the form `DDD payload` and
//! calls the handler registered for each event code.
//!
//! # Crate Structure
//!
//! - [`process`]: Worker ownership and non-blocking pipe transport
//! - [`frame`]: Line framing, event classification and command encoding
//! - [`dispatch`]: Handler table and the pump/dispatch loop
//!
//! # Example
//!
//! ```no_run
//! use workerpump::dispatch::Dispatcher;
//!
//! # fn main() -> workerpump::dispatch::Result<()> {
//! let mut dispatcher = Dispatcher::new("./worker")?;
//! dispatcher.register(200, |d: &mut Dispatcher| {
//!     println!("ok: {}", d.current_event_payload().unwrap_or_default());
//!     d.queue("status");
//! });
//! dispatcher.register_default(|d: &mut Dispatcher| {
//!     eprintln!("unhandled: {:?}", d.current_event());
//! });
//!
//! dispatcher.queue_command("login", ["alice", "secret"]);
//! dispatcher.run_until_exit()?;
//! # Ok(())
//! # }
//! ```

/// Re-export process types.
pub mod process {
    pub use workerpump_process::*;
}

/// Re-export frame types.
pub mod frame {
    pub use workerpump_frame::*;
}

/// Re-export dispatch types.
pub mod dispatch {
    pub use workerpump_dispatch::*;
}
