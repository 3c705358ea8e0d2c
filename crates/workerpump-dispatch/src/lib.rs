//! Event-code handler routing for a line-oriented worker process.
//!
//! This is the layer applications use. Spawn a worker, register callbacks
//! per event code (plus an optional default), queue commands and pump.

pub mod config;
pub mod error;
pub mod table;

#[cfg(unix)]
pub mod dispatcher;

pub use config::{DispatcherConfig, DEFAULT_IDLE_WAIT};
pub use error::{DispatchError, Result};
pub use table::{Handler, HandlerKey, HandlerTable};

#[cfg(unix)]
pub use dispatcher::Dispatcher;
