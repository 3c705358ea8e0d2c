//! Newline framing and event classification for worker output.
//!
//! Inbound, the worker writes one frame per line:
//! - three ASCII digits (the event code)
//! - a single space
//! - the rest of the line (the payload, passed through untouched)
//!
//! Anything else becomes an [`UNKNOWN_FRAME`] event carrying the raw line.
//! Outbound, commands are space-joined tokens terminated by a newline.
//!
//! Partial lines stay buffered until their newline arrives.

pub mod command;
pub mod event;
pub mod parser;

pub use command::encode_command;
pub use event::{is_reserved, Event, CHILD_DIED, UNKNOWN_FRAME};
pub use parser::{extract_frames, parse_line, FrameParser, CODE_WIDTH};
