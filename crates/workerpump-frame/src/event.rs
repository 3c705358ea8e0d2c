use std::fmt;

/// Engine-internal code for a line that does not start with a 3-digit code.
pub const UNKNOWN_FRAME: u16 = 3000;

/// Engine-internal code reported once the worker process is gone.
pub const CHILD_DIED: u16 = 3001;

/// Whether `code` is one of the engine-internal codes a worker never sends.
pub fn is_reserved(code: u16) -> bool {
    matches!(code, UNKNOWN_FRAME | CHILD_DIED)
}

/// One parsed unit of worker output.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Event {
    /// The event code: three digits from the worker, or a reserved code.
    pub code: u16,
    /// Everything after the code and its separating space.
    pub payload: String,
}

impl Event {
    /// Create a new event.
    pub fn new(code: u16, payload: impl Into<String>) -> Self {
        Self {
            code,
            payload: payload.into(),
        }
    }

    /// Event for a line that did not match the frame grammar.
    pub fn unknown(raw_line: &str) -> Self {
        Self::new(UNKNOWN_FRAME, format!("unknown response ({raw_line})"))
    }

    /// Terminal event reported when the worker has exited.
    pub fn child_died() -> Self {
        Self::new(CHILD_DIED, "child died prematurely")
    }

    pub fn is_unknown(&self) -> bool {
        self.code == UNKNOWN_FRAME
    }

    pub fn is_child_died(&self) -> bool {
        self.code == CHILD_DIED
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_event_wraps_raw_line() {
        let event = Event::unknown("garbage line");
        assert_eq!(event.code, UNKNOWN_FRAME);
        assert_eq!(event.payload, "unknown response (garbage line)");
        assert!(event.is_unknown());
    }

    #[test]
    fn child_died_event() {
        let event = Event::child_died();
        assert_eq!(event.code, 3001);
        assert_eq!(event.payload, "child died prematurely");
        assert!(event.is_child_died());
    }

    #[test]
    fn reserved_codes() {
        assert!(is_reserved(3000));
        assert!(is_reserved(3001));
        assert!(!is_reserved(200));
        assert!(!is_reserved(999));
    }

    #[test]
    fn display_matches_wire_shape() {
        assert_eq!(Event::new(200, "hello").to_string(), "200 hello");
    }
}
