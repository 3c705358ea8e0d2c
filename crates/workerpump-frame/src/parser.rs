use bytes::{Buf, BytesMut};
use tracing::debug;

use crate::event::Event;

/// Number of ASCII digits in an event code prefix.
pub const CODE_WIDTH: usize = 3;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Classify one complete line (without its terminating newline).
///
/// `DDD payload` yields `Event { code: DDD, payload }`; anything else yields
/// an unknown-frame event carrying the raw line. Invalid UTF-8 is replaced
/// lossily.
pub fn parse_line(line: &[u8]) -> Event {
    let has_prefix = line.len() > CODE_WIDTH
        && line[..CODE_WIDTH].iter().all(u8::is_ascii_digit)
        && line[CODE_WIDTH] == b' ';

    if !has_prefix {
        let raw = String::from_utf8_lossy(line);
        debug!(line = %raw, "unrecognized worker frame");
        return Event::unknown(&raw);
    }

    let code = line[..CODE_WIDTH]
        .iter()
        .fold(0u16, |acc, digit| acc * 10 + u16::from(digit - b'0'));
    let payload = String::from_utf8_lossy(&line[CODE_WIDTH + 1..]).into_owned();
    Event { code, payload }
}

/// Split every complete line off the front of `buf` and classify it.
///
/// On return `buf` holds only the trailing partial line, if any; it is left
/// for the next call once more bytes have been appended.
pub fn extract_frames(buf: &mut BytesMut) -> Vec<Event> {
    let mut scanned = 0;
    extract_after(buf, &mut scanned)
}

// The first `scanned` bytes of `buf` are known to hold no newline.
fn extract_after(buf: &mut BytesMut, scanned: &mut usize) -> Vec<Event> {
    let mut events = Vec::new();
    let mut start = (*scanned).min(buf.len());
    while let Some(offset) = buf[start..].iter().position(|&b| b == b'\n') {
        let line = buf.split_to(start + offset);
        buf.advance(1);
        events.push(parse_line(&line));
        start = 0;
    }
    *scanned = buf.len();
    events
}

/// Stateful line framer that owns its partial-line buffer.
///
/// Remembers how much of the partial line it has already searched, so a long
/// unterminated line costs linear time across feeds.
#[derive(Debug)]
pub struct FrameParser {
    buf: BytesMut,
    scanned: usize,
}

impl FrameParser {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            scanned: 0,
        }
    }

    /// Append freshly read bytes and return the events they complete.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Event> {
        self.buf.extend_from_slice(bytes);
        extract_after(&mut self.buf, &mut self.scanned)
    }

    /// Bytes of the current unterminated line.
    pub fn pending(&self) -> &[u8] {
        &self.buf
    }

    /// Drop any buffered partial line and return it.
    pub fn take_pending(&mut self) -> BytesMut {
        self.scanned = 0;
        self.buf.split()
    }
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::UNKNOWN_FRAME;

    fn split(bytes: &[u8]) -> (Vec<Event>, BytesMut) {
        let mut buf = BytesMut::from(bytes);
        let events = extract_frames(&mut buf);
        (events, buf)
    }

    #[test]
    fn parses_code_and_payload() {
        assert_eq!(parse_line(b"200 hello world"), Event::new(200, "hello world"));
    }

    #[test]
    fn payload_may_be_empty() {
        assert_eq!(parse_line(b"404 "), Event::new(404, ""));
    }

    #[test]
    fn leading_zeros_are_numeric() {
        assert_eq!(parse_line(b"007 bond").code, 7);
    }

    #[test]
    fn only_first_space_separates() {
        assert_eq!(parse_line(b"301  two  spaces").payload, " two  spaces");
    }

    #[test]
    fn garbage_line_is_unknown() {
        let event = parse_line(b"garbage line");
        assert_eq!(event.code, UNKNOWN_FRAME);
        assert!(event.payload.contains("garbage line"));
    }

    #[test]
    fn wrong_width_codes_are_unknown() {
        let lines: [&[u8]; 6] = [b"20 short", b"2000 long", b"200", b"200x", b"2a0 mixed", b""];
        for line in lines {
            let event = parse_line(line);
            assert_eq!(event.code, UNKNOWN_FRAME, "line {line:?}");
        }
    }

    #[test]
    fn carriage_return_is_kept_in_payload() {
        assert_eq!(parse_line(b"200 dos\r").payload, "dos\r");
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        assert_eq!(parse_line(b"200 a\xffb").payload, "a\u{fffd}b");
    }

    #[test]
    fn splits_multiple_lines() {
        let (events, rest) = split(b"200 one\n201 two\nnoise\n");
        assert_eq!(
            events,
            vec![
                Event::new(200, "one"),
                Event::new(201, "two"),
                Event::unknown("noise"),
            ]
        );
        assert!(rest.is_empty());
    }

    #[test]
    fn blank_line_is_unknown() {
        let (events, _) = split(b"\n");
        assert_eq!(events, vec![Event::unknown("")]);
    }

    #[test]
    fn retains_partial_line() {
        let (events, rest) = split(b"200 hel");
        assert!(events.is_empty());
        assert_eq!(&rest[..], b"200 hel");
    }

    #[test]
    fn completes_partial_line_on_next_feed() {
        let mut parser = FrameParser::new();
        assert!(parser.feed(b"200 hel").is_empty());
        assert_eq!(parser.pending(), b"200 hel");

        let events = parser.feed(b"lo\n");
        assert_eq!(events, vec![Event::new(200, "hello")]);
        assert!(parser.pending().is_empty());
    }

    #[test]
    fn chunking_does_not_change_result() {
        let stream: &[u8] = b"200 alpha\nbad frame\n201 beta gamma\n\n999 \n202 tail";

        let mut whole = FrameParser::new();
        let expected = whole.feed(stream);

        for chunk_size in 1..=stream.len() {
            let mut parser = FrameParser::new();
            let mut got = Vec::new();
            for chunk in stream.chunks(chunk_size) {
                got.extend(parser.feed(chunk));
            }
            assert_eq!(got, expected, "chunk size {chunk_size}");
            assert_eq!(parser.pending(), whole.pending(), "chunk size {chunk_size}");
        }
        assert_eq!(whole.pending(), b"202 tail");
    }

    #[test]
    fn long_partial_line_is_scanned_once() {
        let mut parser = FrameParser::new();
        let chunk = [b'x'; 4096];
        assert!(parser.feed(b"200 ").is_empty());
        for round in 1..=64 {
            assert!(parser.feed(&chunk).is_empty());
            assert_eq!(parser.scanned, 4 + round * chunk.len());
        }

        let events = parser.feed(b"\n201 next\n");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].payload.len(), 64 * chunk.len());
        assert_eq!(events[1], Event::new(201, "next"));
        assert_eq!(parser.scanned, 0);
    }

    #[test]
    fn take_pending_clears_buffer() {
        let mut parser = FrameParser::default();
        parser.feed(b"12");
        assert_eq!(&parser.take_pending()[..], b"12");
        assert!(parser.pending().is_empty());
        assert_eq!(parser.scanned, 0);
    }
}
