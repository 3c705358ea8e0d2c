use std::fmt::{Display, Write as _};

use bytes::{BufMut, BytesMut};

/// Encode an outbound command line into `dst`.
///
/// The command and each parameter are joined with single spaces and the line
/// is terminated with `\n`. Nothing is escaped: embedded newlines or
/// surrounding whitespace in parameters reach the worker verbatim.
pub fn encode_command<I, P>(command: &str, params: I, dst: &mut BytesMut)
where
    I: IntoIterator<Item = P>,
    P: Display,
{
    let mut line = String::from(command);
    for param in params {
        // Writing into a String cannot fail.
        let _ = write!(line, " {param}");
    }
    dst.reserve(line.len() + 1);
    dst.put_slice(line.as_bytes());
    dst.put_u8(b'\n');
}
