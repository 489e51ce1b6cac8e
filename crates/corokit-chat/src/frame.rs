//! Newline framing
//!
//! A frame is the bytes up to a `\n`. There is no escaping, so a `\n`
//! inside application data always ends a frame.

use crate::buffer::GrowableBuffer;

pub const DELIMITER: u8 = b'\n';

/// Remove every complete line from `buf`, without its delimiter
///
/// A trailing partial line stays in the buffer for the next read.
pub fn split_lines(buf: &mut GrowableBuffer) -> Vec<Vec<u8>> {
    let mut lines = Vec::new();
    let mut consumed = 0;
    {
        let bytes = buf.as_slice();
        while let Some(pos) = bytes[consumed..].iter().position(|&b| b == DELIMITER) {
            lines.push(bytes[consumed..consumed + pos].to_vec());
            consumed += pos + 1;
        }
    }
    if consumed > 0 {
        buf.consume(consumed);
    }
    lines
}

/// Append `line` and its delimiter
pub fn write_line(buf: &mut GrowableBuffer, line: &[u8]) {
    buf.ensure_space(line.len() + 1);
    buf.append(line);
    buf.append(&[DELIMITER]);
}
