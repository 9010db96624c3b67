use std::collections::VecDeque;
use std::str::Utf8Error;

/// Circular buffer for line-based parsing of a chunked byte stream
pub struct CircularLineBuffer {
    buffer: VecDeque<u8>,
}

impl CircularLineBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
        }
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend(bytes);
    }

    /// Extract the next complete line (without its terminator, trimmed).
    /// Returns None until a `\n` has been buffered.
    pub fn next_line(&mut self) -> Option<Result<String, Utf8Error>> {
        let newline_pos = self.buffer.iter().position(|&b| b == b'\n')?;
        let line_bytes: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
        Some(decode_line(&line_bytes))
    }

    /// Drain whatever is left once the byte stream has ended
    pub fn take_remainder(&mut self) -> Option<Result<String, Utf8Error>> {
        if self.buffer.is_empty() {
            return None;
        }
        let line_bytes: Vec<u8> = self.buffer.drain(..).collect();
        Some(decode_line(&line_bytes))
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

fn decode_line(bytes: &[u8]) -> Result<String, Utf8Error> {
    std::str::from_utf8(bytes).map(|line| line.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circular_buffer_basic() {
        let mut buffer = CircularLineBuffer::with_capacity(64);

        buffer.extend(b"line1\nline2\r\n");

        assert_eq!(buffer.next_line().unwrap().unwrap(), "line1");
        assert_eq!(buffer.next_line().unwrap().unwrap(), "line2");
        assert!(buffer.next_line().is_none());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_partial_line() {
        let mut buffer = CircularLineBuffer::with_capacity(64);

        buffer.extend(b"partial");
        assert!(buffer.next_line().is_none());

        buffer.extend(b" line\n");
        assert_eq!(buffer.next_line().unwrap().unwrap(), "partial line");
    }

    #[test]
    fn test_multibyte_split_across_chunks() {
        let mut buffer = CircularLineBuffer::with_capacity(64);
        let bytes = "olá\n".as_bytes();

        buffer.extend(&bytes[..3]);
        assert!(buffer.next_line().is_none());
        buffer.extend(&bytes[3..]);
        assert_eq!(buffer.next_line().unwrap().unwrap(), "olá");
    }

    #[test]
    fn test_remainder() {
        let mut buffer = CircularLineBuffer::with_capacity(64);

        buffer.extend(b"done\ntail");
        assert_eq!(buffer.next_line().unwrap().unwrap(), "done");
        assert!(buffer.next_line().is_none());
        assert_eq!(buffer.take_remainder().unwrap().unwrap(), "tail");
        assert!(buffer.take_remainder().is_none());
    }

    #[test]
    fn test_invalid_utf8() {
        let mut buffer = CircularLineBuffer::with_capacity(8);
        buffer.extend(&[0xff, 0xfe, b'\n']);
        assert!(buffer.next_line().unwrap().is_err());
    }
}
