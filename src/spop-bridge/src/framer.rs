/// Splits a byte stream into newline-terminated messages.
///
/// Chunks are buffered in arrival order. Every `\n` closes one message, so a
/// chunk carrying several lines yields several messages and a chunk that ends
/// mid-line leaves the tail buffered for the next read.
#[derive(Debug, Default)]
pub struct LineFramer {
    buffer: Vec<u8>,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every message it completed, oldest first.
    /// The terminator (and a preceding `\r`) is stripped.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let scan_from = self.buffer.len();
        self.buffer.extend_from_slice(chunk);

        let mut messages = Vec::new();
        let mut start = 0;
        for (offset, byte) in self.buffer[scan_from..].iter().enumerate() {
            if *byte != b'\n' {
                continue;
            }
            let end = scan_from + offset;
            let mut line = &self.buffer[start..end];
            if let Some(stripped) = line.strip_suffix(b"\r") {
                line = stripped;
            }
            messages.push(String::from_utf8_lossy(line).into_owned());
            start = end + 1;
        }
        self.buffer.drain(..start);
        messages
    }

    /// Bytes received but not yet part of a complete message.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_completes_on_later_newline() {
        let mut framer = LineFramer::new();
        assert!(framer.push(br#"{"a":1}"#).is_empty());
        assert_eq!(framer.pending(), 7);

        let messages = framer.push(b"\n");
        assert_eq!(messages, vec![r#"{"a":1}"#.to_string()]);
        assert_eq!(framer.pending(), 0);
    }

    #[test]
    fn one_chunk_may_hold_several_lines() {
        let mut framer = LineFramer::new();
        let messages = framer.push(b"spop 0.0.1\n{\"status\":\"stopped\"}\n{\"sta");
        assert_eq!(messages, vec!["spop 0.0.1", r#"{"status":"stopped"}"#]);
        assert_eq!(framer.pending(), 5);

        let messages = framer.push(b"tus\":\"playing\"}\r\n");
        assert_eq!(messages, vec![r#"{"status":"playing"}"#]);
        assert_eq!(framer.pending(), 0);
    }

    #[test]
    fn empty_lines_are_messages() {
        let mut framer = LineFramer::new();
        assert_eq!(framer.push(b"\n\n"), vec![String::new(), String::new()]);
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let mut framer = LineFramer::new();
        let messages = framer.push(b"caf\xff\n");
        assert_eq!(messages, vec!["caf\u{fffd}".to_string()]);
    }
}
