//! Incremental decoder for `data: `-prefixed event lines.
//!
//! State machine: buffer bytes → split on `\n` → classify the `data: `
//! prefix → parse JSON. Bytes are buffered undecoded so multi-byte UTF-8
//! sequences and lines may straddle chunk boundaries.

use super::ChatEvent;

/// Prefix that marks a line carrying one JSON event.
pub const DATA_PREFIX: &str = "data: ";

/// Outcome of decoding one complete line.
#[derive(Debug, Clone, PartialEq)]
pub enum Line {
    /// A well-formed event record.
    Event(ChatEvent),
    /// Any line without the `data: ` prefix (blank lines, comments, `event:`).
    Ignored,
    /// A `data: ` line whose payload did not decode.
    Malformed { line: String, error: String },
}

#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
    /// Bytes of `buffer` already known to contain no newline.
    scanned: usize,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk and returns every line it completed, in order.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Line> {
        self.buffer.extend_from_slice(bytes);

        let mut lines = Vec::new();
        let mut start = 0;
        let mut cursor = self.scanned;
        while let Some(offset) = self.buffer[cursor..].iter().position(|b| *b == b'\n') {
            let end = cursor + offset;
            lines.push(classify(&self.buffer[start..end]));
            start = end + 1;
            cursor = start;
        }

        self.buffer.drain(..start);
        self.scanned = self.buffer.len();
        lines
    }

    /// Flushes a trailing line that never got its newline.
    pub fn finish(&mut self) -> Option<Line> {
        self.scanned = 0;
        if self.buffer.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buffer);
        Some(classify(&rest))
    }

    /// Number of buffered bytes awaiting a newline.
    #[cfg(test)]
    fn pending(&self) -> usize {
        self.buffer.len()
    }
}

fn classify(raw: &[u8]) -> Line {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    let Some(payload) = raw.strip_prefix(DATA_PREFIX.as_bytes()) else {
        return Line::Ignored;
    };

    match serde_json::from_slice::<ChatEvent>(payload) {
        Ok(event) => Line::Event(event),
        Err(err) => Line::Malformed {
            line: String::from_utf8_lossy(raw).into_owned(),
            error: err.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn chunk(text: &str) -> ChatEvent {
        ChatEvent::Chunk {
            content: text.to_string(),
        }
    }

    #[test]
    fn test_complete_line_yields_event() {
        let mut decoder = LineDecoder::new();
        let lines = decoder.push(b"data: {\"type\":\"chunk\",\"content\":\"Hi\"}\n");
        assert_eq!(lines, vec![Line::Event(chunk("Hi"))]);
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_partial_line_waits_for_newline() {
        let mut decoder = LineDecoder::new();
        assert!(decoder.push(b"data: {\"type\":\"chu").is_empty());
        assert!(decoder.push(b"nk\",\"content\":\"a").is_empty());
        assert!(decoder.pending() > 0);

        let lines = decoder.push(b"b\"}\ndata: ");
        assert_eq!(lines, vec![Line::Event(chunk("ab"))]);
        assert_eq!(decoder.pending(), DATA_PREFIX.len());
    }

    #[test]
    fn test_non_data_lines_are_ignored() {
        let mut decoder = LineDecoder::new();
        let lines = decoder.push(b"\n: keepalive\nevent: message\ndata:{\"type\":\"chunk\"}\n");
        assert_eq!(lines, vec![Line::Ignored; 4]);
    }

    #[test]
    fn test_crlf_is_stripped() {
        let mut decoder = LineDecoder::new();
        let lines = decoder.push(b"data: {\"type\":\"error\",\"content\":\"boom\"}\r\n\r\n");
        assert_eq!(
            lines,
            vec![
                Line::Event(ChatEvent::Error {
                    content: "boom".to_string()
                }),
                Line::Ignored
            ]
        );
    }

    #[test]
    fn test_malformed_json_is_reported_not_fatal() {
        let mut decoder = LineDecoder::new();
        let lines = decoder.push(
            b"data: {\"type\":\"chunk\",\ndata: {\"type\":\"chunk\",\"content\":\"ok\"}\n",
        );
        assert_eq!(lines.len(), 2);
        assert!(matches!(&lines[0], Line::Malformed { line, .. } if line.starts_with("data: ")));
        assert_eq!(lines[1], Line::Event(chunk("ok")));
    }

    #[test]
    fn test_unknown_event_type_is_malformed() {
        let mut decoder = LineDecoder::new();
        let lines = decoder.push(b"data: {\"type\":\"heartbeat\"}\n");
        assert!(matches!(lines[0], Line::Malformed { .. }));
    }

    #[test]
    fn test_utf8_split_across_pushes() {
        let data = "data: {\"type\":\"chunk\",\"content\":\"√2 ≈ 1.414 👋\"}\n";
        let bytes = data.as_bytes();
        let emoji_start = bytes
            .windows(4)
            .position(|w| w == [0xF0, 0x9F, 0x91, 0x8B])
            .expect("emoji not found");

        let mut decoder = LineDecoder::new();
        assert!(decoder.push(&bytes[..emoji_start + 2]).is_empty());
        let lines = decoder.push(&bytes[emoji_start + 2..]);
        assert_eq!(lines, vec![Line::Event(chunk("√2 ≈ 1.414 👋"))]);
    }

    #[test]
    fn test_finish_flushes_trailing_line() {
        let mut decoder = LineDecoder::new();
        assert!(
            decoder
                .push(b"data: {\"type\":\"final\",\"content\":{\"type\":\"practice\"}}")
                .is_empty()
        );
        assert_eq!(
            decoder.finish(),
            Some(Line::Event(ChatEvent::Final {
                content: json!({"type": "practice"})
            }))
        );
        assert_eq!(decoder.finish(), None);
    }
}
