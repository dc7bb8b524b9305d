//! Line-level decoder for the provider's `text/event-stream` responses.
//!
//! Network chunks may end anywhere, including inside a multi-byte UTF-8
//! character, so bytes are buffered until a full line is available. Only
//! `data:` fields are surfaced; comments, `event:` and `id:` lines are skipped.

/// Payload of one `data:` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseData {
    Payload(String),
    /// The `[DONE]` marker that ends an OpenAI-style stream
    Done,
}

#[derive(Debug, Default)]
pub struct SseLineDecoder {
    buffer: Vec<u8>,
}

impl SseLineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes and return the `data:` payloads of every completed line.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseData> {
        self.buffer.extend_from_slice(chunk);

        let mut items = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(item) = Self::parse_line(&line) {
                items.push(item);
            }
        }
        items
    }

    /// Flush a trailing line that was not newline-terminated.
    pub fn finish(&mut self) -> Option<SseData> {
        if self.buffer.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.buffer);
        Self::parse_line(&line)
    }

    fn parse_line(raw: &[u8]) -> Option<SseData> {
        let line = String::from_utf8_lossy(raw);
        let line = line.trim_end_matches(['\n', '\r']);

        let data = line.strip_prefix("data:")?;
        let data = data.strip_prefix(' ').unwrap_or(data);

        if data.trim() == "[DONE]" {
            Some(SseData::Done)
        } else if data.is_empty() {
            None
        } else {
            Some(SseData::Payload(data.to_string()))
        }
    }
}
