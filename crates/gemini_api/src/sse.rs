use serde_json::Value;

use crate::error::error_fields;
use crate::events::{GeminiStreamEvent, GenerateContentChunk};

/// Incremental `alt=sse` frame parser.
///
/// Bytes are buffered until a blank line closes a frame, so UTF-8 sequences
/// split across network reads decode intact.
#[derive(Debug, Default)]
pub struct GeminiSseParser {
    buffer: Vec<u8>,
}

impl GeminiSseParser {
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<GeminiStreamEvent> {
        self.buffer
            .extend(bytes.iter().copied().filter(|byte| *byte != b'\r'));

        let mut events = Vec::new();
        while let Some(end) = self.buffer.windows(2).position(|window| window == b"\n\n") {
            let frame = String::from_utf8_lossy(&self.buffer[..end]).into_owned();
            self.buffer.drain(..end + 2);

            let Some(payload) = data_payload(&frame) else {
                continue;
            };
            if let Ok(value) = serde_json::from_str::<Value>(&payload) {
                events.extend(map_event(value));
            }
        }
        events
    }

    pub fn parse_frames(input: &str) -> Vec<GeminiStreamEvent> {
        Self::default().feed(input.as_bytes())
    }

    pub fn is_empty_buffer(&self) -> bool {
        self.buffer.iter().all(u8::is_ascii_whitespace)
    }
}

fn data_payload(frame: &str) -> Option<String> {
    let lines = frame
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>();

    (!lines.is_empty()).then(|| lines.join("\n"))
}

fn map_event(value: Value) -> Option<GeminiStreamEvent> {
    if let Some((code, message)) = error_fields(&value) {
        return Some(GeminiStreamEvent::Error { code, message });
    }

    let chunk = serde_json::from_value::<GenerateContentChunk>(value).ok()?;
    if let Some(reason) = chunk.block_reason() {
        return Some(GeminiStreamEvent::Error {
            code: Some(reason.to_string()),
            message: Some(format!("prompt blocked ({reason})")),
        });
    }
    Some(GeminiStreamEvent::Chunk(chunk))
}
