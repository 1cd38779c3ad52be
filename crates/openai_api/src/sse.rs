use serde_json::Value;

use crate::events::{ChatCompletionChunk, OpenAiStreamEvent};

/// Incremental parser for SSE byte streams.
///
/// Bytes are buffered until a full frame is available, so multi-byte UTF-8
/// sequences split across network chunks decode correctly.
#[derive(Debug, Default)]
pub struct SseStreamParser {
    buffer: Vec<u8>,
}

impl SseStreamParser {
    /// Feed arbitrary bytes into the parser and drain complete events.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<OpenAiStreamEvent> {
        self.buffer.extend(bytes.iter().copied().filter(|byte| *byte != b'\r'));
        let mut events = Vec::new();

        while let Some(split) = find_frame_end(&self.buffer) {
            let frame = String::from_utf8_lossy(&self.buffer[..split]).into_owned();
            self.buffer.drain(0..split + 2);

            if let Some(payload) = extract_data_payload(&frame) {
                if payload == "[DONE]" {
                    events.push(OpenAiStreamEvent::Done);
                    continue;
                }

                if let Ok(value) = serde_json::from_str::<Value>(&payload) {
                    if let Some(event) = map_event(value) {
                        events.push(event);
                    }
                }
            }
        }

        events
    }

    /// Parse a complete SSE payload string in one shot.
    pub fn parse_frames(input: &str) -> Vec<OpenAiStreamEvent> {
        let mut parser = Self::default();
        parser.feed(input.as_bytes())
    }

    pub fn is_empty_buffer(&self) -> bool {
        self.buffer.iter().all(u8::is_ascii_whitespace)
    }
}

fn find_frame_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|window| window == b"\n\n")
}

fn extract_data_payload(frame: &str) -> Option<String> {
    let data_lines: Vec<&str> = frame
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .collect();

    if data_lines.is_empty() {
        None
    } else {
        Some(data_lines.join("\n"))
    }
}

fn map_event(value: Value) -> Option<OpenAiStreamEvent> {
    if let Some(error) = value.get("error") {
        let code = error
            .get("code")
            .and_then(|value| value.as_str())
            .or_else(|| error.get("type").and_then(|value| value.as_str()))
            .map(ToString::to_string);
        let message = error
            .get("message")
            .and_then(|value| value.as_str())
            .map(ToString::to_string);
        return Some(OpenAiStreamEvent::Error { code, message });
    }

    serde_json::from_value::<ChatCompletionChunk>(value)
        .ok()
        .map(OpenAiStreamEvent::Chunk)
}
