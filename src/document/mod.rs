//! Transcript operations on an editable line buffer.
//!
//! Each operation reads the buffer, works on the parsed transcript and writes
//! rendered lines back. A parse failure returns before anything is written.

mod buffer;

use chat_model::{ChatChunk, ModelResolver};
use thiserror::Error;
use tracing::debug;

pub use self::buffer::{BufferError, FileBuffer, MemoryBuffer, TextBuffer};

use crate::chat::{self, BoxError, ChatError};
use crate::transcript::{
    self, message_to_string_list, to_string_list, FormatError, Llm, Message, Transcript,
};

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Chat(#[from] ChatError),

    #[error(transparent)]
    Buffer(#[from] BufferError),
}

/// Replaces the buffer with a fresh transcript for `selector`: one system
/// message per prompt and an empty user message to type into.
pub fn open<B>(buffer: &mut B, selector: Llm, system_prompts: &[String]) -> Result<(), DocumentError>
where
    B: TextBuffer + ?Sized,
{
    let transcript = system_prompts
        .iter()
        .fold(Transcript::new(selector), |transcript, prompt| {
            transcript.with_message(Message::system(prompt.as_str()))
        })
        .with_message(Message::user(""));

    buffer.replace_from(0, to_string_list(&transcript))?;
    Ok(())
}

/// Appends a user message holding `question`.
pub fn append<B>(buffer: &mut B, question: &str) -> Result<(), DocumentError>
where
    B: TextBuffer + ?Sized,
{
    read(buffer)?;

    let mut lines = vec![String::new()];
    lines.extend(message_to_string_list(&Message::user(question)));
    buffer.append(lines)?;
    Ok(())
}

/// Streams a reply into the buffer.
///
/// Everything after the last non-blank line is replaced by the assistant
/// message as it grows. Once the stream completes an empty user message
/// follows it. Returns `Ok(None)` without touching the buffer when there is
/// nothing to answer or no model resolves.
pub fn chat<B, R>(buffer: &mut B, resolver: &R) -> Result<Option<String>, DocumentError>
where
    B: TextBuffer + ?Sized,
    R: ModelResolver + ?Sized,
{
    let (transcript, lines) = read(buffer)?;
    let reply_start = content_end(&lines);

    let mut render = |_chunk: &ChatChunk, current: &ChatChunk| -> Result<(), BoxError> {
        buffer.replace_from(reply_start, reply_lines(&current.content, false))?;
        Ok(())
    };
    let reply = chat::chat(&transcript, resolver, Some(&mut render))?;

    if let Some(text) = &reply {
        buffer.replace_from(reply_start, reply_lines(text, true))?;
        debug!(bytes = text.len(), "reply written to buffer");
    }

    Ok(reply)
}

/// Rewrites the buffer in canonical form.
pub fn format<B>(buffer: &mut B) -> Result<(), DocumentError>
where
    B: TextBuffer + ?Sized,
{
    let (transcript, _) = read(buffer)?;
    buffer.replace_from(0, to_string_list(&transcript))?;
    Ok(())
}

fn read<B>(buffer: &B) -> Result<(Transcript, Vec<String>), FormatError>
where
    B: TextBuffer + ?Sized,
{
    let lines = buffer.lines();
    let transcript = transcript::parse(&lines.join("\n"))?;
    Ok((transcript, lines))
}

/// Number of lines up to and including the last non-blank one.
fn content_end(lines: &[String]) -> usize {
    lines
        .iter()
        .rposition(|line| !line.trim().is_empty())
        .map_or(0, |index| index + 1)
}

fn reply_lines(text: &str, complete: bool) -> Vec<String> {
    let mut lines = vec![String::new(), String::new()];
    lines.extend(message_to_string_list(&Message::assistant(text)));
    if complete {
        lines.push(String::new());
        lines.push(String::new());
        lines.extend(message_to_string_list(&Message::user("")));
    }
    lines
}
