//! Streaming chat orchestration over a parsed transcript.

use chat_model::{ChatChunk, ChatMessage, ChatRole, ModelError, ModelResolver, StreamOptions};
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::transcript::{Role, Transcript};

/// Boxed error returned by chunk observers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Callback run with `(chunk, accumulated)` after every chunk.
pub type ChunkObserver<'a> = dyn FnMut(&ChatChunk, &ChatChunk) -> Result<(), BoxError> + 'a;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("model stream failed: {0}")]
    Model(#[from] ModelError),

    #[error("chunk observer failed: {0}")]
    Observer(#[source] BoxError),
}

/// Streams a reply to the trailing user turn of `transcript`.
///
/// Returns `Ok(None)` without contacting any model when the transcript does
/// not end with a user message or when `resolver` has no model for the
/// selector. Otherwise chunks are folded with [`ChatChunk::concat`] in arrival
/// order and `on_chunk` runs to completion before the next chunk is pulled.
/// The result is the accumulated text, or `None` if the model sent no chunks.
///
/// Errors are returned as soon as they occur. Whatever the observer already
/// rendered stays rendered.
pub fn chat<R>(
    transcript: &Transcript,
    resolver: &R,
    mut on_chunk: Option<&mut ChunkObserver<'_>>,
) -> Result<Option<String>, ChatError>
where
    R: ModelResolver + ?Sized,
{
    if !transcript.awaits_reply() {
        debug!(
            messages = transcript.messages.len(),
            "transcript does not end with a user message; nothing to do"
        );
        return Ok(None);
    }

    let selector = transcript.selector.as_str();
    let Some(model) = resolver.resolve(selector, &transcript.meta) else {
        warn!(selector, "no model resolved for selector");
        return Ok(None);
    };

    let messages = to_chat_messages(transcript);
    let profile = model.profile();
    debug!(
        provider = %profile.provider_id,
        model = %profile.model_id,
        messages = messages.len(),
        "streaming chat completion"
    );

    let stream = model.stream(
        &messages,
        StreamOptions {
            include_usage: true,
        },
    )?;

    let mut accumulated: Option<ChatChunk> = None;
    let mut received = 0_usize;
    for chunk in stream {
        let chunk = chunk?;
        received += 1;
        trace!(index = received, bytes = chunk.content.len(), "chunk received");

        let current = match accumulated.take() {
            Some(previous) => previous.concat(chunk.clone()),
            None => chunk.clone(),
        };
        if let Some(observer) = on_chunk.as_deref_mut() {
            observer(&chunk, &current).map_err(ChatError::Observer)?;
        }
        accumulated = Some(current);
    }

    debug!(chunks = received, "chat completion stream exhausted");
    if let Some(usage) = accumulated.as_ref().and_then(|chunk| chunk.usage) {
        debug!(
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            "token usage"
        );
    }

    Ok(accumulated.map(|chunk| chunk.content))
}

/// Maps transcript messages onto single-text-part chat messages.
pub fn to_chat_messages(transcript: &Transcript) -> Vec<ChatMessage> {
    transcript
        .messages
        .iter()
        .map(|message| {
            let role = match message.role {
                Role::System => ChatRole::System,
                Role::Assistant => ChatRole::Assistant,
                Role::User => ChatRole::Human,
            };
            ChatMessage::text(role, message.text.clone())
        })
        .collect()
}
