//! Deterministic scripted implementation of the shared `chat_model` contract.
//!
//! This crate contains no transport logic and is intended for contract-level
//! tests and offline runs of the transcript workflow.

use std::sync::{Arc, Mutex, MutexGuard};

use chat_model::{
    ChatChunk, ChatMessage, ChatModel, ChunkStream, Meta, ModelError, ModelProfile, StreamOptions,
    Usage,
};

/// Stable provider identifier reported by scripted models.
pub const MOCK_PROVIDER_ID: &str = "mock";

/// One recorded `stream` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub messages: Vec<ChatMessage>,
    pub options: StreamOptions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Failure {
    OnOpen(String),
    AfterChunks { count: usize, message: String },
}

/// Scripted model yielding preset chunks in order.
#[derive(Debug)]
pub struct ScriptedModel {
    chunks: Vec<String>,
    usage: Option<Usage>,
    failure: Option<Failure>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedModel {
    /// Creates a model that streams `chunks` verbatim.
    #[must_use]
    pub fn new(chunks: Vec<String>) -> Self {
        Self {
            chunks,
            usage: None,
            failure: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Creates a model that streams `text` split after every space and newline.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        Self::new(tokenize(text))
    }

    /// Reports `usage` in a trailing content-free chunk when the caller asks for it.
    #[must_use]
    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Fails when the stream is opened.
    #[must_use]
    pub fn failing_on_open(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(Failure::OnOpen(message.into()));
        self
    }

    /// Yields `count` chunks and then fails.
    #[must_use]
    pub fn failing_after(mut self, count: usize, message: impl Into<String>) -> Self {
        self.failure = Some(Failure::AfterChunks {
            count,
            message: message.into(),
        });
        self
    }

    /// Number of `stream` calls observed so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        lock_unpoisoned(&self.requests).len()
    }

    /// Requests observed so far, oldest first.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock_unpoisoned(&self.requests).clone()
    }

    /// Wraps a shared model as a registry factory that ignores metadata.
    pub fn factory(model: &Arc<Self>) -> impl Fn(&Meta) -> Option<Arc<dyn ChatModel>> + Send + Sync {
        let model = Arc::clone(model);
        move |_meta: &Meta| Some(Arc::clone(&model) as Arc<dyn ChatModel>)
    }
}

impl Default for ScriptedModel {
    fn default() -> Self {
        Self::from_text("Scripted reply from the mock model.\n")
    }
}

impl ChatModel for ScriptedModel {
    fn profile(&self) -> ModelProfile {
        ModelProfile {
            provider_id: MOCK_PROVIDER_ID.to_string(),
            model_id: "scripted".to_string(),
        }
    }

    fn stream(
        &self,
        messages: &[ChatMessage],
        options: StreamOptions,
    ) -> Result<ChunkStream, ModelError> {
        lock_unpoisoned(&self.requests).push(RecordedRequest {
            messages: messages.to_vec(),
            options,
        });

        let mut items: Vec<Result<ChatChunk, ModelError>> = Vec::new();
        match &self.failure {
            Some(Failure::OnOpen(message)) => return Err(ModelError::new(message.clone())),
            Some(Failure::AfterChunks { count, message }) => {
                items.extend(
                    self.chunks
                        .iter()
                        .take(*count)
                        .map(|chunk| Ok(ChatChunk::from_text(chunk.clone()))),
                );
                items.push(Err(ModelError::new(message.clone())));
            }
            None => {
                items.extend(
                    self.chunks
                        .iter()
                        .map(|chunk| Ok(ChatChunk::from_text(chunk.clone()))),
                );
                if let (true, Some(usage)) = (options.include_usage, self.usage) {
                    items.push(Ok(ChatChunk {
                        usage: Some(usage),
                        finish_reason: Some("stop".to_string()),
                        ..ChatChunk::default()
                    }));
                }
            }
        }

        Ok(Box::new(items.into_iter()))
    }
}

fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut pending_token = String::new();
    for ch in text.chars() {
        pending_token.push(ch);
        if matches!(ch, ' ' | '\n') {
            tokens.push(std::mem::take(&mut pending_token));
        }
    }

    if !pending_token.is_empty() {
        tokens.push(pending_token);
    }

    tokens
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(model: &ScriptedModel, options: StreamOptions) -> Vec<Result<ChatChunk, ModelError>> {
        model
            .stream(&[ChatMessage::human("hi")], options)
            .expect("stream should open")
            .collect()
    }

    #[test]
    fn profile_exposes_mock_provider_identity() {
        let profile = ScriptedModel::new(Vec::new()).profile();
        assert_eq!(profile.provider_id, MOCK_PROVIDER_ID);
        assert_eq!(profile.model_id, "scripted");
    }

    #[test]
    fn from_text_splits_after_spaces_and_newlines() {
        assert_eq!(
            tokenize("one two\nthree"),
            vec!["one ".to_string(), "two\n".to_string(), "three".to_string()]
        );
    }

    #[test]
    fn stream_yields_chunks_in_order_and_records_request() {
        let model = ScriptedModel::new(vec!["Hel".to_string(), "lo".to_string()]);
        let chunks = drain(&model, StreamOptions::default())
            .into_iter()
            .map(|chunk| chunk.expect("no failure scripted").content)
            .collect::<Vec<_>>();

        assert_eq!(chunks, vec!["Hel".to_string(), "lo".to_string()]);
        assert_eq!(model.calls(), 1);
        assert_eq!(model.requests()[0].messages, vec![ChatMessage::human("hi")]);
    }

    #[test]
    fn usage_chunk_is_only_sent_when_requested() {
        let usage = Usage {
            input_tokens: 4,
            output_tokens: 2,
            total_tokens: 6,
        };
        let model = ScriptedModel::new(vec!["ok".to_string()]).with_usage(usage);

        assert_eq!(drain(&model, StreamOptions::default()).len(), 1);

        let with_usage = drain(
            &model,
            StreamOptions {
                include_usage: true,
            },
        );
        assert_eq!(with_usage.len(), 2);
        let last = with_usage
            .last()
            .and_then(|chunk| chunk.as_ref().ok())
            .expect("usage chunk should be present");
        assert_eq!(last.usage, Some(usage));
        assert!(last.content.is_empty());
    }

    #[test]
    fn failing_after_yields_prefix_then_error() {
        let model = ScriptedModel::new(vec!["a".to_string(), "b".to_string(), "c".to_string()])
            .failing_after(2, "connection reset");
        let items = drain(&model, StreamOptions::default());

        assert_eq!(items.len(), 3);
        assert!(items[0].is_ok());
        assert!(items[1].is_ok());
        assert_eq!(
            items[2].as_ref().expect_err("third item should fail").message(),
            "connection reset"
        );
    }

    #[test]
    fn failing_on_open_returns_error_but_records_call() {
        let model = ScriptedModel::default().failing_on_open("unauthorized");
        let error = match model.stream(&[], StreamOptions::default()) {
            Ok(_) => panic!("open should fail"),
            Err(error) => error,
        };

        assert_eq!(error.message(), "unauthorized");
        assert_eq!(model.calls(), 1);
    }

    #[test]
    fn factory_shares_one_model_instance() {
        let model = Arc::new(ScriptedModel::default());
        let factory = ScriptedModel::factory(&model);

        let resolved = factory(&Meta::new()).expect("factory always resolves");
        let _ = resolved
            .stream(&[ChatMessage::human("hi")], StreamOptions::default())
            .expect("stream should open");

        assert_eq!(model.calls(), 1);
    }
}
