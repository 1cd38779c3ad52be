//! Minimal provider-agnostic contract for streaming one chat completion.
//!
//! This crate defines the message shape handed to a model, the chunk type a
//! model streams back together with its merge rule, and the resolver seam that
//! maps a transcript selector onto a concrete model. It excludes transport
//! details, provider payloads, and transcript formatting.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Add;
use std::sync::Arc;

/// Free-form scalar metadata carried alongside a conversation.
pub type Meta = BTreeMap<String, MetaValue>;

/// Scalar metadata value. Structured values are never represented.
#[derive(Debug, Clone, PartialEq)]
pub enum MetaValue {
    String(String),
    Number(f64),
    Bool(bool),
}

impl MetaValue {
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }

    /// Numeric reading of the value: a number, or a string holding one.
    /// Non-finite results are rejected.
    #[must_use]
    pub fn to_number(&self) -> Option<f64> {
        let number = match self {
            Self::Number(value) => *value,
            Self::String(value) => value.trim().parse::<f64>().ok()?,
            Self::Bool(_) => return None,
        };
        number.is_finite().then_some(number)
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(value) => f.write_str(value),
            Self::Number(value) => write!(f, "{value}"),
            Self::Bool(value) => write!(f, "{value}"),
        }
    }
}

impl From<&str> for MetaValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<f64> for MetaValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for MetaValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Error raised while opening or consuming a model stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelError {
    message: String,
}

impl ModelError {
    /// Creates a new model error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the underlying error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ModelError {}

impl From<String> for ModelError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for ModelError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Speaker of a model-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    System,
    Assistant,
    Human,
}

impl ChatRole {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Assistant => "assistant",
            Self::Human => "human",
        }
    }
}

/// One content part of a model-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart {
    Text { text: String },
}

/// Provider-neutral model-facing message history item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: Vec<ContentPart>,
}

impl ChatMessage {
    /// Builds a message carrying a single text part.
    #[must_use]
    pub fn text(role: ChatRole, text: impl Into<String>) -> Self {
        Self {
            role,
            content: vec![ContentPart::Text { text: text.into() }],
        }
    }

    #[must_use]
    pub fn system(text: impl Into<String>) -> Self {
        Self::text(ChatRole::System, text)
    }

    #[must_use]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::text(ChatRole::Assistant, text)
    }

    #[must_use]
    pub fn human(text: impl Into<String>) -> Self {
        Self::text(ChatRole::Human, text)
    }

    /// Returns all text parts joined in order.
    #[must_use]
    pub fn joined_text(&self) -> String {
        self.content
            .iter()
            .map(|part| match part {
                ContentPart::Text { text } => text.as_str(),
            })
            .collect()
    }
}

/// Token accounting reported by providers that support it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

impl Add for Usage {
    type Output = Usage;

    fn add(self, rhs: Usage) -> Usage {
        Usage {
            input_tokens: self.input_tokens.saturating_add(rhs.input_tokens),
            output_tokens: self.output_tokens.saturating_add(rhs.output_tokens),
            total_tokens: self.total_tokens.saturating_add(rhs.total_tokens),
        }
    }
}

/// One incremental fragment of a streamed assistant message.
///
/// Chunks merge with [`ChatChunk::concat`], which is associative and keeps
/// arrival order, so an accumulator can be built by folding in any grouping.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChatChunk {
    pub id: Option<String>,
    pub content: String,
    pub usage: Option<Usage>,
    pub finish_reason: Option<String>,
}

impl ChatChunk {
    /// Creates a chunk carrying only a text fragment.
    #[must_use]
    pub fn from_text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    /// Merges `next` after `self`.
    ///
    /// Content is appended, usage counts are summed, the first id is kept and
    /// the last finish reason wins.
    #[must_use]
    pub fn concat(self, next: ChatChunk) -> ChatChunk {
        let mut content = self.content;
        content.push_str(&next.content);

        let usage = match (self.usage, next.usage) {
            (Some(left), Some(right)) => Some(left + right),
            (left, right) => left.or(right),
        };

        ChatChunk {
            id: self.id.or(next.id),
            content,
            usage,
            finish_reason: next.finish_reason.or(self.finish_reason),
        }
    }
}

/// Per-request streaming switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamOptions {
    /// Ask the provider to report token usage inside the stream.
    pub include_usage: bool,
}

/// Ordered, pull-based chunk stream.
///
/// Dropping the stream abandons the underlying request.
pub type ChunkStream = Box<dyn Iterator<Item = Result<ChatChunk, ModelError>> + Send>;

/// Immutable metadata describing a resolved model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelProfile {
    pub provider_id: String,
    pub model_id: String,
}

/// A chat model able to stream one completion for an ordered message history.
pub trait ChatModel: Send + Sync + 'static {
    /// Returns provider/model identity metadata.
    fn profile(&self) -> ModelProfile;

    /// Opens a streaming completion. Chunks are yielded in provider order.
    fn stream(
        &self,
        messages: &[ChatMessage],
        options: StreamOptions,
    ) -> Result<ChunkStream, ModelError>;

    /// Runs one completion to the end and returns its text.
    fn invoke(&self, messages: &[ChatMessage]) -> Result<String, ModelError> {
        let mut accumulated: Option<ChatChunk> = None;
        for chunk in self.stream(messages, StreamOptions::default())? {
            let chunk = chunk?;
            accumulated = Some(match accumulated {
                Some(current) => current.concat(chunk),
                None => chunk,
            });
        }

        Ok(accumulated.map(|chunk| chunk.content).unwrap_or_default())
    }
}

/// Maps a selector plus metadata to a ready-to-use model.
///
/// Returns `None` when the selector is unknown or the provider cannot be
/// configured (for example a missing credential).
pub trait ModelResolver {
    fn resolve(&self, selector: &str, meta: &Meta) -> Option<Arc<dyn ChatModel>>;
}

/// Builds a model for one provider from conversation metadata.
pub trait ModelFactory: Send + Sync {
    fn build(&self, meta: &Meta) -> Option<Arc<dyn ChatModel>>;
}

impl<F> ModelFactory for F
where
    F: Fn(&Meta) -> Option<Arc<dyn ChatModel>> + Send + Sync,
{
    fn build(&self, meta: &Meta) -> Option<Arc<dyn ChatModel>> {
        self(meta)
    }
}

/// Selector-keyed set of model factories.
#[derive(Default)]
pub struct ModelRegistry {
    factories: BTreeMap<String, Box<dyn ModelFactory>>,
}

impl ModelRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `factory` for `selector`, replacing any previous one.
    pub fn register(&mut self, selector: impl Into<String>, factory: impl ModelFactory + 'static) {
        self.factories.insert(selector.into(), Box::new(factory));
    }

    /// Builder-style variant of [`ModelRegistry::register`].
    #[must_use]
    pub fn with(mut self, selector: impl Into<String>, factory: impl ModelFactory + 'static) -> Self {
        self.register(selector, factory);
        self
    }

    #[must_use]
    pub fn contains(&self, selector: &str) -> bool {
        self.factories.contains_key(selector)
    }

    pub fn selectors(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("selectors", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ModelResolver for ModelRegistry {
    fn resolve(&self, selector: &str, meta: &Meta) -> Option<Arc<dyn ChatModel>> {
        self.factories.get(selector)?.build(meta)
    }
}
