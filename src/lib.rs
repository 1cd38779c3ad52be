//! Markdown chat transcripts with streamed model replies.
//!
//! # Public API Overview
//! - Read and write transcript documents with [`parse`] and [`to_string_list`].
//! - Stream a reply to the trailing user turn with [`chat()`], observing every chunk.
//! - Drive whole-document edits (`open`, `append`, `chat`, `format`) against a
//!   [`TextBuffer`] through the [`document`] module.
//! - Resolve provider credentials from the JSON config file with [`Config`].
//!
//! Models are supplied through the `chat_model` contract; [`Config::model_registry`]
//! wires in the OpenAI and Gemini adapters.

pub mod chat;
pub mod config;
pub mod document;
pub mod logging;
pub mod transcript;

/// Transcript data model and codec.
pub use crate::transcript::{
    message_to_string_list, parse, to_string_list, ContentKind, FormatError, Llm, Message, Meta,
    MetaValue, Role, Transcript,
};

/// Streaming chat orchestration.
pub use crate::chat::{chat, to_chat_messages, BoxError, ChatError, ChunkObserver};

/// Buffer-level transcript operations.
pub use crate::document::{
    BufferError, DocumentError, FileBuffer, MemoryBuffer, TextBuffer,
};

/// Configuration and logging setup.
pub use crate::config::{Config, ConfigError, EnvConfig, ProviderConfig};
pub use crate::logging::{init_logging, LoggingError};

/// Model contract re-exports for callers supplying their own models.
pub use chat_model::{ChatChunk, ChatModel, ModelError, ModelRegistry, ModelResolver, Usage};
