//! Transport-only client primitives for OpenAI-compatible chat completions.
//!
//! This crate owns request building, header construction, and SSE parsing for
//! the `/chat/completions` streaming endpoint. It contains no credential
//! storage, no retry policy, and no coupling to transcript formatting.
//!
//! Streams are consumed through a caller-supplied handler so a consumer can
//! stop the transfer early by breaking out of the handler.

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod headers;
pub mod payload;
pub mod sse;
pub mod url;

pub use client::OpenAiApiClient;
pub use client::StreamResult;
pub use config::OpenAiApiConfig;
pub use error::OpenAiApiError;
pub use events::{ChatCompletionChunk, CompletionUsage, OpenAiStreamEvent};
pub use payload::{ChatCompletionRequest, RequestMessage};
pub use sse::SseStreamParser;
pub use url::normalize_chat_completions_url;
