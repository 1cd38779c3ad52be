//! Transport-only client for the Gemini `streamGenerateContent` endpoint.
//!
//! Requests are sent with `alt=sse`; the response is a sequence of
//! `GenerateContentResponse` objects framed as server-sent events. The stream
//! has no terminal sentinel and ends when the connection closes.

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod payload;
pub mod sse;
pub mod url;

pub use client::{CancellationSignal, GeminiApiClient};
pub use config::GeminiApiConfig;
pub use error::GeminiApiError;
pub use events::{GeminiStreamEvent, GenerateContentChunk, UsageMetadata};
pub use payload::{Content, ContentRole, GenerateContentRequest, GenerationConfig, Part};
pub use sse::GeminiSseParser;
pub use url::stream_generate_content_url;
