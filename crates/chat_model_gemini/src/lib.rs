//! Gemini-backed implementation of the shared `chat_model` contract.
//!
//! System messages become the request's system instruction. Consecutive turns
//! with the same role are merged so user and model turns alternate. Streaming
//! runs on a worker thread as in the OpenAI adapter.

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chat_model::{
    ChatChunk, ChatMessage, ChatModel, ChatRole, ChunkStream, Meta, MetaValue, ModelError,
    ModelProfile, ModelRegistry, StreamOptions, Usage,
};
use gemini_api::{
    CancellationSignal, Content, ContentRole, GeminiApiClient, GeminiApiConfig, GeminiApiError,
    GeminiStreamEvent, GenerateContentChunk, GenerateContentRequest, Part,
};
use tracing::{debug, warn};

pub const GEMINI_PROVIDER_ID: &str = "google";

/// Transcript selector this adapter registers under.
pub const GEMINI_SELECTOR: &str = "GoogleGenerativeAI";

pub const DEFAULT_MODEL: &str = "gemini-pro";
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 2048;

/// Front-matter key for the output token cap.
pub const MAX_OUTPUT_TOKENS_KEY: &str = "maxOutputTokens";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeminiChatModelConfig {
    pub api_key: String,
    pub model: String,
    pub max_output_tokens: u32,
    pub base_url: Option<String>,
    pub timeout: Option<Duration>,
}

impl GeminiChatModelConfig {
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            base_url: None,
            timeout: None,
        }
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Applies transcript metadata: a non-blank `model` string and a positive
    /// `maxOutputTokens` (number or numeric string, truncated) override the
    /// configured values.
    #[must_use]
    pub fn with_meta(mut self, meta: &Meta) -> Self {
        if let Some(model) = meta
            .get("model")
            .and_then(MetaValue::as_str)
            .map(str::trim)
            .filter(|model| !model.is_empty())
        {
            self.model = model.to_string();
        }

        if let Some(tokens) = meta
            .get(MAX_OUTPUT_TOKENS_KEY)
            .and_then(MetaValue::to_number)
            .map(f64::trunc)
            .filter(|tokens| *tokens >= 1.0 && *tokens <= f64::from(u32::MAX))
        {
            self.max_output_tokens = tokens as u32;
        }

        self
    }

    fn to_api_config(&self) -> GeminiApiConfig {
        let mut config = GeminiApiConfig::new(self.api_key.clone());
        if let Some(base_url) = &self.base_url {
            config = config.with_base_url(base_url.clone());
        }
        if let Some(timeout) = self.timeout {
            config = config.with_timeout(timeout);
        }
        config
    }
}

type EventStream = Box<dyn Iterator<Item = Result<GeminiStreamEvent, GeminiApiError>> + Send>;

trait StreamTransport: Send + Sync {
    fn open(
        &self,
        model: String,
        request: GenerateContentRequest,
    ) -> Result<EventStream, GeminiApiError>;
}

#[derive(Debug)]
struct WorkerTransport {
    client: Arc<GeminiApiClient>,
}

impl StreamTransport for WorkerTransport {
    fn open(
        &self,
        model: String,
        request: GenerateContentRequest,
    ) -> Result<EventStream, GeminiApiError> {
        let _ = self.client.build_request(&model, &request)?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|error| {
                GeminiApiError::Runtime(format!("failed to initialize tokio runtime: {error}"))
            })?;

        let (sender, receiver) = mpsc::sync_channel(0);
        let cancel: CancellationSignal = Arc::new(AtomicBool::new(false));
        let worker_cancel = Arc::clone(&cancel);
        let client = Arc::clone(&self.client);

        thread::Builder::new()
            .name("gemini-stream".to_string())
            .spawn(move || {
                let outcome = runtime.block_on(client.stream_with_handler(
                    &model,
                    &request,
                    Some(&worker_cancel),
                    |event| match sender.send(Ok(event)) {
                        Ok(()) => ControlFlow::Continue(()),
                        Err(_) => ControlFlow::Break(()),
                    },
                ));

                match outcome {
                    Ok(chunks) => debug!(chunks, "gemini stream closed"),
                    Err(GeminiApiError::Cancelled) => debug!("gemini stream abandoned"),
                    Err(error) => {
                        warn!(%error, "gemini stream failed");
                        let _ = sender.send(Err(error));
                    }
                }
            })
            .map_err(|error| {
                GeminiApiError::Runtime(format!("failed to spawn stream worker: {error}"))
            })?;

        Ok(Box::new(ChannelEvents { receiver, cancel }))
    }
}

/// Receiving half of the worker hand-off; dropping it cancels the request.
struct ChannelEvents {
    receiver: Receiver<Result<GeminiStreamEvent, GeminiApiError>>,
    cancel: CancellationSignal,
}

impl Iterator for ChannelEvents {
    type Item = Result<GeminiStreamEvent, GeminiApiError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.receiver.recv().ok()
    }
}

impl Drop for ChannelEvents {
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::Release);
    }
}

pub struct GeminiChatModel {
    config: GeminiChatModelConfig,
    transport: Arc<dyn StreamTransport>,
}

impl GeminiChatModel {
    pub fn new(config: GeminiChatModelConfig) -> Result<Self, ModelError> {
        let client = GeminiApiClient::new(config.to_api_config()).map_err(|error| {
            ModelError::new(format!("failed to initialize Gemini client: {error}"))
        })?;

        Ok(Self {
            config,
            transport: Arc::new(WorkerTransport {
                client: Arc::new(client),
            }),
        })
    }

    pub fn config(&self) -> &GeminiChatModelConfig {
        &self.config
    }

    fn build_request(&self, messages: &[ChatMessage]) -> GenerateContentRequest {
        let mut system = Vec::new();
        let mut contents: Vec<Content> = Vec::new();

        for message in messages {
            let text = message.joined_text();
            if text.trim().is_empty() {
                continue;
            }
            let role = match message.role {
                ChatRole::System => {
                    system.push(text);
                    continue;
                }
                ChatRole::Assistant => ContentRole::Model,
                ChatRole::Human => ContentRole::User,
            };

            match contents.last_mut() {
                Some(last) if last.role == Some(role) => last.parts.push(Part::text(text)),
                _ => contents.push(Content::text(role, text)),
            }
        }

        let request = GenerateContentRequest::new(contents)
            .with_max_output_tokens(self.config.max_output_tokens);
        if system.is_empty() {
            request
        } else {
            request.with_system_instruction(system.join("\n\n"))
        }
    }

    #[cfg(test)]
    fn with_transport_for_tests(
        config: GeminiChatModelConfig,
        transport: Arc<dyn StreamTransport>,
    ) -> Self {
        Self { config, transport }
    }
}

impl std::fmt::Debug for GeminiChatModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiChatModel")
            .field("model", &self.config.model)
            .field("max_output_tokens", &self.config.max_output_tokens)
            .finish_non_exhaustive()
    }
}

impl ChatModel for GeminiChatModel {
    fn profile(&self) -> ModelProfile {
        ModelProfile {
            provider_id: GEMINI_PROVIDER_ID.to_string(),
            model_id: self.config.model.clone(),
        }
    }

    fn stream(
        &self,
        messages: &[ChatMessage],
        options: StreamOptions,
    ) -> Result<ChunkStream, ModelError> {
        let request = self.build_request(messages);
        debug!(
            model = %self.config.model,
            turns = request.contents.len(),
            max_output_tokens = self.config.max_output_tokens,
            "opening gemini stream"
        );

        let events = self
            .transport
            .open(self.config.model.clone(), request)
            .map_err(map_request_error)?;
        let include_usage = options.include_usage;
        Ok(Box::new(events.map(move |event| match event {
            Ok(GeminiStreamEvent::Chunk(chunk)) => Ok(to_chat_chunk(chunk, include_usage)),
            Ok(GeminiStreamEvent::Error { code, message }) => {
                Err(map_request_error(GeminiApiError::StreamFailed {
                    message: message
                        .or_else(|| code.clone())
                        .unwrap_or_else(|| "unknown stream error".to_string()),
                    code,
                }))
            }
            Err(error) => Err(map_request_error(error)),
        })))
    }
}

/// Installs the Gemini factory under [`GEMINI_SELECTOR`].
///
/// The factory resolves to no model while `base.api_key` is blank.
pub fn register_gemini(registry: &mut ModelRegistry, base: GeminiChatModelConfig) {
    registry.register(
        GEMINI_SELECTOR,
        move |meta: &Meta| -> Option<Arc<dyn ChatModel>> {
            if base.api_key.trim().is_empty() {
                warn!("GoogleGenerativeAI api_key is blank; no model resolved");
                return None;
            }

            match GeminiChatModel::new(base.clone().with_meta(meta)) {
                Ok(model) => Some(Arc::new(model)),
                Err(error) => {
                    warn!(%error, "Gemini model construction failed");
                    None
                }
            }
        },
    );
}

/// Usage totals are cumulative per chunk, so only the chunk that finishes
/// the candidate carries them.
fn to_chat_chunk(chunk: GenerateContentChunk, include_usage: bool) -> ChatChunk {
    let finish_reason = chunk.finish_reason().map(ToString::to_string);
    let usage = chunk
        .usage_metadata
        .filter(|_| include_usage && finish_reason.is_some())
        .map(|usage| Usage {
            input_tokens: usage.prompt_token_count,
            output_tokens: usage.candidates_token_count,
            total_tokens: usage.total_token_count,
        });

    ChatChunk {
        content: chunk.text(),
        id: chunk.response_id,
        usage,
        finish_reason,
    }
}

fn map_request_error(error: GeminiApiError) -> ModelError {
    ModelError::new(format!("Gemini request failed: {error}"))
}
