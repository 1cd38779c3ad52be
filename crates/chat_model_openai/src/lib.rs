//! OpenAI-backed implementation of the shared `chat_model` contract.
//!
//! This adapter translates `openai_api` stream events into the pull-based
//! `ChatChunk` iterator expected by the transcript orchestrator. The async
//! transport runs on a worker thread and hands events over a rendezvous
//! channel, so the consumer's pace gates the network reads.

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chat_model::{
    ChatChunk, ChatMessage, ChatModel, ChatRole, ChunkStream, ContentPart, Meta, MetaValue,
    ModelError, ModelProfile, ModelRegistry, StreamOptions, Usage,
};
use openai_api::client::CancellationSignal;
use openai_api::payload::{RequestContentPart, RequestRole};
use openai_api::{
    ChatCompletionChunk, ChatCompletionRequest, OpenAiApiClient, OpenAiApiConfig, OpenAiApiError,
    OpenAiStreamEvent, RequestMessage,
};
use tracing::{debug, warn};

/// Stable provider identifier reported in model profiles.
pub const OPENAI_PROVIDER_ID: &str = "openai";

/// Transcript selector this adapter registers under.
pub const OPENAI_SELECTOR: &str = "OpenAI";

pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_TEMPERATURE: f64 = 0.0;

/// Runtime configuration for one OpenAI chat model.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenAiChatModelConfig {
    pub api_key: String,
    pub model: String,
    pub temperature: f64,
    pub base_url: Option<String>,
    pub timeout: Option<Duration>,
}

impl OpenAiChatModelConfig {
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
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
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
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

    /// Applies transcript metadata: a non-blank string `model` and a
    /// `temperature` given as a number or numeric string override the
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

        if let Some(temperature) = meta.get("temperature").and_then(MetaValue::to_number) {
            self.temperature = temperature;
        }

        self
    }

    fn to_api_config(&self) -> OpenAiApiConfig {
        let mut config = OpenAiApiConfig::new(self.api_key.clone());

        if let Some(base_url) = &self.base_url {
            config = config.with_base_url(base_url.clone());
        }

        if let Some(timeout) = self.timeout {
            config = config.with_timeout(timeout);
        }

        config
    }
}

type EventStream = Box<dyn Iterator<Item = Result<OpenAiStreamEvent, OpenAiApiError>> + Send>;

trait StreamTransport: Send + Sync {
    fn open(&self, request: ChatCompletionRequest) -> Result<EventStream, OpenAiApiError>;
}

#[derive(Debug)]
struct WorkerTransport {
    client: Arc<OpenAiApiClient>,
}

impl StreamTransport for WorkerTransport {
    fn open(&self, request: ChatCompletionRequest) -> Result<EventStream, OpenAiApiError> {
        // Surface request-shape and credential problems before spawning.
        let _ = self.client.build_request(&request)?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|error| {
                OpenAiApiError::Runtime(format!("failed to initialize tokio runtime: {error}"))
            })?;

        let (sender, receiver) = mpsc::sync_channel(0);
        let cancel: CancellationSignal = Arc::new(AtomicBool::new(false));
        let client = Arc::clone(&self.client);
        let worker_cancel = Arc::clone(&cancel);

        thread::Builder::new()
            .name("openai-stream".to_string())
            .spawn(move || {
                let outcome = runtime.block_on(client.stream_with_handler(
                    &request,
                    Some(&worker_cancel),
                    |event| match sender.send(Ok(event)) {
                        Ok(()) => ControlFlow::Continue(()),
                        Err(_) => ControlFlow::Break(()),
                    },
                ));

                match outcome {
                    Ok(true) => {}
                    Ok(false) => debug!("chat completion stream closed without [DONE]"),
                    Err(OpenAiApiError::Cancelled) => debug!("chat completion stream abandoned"),
                    Err(error) => {
                        warn!(%error, "chat completion stream failed");
                        let _ = sender.send(Err(error));
                    }
                }
            })
            .map_err(|error| {
                OpenAiApiError::Runtime(format!("failed to spawn stream worker: {error}"))
            })?;

        Ok(Box::new(ChannelEvents { receiver, cancel }))
    }
}

/// Receiving half of the worker hand-off. Dropping it cancels the transfer.
struct ChannelEvents {
    receiver: Receiver<Result<OpenAiStreamEvent, OpenAiApiError>>,
    cancel: CancellationSignal,
}

impl Iterator for ChannelEvents {
    type Item = Result<OpenAiStreamEvent, OpenAiApiError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.receiver.recv().ok()
    }
}

impl Drop for ChannelEvents {
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::Release);
    }
}

/// `ChatModel` adapter backed by `openai_api` transport primitives.
pub struct OpenAiChatModel {
    config: OpenAiChatModelConfig,
    transport: Arc<dyn StreamTransport>,
}

impl OpenAiChatModel {
    /// Creates a model using the real HTTP transport.
    pub fn new(config: OpenAiChatModelConfig) -> Result<Self, ModelError> {
        let client = OpenAiApiClient::new(config.to_api_config()).map_err(map_init_error)?;

        Ok(Self {
            config,
            transport: Arc::new(WorkerTransport {
                client: Arc::new(client),
            }),
        })
    }

    pub fn config(&self) -> &OpenAiChatModelConfig {
        &self.config
    }

    fn build_request(
        &self,
        messages: &[ChatMessage],
        options: StreamOptions,
    ) -> ChatCompletionRequest {
        let messages = messages.iter().map(to_request_message).collect();
        ChatCompletionRequest::new(self.config.model.clone(), messages)
            .with_temperature(self.config.temperature)
            .with_usage_reporting(options.include_usage)
    }

    #[cfg(test)]
    fn with_transport_for_tests(
        config: OpenAiChatModelConfig,
        transport: Arc<dyn StreamTransport>,
    ) -> Self {
        Self { config, transport }
    }
}

impl std::fmt::Debug for OpenAiChatModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiChatModel")
            .field("model", &self.config.model)
            .field("temperature", &self.config.temperature)
            .finish_non_exhaustive()
    }
}

impl ChatModel for OpenAiChatModel {
    fn profile(&self) -> ModelProfile {
        ModelProfile {
            provider_id: OPENAI_PROVIDER_ID.to_string(),
            model_id: self.config.model.clone(),
        }
    }

    fn stream(
        &self,
        messages: &[ChatMessage],
        options: StreamOptions,
    ) -> Result<ChunkStream, ModelError> {
        let request = self.build_request(messages, options);
        debug!(
            model = %request.model,
            messages = request.messages.len(),
            include_usage = options.include_usage,
            "opening chat completion stream"
        );

        let events = self.transport.open(request).map_err(map_request_error)?;
        Ok(Box::new(events.filter_map(|event| match event {
            Ok(OpenAiStreamEvent::Chunk(chunk)) => Some(Ok(to_chat_chunk(chunk))),
            Ok(OpenAiStreamEvent::Done) => None,
            Ok(OpenAiStreamEvent::Error { code, message }) => {
                Some(Err(map_request_error(OpenAiApiError::StreamFailed {
                    message: message
                        .or_else(|| code.clone())
                        .unwrap_or_else(|| "unknown stream error".to_string()),
                    code,
                })))
            }
            Err(error) => Some(Err(map_request_error(error))),
        })))
    }
}

/// Installs the OpenAI factory under [`OPENAI_SELECTOR`].
///
/// The factory resolves to no model while `base.api_key` is blank.
pub fn register_openai(registry: &mut ModelRegistry, base: OpenAiChatModelConfig) {
    registry.register(
        OPENAI_SELECTOR,
        move |meta: &Meta| -> Option<Arc<dyn ChatModel>> {
            if base.api_key.trim().is_empty() {
                warn!("OpenAI api_key is blank; no model resolved");
                return None;
            }

            match OpenAiChatModel::new(base.clone().with_meta(meta)) {
                Ok(model) => Some(Arc::new(model)),
                Err(error) => {
                    warn!(%error, "OpenAI model construction failed");
                    None
                }
            }
        },
    );
}

fn to_request_message(message: &ChatMessage) -> RequestMessage {
    let role = match message.role {
        ChatRole::System => RequestRole::System,
        ChatRole::Assistant => RequestRole::Assistant,
        ChatRole::Human => RequestRole::User,
    };
    let content = message
        .content
        .iter()
        .map(|part| match part {
            ContentPart::Text { text } => RequestContentPart::Text { text: text.clone() },
        })
        .collect();

    RequestMessage { role, content }
}

fn to_chat_chunk(chunk: ChatCompletionChunk) -> ChatChunk {
    ChatChunk {
        content: chunk.delta_text().to_string(),
        finish_reason: chunk.finish_reason().map(ToString::to_string),
        usage: chunk.usage.map(|usage| Usage {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        }),
        id: chunk.id,
    }
}

fn map_init_error(error: OpenAiApiError) -> ModelError {
    ModelError::new(format!("failed to initialize OpenAI client: {error}"))
}

fn map_request_error(error: OpenAiApiError) -> ModelError {
    ModelError::new(format!("OpenAI request failed: {error}"))
}
