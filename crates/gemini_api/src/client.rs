use std::future::Future;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, Response};

use crate::config::GeminiApiConfig;
use crate::error::{parse_error_message, GeminiApiError};
use crate::events::GeminiStreamEvent;
use crate::payload::GenerateContentRequest;
use crate::sse::GeminiSseParser;
use crate::url::stream_generate_content_url;

pub const HEADER_API_KEY: &str = "x-goog-api-key";

/// Set to `true` to stop an in-flight request or stream.
pub type CancellationSignal = Arc<AtomicBool>;

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug)]
pub struct GeminiApiClient {
    http: Client,
    config: GeminiApiConfig,
}

impl GeminiApiClient {
    pub fn new(config: GeminiApiConfig) -> Result<Self, GeminiApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
            config,
        })
    }

    pub fn config(&self) -> &GeminiApiConfig {
        &self.config
    }

    pub fn endpoint(&self, model: &str) -> String {
        stream_generate_content_url(&self.config.base_url, model)
    }

    pub fn build_headers(&self) -> Result<HeaderMap, GeminiApiError> {
        let api_key = self.config.api_key.trim();
        if api_key.is_empty() {
            return Err(GeminiApiError::MissingApiKey);
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            HEADER_API_KEY,
            HeaderValue::from_str(api_key)
                .map_err(|_| GeminiApiError::InvalidHeader(HEADER_API_KEY.to_string()))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let user_agent = self
            .config
            .user_agent
            .as_deref()
            .map(str::trim)
            .filter(|agent| !agent.is_empty())
            .map(ToString::to_string)
            .unwrap_or_else(|| format!("ramble/{}", env!("CARGO_PKG_VERSION")));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&user_agent)
                .map_err(|_| GeminiApiError::InvalidHeader("user-agent".to_string()))?,
        );

        Ok(headers)
    }

    pub fn build_request(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<reqwest::RequestBuilder, GeminiApiError> {
        if model.trim().is_empty() {
            return Err(GeminiApiError::InvalidRequest(
                "model must not be empty".to_string(),
            ));
        }
        if request.contents.is_empty() {
            return Err(GeminiApiError::InvalidRequest(
                "'contents' must contain at least one turn".to_string(),
            ));
        }

        Ok(self
            .http
            .post(self.endpoint(model))
            .headers(self.build_headers()?)
            .json(request))
    }

    /// Sends one request. Non-success statuses surface as [`GeminiApiError::Status`].
    pub async fn send(
        &self,
        model: &str,
        request: &GenerateContentRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<Response, GeminiApiError> {
        if is_cancelled(cancellation) {
            return Err(GeminiApiError::Cancelled);
        }

        let pending = self.build_request(model, request)?.send();
        let response = await_or_cancel(pending, cancellation).await??;
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = await_or_cancel(response.text(), cancellation)
            .await?
            .unwrap_or_default();
        Err(GeminiApiError::Status(
            status,
            parse_error_message(status, &body),
        ))
    }

    /// Streams a generation, handing each chunk to `on_chunk` in arrival order.
    ///
    /// Returns the number of chunks delivered. An error frame fails the stream
    /// and a handler that breaks yields [`GeminiApiError::Cancelled`].
    pub async fn stream_with_handler<F>(
        &self,
        model: &str,
        request: &GenerateContentRequest,
        cancellation: Option<&CancellationSignal>,
        mut on_event: F,
    ) -> Result<usize, GeminiApiError>
    where
        F: FnMut(GeminiStreamEvent) -> ControlFlow<()>,
    {
        let response = self.send(model, request, cancellation).await?;
        let mut bytes = response.bytes_stream();
        let mut parser = GeminiSseParser::default();
        let mut delivered = 0;

        while let Some(chunk) = await_or_cancel(bytes.next(), cancellation).await? {
            let chunk = chunk?;
            for event in parser.feed(&chunk) {
                if let GeminiStreamEvent::Error { code, message } = event {
                    return Err(GeminiApiError::StreamFailed {
                        message: message
                            .or_else(|| code.clone())
                            .unwrap_or_else(|| "unknown stream error".to_string()),
                        code,
                    });
                }
                if on_event(event).is_break() {
                    return Err(GeminiApiError::Cancelled);
                }
                delivered += 1;
            }
        }

        if is_cancelled(cancellation) {
            return Err(GeminiApiError::Cancelled);
        }
        Ok(delivered)
    }
}

fn is_cancelled(cancellation: Option<&CancellationSignal>) -> bool {
    cancellation.is_some_and(|signal| signal.load(Ordering::Acquire))
}

async fn await_or_cancel<F>(
    future: F,
    cancellation: Option<&CancellationSignal>,
) -> Result<F::Output, GeminiApiError>
where
    F: Future,
{
    let Some(signal) = cancellation else {
        return Ok(future.await);
    };

    let mut future = Box::pin(future);
    loop {
        if signal.load(Ordering::Acquire) {
            return Err(GeminiApiError::Cancelled);
        }
        if let Ok(output) = tokio::time::timeout(CANCEL_POLL_INTERVAL, &mut future).await {
            return Ok(output);
        }
    }
}
