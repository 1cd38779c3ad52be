use std::fmt;

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Error as JsonError;

#[derive(Debug)]
pub enum OpenAiApiError {
    MissingApiKey,
    InvalidHeader(String),
    InvalidRequest(String),
    Request(reqwest::Error),
    Status(StatusCode, String),
    Serde(JsonError),
    StreamFailed {
        code: Option<String>,
        message: String,
    },
    Cancelled,
    Runtime(String),
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorPayload {
    #[serde(rename = "error")]
    pub value: Option<ErrorPayloadFields>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorPayloadFields {
    pub message: Option<String>,
    pub code: Option<String>,
    #[serde(rename = "type")]
    pub type_: Option<String>,
}

impl ErrorPayloadFields {
    pub fn message_or_fallback(&self) -> Option<String> {
        let explicit = self
            .message
            .as_deref()
            .and_then(non_empty_string)
            .or_else(|| self.code.as_deref().and_then(non_empty_string))
            .or_else(|| self.type_.as_deref().and_then(non_empty_string))?;
        Some(explicit.to_owned())
    }
}

impl fmt::Display for OpenAiApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingApiKey => write!(f, "API key is required"),
            Self::InvalidHeader(message) => write!(f, "invalid header: {message}"),
            Self::InvalidRequest(message) => write!(f, "invalid request payload: {message}"),
            Self::Request(error) => write!(f, "request error: {error}"),
            Self::Status(status, message) => write!(f, "HTTP {status} {message}"),
            Self::Serde(error) => write!(f, "serialization error: {error}"),
            Self::StreamFailed { code, message } => match code {
                Some(code) if !code.trim().is_empty() => {
                    write!(f, "stream failed ({code}): {message}")
                }
                _ => write!(f, "stream failed: {message}"),
            },
            Self::Cancelled => write!(f, "request was cancelled"),
            Self::Runtime(message) => write!(f, "runtime failure: {message}"),
        }
    }
}

impl std::error::Error for OpenAiApiError {}

impl From<reqwest::Error> for OpenAiApiError {
    fn from(error: reqwest::Error) -> Self {
        Self::Request(error)
    }
}

impl From<JsonError> for OpenAiApiError {
    fn from(error: JsonError) -> Self {
        Self::Serde(error)
    }
}

/// Extracts a human-readable message from an error response body.
pub fn parse_error_message(status: StatusCode, body: &str) -> String {
    let fallback = || {
        if body.is_empty() {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        } else {
            body.to_string()
        }
    };

    match serde_json::from_str::<ErrorPayload>(body) {
        Ok(ErrorPayload { value: Some(error) }) => {
            error.message_or_fallback().unwrap_or_else(fallback)
        }
        _ => fallback(),
    }
}

fn non_empty_string(value: &str) -> Option<&str> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
