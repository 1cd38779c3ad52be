use std::fmt;

use reqwest::StatusCode;
use serde_json::{Error as JsonError, Value};

#[derive(Debug)]
pub enum GeminiApiError {
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

impl fmt::Display for GeminiApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingApiKey => write!(f, "API key is required"),
            Self::InvalidHeader(message) => write!(f, "invalid header: {message}"),
            Self::InvalidRequest(message) => write!(f, "invalid request payload: {message}"),
            Self::Request(error) => write!(f, "request error: {error}"),
            Self::Status(status, message) => write!(f, "HTTP {status} {message}"),
            Self::Serde(error) => write!(f, "serialization error: {error}"),
            Self::StreamFailed {
                code: Some(code),
                message,
            } => write!(f, "stream failed ({code}): {message}"),
            Self::StreamFailed {
                code: None,
                message,
            } => write!(f, "stream failed: {message}"),
            Self::Cancelled => write!(f, "request was cancelled"),
            Self::Runtime(message) => write!(f, "runtime failure: {message}"),
        }
    }
}

impl std::error::Error for GeminiApiError {}

impl From<reqwest::Error> for GeminiApiError {
    fn from(error: reqwest::Error) -> Self {
        Self::Request(error)
    }
}

impl From<JsonError> for GeminiApiError {
    fn from(error: JsonError) -> Self {
        Self::Serde(error)
    }
}

/// `(status, message)` of a Google API error object, either bare
/// (`{"error": {...}}`) or wrapped in the array the streaming endpoint uses.
pub(crate) fn error_fields(value: &Value) -> Option<(Option<String>, Option<String>)> {
    let error = match value {
        Value::Array(items) => items.first()?.get("error")?,
        other => other.get("error")?,
    };

    let code = error
        .get("status")
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .or_else(|| error.get("code").map(|code| code.to_string()));
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .filter(|message| !message.trim().is_empty())
        .map(ToString::to_string);

    Some((code, message))
}

/// Extracts a human-readable message from an error response body.
pub fn parse_error_message(status: StatusCode, body: &str) -> String {
    let parsed = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| error_fields(&value))
        .and_then(|(code, message)| message.or(code));

    match parsed {
        Some(message) => message,
        None if body.trim().is_empty() => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
        None => body.to_string(),
    }
}
