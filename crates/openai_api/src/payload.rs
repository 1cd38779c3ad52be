use serde::{Deserialize, Serialize};

/// Request payload for the chat completions endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<RequestMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Default: true.
    #[serde(default = "default_true")]
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_options: Option<RequestStreamOptions>,
}

fn default_true() -> bool {
    true
}

impl ChatCompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<RequestMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            stream: true,
            stream_options: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_usage_reporting(mut self, include_usage: bool) -> Self {
        self.stream_options = include_usage.then_some(RequestStreamOptions {
            include_usage: true,
        });
        self
    }
}

/// One message in the request history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMessage {
    pub role: RequestRole,
    pub content: Vec<RequestContentPart>,
}

impl RequestMessage {
    pub fn text(role: RequestRole, text: impl Into<String>) -> Self {
        Self {
            role,
            content: vec![RequestContentPart::Text { text: text.into() }],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestRole {
    System,
    Assistant,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RequestContentPart {
    Text { text: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestStreamOptions {
    pub include_usage: bool,
}
