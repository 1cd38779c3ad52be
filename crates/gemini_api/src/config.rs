use std::time::Duration;

use crate::url::DEFAULT_GEMINI_BASE_URL;

/// Transport configuration for Gemini requests.
#[derive(Debug, Clone)]
pub struct GeminiApiConfig {
    /// Sent as `x-goog-api-key`.
    pub api_key: String,
    pub base_url: String,
    pub user_agent: Option<String>,
    pub timeout: Option<Duration>,
}

impl Default for GeminiApiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            user_agent: None,
            timeout: None,
        }
    }
}

impl GeminiApiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
