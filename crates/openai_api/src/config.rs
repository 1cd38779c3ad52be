use std::collections::BTreeMap;
use std::time::Duration;

use crate::url::DEFAULT_OPENAI_BASE_URL;

/// Transport configuration for OpenAI API requests.
#[derive(Debug, Clone)]
pub struct OpenAiApiConfig {
    /// Bearer key passed to `Authorization`.
    pub api_key: String,
    /// Base URL for API endpoints.
    pub base_url: String,
    /// Optional `OpenAI-Organization` header value.
    pub organization: Option<String>,
    /// Optional `User-Agent` override.
    pub user_agent: Option<String>,
    /// Additional headers merged into request headers.
    pub extra_headers: BTreeMap<String, String>,
    /// Optional request timeout.
    pub timeout: Option<Duration>,
}

impl Default for OpenAiApiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            organization: None,
            user_agent: None,
            extra_headers: BTreeMap::new(),
            timeout: None,
        }
    }
}

impl OpenAiApiConfig {
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

    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
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

    pub fn insert_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.insert(key.into(), value.into());
        self
    }
}
