use std::collections::BTreeMap;

use crate::config::OpenAiApiConfig;
use crate::error::OpenAiApiError;

pub const HEADER_ACCEPT: &str = "accept";
pub const HEADER_CONTENT_TYPE: &str = "content-type";
pub const HEADER_AUTHORIZATION: &str = "authorization";
pub const HEADER_ORGANIZATION: &str = "openai-organization";
pub const HEADER_USER_AGENT: &str = "user-agent";

/// Build a deterministic header map for chat completion requests.
pub fn build_headers(
    config: &OpenAiApiConfig,
    user_agent: Option<&str>,
) -> Result<BTreeMap<String, String>, OpenAiApiError> {
    let mut headers = BTreeMap::new();

    if config.api_key.trim().is_empty() {
        return Err(OpenAiApiError::MissingApiKey);
    }

    headers.insert(
        HEADER_AUTHORIZATION.to_owned(),
        format!("Bearer {}", config.api_key.trim()),
    );
    headers.insert(HEADER_ACCEPT.to_owned(), "text/event-stream".to_owned());
    headers.insert(
        HEADER_CONTENT_TYPE.to_owned(),
        "application/json".to_owned(),
    );

    if let Some(organization) = config.organization.as_deref().and_then(sanitize_nonempty) {
        headers.insert(HEADER_ORGANIZATION.to_owned(), organization);
    }

    let ua = match (user_agent, config.user_agent.as_deref()) {
        (Some(explicit), _) if !explicit.trim().is_empty() => explicit.trim().to_owned(),
        (None, Some(explicit)) if !explicit.trim().is_empty() => explicit.trim().to_owned(),
        _ => default_user_agent(),
    };
    headers.insert(HEADER_USER_AGENT.to_owned(), ua);

    for (key, value) in &config.extra_headers {
        headers.insert(key.trim().to_ascii_lowercase(), value.trim().to_owned());
    }

    Ok(headers)
}

fn sanitize_nonempty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_owned())
    }
}

fn default_user_agent() -> String {
    format!(
        "ramble/{} ({}; {})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        normalize_arch(std::env::consts::ARCH)
    )
}

fn normalize_arch(arch: &str) -> String {
    match arch.to_ascii_lowercase().as_str() {
        "x86_64" | "amd64" => "x64".to_owned(),
        "x86" | "i386" | "i686" => "ia32".to_owned(),
        "aarch64" => "arm64".to_owned(),
        normalized => normalized.to_owned(),
    }
}
