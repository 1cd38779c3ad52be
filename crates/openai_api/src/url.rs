/// Default base URL for OpenAI API requests.
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

const CHAT_COMPLETIONS_PATH: &str = "/chat/completions";

/// Normalize a base URL to the chat completions endpoint.
///
/// Normalization rules:
/// 1) blank input falls back to [`DEFAULT_OPENAI_BASE_URL`]
/// 2) keep `/chat/completions` unchanged
/// 3) append `/chat/completions` otherwise
pub fn normalize_chat_completions_url(input: &str) -> String {
    let base = if input.trim().is_empty() {
        DEFAULT_OPENAI_BASE_URL
    } else {
        input.trim()
    };

    let trimmed = base.trim_end_matches('/');
    if trimmed.ends_with(CHAT_COMPLETIONS_PATH) {
        return trimmed.to_string();
    }
    format!("{trimmed}{CHAT_COMPLETIONS_PATH}")
}
