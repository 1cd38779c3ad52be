use openai_api::normalize_chat_completions_url;
use openai_api::url::DEFAULT_OPENAI_BASE_URL;

#[test]
fn url_normalization_keeps_existing_chat_completions_endpoint() {
    assert_eq!(
        normalize_chat_completions_url("https://api.openai.com/v1/chat/completions/"),
        "https://api.openai.com/v1/chat/completions"
    );
}

#[test]
fn url_normalization_appends_chat_completions_to_base() {
    assert_eq!(
        normalize_chat_completions_url("http://localhost:8080/v1/"),
        "http://localhost:8080/v1/chat/completions"
    );
}

#[test]
fn url_normalization_uses_default_base_when_blank() {
    assert_eq!(
        normalize_chat_completions_url("  "),
        format!("{DEFAULT_OPENAI_BASE_URL}/chat/completions")
    );
}
