/// Default base URL for the Generative Language API.
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const MODELS_SEGMENT: &str = "models/";

/// Streaming endpoint for `model` under `base_url`.
///
/// A blank base falls back to [`DEFAULT_GEMINI_BASE_URL`]. A `models/` prefix
/// on the model name is accepted and not doubled.
pub fn stream_generate_content_url(base_url: &str, model: &str) -> String {
    let base = match base_url.trim() {
        "" => DEFAULT_GEMINI_BASE_URL,
        trimmed => trimmed,
    };
    let base = base.trim_end_matches('/');
    let base = base.strip_suffix("/models").unwrap_or(base);

    let model = model.trim();
    let model = model.strip_prefix(MODELS_SEGMENT).unwrap_or(model);

    format!("{base}/{MODELS_SEGMENT}{model}:streamGenerateContent?alt=sse")
}
