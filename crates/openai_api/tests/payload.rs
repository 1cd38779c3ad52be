use openai_api::payload::{RequestRole, RequestStreamOptions};
use openai_api::{ChatCompletionRequest, RequestMessage};
use serde_json::json;

#[test]
fn payload_serializes_messages_as_text_parts() {
    let request = ChatCompletionRequest::new(
        "gpt-4o",
        vec![
            RequestMessage::text(RequestRole::System, "be brief"),
            RequestMessage::text(RequestRole::User, "hello"),
            RequestMessage::text(RequestRole::Assistant, "hi"),
        ],
    )
    .with_temperature(0.0);

    let value = serde_json::to_value(&request).expect("serialize request");
    assert_eq!(
        value,
        json!({
            "model": "gpt-4o",
            "messages": [
                {"role": "system", "content": [{"type": "text", "text": "be brief"}]},
                {"role": "user", "content": [{"type": "text", "text": "hello"}]},
                {"role": "assistant", "content": [{"type": "text", "text": "hi"}]},
            ],
            "temperature": 0.0,
            "stream": true,
        })
    );
}

#[test]
fn payload_includes_stream_options_only_when_usage_requested() {
    let base = ChatCompletionRequest::new("m", vec![RequestMessage::text(RequestRole::User, "q")]);

    let with_usage = base.clone().with_usage_reporting(true);
    assert_eq!(
        with_usage.stream_options,
        Some(RequestStreamOptions {
            include_usage: true
        })
    );
    let value = serde_json::to_value(&with_usage).expect("serialize request");
    assert_eq!(value["stream_options"], json!({"include_usage": true}));

    let without = serde_json::to_value(base.with_usage_reporting(false)).expect("serialize");
    assert!(without.get("stream_options").is_none());
    assert!(without.get("temperature").is_none());
}

#[test]
fn payload_deserializes_with_stream_defaulting_to_true() {
    let request: ChatCompletionRequest = serde_json::from_value(json!({
        "model": "m",
        "messages": [{"role": "user", "content": [{"type": "text", "text": "q"}]}],
    }))
    .expect("deserialize request");

    assert!(request.stream);
    assert_eq!(
        request.messages,
        vec![RequestMessage::text(RequestRole::User, "q")]
    );
}
