use serde_yaml::Value;

use super::{ContentKind, Llm, Message, MetaValue, Transcript};

const FENCE: &str = "---";

/// Renders a transcript as document lines: front matter, then every message
/// followed by two blank lines.
pub fn to_string_list(transcript: &Transcript) -> Vec<String> {
    let mut lines = vec![
        FENCE.to_string(),
        format!("{}: {}", Llm::FRONT_MATTER_KEY, transcript.selector),
    ];
    lines.extend(
        transcript
            .meta
            .iter()
            .map(|(key, value)| format!("{}: {}", yaml_string(key), yaml_value(value))),
    );
    lines.push(FENCE.to_string());
    lines.push(String::new());

    for message in &transcript.messages {
        lines.extend(message_to_string_list(message));
        lines.push(String::new());
        lines.push(String::new());
    }

    lines
}

/// Renders one message as a setext heading, a blank line and its trimmed body.
pub fn message_to_string_list(message: &Message) -> Vec<String> {
    let heading = match message.content_kind {
        ContentKind::Text => message.role.as_str().to_string(),
        kind => format!("{}:{}", message.role, kind),
    };

    let mut lines = vec![heading, FENCE.to_string(), String::new()];
    lines.extend(message.text.trim().split('\n').map(str::to_string));
    lines
}

fn yaml_value(value: &MetaValue) -> String {
    match value {
        MetaValue::String(text) => yaml_string(text),
        MetaValue::Bool(flag) => flag.to_string(),
        MetaValue::Number(number) if number.is_nan() => ".nan".to_string(),
        MetaValue::Number(number) if number.is_infinite() => {
            let sign = if number.is_sign_negative() { "-" } else { "" };
            format!("{sign}.inf")
        }
        MetaValue::Number(number) => number.to_string(),
    }
}

/// Writes `text` plain when YAML reads it back unchanged, double-quoted otherwise.
fn yaml_string(text: &str) -> String {
    let reads_back = !text.contains('\n')
        && matches!(
            serde_yaml::from_str::<Value>(text),
            Ok(Value::String(parsed)) if parsed == text
        );

    if reads_back {
        text.to_string()
    } else {
        serde_json::Value::String(text.to_string()).to_string()
    }
}
