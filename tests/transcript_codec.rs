
use pretty_assertions::assert_eq;
use ramble::{
    message_to_string_list, parse, to_string_list, ContentKind, FormatError, Llm, Message, Meta,
    MetaValue, Transcript,
};

fn reparse(transcript: &Transcript) -> Transcript {
    parse(&to_string_list(transcript).join("\n")).expect("rendered transcript parses")
}

#[test]
fn messy_document_formats_to_golden() {
    let transcript = parse(&fixture::read_fixture("transcript_messy.md")).expect("fixture parses");

    assert_eq!(
        to_string_list(&transcript),
        fixture::read_lines("transcript_messy.formatted.md")
    );
}

#[test]
fn formatted_golden_is_a_fixed_point() {
    let messy = parse(&fixture::read_fixture("transcript_messy.md")).expect("fixture parses");
    let formatted =
        parse(&fixture::read_fixture("transcript_messy.formatted.md")).expect("golden parses");

    assert_eq!(formatted, messy.canonical());
    assert_eq!(
        formatted.messages.last().map(|message| message.content_kind),
        Some(ContentKind::ImageUrl)
    );
}

#[test]
fn system_and_user_round_trip_exactly() {
    let transcript = Transcript::new(Llm::OpenAI)
        .with_message(Message::system("Be terse"))
        .with_message(Message::user("Hi"));

    assert_eq!(reparse(&transcript), transcript);
}

#[test]
fn round_trip_keeps_selector_meta_and_kinds() {
    let transcript = Transcript::new(Llm::GoogleGenerativeAI)
        .with_meta("temperature", 0.7)
        .with_meta("max_tokens", 2048.0)
        .with_meta("stream", false)
        .with_meta("version", "1.0")
        .with_meta("label", "")
        .with_message(Message::system("Answer in French.\n\nKeep it short."))
        .with_message(Message::user("https://example.com/a.png").with_content_kind(ContentKind::ImageUrl))
        .with_message(Message::assistant("```\n## inside a fence\n```"))
        .with_message(Message::user("  padded  "));

    assert_eq!(reparse(&transcript), transcript.canonical());
}

#[test]
fn unknown_role_is_rejected() {
    let error = parse("## narrator\n\nOnce upon a time").expect_err("narrator is not a role");

    assert!(matches!(
        error,
        FormatError::UnknownRole { ref role, .. } if role == "narrator"
    ));
}

#[test]
fn unknown_content_kind_is_rejected() {
    let error = parse("## user:audio\n\nhello").expect_err("audio is not a content kind");
    assert!(matches!(error, FormatError::UnknownContentKind { .. }));
}

#[test]
fn leading_paragraph_alone_yields_no_messages() {
    let transcript = parse("Just some notes.\n\nNothing else here.").expect("valid document");

    assert!(transcript.messages.is_empty());
    assert_eq!(transcript.selector, Llm::OpenAI);
    assert!(transcript.meta.is_empty());
}

#[test]
fn front_matter_keeps_only_scalar_fields() {
    let raw = "---\nllm: OpenAI\ntemperature: 0.2\nnote: x\nnested:\n  a: 1\n---\n\n## user\n\nHi";
    let transcript = parse(raw).expect("valid document");

    let mut expected = Meta::new();
    expected.insert("temperature".to_string(), MetaValue::Number(0.2));
    expected.insert("note".to_string(), MetaValue::String("x".to_string()));
    assert_eq!(transcript.meta, expected);
    assert_eq!(transcript.selector, Llm::OpenAI);
}

#[test]
fn unknown_llm_falls_back_to_default_selector() {
    let transcript = parse("---\nllm: Claude\n---\n## user\nHi").expect("valid document");

    assert_eq!(transcript.selector, Llm::OpenAI);
    assert!(!transcript.meta.contains_key("llm"));
}

#[test]
fn malformed_front_matter_is_rejected() {
    assert!(matches!(
        parse("---\nllm: OpenAI\n\n## user\nHi"),
        Err(FormatError::UnterminatedFrontMatter)
    ));
    assert!(matches!(
        parse("---\n- a\n- b\n---\n## user\nHi"),
        Err(FormatError::InvalidFrontMatter { .. })
    ));
}

#[test]
fn message_lines_trim_body_once() {
    assert_eq!(
        message_to_string_list(&Message::user("  line1\nline2  ")),
        vec!["user", "---", "", "line1", "line2"]
    );
}
