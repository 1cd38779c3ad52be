
use std::fs;
use std::sync::Arc;

use chat_model_mock::ScriptedModel;
use pretty_assertions::assert_eq;
use ramble::document::{self, FileBuffer, MemoryBuffer, TextBuffer};
use ramble::{parse, ChatError, DocumentError, FormatError, Llm, Message, ModelRegistry, Role};

fn registry_with(model: &Arc<ScriptedModel>) -> ModelRegistry {
    ModelRegistry::new().with("OpenAI", ScriptedModel::factory(model))
}

fn strings(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|line| line.to_string()).collect()
}

#[test]
fn chat_appends_reply_and_next_user_turn() {
    let model = Arc::new(ScriptedModel::new(strings(&["Hello", " world"])));
    let mut buffer = MemoryBuffer::from_text("## user\n\nSay hello\n\n\n");

    let reply = document::chat(&mut buffer, &registry_with(&model)).expect("chat succeeds");

    assert_eq!(reply.as_deref(), Some("Hello world"));
    assert_eq!(
        buffer.lines(),
        strings(&[
            "## user", "", "Say hello", "", "", "assistant", "---", "", "Hello world", "", "",
            "user", "---", "", "",
        ])
    );

    let transcript = parse(&buffer.text()).expect("buffer stays parseable");
    assert_eq!(
        transcript.messages,
        vec![
            Message::user("Say hello"),
            Message::assistant("Hello world"),
            Message::user(""),
        ]
    );
}

#[test]
fn multi_line_reply_renders_line_by_line() {
    let model = Arc::new(ScriptedModel::from_text("First line\n\nSecond line\n"));
    let mut buffer = MemoryBuffer::from_text("user\n---\n\nTwo lines please");

    document::chat(&mut buffer, &registry_with(&model)).expect("chat succeeds");

    let lines = buffer.lines();
    assert_eq!(
        &lines[6..12],
        &strings(&["assistant", "---", "", "First line", "", "Second line"])[..]
    );
}

#[test]
fn stream_failure_leaves_partial_reply() {
    let model = Arc::new(
        ScriptedModel::new(strings(&["Hel", "lo", " world"])).failing_after(1, "connection reset"),
    );
    let mut buffer = MemoryBuffer::from_text("## user\n\nSay hello");

    let error = document::chat(&mut buffer, &registry_with(&model)).expect_err("stream fails");

    assert!(matches!(error, DocumentError::Chat(ChatError::Model(_))));
    assert_eq!(
        buffer.lines(),
        strings(&["## user", "", "Say hello", "", "", "assistant", "---", "", "Hel"])
    );
}

#[test]
fn parse_error_leaves_buffer_untouched() {
    let model = Arc::new(ScriptedModel::new(strings(&["unused"])));
    let original = "## narrator\n\nOnce upon a time";
    let mut buffer = MemoryBuffer::from_text(original);

    let error = document::chat(&mut buffer, &registry_with(&model)).expect_err("bad role");

    assert!(matches!(
        error,
        DocumentError::Format(FormatError::UnknownRole { .. })
    ));
    assert_eq!(buffer.text(), original);
    assert_eq!(model.calls(), 0);

    assert!(document::format(&mut buffer).is_err());
    assert!(document::append(&mut buffer, "more").is_err());
    assert_eq!(buffer.text(), original);
}

#[test]
fn unresolved_selector_leaves_buffer_untouched() {
    let model = Arc::new(ScriptedModel::new(strings(&["unused"])));
    let original = "---\nllm: GoogleGenerativeAI\n---\n\n## user\n\nHi";
    let mut buffer = MemoryBuffer::from_text(original);

    let reply = document::chat(&mut buffer, &registry_with(&model)).expect("no-op");

    assert_eq!(reply, None);
    assert_eq!(buffer.text(), original);
    assert_eq!(model.calls(), 0);
}

#[test]
fn format_rewrites_to_canonical_form() {
    let mut buffer = MemoryBuffer::from_text(&fixture::read_fixture("transcript_messy.md"));

    document::format(&mut buffer).expect("format succeeds");

    assert_eq!(
        buffer.lines(),
        fixture::read_lines("transcript_messy.formatted.md")
    );
}

#[test]
fn file_session_open_append_chat() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("session.md");
    let model = Arc::new(ScriptedModel::new(strings(&["4"])));

    let mut buffer = FileBuffer::open(&path).expect("missing file opens empty");
    document::open(&mut buffer, Llm::OpenAI, &["Answer with a number.".to_string()])
        .expect("open succeeds");
    document::append(&mut buffer, "What is 2+2?").expect("append succeeds");

    let mut reopened = FileBuffer::open(&path).expect("file written");
    let reply = document::chat(&mut reopened, &registry_with(&model)).expect("chat succeeds");
    assert_eq!(reply.as_deref(), Some("4"));

    let transcript =
        parse(&fs::read_to_string(&path).expect("file readable")).expect("file stays parseable");
    let roles = transcript
        .messages
        .iter()
        .map(|message| message.role)
        .collect::<Vec<_>>();
    assert_eq!(
        roles,
        vec![Role::System, Role::User, Role::User, Role::Assistant, Role::User]
    );
    assert_eq!(transcript.messages[2].text, "What is 2+2?");
    assert_eq!(transcript.messages[3].text, "4");

    let request = &model.requests()[0];
    assert_eq!(request.messages.len(), 3);
}
