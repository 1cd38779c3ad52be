use openai_api::headers::{
    build_headers, HEADER_ACCEPT, HEADER_AUTHORIZATION, HEADER_CONTENT_TYPE, HEADER_ORGANIZATION,
    HEADER_USER_AGENT,
};
use openai_api::{OpenAiApiConfig, OpenAiApiError};

#[test]
fn header_map_contains_chat_completion_headers() {
    let config = OpenAiApiConfig::new(" sk-test ")
        .with_organization("org-7")
        .insert_header("X-Extra", "value");

    let headers = build_headers(&config, None).expect("header construction");
    assert_eq!(
        headers.get(HEADER_AUTHORIZATION).expect("authorization"),
        "Bearer sk-test"
    );
    assert_eq!(
        headers.get(HEADER_ACCEPT).expect("accept"),
        "text/event-stream"
    );
    assert_eq!(
        headers.get(HEADER_CONTENT_TYPE).expect("content-type"),
        "application/json"
    );
    assert_eq!(
        headers.get(HEADER_ORGANIZATION).expect("organization"),
        "org-7"
    );
    assert_eq!(headers.get("x-extra").expect("custom"), "value");
    assert!(headers
        .get(HEADER_USER_AGENT)
        .expect("default user-agent")
        .starts_with("ramble/"));
}

#[test]
fn header_map_prefers_explicit_user_agent() {
    let config = OpenAiApiConfig::new("sk-test").with_user_agent("configured-agent");

    let headers = build_headers(&config, Some("test-agent")).expect("header construction");
    assert_eq!(
        headers.get(HEADER_USER_AGENT).expect("user-agent"),
        "test-agent"
    );

    let headers = build_headers(&config, None).expect("header construction");
    assert_eq!(
        headers.get(HEADER_USER_AGENT).expect("user-agent"),
        "configured-agent"
    );
}

#[test]
fn header_map_requires_api_key() {
    let error = build_headers(&OpenAiApiConfig::new("   "), None)
        .expect_err("blank key must be rejected");
    assert!(matches!(error, OpenAiApiError::MissingApiKey));
}

#[test]
fn header_map_skips_blank_organization() {
    let config = OpenAiApiConfig::new("sk-test").with_organization(" ");
    let headers = build_headers(&config, None).expect("header construction");
    assert!(!headers.contains_key(HEADER_ORGANIZATION));
}
