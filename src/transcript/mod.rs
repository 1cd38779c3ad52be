//! Markdown chat transcript codec.
//!
//! A transcript document is an optional YAML front-matter block followed by
//! level-2 `role[:content_kind]` headings, each opening one message:
//!
//! ```text
//! ---
//! llm: OpenAI
//! temperature: 0.2
//! ---
//!
//! system
//! ---
//!
//! Be terse.
//!
//!
//! user
//! ---
//!
//! Hi
//! ```
//!
//! [`parse`] reads such a document and [`to_string_list`] writes one back.
//! Writing trims every message body once as a whole, so
//! `parse(to_string_list(t).join("\n"))` equals [`Transcript::canonical`].

mod error;
mod front_matter;
mod parse;
mod render;

use std::fmt;

pub use chat_model::{Meta, MetaValue};

pub use self::error::FormatError;
pub use self::parse::parse;
pub use self::render::{message_to_string_list, to_string_list};

/// Speaker of one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    System,
    Assistant,
    User,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::System, Role::Assistant, Role::User];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::Assistant => "assistant",
            Role::User => "user",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.as_str() == label)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a message body is meant to be read.
///
/// `ImageUrl` round-trips through the document but is sent to models as plain
/// text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ContentKind {
    #[default]
    Text,
    ImageUrl,
}

impl ContentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentKind::Text => "text",
            ContentKind::ImageUrl => "image_url",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        [ContentKind::Text, ContentKind::ImageUrl]
            .into_iter()
            .find(|kind| kind.as_str() == label)
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content_kind: ContentKind,
    pub text: String,
}

impl Message {
    #[must_use]
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content_kind: ContentKind::Text,
            text: text.into(),
        }
    }

    #[must_use]
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, text)
    }

    #[must_use]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    #[must_use]
    pub fn with_content_kind(mut self, content_kind: ContentKind) -> Self {
        self.content_kind = content_kind;
        self
    }
}

/// Model provider a transcript targets, named by the front-matter `llm` key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Llm {
    #[default]
    OpenAI,
    GoogleGenerativeAI,
}

impl Llm {
    pub const ALL: [Llm; 2] = [Llm::OpenAI, Llm::GoogleGenerativeAI];

    /// Front-matter key holding the selector. Never present in [`Meta`].
    pub const FRONT_MATTER_KEY: &'static str = "llm";

    pub fn as_str(self) -> &'static str {
        match self {
            Llm::OpenAI => "OpenAI",
            Llm::GoogleGenerativeAI => "GoogleGenerativeAI",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|llm| llm.as_str() == name)
    }
}

impl fmt::Display for Llm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Llm {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::from_name(value).ok_or_else(|| {
            let known = Self::ALL.map(Llm::as_str).join(", ");
            format!("unknown llm '{value}'; expected one of {known}")
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcript {
    pub selector: Llm,
    pub messages: Vec<Message>,
    pub meta: Meta,
}

impl Transcript {
    #[must_use]
    pub fn new(selector: Llm) -> Self {
        Self {
            selector,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// True when the last message is a user turn awaiting a reply.
    pub fn awaits_reply(&self) -> bool {
        self.messages
            .last()
            .is_some_and(|message| message.role == Role::User)
    }

    /// The transcript as it reads back after a write: every body trimmed.
    #[must_use]
    pub fn canonical(&self) -> Self {
        Self {
            selector: self.selector,
            meta: self.meta.clone(),
            messages: self
                .messages
                .iter()
                .map(|message| Message {
                    text: message.text.trim().to_string(),
                    ..message.clone()
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_round_trip_through_lookup() {
        for role in Role::ALL {
            assert_eq!(Role::from_label(role.as_str()), Some(role));
        }
        for llm in Llm::ALL {
            assert_eq!(llm.as_str().parse::<Llm>(), Ok(llm));
        }
        assert_eq!(
            ContentKind::from_label("image_url"),
            Some(ContentKind::ImageUrl)
        );
    }

    #[test]
    fn lookups_are_case_sensitive() {
        assert_eq!(Role::from_label("User"), None);
        assert_eq!(Llm::from_name("openai"), None);
        assert!("Anthropic"
            .parse::<Llm>()
            .expect_err("unknown selector")
            .contains("OpenAI, GoogleGenerativeAI"));
    }

    #[test]
    fn awaits_reply_only_after_user_turn() {
        let transcript = Transcript::default();
        assert!(!transcript.awaits_reply());

        let transcript = transcript.with_message(Message::user("hi"));
        assert!(transcript.awaits_reply());

        let transcript = transcript.with_message(Message::assistant("hello"));
        assert!(!transcript.awaits_reply());
    }

    #[test]
    fn canonical_trims_bodies_and_keeps_everything_else() {
        let transcript = Transcript::new(Llm::GoogleGenerativeAI)
            .with_meta("note", "x")
            .with_message(
                Message::user("\n  look  \n").with_content_kind(ContentKind::ImageUrl),
            );

        let canonical = transcript.canonical();
        assert_eq!(canonical.selector, Llm::GoogleGenerativeAI);
        assert_eq!(canonical.meta, transcript.meta);
        assert_eq!(
            canonical.messages,
            vec![Message::user("look").with_content_kind(ContentKind::ImageUrl)]
        );
    }
}
