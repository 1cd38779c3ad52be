use thiserror::Error;

/// Failure to read a markdown document as a transcript.
///
/// Parsing is all-or-nothing: no partial transcript accompanies an error.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("heading '{heading}' names unknown role '{role}'; expected system, assistant or user")]
    UnknownRole { heading: String, role: String },

    #[error("heading '{heading}' names unknown content kind '{kind}'; expected text or image_url")]
    UnknownContentKind { heading: String, kind: String },

    #[error("front matter opened on line 1 is never closed by a '---' line")]
    UnterminatedFrontMatter,

    #[error("front matter is not a YAML mapping: {reason}")]
    InvalidFrontMatter {
        reason: String,
        #[source]
        source: Option<serde_yaml::Error>,
    },

    #[error("failed to lex markdown body: {message}")]
    Markdown { message: String },
}

impl FormatError {
    #[must_use]
    pub fn unknown_role(heading: impl Into<String>, role: impl Into<String>) -> Self {
        Self::UnknownRole {
            heading: heading.into(),
            role: role.into(),
        }
    }

    #[must_use]
    pub fn unknown_content_kind(heading: impl Into<String>, kind: impl Into<String>) -> Self {
        Self::UnknownContentKind {
            heading: heading.into(),
            kind: kind.into(),
        }
    }

    #[must_use]
    pub fn invalid_front_matter(reason: impl Into<String>) -> Self {
        Self::InvalidFrontMatter {
            reason: reason.into(),
            source: None,
        }
    }

    #[must_use]
    pub fn yaml(source: serde_yaml::Error) -> Self {
        Self::InvalidFrontMatter {
            reason: source.to_string(),
            source: Some(source),
        }
    }
}
