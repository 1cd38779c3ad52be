use serde_yaml::Value;
use tracing::debug;

use super::{FormatError, Llm, Meta, MetaValue};

const FENCE: &str = "---";

/// Front matter split off the top of a document.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FrontMatter {
    pub selector: Llm,
    pub meta: Meta,
}

/// Splits `input` into its front matter and the remaining body.
///
/// `input` must already be trimmed and use `\n` line endings. A document whose
/// first line is not `---` has no front matter.
pub(crate) fn split(input: &str) -> Result<(FrontMatter, &str), FormatError> {
    let Some(rest) = input.strip_prefix(FENCE) else {
        return Ok((FrontMatter::default(), input));
    };
    let rest = match rest.strip_prefix('\n') {
        Some(rest) => rest,
        None if rest.trim().is_empty() => return Err(FormatError::UnterminatedFrontMatter),
        // `----` or `--- text` is body text, not a fence.
        None => return Ok((FrontMatter::default(), input)),
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == FENCE {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return Ok((parse_yaml(yaml)?, body));
        }
        offset += line.len();
    }

    Err(FormatError::UnterminatedFrontMatter)
}

fn parse_yaml(yaml: &str) -> Result<FrontMatter, FormatError> {
    let value: Value = serde_yaml::from_str(yaml).map_err(FormatError::yaml)?;
    let mapping = match value {
        Value::Null => return Ok(FrontMatter::default()),
        Value::Mapping(mapping) => mapping,
        other => {
            return Err(FormatError::invalid_front_matter(format!(
                "found {} at top level",
                yaml_kind(&other)
            )))
        }
    };

    let mut front_matter = FrontMatter::default();
    for (key, value) in mapping {
        let Value::String(key) = key else {
            debug!(key = ?key, "dropping front matter field with non-string key");
            continue;
        };

        if key == Llm::FRONT_MATTER_KEY {
            match value.as_str().and_then(Llm::from_name) {
                Some(selector) => front_matter.selector = selector,
                None => debug!(value = ?value, "unrecognized llm selector; using default"),
            }
            continue;
        }

        match scalar(&value) {
            Some(scalar) => {
                front_matter.meta.insert(key, scalar);
            }
            None => debug!(%key, kind = yaml_kind(&value), "dropping non-scalar front matter field"),
        }
    }

    Ok(front_matter)
}

fn scalar(value: &Value) -> Option<MetaValue> {
    match value {
        Value::String(text) => Some(MetaValue::String(text.clone())),
        Value::Number(number) => number.as_f64().map(MetaValue::Number),
        Value::Bool(flag) => Some(MetaValue::Bool(*flag)),
        Value::Null | Value::Sequence(_) | Value::Mapping(_) | Value::Tagged(_) => None,
    }
}

fn yaml_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

impl Default for FrontMatter {
    fn default() -> Self {
        Self {
            selector: Llm::default(),
            meta: Meta::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn document_without_fence_is_all_body() {
        let (front_matter, body) = split("## user\nhi").expect("no front matter");
        assert_eq!(front_matter, FrontMatter::default());
        assert_eq!(body, "## user\nhi");
    }

    #[test]
    fn fenced_block_is_split_from_body() {
        let input = "---\nllm: GoogleGenerativeAI\nmodel: gemini-pro\n---\n\n## user\nhi";
        let (front_matter, body) = split(input).expect("valid front matter");

        assert_eq!(front_matter.selector, Llm::GoogleGenerativeAI);
        assert_eq!(
            front_matter.meta.get("model"),
            Some(&MetaValue::String("gemini-pro".to_string()))
        );
        assert_eq!(body, "\n## user\nhi");
    }

    #[test]
    fn empty_block_is_empty_map() {
        let (front_matter, body) = split("---\n---\nbody").expect("empty block");
        assert_eq!(front_matter, FrontMatter::default());
        assert_eq!(body, "body");
    }

    #[test]
    fn closing_fence_may_end_input() {
        let (front_matter, body) = split("---\nnote: x\n---").expect("valid front matter");
        assert_eq!(front_matter.meta.len(), 1);
        assert_eq!(body, "");
    }

    #[test]
    fn unterminated_block_is_rejected() {
        assert!(matches!(
            split("---\nllm: OpenAI\n## user"),
            Err(FormatError::UnterminatedFrontMatter)
        ));
        assert!(matches!(
            split("---"),
            Err(FormatError::UnterminatedFrontMatter)
        ));
    }

    #[test]
    fn non_mapping_yaml_is_rejected() {
        assert!(matches!(
            split("---\n- a\n- b\n---\nbody"),
            Err(FormatError::InvalidFrontMatter { source: None, .. })
        ));
        assert!(matches!(
            split("---\nkey: [unterminated\n---\nbody"),
            Err(FormatError::InvalidFrontMatter {
                source: Some(_),
                ..
            })
        ));
    }

    #[test]
    fn only_scalar_fields_become_meta() {
        let input = "---\nllm: OpenAI\ntemperature: 0.2\nnote: x\nnested:\n  a: 1\nlist: [1, 2]\nempty:\nstream: true\n1: numeric key\n---";
        let (front_matter, _) = split(input).expect("valid front matter");

        let mut expected = Meta::new();
        expected.insert("note".to_string(), MetaValue::from("x"));
        expected.insert("stream".to_string(), MetaValue::from(true));
        expected.insert("temperature".to_string(), MetaValue::from(0.2));
        assert_eq!(front_matter.selector, Llm::OpenAI);
        assert_eq!(front_matter.meta, expected);
    }

    #[test]
    fn unknown_or_non_string_selector_falls_back_to_default() {
        let (front_matter, _) = split("---\nllm: Anthropic\n---").expect("valid");
        assert_eq!(front_matter.selector, Llm::OpenAI);
        assert!(front_matter.meta.is_empty());

        let (front_matter, _) = split("---\nllm: 3\n---").expect("valid");
        assert_eq!(front_matter.selector, Llm::OpenAI);
    }
}
