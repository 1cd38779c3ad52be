use markdown::mdast::Node;
use markdown::{to_mdast, ParseOptions};
use tracing::debug;

use super::front_matter;
use super::{ContentKind, FormatError, Message, Role, Transcript};

const MESSAGE_HEADING_DEPTH: u8 = 2;

/// A message-opening heading and the byte range it covers in the body.
struct Opening {
    role: Role,
    content_kind: ContentKind,
    start: usize,
    end: usize,
}

/// Parses a markdown document into a transcript.
///
/// Every top-level level-2 heading (ATX or setext) must read
/// `role[:content_kind]`. Source before the first heading is discarded.
///
/// Source between one such heading and the next becomes the message body.
/// Bodies are normalized, not copied verbatim: leading whitespace-only lines
/// and all trailing whitespace are removed. Interior lines, fences and
/// indentation are kept as written.
pub fn parse(raw: &str) -> Result<Transcript, FormatError> {
    let normalized = raw.replace("\r\n", "\n");
    let (front_matter, body) = front_matter::split(normalized.trim())?;

    let root = to_mdast(body, &ParseOptions::gfm()).map_err(|message| FormatError::Markdown {
        message: message.to_string(),
    })?;
    let blocks = match root {
        Node::Root(root) => root.children,
        _ => Vec::new(),
    };

    let mut openings = Vec::new();
    for block in &blocks {
        let Node::Heading(heading) = block else {
            continue;
        };
        if heading.depth != MESSAGE_HEADING_DEPTH {
            continue;
        }
        let Some(position) = heading.position.as_ref() else {
            continue;
        };

        let (start, end) = (position.start.offset, position.end.offset);
        let (role, content_kind) = parse_heading(heading_text(&body[start..end]))?;
        openings.push(Opening {
            role,
            content_kind,
            start,
            end,
        });
    }

    if let Some(first) = openings.first() {
        if !body[..first.start].trim().is_empty() {
            debug!(bytes = first.start, "discarding content before first message heading");
        }
    }

    let messages = openings
        .iter()
        .enumerate()
        .map(|(index, opening)| {
            let body_end = openings
                .get(index + 1)
                .map_or(body.len(), |next| next.start);
            Message {
                role: opening.role,
                content_kind: opening.content_kind,
                text: strip_blank_edges(&body[opening.end..body_end]).to_string(),
            }
        })
        .collect::<Vec<_>>();

    debug!(
        selector = %front_matter.selector,
        meta = front_matter.meta.len(),
        messages = messages.len(),
        "parsed transcript"
    );

    Ok(Transcript {
        selector: front_matter.selector,
        messages,
        meta: front_matter.meta,
    })
}

/// Reads `role[:content_kind]`. Segments after a second colon are ignored.
fn parse_heading(text: &str) -> Result<(Role, ContentKind), FormatError> {
    let mut segments = text.split(':');
    let role = segments.next().unwrap_or_default().trim();
    let kind = segments.next().map(str::trim);

    let role = Role::from_label(role).ok_or_else(|| FormatError::unknown_role(text, role))?;
    let content_kind = match kind {
        None => ContentKind::Text,
        Some(kind) => ContentKind::from_label(kind)
            .ok_or_else(|| FormatError::unknown_content_kind(text, kind))?,
    };

    Ok((role, content_kind))
}

/// Inline text of a heading's source with the ATX markers or setext underline removed.
fn heading_text(source: &str) -> &str {
    let source = source.trim();

    if source.starts_with('#') {
        let text = source.trim_start_matches('#').trim();
        let unclosed = text.trim_end_matches('#');
        let has_closing_sequence = unclosed.len() != text.len()
            && (unclosed.is_empty() || unclosed.ends_with([' ', '\t']));
        return if has_closing_sequence {
            unclosed.trim_end()
        } else {
            text
        };
    }

    match source.rsplit_once('\n') {
        Some((text, _underline)) => text.trim(),
        None => source,
    }
}

/// Drops whitespace-only lines at the start and trailing whitespace at the end.
fn strip_blank_edges(text: &str) -> &str {
    let text = text.trim_end();
    let mut start = 0;
    for line in text.split_inclusive('\n') {
        if !line.trim().is_empty() {
            break;
        }
        start += line.len();
    }
    &text[start..]
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn heading_text_strips_atx_markers_and_closing_sequence() {
        assert_eq!(heading_text("## user"), "user");
        assert_eq!(heading_text("##   assistant  ##"), "assistant");
        assert_eq!(heading_text("## user:image_url #"), "user:image_url");
        assert_eq!(heading_text("## c#"), "c#");
    }

    #[test]
    fn heading_text_drops_setext_underline() {
        assert_eq!(heading_text("user\n---"), "user");
        assert_eq!(heading_text("system\n-"), "system");
    }

    #[test]
    fn heading_keeps_first_two_colon_segments() {
        assert!(matches!(
            parse_heading("user : image_url"),
            Ok((Role::User, ContentKind::ImageUrl))
        ));
        assert!(matches!(
            parse_heading("system"),
            Ok((Role::System, ContentKind::Text))
        ));
        assert!(matches!(
            parse_heading("user:text:extra"),
            Ok((Role::User, ContentKind::Text))
        ));
        assert!(matches!(
            parse_heading("user:image_url:x"),
            Ok((Role::User, ContentKind::ImageUrl))
        ));
        assert!(matches!(
            parse_heading("user:"),
            Err(FormatError::UnknownContentKind { kind, .. }) if kind.is_empty()
        ));
    }

    #[test]
    fn unknown_role_names_heading() {
        let error = parse_heading("narrator").expect_err("narrator is not a role");
        assert!(matches!(
            &error,
            FormatError::UnknownRole { role, heading } if role == "narrator" && heading == "narrator"
        ));
        assert!(error.to_string().contains("'narrator'"));
    }

    #[test]
    fn blank_edges_are_removed_but_indentation_kept() {
        assert_eq!(strip_blank_edges("\n  \n    code\nnext  \n\n"), "    code\nnext");
        assert_eq!(strip_blank_edges("\n \n"), "");
    }

    #[test]
    fn body_is_verbatim_source_between_headings() {
        let raw = "## user\n\nLook:\n\n```rust\nfn main() {}\n\n```\n\n- a\n- b\n\n### Notes\n> quoted\n\n## assistant\nok";
        let transcript = parse(raw).expect("valid transcript");

        assert_eq!(
            transcript.messages,
            vec![
                Message::user("Look:\n\n```rust\nfn main() {}\n\n```\n\n- a\n- b\n\n### Notes\n> quoted"),
                Message::assistant("ok"),
            ]
        );
    }

    #[test]
    fn headings_inside_blocks_do_not_open_messages() {
        let raw = "## user\n> ## assistant\n\n```\n## system\n```";
        let transcript = parse(raw).expect("valid transcript");

        assert_eq!(transcript.messages.len(), 1);
        assert_eq!(
            transcript.messages[0].text,
            "> ## assistant\n\n```\n## system\n```"
        );
    }

    #[test]
    fn extra_heading_segments_are_ignored() {
        let transcript = parse("## user:image_url:x\n\nhttps://a/b.png").expect("valid transcript");
        assert_eq!(
            transcript.messages,
            vec![Message::user("https://a/b.png").with_content_kind(ContentKind::ImageUrl)]
        );
    }

    #[test]
    fn body_trailing_whitespace_is_normalized_away() {
        let transcript = parse("## user\n\n\n  indented  \n\n## assistant\nok").expect("valid transcript");
        assert_eq!(transcript.messages[0].text, "  indented");
    }

    #[test]
    fn crlf_input_is_normalized() {
        let transcript = parse("user\r\n---\r\n\r\nline1\r\nline2\r\n").expect("valid transcript");
        assert_eq!(transcript.messages, vec![Message::user("line1\nline2")]);
    }
}
