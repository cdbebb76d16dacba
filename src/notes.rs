//! Inline note protocol.
//!
//! A chapter file carries notes as `<Note id="ID" ...attrs>body</Note>`. The body splits on
//! `///` into a content segment and any number of reference segments. Notes must not nest:
//! a span that contains another opening anchor is never cut short at the inner `</Note>`.
//! Listing skips it, lookup and update reject it.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::sync::OnceLock;

use crate::error::{NoteError, NoteResult};

const OPEN_ANCHOR: &str = "<Note id=\"";
const CLOSE_TAG: &str = "</Note>";
const SEGMENT_DELIMITER: &str = "///";
const PREVIEW_CHARS: usize = 22;

// Listing entry for one note
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteSummary {
    pub id: String,
    pub preview: String,
}

// Note body split into its segments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteParts {
    pub content: String,
    pub reference: String,
}

/// Byte offsets of one note inside a file's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteSpan {
    /// Offset of the `<` that opens the tag.
    pub tag_start: usize,
    /// Everything strictly between the opening tag's `>` and `</Note>`.
    pub body: Range<usize>,
}

impl NoteSpan {
    pub fn body<'a>(&self, text: &'a str) -> &'a str {
        text[self.body.clone()].trim()
    }
}

fn opening_tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"<Note id="([^"]*)"[^>]*>"#).expect("opening tag pattern"))
}

// Find the body range that starts at `body_start` and ends at the next `</Note>`.
fn body_range(text: &str, id: &str, body_start: usize) -> NoteResult<Range<usize>> {
    let len = text[body_start..]
        .find(CLOSE_TAG)
        .ok_or_else(|| NoteError::MissingClosingTag(id.to_string()))?;
    let body = body_start..body_start + len;

    if text[body.clone()].contains(OPEN_ANCHOR) {
        return Err(NoteError::NestedNote(id.to_string()));
    }
    Ok(body)
}

/// List every note in `text`, in order of appearance.
///
/// A span with no `</Note>` after it, or one that contains another opening tag, is
/// skipped; notes after or inside it are still listed.
pub fn extract_notes(text: &str) -> Vec<NoteSummary> {
    let mut notes = Vec::new();
    let mut cursor = 0;

    while let Some(caps) = opening_tag_pattern().captures_at(text, cursor) {
        let (Some(tag), Some(id)) = (caps.get(0), caps.get(1)) else {
            break;
        };

        match body_range(text, id.as_str(), tag.end()) {
            Ok(body) => {
                notes.push(NoteSummary {
                    id: id.as_str().to_string(),
                    preview: preview(text[body.clone()].trim()),
                });
                cursor = body.end + CLOSE_TAG.len();
            }
            Err(e) => {
                tracing::warn!(note_id = id.as_str(), error = %e, "skipping broken note");
                cursor = tag.end();
            }
        }
    }

    notes
}

/// First non-blank line of a note body, cut to 22 characters plus `..`.
pub fn preview(body: &str) -> String {
    let line = body
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("");

    if line.chars().count() > PREVIEW_CHARS {
        let head: String = line.chars().take(PREVIEW_CHARS).collect();
        format!("{}..", head)
    } else {
        line.to_string()
    }
}

/// Split a note body on `///`: the first segment is the content, the rest form the
/// reference joined by blank lines.
pub fn decompose(body: &str) -> NoteParts {
    let mut segments = body.split(SEGMENT_DELIMITER).map(str::trim);
    let content = segments.next().unwrap_or("").to_string();
    let reference = segments.collect::<Vec<_>>().join("\n\n").trim().to_string();

    NoteParts { content, reference }
}

/// Locate the first note whose opening tag starts with `<Note id="ID"`.
///
/// The id is matched as literal text, never as a pattern.
pub fn locate_note(text: &str, id: &str) -> NoteResult<NoteSpan> {
    let anchor = format!("{}{}\"", OPEN_ANCHOR, id);
    let tag_start = text
        .find(&anchor)
        .ok_or_else(|| NoteError::NoteNotFound(id.to_string()))?;

    let after_anchor = tag_start + anchor.len();
    let tag_end = text[after_anchor..]
        .find('>')
        .map(|offset| after_anchor + offset + 1)
        .ok_or_else(|| NoteError::MalformedTag(id.to_string()))?;

    let body = body_range(text, id, tag_end)?;
    Ok(NoteSpan { tag_start, body })
}

/// Parse the note `id` out of `text`.
pub fn read_note(text: &str, id: &str) -> NoteResult<NoteParts> {
    let span = locate_note(text, id)?;
    Ok(decompose(span.body(text)))
}

/// Return `text` with the body of note `id` replaced by `new_body`.
///
/// The opening tag, its attributes and everything outside the body are kept as they are.
pub fn replace_note_body(text: &str, id: &str, new_body: &str) -> NoteResult<String> {
    let span = locate_note(text, id)?;

    let mut updated =
        String::with_capacity(text.len() - span.body.len() + new_body.len());
    updated.push_str(&text[..span.body.start]);
    updated.push_str(new_body);
    updated.push_str(&text[span.body.end..]);
    Ok(updated)
}
