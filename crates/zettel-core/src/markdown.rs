//! Front matter and section helpers for Markdown notes.
//!
//! Notes are Markdown with a YAML front-matter block delimited by `---`
//! lines. Fields are read line-wise rather than through a YAML parser,
//! because generated front matter is frequently not valid YAML
//! (`tags: [#people]`).

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::error::Result;
use crate::models::Category;

const DELIMITER: &str = "---";

static FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^([A-Za-z_]+):[ \t]*(.*?)[ \t]*$").expect("valid regex"));

/// Split a document into its front-matter block and body.
///
/// The block includes both delimiter lines and the newline after the closing
/// one, so `block + body == doc`. Returns `None` when the document does not
/// open with a delimiter line or the block is never closed.
pub fn split_front_matter(doc: &str) -> Option<(&str, &str)> {
    let first_line_end = doc.find('\n')?;
    if doc[..first_line_end].trim_end() != DELIMITER {
        return None;
    }
    let mut offset = first_line_end + 1;
    for line in doc[offset..].split_inclusive('\n') {
        offset += line.len();
        if line.trim_end() == DELIMITER {
            return Some((&doc[..offset], &doc[offset..]));
        }
    }
    None
}

/// Read a `name: value` field from a record.
///
/// Looks inside the front matter when there is one, otherwise anywhere in the
/// text. Empty values read as `None`.
pub fn field(record: &str, name: &str) -> Option<String> {
    let haystack = split_front_matter(record.trim_start())
        .map(|(block, _)| block)
        .unwrap_or(record);
    FIELD
        .captures_iter(haystack)
        .find(|c| &c[1] == name)
        .map(|c| c[2].trim_matches(|q| q == '"' || q == '\'').trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Body text after the front matter, trimmed.
pub fn body(record: &str) -> &str {
    match split_front_matter(record.trim_start()) {
        Some((_, body)) => body.trim(),
        None => record.trim(),
    }
}

/// Replace whatever front matter `doc` has with `block`, byte-for-byte.
///
/// A document without front matter gets `block` prepended.
pub fn with_front_matter(doc: &str, block: &str) -> String {
    let body = match split_front_matter(doc) {
        Some((_, body)) => body,
        None => doc,
    };
    let mut out = String::with_capacity(block.len() + body.len());
    out.push_str(block);
    out.push_str(body);
    out
}

/// Front matter for a newly created entity document.
#[derive(Debug, Clone, Serialize)]
pub struct EntityFrontMatter {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub category: Category,
    pub name_slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub person: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    pub tags: Vec<String>,
    pub links: Vec<String>,
}

impl EntityFrontMatter {
    /// Render as a delimited YAML block ending in a newline.
    pub fn render(&self) -> Result<String> {
        let yaml = serde_yaml::to_string(self)?;
        Ok(format!("{DELIMITER}\n{yaml}{DELIMITER}\n"))
    }
}

/// Byte range of a `## heading` section: from the heading line to the next
/// `## ` heading (or end of document).
fn section_range(doc: &str, heading: &str) -> Option<(usize, usize)> {
    let marker = format!("## {}", heading);
    let mut offset = 0;
    let mut start = None;
    for line in doc.split_inclusive('\n') {
        let trimmed = line.trim_end();
        match start {
            None if trimmed == marker => start = Some(offset),
            Some(s) if trimmed.starts_with("## ") => return Some((s, offset)),
            _ => {}
        }
        offset += line.len();
    }
    start.map(|s| (s, doc.len()))
}

/// Full text of a `## heading` section including its heading line.
pub fn section<'a>(doc: &'a str, heading: &str) -> Option<&'a str> {
    section_range(doc, heading).map(|(s, e)| &doc[s..e])
}

/// Append lines to the end of a section, creating it at the end of the
/// document when missing. Nothing outside the section changes.
pub fn append_to_section(doc: &str, heading: &str, lines: &[String]) -> String {
    if lines.is_empty() {
        return doc.to_string();
    }
    let addition: String = lines.iter().map(|l| format!("{}\n", l)).collect();

    match section_range(doc, heading) {
        Some((start, end)) => {
            let existing = &doc[start..end];
            let content = existing.trim_end_matches('\n');
            let trailing = &existing[content.len()..];
            let mut out = String::with_capacity(doc.len() + addition.len());
            out.push_str(&doc[..start]);
            out.push_str(content);
            out.push('\n');
            // A bare heading gets the same blank line a fresh section has.
            if !content.contains('\n') {
                out.push('\n');
            }
            out.push_str(&addition);
            // Keep the blank line that separated this section from the next.
            if trailing.len() > 1 {
                out.push_str(&trailing[1..]);
            } else if end < doc.len() {
                out.push('\n');
            }
            out.push_str(&doc[end..]);
            out
        }
        None => {
            let mut out = doc.trim_end_matches('\n').to_string();
            out.push_str(&format!("\n\n## {}\n\n", heading));
            out.push_str(&addition);
            out
        }
    }
}
