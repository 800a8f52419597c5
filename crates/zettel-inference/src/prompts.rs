//! Instruction templates and response parsers for the generative service.
//!
//! Five templates are used by the pipeline:
//! - clarification check (one note → `CLEAR` or `QUESTION: ...`)
//! - batch structuring, in work and personal flavours
//! - single-document merge
//! - journal session summary

use zettel_core::defaults::RECORD_DELIMITER;
use zettel_core::Mode;

/// Asks whether one clarifying question would make a raw note richer.
pub const CLARIFICATION_PROMPT: &str = r#"You are a Zettelkasten assistant reviewing a raw note from an Engineering Manager.

Your job: decide if asking ONE clarifying question would make this note significantly richer and more useful.

Ask a question if the note:
- Mentions a person, topic, or thing without enough context to be useful later
- Contains an action item without a clear owner, deadline, or next step
- Is vague enough that future-you might not understand it
- Has a decision or insight that would benefit from knowing the "why"

Do NOT ask a question if:
- The note is already clear and self-contained
- It's a simple reminder or quick thought that doesn't need more detail
- Asking would feel annoying or unnecessary

RESPOND IN EXACTLY ONE OF THESE TWO FORMATS:

If no question needed:
CLEAR

If a question would help:
QUESTION: <your single, specific, conversational question>

Raw note:
"#;

/// Structures a batch of work notes.
pub const WORK_PROMPT: &str = r#"You are a Zettelkasten assistant for an Engineering Manager.

Below are raw notes captured throughout the day. Each note may include extra context added after clarification.
A note marked [Pre-classified as: <type>] MUST produce a note of that type.
For EACH distinct idea or action, create a properly structured Zettelkasten note in Markdown.

FOLDER TYPES — choose the best fit:
- fleeting    → quick thought, reminder, something to revisit later
- literature  → insight from an article, book, podcast, or conversation
- permanent   → refined, evergreen engineering or leadership principle
- tasks       → a concrete action item that needs to be done
- people      → information, observations, or context about a specific person
- meetings    → notes or outcomes from a meeting
- projects    → ideas, status, or decisions related to a specific project

REQUIRED FORMAT for every note:

---
id: <YYYYMMDDHHmm>
title: <Clear concise title in English>
type: <folder type from above>
tags: [<tag1>, <tag2>]
links: [<related note title if obvious, else leave empty>]
---

<Body: 2-5 sentences expanding the idea clearly.>

EXTRA FIELDS by type (add these inside the frontmatter):
- tasks    → add:  status: open   and   due: <YYYY-MM-DD if mentioned, else TBD>
- people   → add:  person: <full name>
- meetings → add:  attendees: [<name1>, <name2>]   and   date: <YYYY-MM-DD>
- projects → add:  project: <project name>

TAGS to use (pick what fits):
#people #process #technical #strategy #meeting #project #decision #risk #feedback #growth #hiring #delivery

RULES:
1. One idea per note — atomic.
2. If a raw note contains multiple ideas, split into multiple notes.
3. If you see an image, extract ALL meaningful content from it.
4. Use any clarification context provided to make the note richer.
5. Output ONLY the notes, no commentary or explanation.
6. Separate each note with a line containing only ===

RAW NOTES:
"#;

/// Structures a batch of personal notes; everything lands in `personal/`.
pub const PERSONAL_PROMPT: &str = r#"You are a Zettelkasten assistant helping organize personal notes and thoughts.

Below are raw personal notes. Each note may include extra context added after clarification.
For EACH distinct idea, create a structured Zettelkasten note.

All notes go into the "personal" folder.

REQUIRED FORMAT:

---
id: <YYYYMMDDHHmm>
title: <Clear concise title in English>
type: personal
tags: [<tag1>, <tag2>]
links: [<related note title if obvious, else leave empty>]
---

<Body: 2-5 sentences expanding the idea clearly.>

EXTRA FIELDS:
- If it is a task → add:  status: open   and   due: <YYYY-MM-DD if mentioned, else TBD>
- If it relates to a person → add:  person: <name>

TAGS to use (pick what fits):
#health #family #finance #learning #goals #ideas #travel #reflection #reading #habits

RULES:
1. One idea per note — atomic.
2. Split multiple ideas into multiple notes.
3. If you see an image, extract all meaningful content.
4. Use any clarification context provided to make the note richer.
5. Output ONLY the notes, no commentary.
6. Separate each note with a line containing only ===

RAW NOTES:
"#;

/// Merges one new record into an existing rolling document.
pub const MERGE_PROMPT: &str = r#"You maintain a rolling Markdown document about one person or project in a Zettelkasten.

You will receive the EXISTING DOCUMENT, the NEW NOTE, the date, and optionally ACTION ITEM LINKS.

Produce the COMPLETE updated document following these rules exactly:
1. Copy the front matter block (from the first --- line to the closing --- line) byte-for-byte. Do not add, remove, or reorder fields.
2. Copy the curated section (## Profile or ## Overview) byte-for-byte.
3. Append exactly ONE new bullet at the end of the rolling section (## Observations or ## Updates) in the form:
   - <date>: <one sentence summarising the new note>
4. If ACTION ITEM LINKS are given, append each one as a bullet at the end of the ## Action Items section, creating that section at the end of the document if it does not exist.
5. Do not change any other text.
6. Output ONLY the document. No commentary, no code fences.
"#;

/// Writes the prose summary at the top of a journal block.
pub const SUMMARY_PROMPT: &str = r#"Summarise the following captured notes in two or three plain sentences for a personal work journal.
Write in the first person, past tense. Output only the summary.

NOTES:
"#;

/// Instruction template for batch structuring in the given mode.
pub fn structuring_prompt(mode: Mode) -> &'static str {
    match mode {
        Mode::Work => WORK_PROMPT,
        Mode::Personal => PERSONAL_PROMPT,
    }
}

/// Build the text fragment for a merge call.
pub fn merge_request(
    existing: &str,
    new_note: &str,
    date: &str,
    action_item_links: &[String],
) -> String {
    let mut out = format!(
        "EXISTING DOCUMENT:\n{}\n\nNEW NOTE:\n{}\n\nDATE: {}\n",
        existing.trim_end(),
        new_note.trim(),
        date
    );
    if !action_item_links.is_empty() {
        out.push_str("\nACTION ITEM LINKS:\n");
        for link in action_item_links {
            out.push_str(&format!("- {}\n", link));
        }
    }
    out
}

/// Outcome of a clarification check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClarificationVerdict {
    Clear,
    Question(String),
}

/// Parse a clarification reply. Anything other than a non-empty
/// `QUESTION:` line reads as `Clear`.
pub fn parse_clarification(reply: &str) -> ClarificationVerdict {
    let reply = reply.trim();
    match reply.strip_prefix("QUESTION:") {
        Some(q) if !q.trim().is_empty() => ClarificationVerdict::Question(q.trim().to_string()),
        _ => ClarificationVerdict::Clear,
    }
}

/// Split a structuring response into record blocks on delimiter lines.
/// Empty blocks are dropped.
pub fn split_records(response: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current = String::new();
    for line in response.trim().lines() {
        if line.trim() == RECORD_DELIMITER {
            blocks.push(std::mem::take(&mut current));
        } else {
            current.push_str(line);
            current.push('\n');
        }
    }
    blocks.push(current);
    blocks
        .into_iter()
        .map(|b| b.trim().to_string())
        .filter(|b| !b.is_empty())
        .collect()
}

/// Strip a surrounding Markdown code fence some models add despite instructions.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return text;
    }
    let without_open = match trimmed.find('\n') {
        Some(i) => &trimmed[i + 1..],
        None => return text,
    };
    without_open
        .trim_end()
        .strip_suffix("```")
        .unwrap_or(without_open)
}
