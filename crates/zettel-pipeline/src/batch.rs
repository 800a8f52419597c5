//! Batch structuring request builder.

use zettel_core::{Fragment, Mode, NotePayload, RawNote};
use zettel_inference::prompts::structuring_prompt;

/// Instruction plus ordered fragments for one structuring call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRequest {
    pub instruction: &'static str,
    pub fragments: Vec<Fragment>,
}

/// Build the structuring request for `notes` in queue order.
///
/// Per note: a `--- Note N ---` marker (1-based), a pre-classification hint
/// when the note had a sentinel, the text or the image block (preceded by
/// `[Image attached]` and its caption), then the clarification answer if
/// there is one. Notes are neither reordered nor deduplicated.
pub fn build_batch_request(notes: &[RawNote], mode: Mode) -> BatchRequest {
    let mut fragments = Vec::with_capacity(notes.len() * 3);

    for (i, note) in notes.iter().enumerate() {
        fragments.push(Fragment::text(format!("\n--- Note {} ---\n", i + 1)));

        if let Some(category) = note.sentinel {
            fragments.push(Fragment::text(format!("[Pre-classified as: {}]", category)));
        }

        match &note.payload {
            NotePayload::Text(text) => fragments.push(Fragment::text(text.clone())),
            NotePayload::Image(image) => {
                fragments.push(Fragment::text("[Image attached]"));
                if let Some(caption) = &image.caption {
                    fragments.push(Fragment::text(format!("Caption: {}", caption)));
                }
                fragments.push(Fragment::Image {
                    media_type: image.media_type.clone(),
                    data: image.data.clone(),
                });
            }
        }

        if let Some(answer) = &note.clarification {
            fragments.push(Fragment::text(format!(
                "\n[Clarification provided]: {}",
                answer
            )));
        }
    }

    BatchRequest {
        instruction: structuring_prompt(mode),
        fragments,
    }
}
