//! Clarification policy: decides whether a freshly queued note gets a
//! question, and what it is.

use tracing::{debug, instrument, warn};

use zettel_core::{GenerationBackend, NotePayload, RawNote};
use zettel_inference::prompts::{parse_clarification, ClarificationVerdict, CLARIFICATION_PROMPT};

/// Question sent for an image that arrived without a caption.
pub const IMAGE_CONTEXT_QUESTION: &str = "What's the context for this image?";

/// Example answers shown under [`IMAGE_CONTEXT_QUESTION`].
pub const IMAGE_CONTEXT_HINT: &str =
    "e.g. 'whiteboard from sprint planning', 'article screenshot about system design'";

/// Clarifying question for `note`, if one should be asked.
///
/// - Sentinel-prefixed notes are never questioned.
/// - Images without a caption get [`IMAGE_CONTEXT_QUESTION`] with no service
///   call; images with a caption get nothing.
/// - Text notes are checked by the generative service. A failed check is
///   logged and treated as "no question".
#[instrument(skip(backend, note), fields(subsystem = "pipeline", component = "clarify", op = "check"))]
pub async fn clarifying_question(
    backend: &dyn GenerationBackend,
    note: &RawNote,
) -> Option<String> {
    if note.sentinel.is_some() {
        debug!("Sentinel present, skipping clarification");
        return None;
    }

    match &note.payload {
        NotePayload::Image(image) => match image.caption {
            None => Some(IMAGE_CONTEXT_QUESTION.to_string()),
            Some(_) => None,
        },
        NotePayload::Text(text) => match backend.generate_text(CLARIFICATION_PROMPT, text).await {
            Ok(reply) => match parse_clarification(&reply) {
                ClarificationVerdict::Question(question) => Some(question),
                ClarificationVerdict::Clear => None,
            },
            Err(e) => {
                warn!(
                    error = %e,
                    error_kind = e.kind(),
                    "Clarification check failed, queueing without a question"
                );
                None
            }
        },
    }
}
