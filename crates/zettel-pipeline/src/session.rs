//! Intake queue and clarification state machine.
//!
//! A [`Session`] owns the ordered queue of raw notes, the map of outstanding
//! clarification questions, and the current structuring mode. It is owned by
//! the single actor that handles chat events and passed `&mut` into each
//! step, so it carries no locks.
//!
//! Note lifecycle: `queued-unanswered` → `queued-clarified` → consumed by a
//! processing run and dropped by [`Session::clear`]. A note may stay
//! unanswered indefinitely.

use std::collections::HashMap;

use tracing::{debug, warn};
use uuid::Uuid;

use zettel_core::{Error, MessageId, Mode, RawNote, Result};

/// Key correlating a clarification answer with its question: the transport's
/// identifier for the question message.
pub type PendingKey = MessageId;

/// Queue counts reported by the `/queue` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueStatus {
    pub queued: usize,
    pub clarified: usize,
    pub awaiting_reply: usize,
}

/// In-memory state of one user's intake session.
#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    notes: Vec<RawNote>,
    pending: HashMap<PendingKey, usize>,
    mode: Mode,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::now_v7(),
            notes: Vec::new(),
            pending: HashMap::new(),
            mode: Mode::default(),
        }
    }

    /// Identifier used to correlate log lines. Rotated on every clear.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    /// Queued notes in arrival order.
    pub fn notes(&self) -> &[RawNote] {
        &self.notes
    }

    pub fn note(&self, index: usize) -> Option<&RawNote> {
        self.notes.get(index)
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Number of questions still waiting for an answer.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, key: PendingKey) -> bool {
        self.pending.contains_key(&key)
    }

    /// Append a note and return its queue index.
    pub fn enqueue(&mut self, note: RawNote) -> usize {
        self.notes.push(note);
        let index = self.notes.len() - 1;
        debug!(
            session_id = %self.id,
            note_index = index,
            kind = ?self.notes[index].kind(),
            "Note queued"
        );
        index
    }

    /// Record that the question sent as `key` is about the note at `index`.
    pub fn request_clarification(&mut self, index: usize, key: PendingKey) -> Result<PendingKey> {
        if index >= self.notes.len() {
            return Err(Error::InvalidInput(format!(
                "note index {} out of range (queue has {})",
                index,
                self.notes.len()
            )));
        }
        self.pending.insert(key, index);
        debug!(session_id = %self.id, note_index = index, message_id = key, "Clarification requested");
        Ok(key)
    }

    /// Attach an answer to the note its question refers to.
    ///
    /// The pending entry is consumed either way. Returns `false`, leaving the
    /// queue untouched, when the key is unknown, the note is gone, or the
    /// note already carries a clarification.
    pub fn answer_clarification(&mut self, key: PendingKey, answer: &str) -> bool {
        let Some(index) = self.pending.remove(&key) else {
            warn!(session_id = %self.id, message_id = key, "Answer for unknown question");
            return false;
        };
        match self.notes.get_mut(index) {
            Some(note) if note.clarification.is_none() => {
                note.clarification = Some(answer.trim().to_string());
                debug!(session_id = %self.id, note_index = index, "Clarification attached");
                true
            }
            Some(_) => {
                warn!(session_id = %self.id, note_index = index, "Note already clarified");
                false
            }
            None => {
                warn!(session_id = %self.id, note_index = index, "Answer for a note no longer queued");
                false
            }
        }
    }

    /// Drop every queued note and pending question. The mode is kept.
    pub fn clear(&mut self) {
        debug!(
            session_id = %self.id,
            note_count = self.notes.len(),
            pending = self.pending.len(),
            "Session cleared"
        );
        self.notes.clear();
        self.pending.clear();
        self.id = Uuid::now_v7();
    }

    pub fn status(&self) -> QueueStatus {
        QueueStatus {
            queued: self.notes.len(),
            clarified: self.notes.iter().filter(|n| n.is_clarified()).count(),
            awaiting_reply: self.pending.len(),
        }
    }
}
