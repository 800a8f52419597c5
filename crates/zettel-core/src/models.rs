//! Domain models for zettel-intake.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Chat transport message identifier.
pub type MessageId = i64;

// =============================================================================
// CATEGORIES
// =============================================================================

/// Closed set of record categories. Each maps to a top-level store folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Quick thought or reminder. Also the catch-all.
    Fleeting,
    /// Insight from an article, book, podcast, or conversation.
    Literature,
    /// Evergreen principle.
    Permanent,
    /// Actionable item.
    #[serde(rename = "tasks")]
    Task,
    /// Entity profile for a person.
    #[serde(rename = "people")]
    Person,
    /// Recurring event (meeting occurrence).
    #[serde(rename = "meetings")]
    Meeting,
    /// Rolling project document.
    #[serde(rename = "projects")]
    Project,
    /// Anything captured in personal mode.
    Personal,
}

impl Category {
    /// All categories in folder order.
    pub const ALL: [Category; 8] = [
        Category::Fleeting,
        Category::Literature,
        Category::Permanent,
        Category::Task,
        Category::Person,
        Category::Meeting,
        Category::Project,
        Category::Personal,
    ];

    /// Store folder for this category.
    pub fn folder(self) -> &'static str {
        match self {
            Category::Fleeting => "fleeting",
            Category::Literature => "literature",
            Category::Permanent => "permanent",
            Category::Task => "tasks",
            Category::Person => "people",
            Category::Meeting => "meetings",
            Category::Project => "projects",
            Category::Personal => "personal",
        }
    }

    /// Parse a declared `type:` value. Accepts folder names and the
    /// taxonomy aliases used in prompts.
    pub fn from_declared(value: &str) -> Option<Self> {
        match value.trim().trim_matches('"').to_lowercase().as_str() {
            "fleeting" | "reminder" => Some(Category::Fleeting),
            "literature" | "insight" => Some(Category::Literature),
            "permanent" | "principle" => Some(Category::Permanent),
            "tasks" | "task" | "actionable-item" | "action" => Some(Category::Task),
            "people" | "person" | "profile" => Some(Category::Person),
            "meetings" | "meeting" | "event" => Some(Category::Meeting),
            "projects" | "project" | "project-idea" => Some(Category::Project),
            "personal" => Some(Category::Personal),
            _ => None,
        }
    }

    /// Rolling per-entity documents that are merged instead of duplicated.
    pub fn is_entity(self) -> bool {
        matches!(self, Category::Person | Category::Project)
    }

    /// Category pre-assigned by a single-character note prefix.
    pub fn from_sentinel(c: char) -> Option<Self> {
        match c {
            '@' => Some(Category::Person),
            '~' => Some(Category::Meeting),
            '+' => Some(Category::Project),
            _ => None,
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            Category::Fleeting => "💭",
            Category::Literature => "📚",
            Category::Permanent => "🏛️",
            Category::Task => "✅",
            Category::Person => "👤",
            Category::Meeting => "🤝",
            Category::Project => "🗂️",
            Category::Personal => "🏠",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.folder())
    }
}

/// Split a leading sentinel prefix off a note's text.
///
/// Returns the pre-assigned category (if any) and the remaining text with
/// surrounding whitespace trimmed.
pub fn split_sentinel(text: &str) -> (Option<Category>, &str) {
    let trimmed = text.trim_start();
    match trimmed.chars().next().and_then(Category::from_sentinel) {
        Some(category) => (Some(category), trimmed[1..].trim()),
        None => (None, text.trim()),
    }
}

/// Instruction-template mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Work,
    Personal,
}

impl Mode {
    pub fn label(self) -> &'static str {
        match self {
            Mode::Work => "💼 Work",
            Mode::Personal => "🏠 Personal",
        }
    }
}

// =============================================================================
// RAW NOTES
// =============================================================================

/// Image attached to a raw note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    pub data: Vec<u8>,
    pub media_type: String,
    pub caption: Option<String>,
}

/// Payload of a raw note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotePayload {
    Text(String),
    Image(ImageAttachment),
}

/// Kind discriminator for a raw note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteKind {
    Text,
    Image,
}

/// One queued, unprocessed note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawNote {
    pub payload: NotePayload,
    /// Category pre-assigned by a prefix marker, which is stripped from the payload.
    pub sentinel: Option<Category>,
    /// Answer to the clarifying question, set at most once.
    pub clarification: Option<String>,
    pub received_at: DateTime<Local>,
}

impl RawNote {
    /// Create a text note, splitting off any sentinel prefix.
    pub fn text(text: impl AsRef<str>, received_at: DateTime<Local>) -> Self {
        let (sentinel, body) = split_sentinel(text.as_ref());
        Self {
            payload: NotePayload::Text(body.to_string()),
            sentinel,
            clarification: None,
            received_at,
        }
    }

    /// Create an image note. A sentinel prefix on the caption is honored.
    pub fn image(
        data: Vec<u8>,
        media_type: impl Into<String>,
        caption: Option<String>,
        received_at: DateTime<Local>,
    ) -> Self {
        let (sentinel, caption) = match caption.as_deref() {
            Some(c) => {
                let (sentinel, body) = split_sentinel(c);
                (sentinel, Some(body.to_string()).filter(|b| !b.is_empty()))
            }
            None => (None, None),
        };
        Self {
            payload: NotePayload::Image(ImageAttachment {
                data,
                media_type: media_type.into(),
                caption,
            }),
            sentinel,
            clarification: None,
            received_at,
        }
    }

    pub fn kind(&self) -> NoteKind {
        match self.payload {
            NotePayload::Text(_) => NoteKind::Text,
            NotePayload::Image(_) => NoteKind::Image,
        }
    }

    pub fn is_clarified(&self) -> bool {
        self.clarification.is_some()
    }

    /// Caption of an image note, if any.
    pub fn caption(&self) -> Option<&str> {
        match &self.payload {
            NotePayload::Image(img) => img.caption.as_deref(),
            NotePayload::Text(_) => None,
        }
    }

    /// One-line preview, truncated to `max_chars` characters.
    ///
    /// Images render as `[Image] <caption or clarification>`.
    pub fn preview(&self, max_chars: usize) -> String {
        let line = match &self.payload {
            NotePayload::Text(text) => text.clone(),
            NotePayload::Image(img) => {
                let context = img
                    .caption
                    .as_deref()
                    .or(self.clarification.as_deref())
                    .unwrap_or("");
                format!("[Image] {}", context)
            }
        };
        truncate_chars(&collapse_whitespace(&line), max_chars)
    }
}

/// Collapse runs of whitespace (including newlines) into single spaces.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate on a character boundary, appending an ellipsis when cut.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let cut: String = s.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{}…", cut.trim_end())
}

// =============================================================================
// GENERATIVE SERVICE
// =============================================================================

/// One ordered fragment submitted to the generative service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    Text(String),
    Image { media_type: String, data: Vec<u8> },
}

impl Fragment {
    pub fn text(s: impl Into<String>) -> Self {
        Fragment::Text(s.into())
    }
}

// =============================================================================
// STRUCTURED RECORDS
// =============================================================================

/// One record parsed out of a batch structuring response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuredRecord {
    /// The verbatim block as returned by the service.
    pub raw_text: String,
    pub declared_type: Category,
    pub title: String,
    /// `id:` field, or a generated `YYYYMMDDHHmm` identifier.
    pub identifier: String,
    /// `person:` / `project:` field when present.
    pub name: Option<String>,
    /// Approximate origin raw note; see `zettel_pipeline::classify`.
    pub source_index: usize,
    /// Position of the record in the response.
    pub position: usize,
}

impl StructuredRecord {
    /// Name used to key an entity document (name field, else title).
    pub fn entity_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.title)
    }
}

/// Link to a written actionable item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossReference {
    pub path: String,
    pub title: String,
}

impl CrossReference {
    /// Obsidian wiki link: `[[tasks/2026-fix-ci|Fix CI]]`.
    pub fn wiki_link(&self) -> String {
        wiki_link(&self.path, &self.title)
    }
}

/// Render a wiki link for a store path (the `.md` suffix is dropped).
pub fn wiki_link(path: &str, title: &str) -> String {
    format!("[[{}|{}]]", path.trim_end_matches(".md"), title)
}

/// Result of writing one record to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushedRecord {
    pub path: String,
    pub title: String,
    pub category: Category,
    pub source_index: usize,
    /// True when merged into an existing document, false when newly created.
    pub merged: bool,
}

impl PushedRecord {
    pub fn cross_reference(&self) -> CrossReference {
        CrossReference {
            path: self.path.clone(),
            title: self.title.clone(),
        }
    }
}

// =============================================================================
// DOCUMENT STORE
// =============================================================================

/// File content with its optimistic-concurrency token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub content: String,
    pub version: String,
}

// =============================================================================
// CHAT TRANSPORT
// =============================================================================

/// Body of an incoming chat event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventBody {
    Text(String),
    Image {
        data: Vec<u8>,
        media_type: String,
        caption: Option<String>,
    },
    Command {
        name: String,
        args: String,
    },
}

/// Incoming chat event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingEvent {
    pub sender_id: i64,
    pub chat_id: i64,
    pub message_id: MessageId,
    pub reply_to_message_id: Option<MessageId>,
    pub body: EventBody,
}

/// Outgoing chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub chat_id: i64,
    pub text: String,
    pub reply_to_message_id: Option<MessageId>,
    pub markdown: bool,
}

impl OutgoingMessage {
    pub fn plain(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            reply_to_message_id: None,
            markdown: false,
        }
    }

    pub fn markdown(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            markdown: true,
            ..Self::plain(chat_id, text)
        }
    }

    pub fn in_reply_to(mut self, message_id: MessageId) -> Self {
        self.reply_to_message_id = Some(message_id);
        self
    }
}
