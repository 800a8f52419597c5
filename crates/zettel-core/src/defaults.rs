//! Centralized default constants for zettel-intake.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates reference these constants instead of defining their own magic
//! numbers. Organized by domain area.

// =============================================================================
// DOCUMENT LAYOUT
// =============================================================================

/// Folder for daily journal documents.
pub const JOURNAL_FOLDER: &str = "journal";

/// Maximum slug length used in filenames.
pub const SLUG_MAX_LEN: usize = 60;

/// Same-day meetings sharing a title get `-2`, `-3`, ... up to this count.
pub const MEETING_OCCURRENCE_LIMIT: u32 = 50;

/// Format of generated note identifiers (`YYYYMMDDHHmm`).
pub const NOTE_ID_FORMAT: &str = "%Y%m%d%H%M";

/// Calendar date format used for journal files and dated bullets.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

// =============================================================================
// BATCH RESPONSE
// =============================================================================

/// Line that separates records in a structuring response.
pub const RECORD_DELIMITER: &str = "===";

/// Title used when a record carries none.
pub const UNTITLED: &str = "untitled";

/// Maximum characters of a locally written observation bullet.
pub const BULLET_MAX_LENGTH: usize = 280;

// =============================================================================
// JOURNAL
// =============================================================================

/// Maximum characters of a raw-note preview in a journal block.
pub const PREVIEW_LENGTH: usize = 80;

// =============================================================================
// GENERATIVE SERVICE
// =============================================================================

/// Default Anthropic API base URL.
pub const ANTHROPIC_URL: &str = "https://api.anthropic.com";

/// Anthropic API version header value.
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Default generation model.
pub const GEN_MODEL: &str = "claude-opus-4-6";

/// Default max tokens for structuring and merge calls.
pub const GEN_MAX_TOKENS: u32 = 4096;

/// Request timeout for generative calls (seconds).
pub const GEN_TIMEOUT_SECS: u64 = 120;

// =============================================================================
// DOCUMENT STORE
// =============================================================================

/// Default GitHub REST API base URL.
pub const GITHUB_API_URL: &str = "https://api.github.com";

/// Request timeout for document store calls (seconds).
pub const STORE_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// CHAT TRANSPORT
// =============================================================================

/// Default Telegram Bot API base URL.
pub const TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Long-poll timeout passed to `getUpdates` (seconds).
pub const TELEGRAM_POLL_TIMEOUT_SECS: u64 = 30;

/// Media type assumed for chat photos.
pub const PHOTO_MEDIA_TYPE: &str = "image/jpeg";

/// Pause after a failed `getUpdates` call before polling again (seconds).
pub const POLL_ERROR_DELAY_SECS: u64 = 5;
