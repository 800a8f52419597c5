//! Filesystem-safe slugs and note identifiers.

use chrono::{DateTime, Local};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::defaults::{DATE_FORMAT, NOTE_ID_FORMAT, SLUG_MAX_LEN};

static NON_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\p{L}\p{N}\s-]").expect("valid regex"));
static SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s_-]+").expect("valid regex"));

/// Normalize a title or name to a lowercase slug of letters, digits and
/// dashes, at most [`SLUG_MAX_LEN`] characters. Non-Latin letters are kept.
///
/// ```
/// assert_eq!(zettel_core::slugify("Jane Doe"), "jane-doe");
/// assert_eq!(zettel_core::slugify("  Q3: Platform / Infra!  "), "q3-platform-infra");
/// ```
pub fn slugify(input: &str) -> String {
    let lower = input.to_lowercase();
    let cleaned = NON_WORD.replace_all(&lower, " ");
    let joined = SEPARATORS.replace_all(cleaned.trim(), "-");
    let mut slug: String = joined.trim_matches('-').chars().take(SLUG_MAX_LEN).collect();
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Generated note identifier (`YYYYMMDDHHmm`).
pub fn note_id(now: &DateTime<Local>) -> String {
    now.format(NOTE_ID_FORMAT).to_string()
}

/// Calendar date (`YYYY-MM-DD`).
pub fn date_stamp(now: &DateTime<Local>) -> String {
    now.format(DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_slugify_basic() {
        assert_eq!(slugify("Jane Doe"), "jane-doe");
        assert_eq!(slugify("jane   doe"), "jane-doe");
    }

    #[test]
    fn test_slugify_strips_punctuation() {
        assert_eq!(slugify("1:1 with Jane (Q3)"), "1-1-with-jane-q3");
        assert_eq!(slugify("--Atlas__Migration--"), "atlas-migration");
    }

    #[test]
    fn test_slugify_keeps_unicode_letters() {
        assert_eq!(slugify("Café Résumé"), "café-résumé");
        assert_eq!(slugify("Zoë"), "zoë");
        assert_eq!(slugify("李雷"), "李雷");
        assert_ne!(slugify("李雷"), slugify("韩梅梅"));
        assert_eq!(slugify("Ünïcode 2 / test"), "ünïcode-2-test");
    }

    #[test]
    fn test_slugify_truncates_without_trailing_dash() {
        let long = "word ".repeat(30);
        let slug = slugify(&long);
        assert!(slug.len() <= SLUG_MAX_LEN);
        assert!(!slug.ends_with('-'));

        let wide = slugify(&"名".repeat(100));
        assert_eq!(wide.chars().count(), SLUG_MAX_LEN);
    }

    #[test]
    fn test_slugify_empty() {
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_note_id_and_date_stamp() {
        let now = Local.with_ymd_and_hms(2026, 10, 16, 9, 5, 0).unwrap();
        assert_eq!(note_id(&now), "202610160905");
        assert_eq!(date_stamp(&now), "2026-10-16");
    }
}
