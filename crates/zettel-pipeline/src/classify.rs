//! Record classifier: splits a structuring response into records.

use chrono::{DateTime, Local};
use tracing::debug;

use zettel_core::defaults::UNTITLED;
use zettel_core::markdown::field;
use zettel_core::{note_id, slugify, Category, StructuredRecord};
use zettel_inference::prompts::{split_records, strip_code_fence};

/// Parse a structuring response into records.
///
/// `note_count` is the number of raw notes in the batch. The service does
/// not report which note a record came from, so record `i` is attributed to
/// note `i mod note_count`. This is approximate whenever a note was split
/// into several records.
pub fn parse_records(
    response: &str,
    note_count: usize,
    now: &DateTime<Local>,
) -> Vec<StructuredRecord> {
    let records: Vec<StructuredRecord> = split_records(strip_code_fence(response))
        .into_iter()
        .enumerate()
        .map(|(position, raw_text)| parse_record(raw_text, position, note_count, now))
        .collect();
    debug!(
        record_count = records.len(),
        note_count, "Structuring response parsed"
    );
    records
}

fn parse_record(
    raw_text: String,
    position: usize,
    note_count: usize,
    now: &DateTime<Local>,
) -> StructuredRecord {
    let declared_type = field(&raw_text, "type")
        .and_then(|t| Category::from_declared(&t))
        .unwrap_or(Category::Fleeting);

    let title = field(&raw_text, "title").unwrap_or_else(|| UNTITLED.to_string());

    let identifier = field(&raw_text, "id")
        .map(|id| slugify(&id))
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| note_id(now));

    let name = match declared_type {
        Category::Project => field(&raw_text, "project").or_else(|| field(&raw_text, "person")),
        _ => field(&raw_text, "person").or_else(|| field(&raw_text, "project")),
    };

    StructuredRecord {
        raw_text,
        declared_type,
        title,
        identifier,
        name,
        source_index: if note_count == 0 { 0 } else { position % note_count },
        position,
    }
}

/// Split records into actionable items and everything else, each keeping
/// its relative order.
pub fn partition_actionable(
    records: Vec<StructuredRecord>,
) -> (Vec<StructuredRecord>, Vec<StructuredRecord>) {
    records
        .into_iter()
        .partition(|r| r.declared_type == Category::Task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 10, 16, 9, 30, 0).unwrap()
    }

    const RESPONSE: &str = "---\nid: 202610160930\ntitle: Jane wants platform\ntype: people\nperson: Jane Doe\n---\n\nJane wants to move.\n\n===\n\n---\ntitle: Fix CI\ntype: tasks\nstatus: open\n---\n\nFix the flaky pipeline.\n===\n---\ntitle: Odd one\ntype: recipes\n---\nbody\n";

    #[test]
    fn test_parse_records_fields() {
        let records = parse_records(RESPONSE, 2, &now());
        assert_eq!(records.len(), 3);

        assert_eq!(records[0].declared_type, Category::Person);
        assert_eq!(records[0].title, "Jane wants platform");
        assert_eq!(records[0].identifier, "202610160930");
        assert_eq!(records[0].name.as_deref(), Some("Jane Doe"));

        assert_eq!(records[1].declared_type, Category::Task);
        assert_eq!(records[1].identifier, "202610160930");
        assert!(records[1].name.is_none());
    }

    #[test]
    fn test_unknown_type_defaults_to_fleeting() {
        let records = parse_records(RESPONSE, 2, &now());
        assert_eq!(records[2].declared_type, Category::Fleeting);
    }

    #[test]
    fn test_source_index_wraps() {
        let records = parse_records(RESPONSE, 2, &now());
        let indices: Vec<_> = records.iter().map(|r| r.source_index).collect();
        assert_eq!(indices, vec![0, 1, 0]);
    }

    #[test]
    fn test_missing_title_is_untitled() {
        let records = parse_records("just a loose thought", 1, &now());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, UNTITLED);
        assert_eq!(records[0].declared_type, Category::Fleeting);
    }

    #[test]
    fn test_empty_and_fenced_responses() {
        assert!(parse_records("  \n===\n  ", 3, &now()).is_empty());
        let fenced = "```markdown\n---\ntitle: A\ntype: permanent\n---\nbody\n```";
        let records = parse_records(fenced, 1, &now());
        assert_eq!(records[0].declared_type, Category::Permanent);
    }

    #[test]
    fn test_project_name_prefers_project_field() {
        let records = parse_records(
            "---\ntitle: Atlas update\ntype: projects\nproject: Atlas\n---\nx",
            1,
            &now(),
        );
        assert_eq!(records[0].entity_name(), "Atlas");
    }

    #[test]
    fn test_partition_keeps_relative_order() {
        let records = parse_records(
            "---\ntitle: A\ntype: people\n---\n===\n---\ntitle: B\ntype: tasks\n---\n===\n---\ntitle: C\ntype: fleeting\n---\n===\n---\ntitle: D\ntype: tasks\n---\n",
            4,
            &now(),
        );
        let (tasks, rest) = partition_actionable(records);
        let titles = |v: &[StructuredRecord]| v.iter().map(|r| r.title.clone()).collect::<Vec<_>>();
        assert_eq!(titles(&tasks), vec!["B", "D"]);
        assert_eq!(titles(&rest), vec!["A", "C"]);
    }
}
