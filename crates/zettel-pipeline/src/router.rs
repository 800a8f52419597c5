//! Record router: dispatches structured records to the upsert engine.
//!
//! Actionable items are written first so that the references they produce
//! can be attached to the people and project documents derived from the
//! same raw note.

use std::collections::HashMap;

use chrono::{DateTime, Local};
use tracing::{error, info, instrument};

use zettel_core::{Category, CrossReference, Error, PushedRecord, StructuredRecord};

use crate::classify::partition_actionable;
use crate::upsert::UpsertEngine;

/// A record that could not be written.
#[derive(Debug)]
pub struct RecordFailure {
    pub title: String,
    pub category: Category,
    pub error: Error,
}

/// Result of dispatching one batch of records.
#[derive(Debug, Default)]
pub struct DispatchOutcome {
    /// Written records, in write order.
    pub pushed: Vec<PushedRecord>,
    pub failures: Vec<RecordFailure>,
}

impl DispatchOutcome {
    fn record(&mut self, record: &StructuredRecord, result: zettel_core::Result<PushedRecord>) {
        match result {
            Ok(pushed) => self.pushed.push(pushed),
            Err(e) => {
                error!(
                    title = %record.title,
                    category = %record.declared_type,
                    error = %e,
                    error_kind = e.kind(),
                    "Record write failed"
                );
                self.failures.push(RecordFailure {
                    title: record.title.clone(),
                    category: record.declared_type,
                    error: e,
                });
            }
        }
    }
}

/// Write every record. A failed record is logged and counted; the rest of
/// the batch continues.
#[instrument(skip_all, fields(
    subsystem = "pipeline",
    component = "router",
    op = "dispatch",
    record_count = records.len(),
))]
pub async fn dispatch(
    engine: &UpsertEngine,
    records: Vec<StructuredRecord>,
    now: &DateTime<Local>,
) -> DispatchOutcome {
    let mut outcome = DispatchOutcome::default();
    let (actionable, rest) = partition_actionable(records);

    let mut references: HashMap<usize, Vec<CrossReference>> = HashMap::new();
    for record in &actionable {
        let result = engine.upsert(record, &[], now).await;
        if let Ok(pushed) = &result {
            references
                .entry(record.source_index)
                .or_default()
                .push(pushed.cross_reference());
        }
        outcome.record(record, result);
    }

    for record in &rest {
        let related: &[CrossReference] = if record.declared_type.is_entity() {
            references
                .get(&record.source_index)
                .map(Vec::as_slice)
                .unwrap_or(&[])
        } else {
            &[]
        };
        let result = engine.upsert(record, related, now).await;
        outcome.record(record, result);
    }

    info!(
        pushed = outcome.pushed.len(),
        failed = outcome.failures.len(),
        "Dispatch complete"
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::parse_records;
    use chrono::TimeZone;
    use std::sync::Arc;
    use zettel_inference::mock::ScriptedBackend;
    use zettel_store::MemoryStore;

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 10, 16, 9, 30, 0).unwrap()
    }

    fn engine(store: &MemoryStore) -> UpsertEngine {
        UpsertEngine::new(Arc::new(ScriptedBackend::new()), Arc::new(store.clone()))
    }

    #[tokio::test]
    async fn test_actionable_items_written_first() {
        let store = MemoryStore::new();
        let records = parse_records(
            "---\ntitle: Jane note\ntype: people\nperson: Jane Doe\n---\nx\n===\n---\ntitle: Atlas\ntype: projects\nproject: Atlas\n---\ny\n===\n---\ntitle: Fix CI\ntype: tasks\n---\nz\n",
            1,
            &now(),
        );

        let outcome = dispatch(&engine(&store), records, &now()).await;

        let categories: Vec<_> = outcome.pushed.iter().map(|p| p.category).collect();
        assert_eq!(
            categories,
            vec![Category::Task, Category::Person, Category::Project]
        );
        assert!(outcome.failures.is_empty());
    }

    #[tokio::test]
    async fn test_references_attached_by_source_index() {
        let store = MemoryStore::new();
        // Two notes: record 0 and 2 come from note 0, record 1 from note 1.
        let records = parse_records(
            "---\ntitle: Fix CI\ntype: tasks\n---\nz\n===\n---\ntitle: Other task\ntype: tasks\n---\nq\n===\n---\ntitle: Jane note\ntype: people\nperson: Jane Doe\n---\nx\n===\n---\ntitle: Idea\ntype: fleeting\n---\nw\n",
            2,
            &now(),
        );

        dispatch(&engine(&store), records, &now()).await;

        let jane = store.content("people/jane-doe.md").await.unwrap();
        assert!(jane.contains("[[tasks/202610160930-fix-ci|Fix CI]]"));
        assert!(!jane.contains("Other task"));
        let idea = store
            .content("fleeting/202610160930-idea.md")
            .await
            .unwrap();
        assert!(!idea.contains("[["));
    }

    #[tokio::test]
    async fn test_single_failure_does_not_stop_batch() {
        let store = MemoryStore::with_files([("fleeting/202610160930-taken.md", "old")]);
        let records = parse_records(
            "---\ntitle: Taken\ntype: fleeting\n---\na\n===\n---\ntitle: Free\ntype: fleeting\n---\nb\n",
            2,
            &now(),
        );

        let outcome = dispatch(&engine(&store), records, &now()).await;

        assert_eq!(outcome.pushed.len(), 1);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].title, "Taken");
        assert!(outcome.failures[0].error.is_conflict());
    }
}
