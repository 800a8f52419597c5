//! End-to-end pipeline scenarios against the scripted backend and the
//! in-memory store.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone};

use zettel_core::markdown::split_front_matter;
use zettel_core::{Category, DocumentStore, Error, RawNote, Result, StoredFile};
use zettel_inference::mock::ScriptedBackend;
use zettel_inference::prompts::{
    CLARIFICATION_PROMPT, MERGE_PROMPT, PERSONAL_PROMPT, SUMMARY_PROMPT, WORK_PROMPT,
};
use zettel_pipeline::{clarifying_question, Processor, Session, IMAGE_CONTEXT_QUESTION};
use zettel_store::MemoryStore;

fn today() -> DateTime<Local> {
    Local.with_ymd_and_hms(2026, 10, 16, 9, 30, 0).unwrap()
}

const JANE_RESPONSE: &str = "---\nid: 202610160930\ntitle: Jane wants platform team\ntype: people\nperson: Jane Doe\ntags: [#people, #growth]\n---\n\nJane wants to move to the platform team by Q3.\n";

fn processor(backend: &ScriptedBackend, store: Arc<dyn DocumentStore>) -> Processor {
    Processor::new(Arc::new(backend.clone()), store)
}

#[tokio::test]
async fn test_jane_scenario_question_answer_process() {
    let backend = ScriptedBackend::new()
        .respond_to(CLARIFICATION_PROMPT, "QUESTION: Who is Jane and what was discussed?")
        .respond_to(WORK_PROMPT, JANE_RESPONSE)
        .respond_to(SUMMARY_PROMPT, "Had a 1:1 with Jane.");
    let store = MemoryStore::new();
    let mut session = Session::new();

    let index = session.enqueue(RawNote::text("1:1 with Jane, wants platform", today()));
    let question = clarifying_question(&backend, session.note(index).unwrap())
        .await
        .expect("note should get a question");
    assert_eq!(question, "Who is Jane and what was discussed?");

    let key = session.request_clarification(index, 501).unwrap();
    assert!(session.answer_clarification(key, "Jane Doe, my report; Q3 move"));

    let report = processor(&backend, Arc::new(store.clone()))
        .process_at(&mut session, today())
        .await
        .unwrap();

    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.failed(), 0);
    assert_eq!(report.pushed[0].path, "people/jane-doe.md");
    assert!(session.is_empty());
    assert_eq!(session.pending_count(), 0);

    let doc = store.content("people/jane-doe.md").await.unwrap();
    assert!(doc.contains("- 2026-10-16: Jane wants to move to the platform team by Q3."));

    let structuring = &backend.calls_for(WORK_PROMPT)[0];
    assert!(structuring
        .text()
        .contains("[Clarification provided]: Jane Doe, my report; Q3 move"));
}

#[tokio::test]
async fn test_same_entity_twice_extends_one_document() {
    let backend = ScriptedBackend::new()
        .respond_to(WORK_PROMPT, JANE_RESPONSE)
        .fail_on(MERGE_PROMPT, "overloaded")
        .with_default_response("summary");
    let store = MemoryStore::new();
    let processor = processor(&backend, Arc::new(store.clone()));

    let mut session = Session::new();
    session.enqueue(RawNote::text("@Jane Doe wants platform", today()));
    processor.process_at(&mut session, today()).await.unwrap();
    let first = store.content("people/jane-doe.md").await.unwrap();

    session.enqueue(RawNote::text("@Jane Doe still wants platform", today()));
    let report = processor.process_at(&mut session, today()).await.unwrap();
    let second = store.content("people/jane-doe.md").await.unwrap();

    assert!(report.pushed[0].merged);
    let people: Vec<_> = store
        .paths()
        .await
        .into_iter()
        .filter(|p| p.starts_with("people/"))
        .collect();
    assert_eq!(people, vec!["people/jane-doe.md".to_string()]);
    assert_eq!(second.matches("- 2026-10-16:").count(), 2);
    assert_eq!(
        split_front_matter(&first).unwrap().0,
        split_front_matter(&second).unwrap().0
    );
}

#[tokio::test]
async fn test_image_scenario_journal_preview_links_one_record() {
    let backend = ScriptedBackend::new()
        .respond_to(
            WORK_PROMPT,
            "---\nid: 202610160931\ntitle: Sprint planning board\ntype: meetings\n---\n\nBoard contents.\n",
        )
        .respond_to(SUMMARY_PROMPT, "Planned the sprint.");
    let store = MemoryStore::new();
    let mut session = Session::new();

    let index = session.enqueue(RawNote::image(vec![0xff, 0xd8], "image/jpeg", None, today()));
    let question = clarifying_question(&backend, session.note(index).unwrap()).await;
    assert_eq!(question.as_deref(), Some(IMAGE_CONTEXT_QUESTION));
    session.request_clarification(index, 77).unwrap();
    assert!(session.answer_clarification(77, "whiteboard from sprint planning"));

    let report = processor(&backend, Arc::new(store.clone()))
        .process_at(&mut session, today())
        .await
        .unwrap();

    let journal_path = report.journal.as_ref().unwrap();
    let journal = store.content(journal_path).await.unwrap();
    assert!(journal.contains(
        "- [Image] whiteboard from sprint planning\n    - [[meetings/2026-10-16-sprint-planning-board|Sprint planning board]] (created)\n"
    ));
    assert_eq!(journal.matches("    - [[").count(), 1);
    assert_eq!(backend.calls_for(CLARIFICATION_PROMPT).len(), 0);
}

/// Store where another writer updates a file right after it is read.
struct RacingStore {
    inner: MemoryStore,
    contested: String,
}

#[async_trait]
impl DocumentStore for RacingStore {
    async fn get_file(&self, path: &str) -> Result<Option<StoredFile>> {
        let file = self.inner.get_file(path).await?;
        if path == self.contested {
            self.inner.overwrite(path, "edited on another device\n").await;
        }
        Ok(file)
    }

    async fn list_folder(&self, folder: &str) -> Result<Vec<String>> {
        self.inner.list_folder(folder).await
    }

    async fn create_file(&self, path: &str, message: &str, content: &str) -> Result<()> {
        self.inner.create_file(path, message, content).await
    }

    async fn update_file(
        &self,
        path: &str,
        message: &str,
        content: &str,
        version: &str,
    ) -> Result<()> {
        self.inner.update_file(path, message, content, version).await
    }
}

#[tokio::test]
async fn test_stale_token_on_merge_is_conflict_and_file_unchanged() {
    let inner = MemoryStore::with_files([("people/jane-doe.md", "# Jane Doe\n")]);
    let store = RacingStore {
        inner: inner.clone(),
        contested: "people/jane-doe.md".to_string(),
    };
    let backend = ScriptedBackend::new()
        .respond_to(WORK_PROMPT, JANE_RESPONSE)
        .fail_on(MERGE_PROMPT, "down")
        .with_default_response("summary");
    let mut session = Session::new();
    session.enqueue(RawNote::text("@Jane Doe wants platform", today()));

    let report = processor(&backend, Arc::new(store))
        .process_at(&mut session, today())
        .await
        .unwrap();

    assert_eq!(report.succeeded(), 0);
    assert_eq!(report.conflicts().count(), 1);
    assert!(matches!(
        report.failures[0].error,
        Error::Conflict { ref path } if path == "people/jane-doe.md"
    ));
    assert_eq!(
        inner.content("people/jane-doe.md").await.unwrap(),
        "edited on another device\n"
    );
    // Dispatch happened, so the queue is cleared even though nothing was written.
    assert!(session.is_empty());
}

#[tokio::test]
async fn test_actionable_items_first_for_any_order() {
    let response = "---\ntitle: Atlas slipped\ntype: projects\nproject: Atlas\n---\nx\n===\n---\ntitle: Weekly sync\ntype: meetings\n---\ny\n===\n---\ntitle: Jane growth\ntype: people\nperson: Jane Doe\n---\nz\n===\n---\ntitle: Fix CI\ntype: tasks\n---\nw\n";
    let backend = ScriptedBackend::new()
        .respond_to(WORK_PROMPT, response)
        .with_default_response("summary");
    let store = MemoryStore::new();
    let mut session = Session::new();
    session.enqueue(RawNote::text("a dump of everything", today()));

    let report = processor(&backend, Arc::new(store.clone()))
        .process_at(&mut session, today())
        .await
        .unwrap();

    let order: Vec<_> = report.pushed.iter().map(|p| p.category).collect();
    assert_eq!(
        order,
        vec![
            Category::Task,
            Category::Project,
            Category::Meeting,
            Category::Person
        ]
    );
    let atlas = store.content("projects/atlas.md").await.unwrap();
    assert!(atlas.contains("## Action Items"));
    assert!(atlas.contains("Fix CI]]"));
}

#[tokio::test]
async fn test_structuring_failure_keeps_queue() {
    let backend = ScriptedBackend::new().fail_on(WORK_PROMPT, "unreachable");
    let mut session = Session::new();
    session.enqueue(RawNote::text("a", today()));
    session.request_clarification(0, 9).unwrap();

    let err = processor(&backend, Arc::new(MemoryStore::new()))
        .process_at(&mut session, today())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Inference(_)));
    assert_eq!(session.len(), 1);
    assert!(session.is_pending(9));
}

#[tokio::test]
async fn test_no_records_keeps_queue() {
    let backend = ScriptedBackend::new().respond_to(WORK_PROMPT, "\n===\n");
    let store = MemoryStore::new();
    let mut session = Session::new();
    session.enqueue(RawNote::text("a", today()));

    let err = processor(&backend, Arc::new(store.clone()))
        .process_at(&mut session, today())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::NoStructuredOutput));
    assert_eq!(session.len(), 1);
    assert!(store.paths().await.is_empty());
}

#[tokio::test]
async fn test_empty_queue_is_rejected() {
    let backend = ScriptedBackend::new();
    let mut session = Session::new();
    let processor = processor(&backend, Arc::new(MemoryStore::new()));

    assert!(matches!(
        processor.process_at(&mut session, today()).await,
        Err(Error::EmptyQueue)
    ));
    assert!(matches!(
        processor.save_at(&mut session, today()).await,
        Err(Error::EmptyQueue)
    ));
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn test_personal_mode_uses_personal_template() {
    let backend = ScriptedBackend::new()
        .respond_to(
            PERSONAL_PROMPT,
            "---\nid: 202610160930\ntitle: Run 5k\ntype: personal\n---\nTraining plan.\n",
        )
        .with_default_response("summary");
    let store = MemoryStore::new();
    let mut session = Session::new();
    session.set_mode(zettel_core::Mode::Personal);
    session.enqueue(RawNote::text("start running again", today()));

    let report = processor(&backend, Arc::new(store.clone()))
        .process_at(&mut session, today())
        .await
        .unwrap();

    assert_eq!(report.pushed[0].path, "personal/202610160930-run-5k.md");
    assert_eq!(backend.calls_for(WORK_PROMPT).len(), 0);
}

#[tokio::test]
async fn test_save_writes_journal_only_and_clears() {
    let backend = ScriptedBackend::new().respond_to(SUMMARY_PROMPT, "Thoughts saved.");
    let store = MemoryStore::new();
    let mut session = Session::new();
    session.enqueue(RawNote::text("idea one", today()));
    session.enqueue(RawNote::text("idea two", today()));

    let report = processor(&backend, Arc::new(store.clone()))
        .save_at(&mut session, today())
        .await
        .unwrap();

    assert_eq!(report.note_count, 2);
    assert_eq!(store.paths().await, vec!["journal/2026-10-16.md".to_string()]);
    let journal = store.content(&report.journal_path).await.unwrap();
    assert!(journal.contains("- idea one\n- idea two\n"));
    assert!(session.is_empty());
    assert_eq!(backend.calls_for(WORK_PROMPT).len(), 0);
}
