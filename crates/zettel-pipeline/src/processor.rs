//! Processing runs: structure the queued notes, dispatch the records, write
//! the journal, clear the queue.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Local};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use zettel_core::{DocumentStore, Error, GenerationBackend, PushedRecord, Result};

use crate::batch::build_batch_request;
use crate::classify::parse_records;
use crate::journal::JournalAggregator;
use crate::router::{dispatch, RecordFailure};
use crate::session::Session;
use crate::upsert::UpsertEngine;

/// Outcome of a `/process` run.
#[derive(Debug)]
pub struct ProcessReport {
    pub session_id: Uuid,
    pub note_count: usize,
    pub pushed: Vec<PushedRecord>,
    pub failures: Vec<RecordFailure>,
    /// Journal path, or why the journal could not be written.
    pub journal: std::result::Result<String, Error>,
}

impl ProcessReport {
    pub fn succeeded(&self) -> usize {
        self.pushed.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// Failures caused by a stale version token.
    pub fn conflicts(&self) -> impl Iterator<Item = &RecordFailure> {
        self.failures.iter().filter(|f| f.error.is_conflict())
    }
}

/// Outcome of a `/save` run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReport {
    pub note_count: usize,
    pub journal_path: String,
}

/// Drives processing runs against the generative service and the store.
#[derive(Clone)]
pub struct Processor {
    backend: Arc<dyn GenerationBackend>,
    engine: UpsertEngine,
    journal: JournalAggregator,
}

impl Processor {
    pub fn new(backend: Arc<dyn GenerationBackend>, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            engine: UpsertEngine::new(backend.clone(), store.clone()),
            journal: JournalAggregator::new(backend.clone(), store),
            backend,
        }
    }

    pub async fn process(&self, session: &mut Session) -> Result<ProcessReport> {
        self.process_at(session, Local::now()).await
    }

    /// Structure and dispatch every queued note.
    ///
    /// Fails, leaving the queue intact, when the queue is empty, the
    /// structuring call fails, or the response holds no records. Once
    /// dispatch starts the queue is always cleared, even if every record
    /// failed.
    #[instrument(skip_all, fields(
        subsystem = "pipeline",
        component = "processor",
        op = "process",
        session_id = %session.id(),
        note_count = session.len(),
    ))]
    pub async fn process_at(
        &self,
        session: &mut Session,
        now: DateTime<Local>,
    ) -> Result<ProcessReport> {
        if session.is_empty() {
            return Err(Error::EmptyQueue);
        }
        let start = Instant::now();
        let session_id = session.id();
        let note_count = session.len();

        let request = build_batch_request(session.notes(), session.mode());
        let response = self
            .backend
            .generate(request.instruction, &request.fragments)
            .await
            .map_err(|e| {
                error!(error = %e, "Structuring call failed, queue kept");
                e
            })?;

        let records = parse_records(&response, note_count, &now);
        if records.is_empty() {
            warn!(response_len = response.len(), "No structured records, queue kept");
            return Err(Error::NoStructuredOutput);
        }

        let outcome = dispatch(&self.engine, records, &now).await;

        let journal = self
            .journal
            .append_session(session.notes(), &outcome.pushed, session.mode(), &now)
            .await;
        if let Err(e) = &journal {
            error!(error = %e, error_kind = e.kind(), "Journal write failed");
        }

        session.clear();

        info!(
            succeeded = outcome.pushed.len(),
            failed = outcome.failures.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Processing run complete"
        );

        Ok(ProcessReport {
            session_id,
            note_count,
            pushed: outcome.pushed,
            failures: outcome.failures,
            journal,
        })
    }

    pub async fn save(&self, session: &mut Session) -> Result<SaveReport> {
        self.save_at(session, Local::now()).await
    }

    /// Journal the queued notes without structuring them, then clear.
    /// On a journal failure the queue is kept.
    #[instrument(skip_all, fields(
        subsystem = "pipeline",
        component = "processor",
        op = "save",
        session_id = %session.id(),
        note_count = session.len(),
    ))]
    pub async fn save_at(&self, session: &mut Session, now: DateTime<Local>) -> Result<SaveReport> {
        if session.is_empty() {
            return Err(Error::EmptyQueue);
        }
        let note_count = session.len();
        let journal_path = self
            .journal
            .append_session(session.notes(), &[], session.mode(), &now)
            .await?;
        session.clear();

        info!(journal_path = %journal_path, "Session saved to journal");
        Ok(SaveReport {
            note_count,
            journal_path,
        })
    }
}
