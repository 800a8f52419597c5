//! # zettel-pipeline
//!
//! The intake-and-dispatch pipeline.
//!
//! - [`session`]: intake queue and clarification state machine
//! - [`clarify`]: whether a new note gets a clarifying question
//! - [`batch`]: structuring request builder
//! - [`classify`]: structuring response → records
//! - [`router`]: actionable items first, then everything else
//! - [`upsert`]: create or merge one record in the store
//! - [`journal`]: per-day session log
//! - [`processor`]: ties the above into `/process` and `/save` runs

pub mod batch;
pub mod clarify;
pub mod classify;
pub mod journal;
pub mod processor;
pub mod router;
pub mod session;
pub mod upsert;

pub use batch::{build_batch_request, BatchRequest};
pub use clarify::{clarifying_question, IMAGE_CONTEXT_HINT, IMAGE_CONTEXT_QUESTION};
pub use classify::{parse_records, partition_actionable};
pub use journal::JournalAggregator;
pub use processor::{ProcessReport, Processor, SaveReport};
pub use router::{dispatch, DispatchOutcome, RecordFailure};
pub use session::{PendingKey, QueueStatus, Session};
pub use upsert::UpsertEngine;
