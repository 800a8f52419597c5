//! # zettel-core
//!
//! Core types, traits, and abstractions for the zettel-intake pipeline.
//!
//! This crate provides the foundational data structures (raw notes,
//! structured records, pushed records), the error taxonomy, and the trait
//! definitions for the external collaborators that other zettel-intake
//! crates depend on.
//!
//! ## Logging
//!
//! Spans carry `subsystem`/`component`/`op` fields; failures add
//! `error_kind` (see [`Error::kind`]).
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown), run completions |
//! | DEBUG | Decision points, intermediate values, config choices |

pub mod defaults;
pub mod error;
pub mod markdown;
pub mod models;
pub mod slug;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use models::*;
pub use slug::{date_stamp, note_id, slugify};
pub use traits::*;
