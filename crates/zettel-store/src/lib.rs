//! # zettel-store
//!
//! [`zettel_core::DocumentStore`] backends.
//!
//! - [`GitHubStore`]: a repository via the GitHub contents API
//! - [`MemoryStore`]: process memory, for tests and dry runs

pub mod github;
pub mod memory;

pub use github::{GitHubConfig, GitHubStore};
pub use memory::{content_version, MemoryStore};
