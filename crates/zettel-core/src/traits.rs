//! Core traits for zettel-intake abstractions.
//!
//! These traits define the interfaces of the three external collaborators
//! (generative service, document store, chat transport), enabling pluggable
//! backends and testability.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Fragment, MessageId, OutgoingMessage, StoredFile};

// =============================================================================
// INFERENCE TRAITS
// =============================================================================

/// Backend for the generative text service.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Submit an instruction template followed by ordered fragments and
    /// return the single response text.
    async fn generate(&self, instruction: &str, fragments: &[Fragment]) -> Result<String>;

    /// Generate from a single text prompt.
    async fn generate_text(&self, instruction: &str, text: &str) -> Result<String> {
        self.generate(instruction, &[Fragment::text(text)]).await
    }

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}

// =============================================================================
// DOCUMENT STORE TRAITS
// =============================================================================

/// Version-controlled document store.
///
/// Writes are compare-and-swap: `update_file` must be given the version token
/// returned by the `get_file` it is based on, and fails with
/// [`Error::Conflict`](crate::Error::Conflict) when that token is stale.
/// After a conflict, callers re-read before attempting another write.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read a file. `Ok(None)` when it does not exist.
    async fn get_file(&self, path: &str) -> Result<Option<StoredFile>>;

    /// List the file names (not paths) directly inside a folder.
    /// A missing folder lists as empty.
    async fn list_folder(&self, folder: &str) -> Result<Vec<String>>;

    /// Create a new file. Fails with `Conflict` if it already exists.
    async fn create_file(&self, path: &str, message: &str, content: &str) -> Result<()>;

    /// Replace a file's content, guarded by its expected prior version.
    async fn update_file(
        &self,
        path: &str,
        message: &str,
        content: &str,
        version: &str,
    ) -> Result<()>;
}

// =============================================================================
// CHAT TRANSPORT TRAITS
// =============================================================================

/// Outgoing side of the chat transport.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send a message and return the transport's identifier for it.
    async fn send(&self, message: OutgoingMessage) -> Result<MessageId>;
}
