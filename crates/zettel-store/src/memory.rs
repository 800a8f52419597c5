//! In-memory document store.
//!
//! Same compare-and-swap semantics as the GitHub store, with SHA-256 content
//! hashes as version tokens. Used by tests and by dry runs
//! (`STORE_BACKEND=memory`).

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::debug;

use zettel_core::{DocumentStore, Error, Result, StoredFile};

/// Version token for a piece of content.
pub fn content_version(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// Document store held in process memory.
#[derive(Clone, Default)]
pub struct MemoryStore {
    files: Arc<RwLock<BTreeMap<String, StoredFile>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `(path, content)` pairs.
    pub fn with_files<I, P, C>(files: I) -> Self
    where
        I: IntoIterator<Item = (P, C)>,
        P: Into<String>,
        C: Into<String>,
    {
        let map = files
            .into_iter()
            .map(|(p, c)| {
                let content = c.into();
                let version = content_version(&content);
                (p.into(), StoredFile { content, version })
            })
            .collect();
        Self {
            files: Arc::new(RwLock::new(map)),
        }
    }

    /// Write a file unconditionally, as another writer would.
    pub async fn overwrite(&self, path: &str, content: &str) {
        self.files.write().await.insert(
            path.to_string(),
            StoredFile {
                content: content.to_string(),
                version: content_version(content),
            },
        );
    }

    /// Content of a file, if present.
    pub async fn content(&self, path: &str) -> Option<String> {
        self.files.read().await.get(path).map(|f| f.content.clone())
    }

    /// All stored paths, sorted.
    pub async fn paths(&self) -> Vec<String> {
        self.files.read().await.keys().cloned().collect()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get_file(&self, path: &str) -> Result<Option<StoredFile>> {
        Ok(self.files.read().await.get(path).cloned())
    }

    async fn list_folder(&self, folder: &str) -> Result<Vec<String>> {
        let prefix = format!("{}/", folder.trim_end_matches('/'));
        Ok(self
            .files
            .read()
            .await
            .keys()
            .filter_map(|p| p.strip_prefix(&prefix))
            .filter(|name| !name.contains('/'))
            .map(str::to_string)
            .collect())
    }

    async fn create_file(&self, path: &str, message: &str, content: &str) -> Result<()> {
        let mut files = self.files.write().await;
        if files.contains_key(path) {
            return Err(Error::Conflict {
                path: path.to_string(),
            });
        }
        debug!(path, message, "memory store create");
        files.insert(
            path.to_string(),
            StoredFile {
                content: content.to_string(),
                version: content_version(content),
            },
        );
        Ok(())
    }

    async fn update_file(
        &self,
        path: &str,
        message: &str,
        content: &str,
        version: &str,
    ) -> Result<()> {
        let mut files = self.files.write().await;
        match files.get_mut(path) {
            Some(file) if file.version == version => {
                debug!(path, message, "memory store update");
                file.content = content.to_string();
                file.version = content_version(content);
                Ok(())
            }
            Some(_) => Err(Error::Conflict {
                path: path.to_string(),
            }),
            None => Err(Error::NotFound(path.to_string())),
        }
    }
}
