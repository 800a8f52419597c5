//! GitHub contents API document store.
//!
//! The blob `sha` returned by the contents API is the version token. Updates
//! send it back; GitHub rejects a stale one with 409, and a create that
//! targets an existing file with 422. Both surface as [`Error::Conflict`].

use async_trait::async_trait;
use base64::Engine;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use zettel_core::defaults::{GITHUB_API_URL, STORE_TIMEOUT_SECS};
use zettel_core::{DocumentStore, Error, Result, StoredFile};

const GITHUB_API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!("zettel-intake/", env!("CARGO_PKG_VERSION"));

/// Configuration for the GitHub store.
#[derive(Debug, Clone)]
pub struct GitHubConfig {
    /// API base URL.
    pub api_url: String,
    /// Token sent as a bearer credential.
    pub token: String,
    /// Repository as `owner/name`.
    pub repo: String,
    /// Branch to read and commit to. `None` uses the default branch.
    pub branch: Option<String>,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
}

impl GitHubConfig {
    pub fn new(token: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            api_url: GITHUB_API_URL.to_string(),
            token: token.into(),
            repo: repo.into(),
            branch: None,
            timeout_seconds: STORE_TIMEOUT_SECS,
        }
    }

    /// Create config from environment variables.
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `GITHUB_TOKEN` | (required) | Token with contents read/write |
    /// | `GITHUB_REPO` | (required) | `owner/name` of the notes repo |
    /// | `GITHUB_BRANCH` | repo default | Branch to commit to |
    /// | `GITHUB_API_URL` | `https://api.github.com` | API endpoint |
    /// | `GITHUB_TIMEOUT` | `30` | Request timeout (seconds) |
    pub fn from_env() -> Result<Self> {
        let token = std::env::var("GITHUB_TOKEN")
            .map_err(|_| Error::Config("GITHUB_TOKEN is not set".to_string()))?;
        let repo = std::env::var("GITHUB_REPO")
            .map_err(|_| Error::Config("GITHUB_REPO is not set".to_string()))?;
        if !repo.contains('/') {
            return Err(Error::Config(format!(
                "GITHUB_REPO must be owner/name, got {}",
                repo
            )));
        }
        Ok(Self {
            api_url: std::env::var("GITHUB_API_URL").unwrap_or_else(|_| GITHUB_API_URL.to_string()),
            token,
            repo,
            branch: std::env::var("GITHUB_BRANCH").ok().filter(|b| !b.is_empty()),
            timeout_seconds: std::env::var("GITHUB_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(STORE_TIMEOUT_SECS),
        })
    }
}

#[derive(Debug, Deserialize)]
struct FileContent {
    sha: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct DirEntry {
    name: String,
    #[serde(rename = "type")]
    entry_type: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ContentsResponse {
    Dir(Vec<DirEntry>),
    File(FileContent),
}

#[derive(Debug, Serialize)]
struct PutContentsRequest<'a> {
    message: &'a str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    branch: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct GitHubErrorResponse {
    message: String,
}

/// Document store backed by a GitHub repository.
pub struct GitHubStore {
    client: Client,
    config: GitHubConfig,
}

impl GitHubStore {
    pub fn new(config: GitHubConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::Store(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            subsystem = "store",
            component = "github",
            repo = %config.repo,
            branch = config.branch.as_deref().unwrap_or("(default)"),
            "Initializing GitHub store"
        );

        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(GitHubConfig::from_env()?)
    }

    pub fn config(&self) -> &GitHubConfig {
        &self.config
    }

    fn contents_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/contents/{}",
            self.config.api_url.trim_end_matches('/'),
            self.config.repo,
            path.trim_matches('/')
        )
    }

    fn get_request(&self, path: &str) -> reqwest::RequestBuilder {
        let mut request = self
            .client
            .get(self.contents_url(path))
            .bearer_auth(&self.config.token)
            .header("accept", "application/vnd.github+json")
            .header("x-github-api-version", GITHUB_API_VERSION);
        if let Some(branch) = &self.config.branch {
            request = request.query(&[("ref", branch)]);
        }
        request
    }

    async fn fetch(&self, path: &str) -> Result<Option<ContentsResponse>> {
        let response = self
            .get_request(path)
            .send()
            .await
            .map_err(|e| Error::Store(format!("Request failed: {}", e)))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(Error::Store(format!(
                "GitHub returned {} for {}: {}",
                status,
                path,
                error_message(response).await
            )));
        }

        response
            .json::<ContentsResponse>()
            .await
            .map(Some)
            .map_err(|e| Error::Store(format!("Failed to parse contents of {}: {}", path, e)))
    }

    async fn put(&self, path: &str, message: &str, content: &str, sha: Option<&str>) -> Result<()> {
        let start = Instant::now();
        let body = PutContentsRequest {
            message,
            content: base64::engine::general_purpose::STANDARD.encode(content.as_bytes()),
            sha,
            branch: self.config.branch.as_deref(),
        };

        let response = self
            .client
            .put(self.contents_url(path))
            .bearer_auth(&self.config.token)
            .header("accept", "application/vnd.github+json")
            .header("x-github-api-version", GITHUB_API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Store(format!("Request failed: {}", e)))?;

        let status = response.status();
        match status {
            s if s.is_success() => {
                debug!(
                    path,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Commit complete"
                );
                Ok(())
            }
            StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
                let detail = error_message(response).await;
                warn!(path, status = %status, detail = %detail, "Write rejected as stale");
                Err(Error::Conflict {
                    path: path.to_string(),
                })
            }
            _ => Err(Error::Store(format!(
                "GitHub returned {} for {}: {}",
                status,
                path,
                error_message(response).await
            ))),
        }
    }
}

async fn error_message(response: reqwest::Response) -> String {
    response
        .json::<GitHubErrorResponse>()
        .await
        .map(|body| body.message)
        .unwrap_or_else(|_| "Unknown error".to_string())
}

/// Decode the contents API's line-wrapped base64.
fn decode_content(encoded: &str) -> Result<String> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| Error::Store(format!("Invalid base64 content: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| Error::Store(format!("File is not UTF-8: {}", e)))
}

#[async_trait]
impl DocumentStore for GitHubStore {
    #[instrument(skip(self), fields(subsystem = "store", component = "github", op = "get_file"))]
    async fn get_file(&self, path: &str) -> Result<Option<StoredFile>> {
        match self.fetch(path).await? {
            None => Ok(None),
            Some(ContentsResponse::File(file)) => Ok(Some(StoredFile {
                content: decode_content(&file.content)?,
                version: file.sha,
            })),
            Some(ContentsResponse::Dir(_)) => Err(Error::InvalidInput(format!(
                "{} is a directory, not a file",
                path
            ))),
        }
    }

    #[instrument(skip(self), fields(subsystem = "store", component = "github", op = "list_folder"))]
    async fn list_folder(&self, folder: &str) -> Result<Vec<String>> {
        match self.fetch(folder).await? {
            None => Ok(Vec::new()),
            Some(ContentsResponse::Dir(entries)) => Ok(entries
                .into_iter()
                .filter(|e| e.entry_type == "file")
                .map(|e| e.name)
                .collect()),
            Some(ContentsResponse::File(_)) => Err(Error::InvalidInput(format!(
                "{} is a file, not a directory",
                folder
            ))),
        }
    }

    #[instrument(skip(self, content), fields(subsystem = "store", component = "github", op = "create_file"))]
    async fn create_file(&self, path: &str, message: &str, content: &str) -> Result<()> {
        self.put(path, message, content, None).await
    }

    #[instrument(skip(self, content), fields(subsystem = "store", component = "github", op = "update_file"))]
    async fn update_file(
        &self,
        path: &str,
        message: &str,
        content: &str,
        version: &str,
    ) -> Result<()> {
        self.put(path, message, content, Some(version)).await
    }
}
