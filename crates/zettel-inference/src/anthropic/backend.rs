//! Anthropic Messages backend implementation.

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument};

use zettel_core::defaults::{
    ANTHROPIC_URL, ANTHROPIC_VERSION, GEN_MAX_TOKENS, GEN_MODEL, GEN_TIMEOUT_SECS,
};
use zettel_core::{Error, Fragment, GenerationBackend, Result};

use super::types::*;

/// Configuration for the Anthropic backend.
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    /// Base URL for the API (without `/v1`).
    pub base_url: String,
    /// API key sent as `x-api-key`.
    pub api_key: String,
    /// Model used for every call.
    pub model: String,
    /// `max_tokens` for every call.
    pub max_tokens: u32,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
}

impl AnthropicConfig {
    /// Config with defaults for everything but the key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: ANTHROPIC_URL.to_string(),
            api_key: api_key.into(),
            model: GEN_MODEL.to_string(),
            max_tokens: GEN_MAX_TOKENS,
            timeout_seconds: GEN_TIMEOUT_SECS,
        }
    }

    /// Create config from environment variables.
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `ANTHROPIC_API_KEY` | (required) | API key |
    /// | `ANTHROPIC_BASE_URL` | `https://api.anthropic.com` | API endpoint |
    /// | `ANTHROPIC_MODEL` | `claude-opus-4-6` | Generation model |
    /// | `ANTHROPIC_MAX_TOKENS` | `4096` | Max output tokens |
    /// | `ANTHROPIC_TIMEOUT` | `120` | Request timeout (seconds) |
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| Error::Config("ANTHROPIC_API_KEY is not set".to_string()))?;
        Ok(Self {
            base_url: std::env::var("ANTHROPIC_BASE_URL")
                .unwrap_or_else(|_| ANTHROPIC_URL.to_string()),
            api_key,
            model: std::env::var("ANTHROPIC_MODEL").unwrap_or_else(|_| GEN_MODEL.to_string()),
            max_tokens: std::env::var("ANTHROPIC_MAX_TOKENS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(GEN_MAX_TOKENS),
            timeout_seconds: std::env::var("ANTHROPIC_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(GEN_TIMEOUT_SECS),
        })
    }
}

/// Generative backend speaking the Anthropic Messages API.
pub struct AnthropicBackend {
    client: Client,
    config: AnthropicConfig,
}

impl AnthropicBackend {
    /// Create a new backend with the given configuration.
    pub fn new(config: AnthropicConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Inference(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            subsystem = "inference",
            component = "anthropic",
            url = %config.base_url,
            model = %config.model,
            "Initializing Anthropic backend"
        );

        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(AnthropicConfig::from_env()?)
    }

    /// Get the current configuration.
    pub fn config(&self) -> &AnthropicConfig {
        &self.config
    }

    /// Build the request body: the instruction first, then every fragment
    /// in order, all in a single user turn.
    pub fn build_request(&self, instruction: &str, fragments: &[Fragment]) -> MessagesRequest {
        let mut content = Vec::with_capacity(fragments.len() + 1);
        content.push(ContentBlock::Text {
            text: instruction.to_string(),
        });
        for fragment in fragments {
            content.push(match fragment {
                Fragment::Text(text) => ContentBlock::Text { text: text.clone() },
                Fragment::Image { media_type, data } => ContentBlock::Image {
                    source: ImageSource {
                        source_type: "base64".to_string(),
                        media_type: media_type.clone(),
                        data: base64::engine::general_purpose::STANDARD.encode(data),
                    },
                },
            });
        }

        MessagesRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            messages: vec![Message {
                role: "user".to_string(),
                content,
            }],
        }
    }
}

#[async_trait]
impl GenerationBackend for AnthropicBackend {
    #[instrument(skip(self, instruction, fragments), fields(
        subsystem = "inference",
        component = "anthropic",
        op = "generate",
        model = %self.config.model,
        fragment_count = fragments.len(),
    ))]
    async fn generate(&self, instruction: &str, fragments: &[Fragment]) -> Result<String> {
        let start = Instant::now();
        let request = self.build_request(instruction, fragments);
        let url = format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Inference(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response
                .json::<AnthropicErrorResponse>()
                .await
                .map(|body| body.error.message)
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Error::Inference(format!(
                "Anthropic returned {}: {}",
                status, message
            )));
        }

        let result: MessagesResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("Failed to parse response: {}", e)))?;

        let text = result.text();
        debug!(
            response_len = text.len(),
            stop_reason = result.stop_reason.as_deref().unwrap_or("unknown"),
            duration_ms = start.elapsed().as_millis() as u64,
            "Generation complete"
        );
        Ok(text)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_new_defaults() {
        let config = AnthropicConfig::new("key");
        assert_eq!(config.base_url, ANTHROPIC_URL);
        assert_eq!(config.model, GEN_MODEL);
        assert_eq!(config.max_tokens, GEN_MAX_TOKENS);
        assert_eq!(config.timeout_seconds, GEN_TIMEOUT_SECS);
        assert_eq!(config.api_key, "key");
    }

    #[test]
    fn test_backend_creation_and_model_name() {
        let backend = AnthropicBackend::new(AnthropicConfig {
            model: "claude-test".to_string(),
            ..AnthropicConfig::new("key")
        })
        .unwrap();
        assert_eq!(backend.model_name(), "claude-test");
    }

    #[test]
    fn test_build_request_orders_instruction_then_fragments() {
        let backend = AnthropicBackend::new(AnthropicConfig::new("key")).unwrap();
        let request = backend.build_request(
            "INSTRUCTION",
            &[
                Fragment::text("--- Note 1 ---"),
                Fragment::Image {
                    media_type: "image/png".to_string(),
                    data: vec![0, 1, 2],
                },
            ],
        );
        let json = serde_json::to_value(&request).unwrap();
        let content = &json["messages"][0]["content"];
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(content[0]["text"], "INSTRUCTION");
        assert_eq!(content[1]["text"], "--- Note 1 ---");
        assert_eq!(content[2]["type"], "image");
        assert_eq!(content[2]["source"]["data"], "AAEC");
        assert_eq!(content[2]["source"]["media_type"], "image/png");
    }
}
