//! Bot-level configuration.

use zettel_core::{Error, Result};

/// Which document store the bot writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    #[default]
    GitHub,
    /// Process memory; nothing survives a restart.
    Memory,
}

impl StoreBackend {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "github" => Ok(StoreBackend::GitHub),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(Error::Config(format!(
                "STORE_BACKEND must be github or memory, got {}",
                other
            ))),
        }
    }
}

/// Configuration for the bot actor.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// The only sender whose messages are handled.
    pub allowed_user_id: i64,
    pub store_backend: StoreBackend,
}

impl BotConfig {
    /// Create config from environment variables.
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `ALLOWED_USER_ID` | (required) | Telegram user id of the owner |
    /// | `STORE_BACKEND` | `github` | `github` or `memory` |
    pub fn from_env() -> Result<Self> {
        let raw = std::env::var("ALLOWED_USER_ID")
            .map_err(|_| Error::Config("ALLOWED_USER_ID is not set".to_string()))?;
        Self::from_values(&raw, std::env::var("STORE_BACKEND").ok().as_deref())
    }

    fn from_values(allowed_user_id: &str, store_backend: Option<&str>) -> Result<Self> {
        let allowed_user_id = allowed_user_id.trim().parse().map_err(|_| {
            Error::Config(format!(
                "ALLOWED_USER_ID must be a numeric user id, got {}",
                allowed_user_id
            ))
        })?;
        let store_backend = match store_backend {
            Some(value) => StoreBackend::parse(value)?,
            None => StoreBackend::default(),
        };
        Ok(Self {
            allowed_user_id,
            store_backend,
        })
    }
}
