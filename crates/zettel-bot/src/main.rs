//! zettel-bot - Telegram intake bot for zettel-intake

mod config;
mod handler;
mod telegram;

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::{BotConfig, StoreBackend};
use handler::Bot;
use telegram::TelegramClient;
use zettel_core::defaults::POLL_ERROR_DELAY_SECS;
use zettel_core::{ChatTransport, DocumentStore, GenerationBackend};
use zettel_inference::AnthropicBackend;
use zettel_pipeline::Processor;
use zettel_store::{GitHubStore, MemoryStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with configurable output
    //
    // Environment variables:
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   LOG_FILE    - path to log file (optional, enables file logging)
    //   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
    //   RUST_LOG    - standard env filter (default: "zettel_bot=debug,zettel_pipeline=debug")
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "zettel_bot=debug,zettel_pipeline=debug".into());

    let registry = tracing_subscriber::registry().with(env_filter);

    let _file_guard = if let Some(ref path) = log_file {
        let file_dir = std::path::Path::new(path)
            .parent()
            .unwrap_or(std::path::Path::new("."));
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("zettel-bot.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        // Console-only output
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );

    let config = BotConfig::from_env()?;
    let backend: Arc<dyn GenerationBackend> = Arc::new(AnthropicBackend::from_env()?);
    let store: Arc<dyn DocumentStore> = match config.store_backend {
        StoreBackend::GitHub => Arc::new(GitHubStore::from_env()?),
        StoreBackend::Memory => {
            warn!("STORE_BACKEND=memory, notes will not survive a restart");
            Arc::new(MemoryStore::new())
        }
    };
    let telegram = Arc::new(TelegramClient::from_env()?);
    let transport: Arc<dyn ChatTransport> = telegram.clone();

    let processor = Processor::new(backend.clone(), store);
    let mut bot = Bot::new(transport, backend.clone(), processor, config.allowed_user_id);

    info!(
        model = backend.model_name(),
        store_backend = ?config.store_backend,
        "zettel-bot started, polling for updates"
    );

    let mut offset: Option<i64> = None;
    loop {
        let updates = tokio::select! {
            result = telegram.get_updates(offset) => result,
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        };

        let updates = match updates {
            Ok(updates) => updates,
            Err(e) => {
                error!(error = %e, error_kind = e.kind(), "Polling for updates failed");
                tokio::time::sleep(Duration::from_secs(POLL_ERROR_DELAY_SECS)).await;
                continue;
            }
        };

        for update in updates {
            offset = Some(update.update_id + 1);
            match telegram.to_event(update).await {
                Ok(Some(event)) => bot.handle(event).await,
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        error = %e,
                        error_kind = e.kind(),
                        "Dropping update that could not be read"
                    );
                }
            }
        }
    }

    info!(queued = bot.session().len(), "zettel-bot stopped");
    Ok(())
}
