//! Telegram chat transport.
//!
//! Long polling over the Bot API; implements [`zettel_core::ChatTransport`]
//! for outgoing messages.

mod client;
mod types;

pub use client::{escape_markdown, TelegramClient, TelegramConfig};
