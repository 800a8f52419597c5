//! Anthropic Messages API backend.
//!
//! # Example
//!
//! ```rust,no_run
//! use zettel_inference::anthropic::{AnthropicBackend, AnthropicConfig};
//! use zettel_core::{Fragment, GenerationBackend};
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = AnthropicBackend::new(AnthropicConfig::new("sk-ant-...")).unwrap();
//!     let reply = backend
//!         .generate("Summarise:", &[Fragment::text("a long note")])
//!         .await
//!         .unwrap();
//!     println!("{reply}");
//! }
//! ```

mod backend;
mod types;

pub use backend::{AnthropicBackend, AnthropicConfig};
pub use types::*;
