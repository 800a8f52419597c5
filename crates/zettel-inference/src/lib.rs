//! # zettel-inference
//!
//! Generative service backends for zettel-intake.
//!
//! This crate provides:
//! - Anthropic Messages backend implementing [`zettel_core::GenerationBackend`]
//! - Instruction templates (clarification, structuring, merge, summary)
//! - Parsers for clarification replies and structuring responses
//! - Scripted mock backend (feature `mock`)
//!
//! # Feature Flags
//!
//! - `mock`: Enable [`mock::ScriptedBackend`] for downstream tests

pub mod anthropic;
pub mod prompts;

// Scripted backend for testing
#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export core types
pub use zettel_core::*;

pub use anthropic::{AnthropicBackend, AnthropicConfig};
pub use prompts::{
    parse_clarification, split_records, strip_code_fence, structuring_prompt,
    ClarificationVerdict,
};
