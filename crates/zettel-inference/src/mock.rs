//! Scripted generation backend for deterministic testing.
//!
//! Replies are keyed by the instruction template, so a test can script the
//! clarification check, the structuring call, and merge calls independently.
//! Each key holds a queue of replies; the last reply of a queue is sticky
//! and repeats for any further calls.
//!
//! ## Usage
//!
//! ```rust
//! use zettel_inference::mock::ScriptedBackend;
//! use zettel_inference::prompts::CLARIFICATION_PROMPT;
//!
//! let backend = ScriptedBackend::new()
//!     .respond_to(CLARIFICATION_PROMPT, "QUESTION: Which Jane?")
//!     .with_default_response("CLEAR");
//! assert_eq!(backend.call_count(), 0);
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use zettel_core::{Error, Fragment, GenerationBackend, Result};

#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Fail(String),
}

/// One recorded call.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub instruction: String,
    pub fragments: Vec<Fragment>,
}

impl MockCall {
    /// All text fragments joined with newlines.
    pub fn text(&self) -> String {
        self.fragments
            .iter()
            .filter_map(|f| match f {
                Fragment::Text(t) => Some(t.as_str()),
                Fragment::Image { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Mock generation backend with scripted replies.
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    script: Arc<Mutex<HashMap<String, VecDeque<Reply>>>>,
    default_reply: Option<String>,
    call_log: Arc<Mutex<Vec<MockCall>>>,
}

impl ScriptedBackend {
    /// Create a backend with no scripted replies. Unscripted calls fail.
    pub fn new() -> Self {
        Self::default()
    }

    fn push(self, instruction: &str, reply: Reply) -> Self {
        self.script
            .lock()
            .expect("mock script lock poisoned")
            .entry(instruction.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    /// Queue a reply for calls made with exactly this instruction.
    pub fn respond_to(self, instruction: &str, reply: impl Into<String>) -> Self {
        self.push(instruction, Reply::Text(reply.into()))
    }

    /// Queue a failure for calls made with exactly this instruction.
    pub fn fail_on(self, instruction: &str, message: impl Into<String>) -> Self {
        self.push(instruction, Reply::Fail(message.into()))
    }

    /// Reply used for any instruction without a script.
    pub fn with_default_response(mut self, reply: impl Into<String>) -> Self {
        self.default_reply = Some(reply.into());
        self
    }

    /// Get all logged calls for assertion.
    pub fn calls(&self) -> Vec<MockCall> {
        self.call_log.lock().expect("mock log lock poisoned").clone()
    }

    /// Total number of calls.
    pub fn call_count(&self) -> usize {
        self.call_log.lock().expect("mock log lock poisoned").len()
    }

    /// Calls made with the given instruction.
    pub fn calls_for(&self, instruction: &str) -> Vec<MockCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.instruction == instruction)
            .collect()
    }

    fn next_reply(&self, instruction: &str) -> Option<Reply> {
        let mut script = self.script.lock().expect("mock script lock poisoned");
        let queue = script.get_mut(instruction)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    async fn generate(&self, instruction: &str, fragments: &[Fragment]) -> Result<String> {
        self.call_log
            .lock()
            .expect("mock log lock poisoned")
            .push(MockCall {
                instruction: instruction.to_string(),
                fragments: fragments.to_vec(),
            });

        match self.next_reply(instruction) {
            Some(Reply::Text(text)) => Ok(text),
            Some(Reply::Fail(message)) => Err(Error::Inference(message)),
            None => self
                .default_reply
                .clone()
                .ok_or_else(|| Error::Inference("no scripted reply".to_string())),
        }
    }

    fn model_name(&self) -> &str {
        "scripted-mock"
    }
}
