//! LLM Provider Strategy Pattern
//!
//! Defines a common interface for LLM backends so the turn loop can drive any
//! of them. One call to [`LlmProvider::stream_step`] is one generation step.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_core::provider::{GenerationRequest, LlmProvider, StepEvent};
//!
//! let mut events = provider.stream_step(&request).await?;
//! while let Some(event) = events.next().await {
//!     match event? {
//!         StepEvent::TextDelta(text) => print!("{text}"),
//!         StepEvent::ToolCall(call) => calls.push(call),
//!         StepEvent::Finish(_) => break,
//!     }
//! }
//! ```

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

use crate::error::Result;
use crate::message::Message;
use crate::tool::ToolSchema;

/// Configuration for LLM generation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Model identifier
    pub model: String,

    /// Temperature for sampling (0.0 = deterministic, 1.0 = creative)
    #[serde(default)]
    pub temperature: Option<f32>,

    /// Maximum tokens to generate per step
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
}

const fn default_max_output_tokens() -> u32 {
    8192
}

impl GenerationOptions {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: None,
            max_output_tokens: default_max_output_tokens(),
        }
    }
}

/// Everything one generation step needs
#[derive(Clone, Copy, Debug)]
pub struct GenerationRequest<'a> {
    /// Full ordered history
    pub messages: &'a [Message],

    /// Tools advertised to the model
    pub tools: &'a [ToolSchema],

    pub options: &'a GenerationOptions,
}

/// Reason for a step finishing
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolUse,
    ContentFilter,
    Other,
}

/// One item from a streaming generation step
#[derive(Clone, Debug, PartialEq)]
pub enum StepEvent {
    /// Text to show the user, in order
    TextDelta(String),

    /// Completed tool-call request
    ToolCall(crate::tool::ToolCall),

    /// Explicit end of the step
    Finish(FinishReason),
}

/// Stream type for a generation step
pub type StepStream = Pin<Box<dyn Stream<Item = Result<StepEvent>> + Send>>;

/// Strategy trait for LLM providers
///
/// Implement this trait to add support for new LLM backends.
/// The agent works exclusively through this interface.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &str;

    /// Start one generation step
    async fn stream_step(&self, request: &GenerationRequest<'_>) -> Result<StepStream>;
}
