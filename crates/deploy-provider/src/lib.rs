//! Model provider abstraction for deploy.
//!
//! The orchestration loop talks to a model through [`LanguageModel`], which
//! returns a finite stream of [`StreamChunk`]s. [`event::EventSource`] turns
//! that stream into a channel of typed events with explicit terminal
//! `Done`/`Error` variants.
//!
//! Providers:
//! - Groq (OpenAI-compatible chat completions with parsed reasoning)
//! - A scripted mock provider for tests

pub mod error;
pub mod event;
pub mod groq;
pub mod message;
pub mod mock;
pub mod model;
pub mod stream;

pub use error::{ProviderError, ProviderResult};
pub use event::{EventSource, ModelEvent};
pub use message::{ContentPart, Message, Role};
pub use model::ModelInfo;
pub use stream::{FinishReason, StreamChunk, Usage};

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;
use std::sync::Arc;

/// Options for a single streaming completion.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Model identifier. Falls back to the provider's default model.
    pub model: Option<String>,
    /// Temperature for sampling (0.0-1.0).
    pub temperature: Option<f32>,
    /// Maximum tokens to generate.
    pub max_tokens: Option<u32>,
    /// System prompt.
    pub system: Option<String>,
    /// Available tools.
    pub tools: Vec<ToolDefinition>,
    /// Cancellation token.
    pub abort: Option<tokio_util::sync::CancellationToken>,
}

/// A tool definition for the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    /// Tool name.
    pub name: String,
    /// Tool description.
    pub description: String,
    /// JSON Schema for the tool parameters.
    pub parameters: Value,
}

/// The main trait for language models.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generate a streaming response.
    ///
    /// The returned stream is finite and consumed exactly once.
    async fn generate(
        &self,
        messages: Vec<Message>,
        options: GenerateOptions,
    ) -> ProviderResult<BoxStream<'static, ProviderResult<StreamChunk>>>;

    /// Get information about the default model.
    fn model_info(&self) -> &ModelInfo;

    /// Get the provider ID (e.g., "groq").
    fn provider_id(&self) -> &str;

    /// Whether the provider holds credentials to make requests.
    fn has_credentials(&self) -> bool {
        true
    }
}

/// A boxed language model for dynamic dispatch.
pub type BoxedLanguageModel = Arc<dyn LanguageModel>;
