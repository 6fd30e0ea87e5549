//! Model information types.

use serde::{Deserialize, Serialize};

/// Default model used when nothing else is configured.
pub const DEFAULT_MODEL: &str = "openai/gpt-oss-120b";

/// Information about a model.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ModelInfo {
    /// Model ID as sent to the provider (e.g., "openai/gpt-oss-120b").
    pub id: String,
    /// Provider ID (e.g., "groq").
    pub provider_id: String,
    /// Human-readable name.
    pub name: String,
    /// Exposes a separate reasoning channel.
    #[serde(default)]
    pub reasoning: bool,
    /// Context window in tokens.
    #[serde(default)]
    pub context: u32,
}

impl ModelInfo {
    /// Create a new model info with the id doubling as display name.
    pub fn new(id: impl Into<String>, provider_id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            provider_id: provider_id.into(),
            reasoning: false,
            context: 0,
        }
    }

    /// Set the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Mark the model as exposing reasoning.
    pub fn with_reasoning(mut self, reasoning: bool) -> Self {
        self.reasoning = reasoning;
        self
    }

    /// Set the context window.
    pub fn with_context(mut self, context: u32) -> Self {
        self.context = context;
        self
    }
}
