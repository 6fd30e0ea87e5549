//! Chunks yielded by [`LanguageModel::generate`](crate::LanguageModel::generate).
//!
//! A well-formed stream is any number of deltas and tool calls followed by
//! exactly one [`StreamChunk::Finish`]. Tool calls are always complete: the
//! provider accumulates argument fragments itself.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    /// Visible answer text.
    TextDelta(String),

    /// Text from the model's reasoning channel.
    ReasoningDelta(String),

    /// One complete tool call; `arguments` is the raw JSON text.
    ToolCall {
        id: String,
        name: String,
        arguments: String,
    },

    /// End of the response.
    Finish {
        usage: Usage,
        finish_reason: FinishReason,
    },

    /// Error reported inside an otherwise successful HTTP stream.
    Error(String),
}

impl StreamChunk {
    pub fn text(delta: impl Into<String>) -> Self {
        Self::TextDelta(delta.into())
    }

    pub fn reasoning(delta: impl Into<String>) -> Self {
        Self::ReasoningDelta(delta.into())
    }

    pub fn tool_call(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self::ToolCall {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// A finish chunk with zero usage.
    pub fn finish(finish_reason: FinishReason) -> Self {
        Self::Finish {
            usage: Usage::default(),
            finish_reason,
        }
    }

    /// Whether this chunk ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finish { .. } | Self::Error(_))
    }
}

/// Token counts reported with the final chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl Usage {
    pub fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }
}

/// Why the model stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    #[default]
    EndTurn,
    MaxTokens,
    /// The response ends with tool calls.
    ToolUse,
    ContentFilter,
    Other,
}

impl FinishReason {
    /// Map a chat-completions `finish_reason` string.
    pub fn parse(reason: &str) -> Self {
        match reason {
            "stop" => Self::EndTurn,
            "length" => Self::MaxTokens,
            "tool_calls" | "function_call" => Self::ToolUse,
            "content_filter" => Self::ContentFilter,
            _ => Self::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_reason_parse() {
        assert_eq!(FinishReason::parse("stop"), FinishReason::EndTurn);
        assert_eq!(FinishReason::parse("tool_calls"), FinishReason::ToolUse);
        assert_eq!(FinishReason::parse("length"), FinishReason::MaxTokens);
        assert_eq!(FinishReason::parse("something_new"), FinishReason::Other);
    }

    #[test]
    fn test_terminal_chunks() {
        assert!(StreamChunk::finish(FinishReason::EndTurn).is_terminal());
        assert!(StreamChunk::Error("boom".into()).is_terminal());
        assert!(!StreamChunk::text("hi").is_terminal());
        assert!(!StreamChunk::tool_call("c1", "readFile", "{}").is_terminal());
    }
}
