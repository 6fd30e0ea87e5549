//! Conversation turns.
//!
//! A [`Turn`] is one entry of the transcript. Assistant turns carry the
//! tool-call intents the model emitted; the tool turn that follows carries
//! exactly one [`ToolOutcome`] per intent, matched by call id.

use deploy_provider::{ContentPart, Message, Role};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A model-declared request to invoke a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallIntent {
    pub call_id: String,
    pub tool_name: String,
    pub arguments: Value,
}

impl ToolCallIntent {
    /// Build an intent from the raw argument string the model produced.
    ///
    /// Arguments that are not valid JSON are kept as a string so that
    /// validation rejects them with a visible outcome.
    pub fn from_raw(call_id: impl Into<String>, tool_name: impl Into<String>, raw: &str) -> Self {
        let arguments = if raw.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
        };
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            arguments,
        }
    }
}

/// How a tool call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    #[default]
    Success,
    /// The tool ran and failed.
    Error,
    /// Arguments did not match the tool's schema.
    Invalid,
    /// No tool with that name is registered.
    NotFound,
}

impl OutcomeStatus {
    pub fn is_error(self) -> bool {
        self != OutcomeStatus::Success
    }
}

/// The result of executing one intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub call_id: String,
    pub tool_name: String,
    pub result: String,
    #[serde(default)]
    pub status: OutcomeStatus,
}

impl ToolOutcome {
    pub fn success(intent: &ToolCallIntent, result: impl Into<String>) -> Self {
        Self::with_status(intent, result, OutcomeStatus::Success)
    }

    pub fn with_status(
        intent: &ToolCallIntent,
        result: impl Into<String>,
        status: OutcomeStatus,
    ) -> Self {
        Self {
            call_id: intent.call_id.clone(),
            tool_name: intent.tool_name.clone(),
            result: result.into(),
            status,
        }
    }
}

/// One entry in the conversation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallIntent>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_results: Vec<ToolOutcome>,
}

impl Turn {
    fn new(role: Role, content: Option<String>) -> Self {
        Self {
            role,
            content,
            reasoning: None,
            tool_calls: Vec::new(),
            tool_results: Vec::new(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, Some(content.into()))
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, Some(content.into()))
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, Some(content.into()))
    }

    /// An empty assistant turn that grows while the model streams.
    pub fn placeholder() -> Self {
        Self::new(Role::Assistant, None)
    }

    /// A tool turn bundling every outcome of one assistant turn.
    pub fn tool(results: Vec<ToolOutcome>) -> Self {
        Self {
            tool_results: results,
            ..Self::new(Role::Tool, None)
        }
    }

    pub fn push_content(&mut self, delta: &str) {
        self.content.get_or_insert_with(String::new).push_str(delta);
    }

    pub fn push_reasoning(&mut self, delta: &str) {
        self.reasoning.get_or_insert_with(String::new).push_str(delta);
    }

    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }

    /// Whether the turn carries nothing worth keeping.
    pub fn is_empty(&self) -> bool {
        self.content.as_deref().map_or(true, str::is_empty)
            && self.reasoning.as_deref().map_or(true, str::is_empty)
            && self.tool_calls.is_empty()
            && self.tool_results.is_empty()
    }

    /// Look up the outcome for a call id.
    pub fn outcome(&self, call_id: &str) -> Option<&ToolOutcome> {
        self.tool_results.iter().find(|o| o.call_id == call_id)
    }

    /// Convert to a provider message. Reasoning is never sent back.
    pub fn to_message(&self) -> Message {
        let mut message = Message::new(self.role);
        match self.role {
            Role::Tool => {
                for outcome in &self.tool_results {
                    let part = if outcome.status.is_error() {
                        ContentPart::tool_error(&outcome.call_id, &outcome.result)
                    } else {
                        ContentPart::tool_result(&outcome.call_id, &outcome.result)
                    };
                    message = message.with_part(part);
                }
            }
            _ => {
                if let Some(text) = self.content.as_deref().filter(|t| !t.is_empty()) {
                    message = message.with_part(ContentPart::text(text));
                }
                for call in &self.tool_calls {
                    message = message.with_part(ContentPart::tool_use(
                        &call.call_id,
                        &call.tool_name,
                        call.arguments.clone(),
                    ));
                }
            }
        }
        message
    }
}

/// Convert a transcript to provider messages, dropping empty turns.
pub fn to_messages(turns: &[Turn]) -> Vec<Message> {
    turns
        .iter()
        .map(Turn::to_message)
        .filter(|m| !m.content.is_empty())
        .collect()
}
