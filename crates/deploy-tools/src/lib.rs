//! Tool implementations for deploy.
//!
//! This crate provides the capabilities a model can invoke against the
//! workspace, and the [`ToolRegistry`] the orchestration loop dispatches
//! through. Every tool declares a JSON schema that doubles as the
//! model-facing declaration and the runtime argument check performed by
//! [`Tool::validate`] before `execute` runs.

pub mod error;
pub mod registry;
pub mod schema;

// Tool implementations
pub mod analyze;
pub mod bash;
pub mod edit;
pub mod find;
pub mod glob;
pub mod list;
pub mod patch;
pub mod question;
pub mod read;
pub mod search;
pub mod skill;
pub mod todo;
pub mod webfetch;
pub mod write;

pub use error::{ToolError, ToolResult};
pub use registry::ToolRegistry;

use async_trait::async_trait;
use deploy_snapshot::{FileHistory, SharedFileHistory};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Context provided to tools during execution.
#[derive(Clone)]
pub struct ToolContext {
    /// Cancellation token.
    pub abort: CancellationToken,
    /// Working directory that relative paths resolve against.
    pub cwd: PathBuf,
    /// File edit history shared with the undo/redo commands.
    pub history: SharedFileHistory,
}

impl ToolContext {
    /// Create a context rooted at `cwd` with its own history.
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            abort: CancellationToken::new(),
            cwd: cwd.into(),
            history: FileHistory::shared(deploy_snapshot::DEFAULT_CAPACITY),
        }
    }

    /// Use a shared history.
    pub fn with_history(mut self, history: SharedFileHistory) -> Self {
        self.history = history;
        self
    }

    /// Resolve a tool-supplied path against the working directory.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        deploy_util::path::resolve(&self.cwd, path)
    }

    /// Fail with `Cancelled` once the token has fired.
    pub fn check_cancelled(&self) -> ToolResult<()> {
        if self.abort.is_cancelled() {
            Err(ToolError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Result of tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Title/summary of the operation.
    pub title: String,
    /// Output text handed back to the model.
    pub output: String,
    /// Tool-specific metadata.
    pub metadata: Value,
}

impl ToolOutput {
    /// Create a new tool output.
    pub fn new(title: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            output: output.into(),
            metadata: Value::Null,
        }
    }

    /// Add metadata to the output.
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// The main trait for tools.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool ID.
    fn id(&self) -> &str;

    /// Get the tool description (for the model).
    fn description(&self) -> &str;

    /// Get the JSON Schema for the tool's parameters.
    fn parameters_schema(&self) -> Value;

    /// Check `args` against the parameter schema.
    fn validate(&self, args: &Value) -> ToolResult<()> {
        schema::validate(&self.parameters_schema(), args)
    }

    /// Execute the tool.
    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult<ToolOutput>;
}

/// A boxed tool for dynamic dispatch.
pub type BoxedTool = Arc<dyn Tool>;

/// Deserialize validated arguments into a tool's argument struct.
pub(crate) fn parse_args<T: serde::de::DeserializeOwned>(args: Value) -> ToolResult<T> {
    serde_json::from_value(args)
        .map_err(|e| ToolError::validation(format!("Invalid arguments: {e}")))
}

/// Truncate `text` to at most `max` bytes on a char boundary.
pub(crate) fn truncate_str(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_context_resolve() {
        let ctx = ToolContext::new("/test/root");
        assert_eq!(ctx.resolve("a/b.txt"), PathBuf::from("/test/root/a/b.txt"));
        assert_eq!(ctx.resolve("/abs/c.txt"), PathBuf::from("/abs/c.txt"));
    }

    #[test]
    fn test_check_cancelled() {
        let ctx = ToolContext::new("/tmp");
        assert!(ctx.check_cancelled().is_ok());
        ctx.abort.cancel();
        assert!(matches!(ctx.check_cancelled(), Err(ToolError::Cancelled)));
    }

    #[test]
    fn test_tool_output_with_metadata() {
        let output = ToolOutput::new("Title", "Content").with_metadata(json!({"key": "value"}));
        assert_eq!(output.title, "Title");
        assert_eq!(output.output, "Content");
        assert_eq!(output.metadata["key"], "value");
    }

    #[test]
    fn test_truncate_str_respects_char_boundary() {
        assert_eq!(truncate_str("hello", 10), "hello");
        assert_eq!(truncate_str("hello", 3), "hel");
        // 'é' is two bytes; cutting inside it backs off
        assert_eq!(truncate_str("aé", 2), "a");
    }
}
