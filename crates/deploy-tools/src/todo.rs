//! Todo tools - a Markdown checklist in the workspace's `TODO.md`.

use crate::{parse_args, Tool, ToolContext, ToolError, ToolOutput, ToolResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;

/// File name of the checklist, relative to the working directory.
pub const TODO_FILE: &str = "TODO.md";

/// Format one unchecked checklist line, including its leading newline.
pub fn todo_entry(task: &str, created: DateTime<Utc>) -> String {
    format!("\n- [ ] {task} (Created: {})", created.to_rfc3339())
}

/// Append a task to TODO.md.
pub struct TodoWriteTool;

#[derive(Debug, Deserialize)]
struct TodoWriteArgs {
    task: String,
}

#[async_trait]
impl Tool for TodoWriteTool {
    fn id(&self) -> &str {
        "todowrite"
    }

    fn description(&self) -> &str {
        "Add a task to the TODO.md file."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["task"],
            "properties": {
                "task": {
                    "type": "string",
                    "description": "Task description to add"
                }
            }
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult<ToolOutput> {
        let args: TodoWriteArgs = parse_args(args)?;
        let task = args.task.trim();
        if task.is_empty() {
            return Err(ToolError::validation("No task provided."));
        }

        let path = ctx.cwd.join(TODO_FILE);
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(todo_entry(task, Utc::now()).as_bytes())
            .await?;
        file.flush().await?;

        Ok(ToolOutput::new(
            "Todo added",
            format!("SUCCESS: Task added to {TODO_FILE}"),
        ))
    }
}

/// Return the contents of TODO.md.
pub struct TodoReadTool;

#[async_trait]
impl Tool for TodoReadTool {
    fn id(&self) -> &str {
        "todoread"
    }

    fn description(&self) -> &str {
        "Read the current TODO.md file to track task progress."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _args: Value, ctx: &ToolContext) -> ToolResult<ToolOutput> {
        let path = ctx.cwd.join(TODO_FILE);
        let output = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                format!("{TODO_FILE} not found. Use todowrite to create it.")
            }
            Err(e) => return Err(e.into()),
        };
        Ok(ToolOutput::new("Todos", output))
    }
}
