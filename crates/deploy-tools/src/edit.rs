//! Edit tool - replace one exact block of text in a file.

use crate::{parse_args, Tool, ToolContext, ToolError, ToolOutput, ToolResult};
use async_trait::async_trait;
use deploy_snapshot::{diff_stats, unified_diff};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::fs;
use tracing::debug;

/// Edit tool for exact block replacement.
pub struct EditTool;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EditArgs {
    path: String,
    old_text: String,
    new_text: String,
}

#[async_trait]
impl Tool for EditTool {
    fn id(&self) -> &str {
        "edit"
    }

    fn description(&self) -> &str {
        r#"Edit a file by replacing a specific block of text with new content.

Usage:
- oldText must match the file exactly, including whitespace and indentation.
- Only the first occurrence is replaced.
- Read the file first if you are unsure of its current content."#
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["path", "oldText", "newText"],
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the file to edit"
                },
                "oldText": {
                    "type": "string",
                    "description": "The text block to replace. Must match exactly including whitespace."
                },
                "newText": {
                    "type": "string",
                    "description": "The new text to insert"
                }
            }
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult<ToolOutput> {
        let args: EditArgs = parse_args(args)?;

        if args.old_text.is_empty() {
            return Err(ToolError::validation("oldText cannot be empty"));
        }

        let file_path = ctx.resolve(&args.path);
        if !file_path.is_file() {
            return Err(ToolError::file_not_found(args.path));
        }

        let content = fs::read_to_string(&file_path)
            .await
            .map_err(|e| ToolError::execution_failed(format!("Failed to read file: {e}")))?;

        if !content.contains(&args.old_text) {
            return Err(ToolError::execution_failed(format!(
                "Could not find exact match for text block in {}. Ensure whitespace and indentation match exactly.",
                args.path
            )));
        }

        let new_content = content.replacen(&args.old_text, &args.new_text, 1);
        let diff = unified_diff(&content, &new_content, &file_path);
        let stats = diff_stats(&content, &new_content);

        ctx.history.lock().await.push(file_path.clone(), content);
        fs::write(&file_path, &new_content).await?;

        debug!(
            path = %file_path.display(),
            additions = stats.additions,
            deletions = stats.deletions,
            "Edited file"
        );

        Ok(ToolOutput::new(
            format!("Edited {}", args.path),
            format!("SUCCESS: File {} updated.", args.path),
        )
        .with_metadata(json!({
            "path": file_path.display().to_string(),
            "diff": diff,
            "additions": stats.additions,
            "deletions": stats.deletions
        })))
    }
}
