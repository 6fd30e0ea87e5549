//! readFile tool - return a file's contents.

use crate::{parse_args, Tool, ToolContext, ToolError, ToolOutput, ToolResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;
use tracing::debug;

/// Maximum file size to read (10MB).
const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Appended to read failures so the model knows how to recover.
const PATH_HINT: &str =
    "Tip: If you are unsure of the path, use 'list' to check the directory or 'find' to search for the file.";

/// Read a file's contents.
pub struct ReadFileTool;

#[derive(Debug, Deserialize)]
struct ReadArgs {
    path: String,
}

#[async_trait]
impl Tool for ReadFileTool {
    fn id(&self) -> &str {
        "readFile"
    }

    fn description(&self) -> &str {
        "Read the contents of a file from the filesystem."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["path"],
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the file to read"
                }
            }
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult<ToolOutput> {
        let args: ReadArgs = parse_args(args)?;
        let file_path = ctx.resolve(&args.path);
        debug!(path = %file_path.display(), "Reading file");

        if !file_path.is_file() {
            let mut message = format!("{}.", args.path);
            if let Some(suggestion) = suggest_similar_file(&file_path).await {
                message.push_str(&format!(" Did you mean: {suggestion}?"));
            }
            message.push(' ');
            message.push_str(PATH_HINT);
            return Err(ToolError::file_not_found(message));
        }

        let metadata = tokio::fs::metadata(&file_path).await?;
        if metadata.len() > MAX_FILE_SIZE {
            return Err(ToolError::validation(format!(
                "File too large ({} bytes). Maximum allowed size is {} bytes.",
                metadata.len(),
                MAX_FILE_SIZE
            )));
        }

        let bytes = tokio::fs::read(&file_path)
            .await
            .map_err(|e| ToolError::execution_failed(format!("{e}. {PATH_HINT}")))?;

        // Null bytes in the first 8KB mark a binary file
        let sample_size = bytes.len().min(8192);
        if bytes[..sample_size].contains(&0) {
            return Ok(ToolOutput::new(
                format!("Read {}", args.path),
                format!(
                    "[Binary file: {} bytes]\n\nThis file appears to be binary and cannot be displayed as text.",
                    bytes.len()
                ),
            )
            .with_metadata(json!({ "binary": true, "size": bytes.len() })));
        }

        let content = String::from_utf8_lossy(&bytes).into_owned();
        Ok(ToolOutput::new(format!("Read {}", args.path), content).with_metadata(json!({
            "size": bytes.len(),
            "path": file_path.display().to_string()
        })))
    }
}

/// Find a sibling whose name is close to the missing file's name.
async fn suggest_similar_file(path: &Path) -> Option<String> {
    let parent = path.parent()?;
    let filename = path.file_name()?.to_string_lossy();

    let mut entries = tokio::fs::read_dir(parent).await.ok()?;
    let mut best_match: Option<(String, usize)> = None;

    while let Ok(Some(entry)) = entries.next_entry().await {
        let entry_name = entry.file_name().to_string_lossy().to_string();

        let similarity = filename
            .chars()
            .zip(entry_name.chars())
            .filter(|(a, b)| a.eq_ignore_ascii_case(b))
            .count();
        let len_diff = filename.len().abs_diff(entry_name.len());
        let score = similarity.saturating_sub(len_diff);

        if score > filename.len() / 3 && best_match.as_ref().map_or(true, |(_, best)| score > *best)
        {
            best_match = Some((entry_name, score));
        }
    }

    best_match.map(|(name, _)| name)
}
