//! List tool - directory entries with metadata.

use crate::{parse_args, Tool, ToolContext, ToolError, ToolOutput, ToolResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fs::Metadata;
use std::path::Path;

/// List the entries of one directory.
pub struct ListTool;

#[derive(Debug, Deserialize)]
struct ListArgs {
    path: Option<String>,
}

/// One directory entry as reported to the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntryInfo {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub size: u64,
    pub modified: String,
    pub permissions: String,
}

#[async_trait]
impl Tool for ListTool {
    fn id(&self) -> &str {
        "list"
    }

    fn description(&self) -> &str {
        "List directory contents with file details. Use this when you are unsure of file names or paths."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the directory (defaults to current directory)"
                }
            }
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult<ToolOutput> {
        let args: ListArgs = parse_args(args)?;
        let target = args
            .path
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(".")
            .to_string();
        let dir = ctx.resolve(&target);

        if !dir.is_dir() {
            return Err(ToolError::file_not_found(format!(
                "Directory not found: {target}. Try listing the parent directory instead."
            )));
        }

        let mut entries = Vec::new();
        let mut read_dir = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            let metadata = match tokio::fs::metadata(entry.path()).await {
                Ok(m) => m,
                // Dangling symlinks and the like
                Err(_) => entry.metadata().await?,
            };
            entries.push(EntryInfo {
                path: Path::new(&target).join(&name).display().to_string(),
                name,
                kind: if metadata.is_dir() { "directory" } else { "file" }.to_string(),
                size: metadata.len(),
                modified: modified_rfc3339(&metadata),
                permissions: permissions(&metadata),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        let count = entries.len();
        let output = serde_json::to_string(&entries)?;

        Ok(ToolOutput::new(format!("List {target} ({count} entries)"), output)
            .with_metadata(json!({ "count": count })))
    }
}

fn modified_rfc3339(metadata: &Metadata) -> String {
    metadata
        .modified()
        .map(|t| DateTime::<Utc>::from(t).to_rfc3339())
        .unwrap_or_default()
}

#[cfg(unix)]
fn permissions(metadata: &Metadata) -> String {
    use std::os::unix::fs::PermissionsExt;
    format!("{:03o}", metadata.permissions().mode() & 0o777)
}

#[cfg(not(unix))]
fn permissions(metadata: &Metadata) -> String {
    if metadata.permissions().readonly() {
        "444".to_string()
    } else {
        "666".to_string()
    }
}
