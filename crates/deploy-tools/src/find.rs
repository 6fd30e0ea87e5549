//! Find tool - locate files by name pattern.

use crate::{parse_args, Tool, ToolContext, ToolError, ToolOutput, ToolResult};
use async_trait::async_trait;
use ignore::overrides::OverrideBuilder;
use ignore::{Walk, WalkBuilder};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;
use tracing::debug;

/// Maximum number of paths returned.
const LIMIT: usize = 50;

/// Directories never descended into by the workspace walkers.
const SKIPPED_DIRS: &[&str] = &["node_modules", ".git"];

/// Find files whose name matches a glob.
pub struct FindTool;

#[derive(Debug, Deserialize)]
struct FindArgs {
    name: String,
    path: Option<String>,
}

#[async_trait]
impl Tool for FindTool {
    fn id(&self) -> &str {
        "find"
    }

    fn description(&self) -> &str {
        "Find files by name pattern (e.g. \"*.ts\", \"README.md\"). Returns at most 50 paths."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["name"],
            "properties": {
                "name": {
                    "type": "string",
                    "description": "File name pattern to search for (e.g., \"*.ts\", \"README.md\")"
                },
                "path": {
                    "type": "string",
                    "description": "Directory to search in (defaults to current directory)"
                }
            }
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult<ToolOutput> {
        let args: FindArgs = parse_args(args)?;
        let base = args
            .path
            .as_deref()
            .map(|p| ctx.resolve(p))
            .unwrap_or_else(|| ctx.cwd.clone());

        if !base.is_dir() {
            return Err(ToolError::file_not_found(base.display().to_string()));
        }

        let matcher = OverrideBuilder::new(&base)
            .add(&args.name)
            .and_then(|b| b.build())
            .map_err(|e| ToolError::validation(format!("Invalid name pattern: {e}")))?;

        debug!(name = %args.name, base = %base.display(), "Finding files");

        let mut found = Vec::new();
        for entry in workspace_walker(&base).filter_map(Result::ok) {
            ctx.check_cancelled()?;
            let path = entry.path();
            let is_file = entry.file_type().is_some_and(|t| t.is_file());
            if is_file && matcher.matched(path, false).is_whitelist() {
                found.push(path.display().to_string());
                if found.len() >= LIMIT {
                    break;
                }
            }
        }

        let count = found.len();
        let output = if found.is_empty() {
            format!("No files matching \"{}\" found.", args.name)
        } else {
            found.join("\n")
        };

        Ok(
            ToolOutput::new(format!("Find: {} ({count} files)", args.name), output)
                .with_metadata(json!({ "count": count, "truncated": count >= LIMIT })),
        )
    }
}

/// Walk `base` including hidden files, skipping `node_modules` and `.git`.
pub(crate) fn workspace_walker(base: &Path) -> Walk {
    WalkBuilder::new(base)
        .hidden(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .follow_links(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(|entry| {
            let name = entry.file_name().to_string_lossy();
            !SKIPPED_DIRS.iter().any(|d| *d == name)
        })
        .build()
}
