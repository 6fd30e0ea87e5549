//! Glob tool - find files by pattern.

use crate::{parse_args, Tool, ToolContext, ToolError, ToolOutput, ToolResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::SystemTime;

/// Maximum number of paths returned.
const LIMIT: usize = 50;

/// Find files by glob pattern.
pub struct GlobTool;

#[derive(Debug, Deserialize)]
struct GlobArgs {
    pattern: String,
    path: Option<String>,
}

#[async_trait]
impl Tool for GlobTool {
    fn id(&self) -> &str {
        "glob"
    }

    fn description(&self) -> &str {
        r#"Find files matching a glob pattern.

- Supports glob patterns like "**/*.js" or "src/**/*.ts"
- Returns matching file paths sorted by modification time, newest first
- At most 50 paths are returned"#
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["pattern"],
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Glob pattern (e.g., **/*.ts, src/**/*.tsx)"
                },
                "path": {
                    "type": "string",
                    "description": "Directory to search in (defaults to current directory)"
                }
            }
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult<ToolOutput> {
        let args: GlobArgs = parse_args(args)?;
        let base_path = args
            .path
            .as_deref()
            .map(|p| ctx.resolve(p))
            .unwrap_or_else(|| ctx.cwd.clone());

        if !base_path.is_dir() {
            return Err(ToolError::validation(format!(
                "Path does not exist: {}",
                base_path.display()
            )));
        }

        // globwalk can panic on some pattern/path combinations
        let pattern = args.pattern.clone();
        let walker_result = std::panic::catch_unwind(|| {
            globwalk::GlobWalkerBuilder::from_patterns(&base_path, &[pattern.as_str()])
                .follow_links(false)
                .build()
        });

        let walker = match walker_result {
            Ok(Ok(w)) => w,
            Ok(Err(e)) => return Err(ToolError::validation(e.to_string())),
            Err(_) => {
                return Err(ToolError::execution_failed(
                    "Failed to build glob walker (invalid pattern or path)",
                ));
            }
        };

        let mut files: Vec<(PathBuf, Option<SystemTime>)> = walker
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                let modified = e.metadata().ok().and_then(|m| m.modified().ok());
                (e.into_path(), modified)
            })
            .collect();

        // Newest first
        files.sort_by(|a, b| b.1.cmp(&a.1));
        let total = files.len();
        files.truncate(LIMIT);

        let count = files.len();
        let output = if files.is_empty() {
            format!("No files matching \"{}\" found.", args.pattern)
        } else {
            files
                .iter()
                .map(|(p, _)| p.display().to_string())
                .collect::<Vec<_>>()
                .join("\n")
        };

        Ok(
            ToolOutput::new(format!("Glob: {} ({count} files)", args.pattern), output)
                .with_metadata(json!({ "count": count, "total": total })),
        )
    }
}
