//! writeFile tool - create or overwrite a file.

use crate::{parse_args, Tool, ToolContext, ToolOutput, ToolResult};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

/// Patterns that suggest the content carries a credential.
static SECRET_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"(?i)AI_KEY|API_KEY|SECRET|PASSWORD|TOKEN|PRIVATE_KEY|AUTH_DOMAIN").ok()
});

/// Write content to a file.
pub struct WriteFileTool;

#[derive(Debug, Deserialize)]
struct WriteArgs {
    path: String,
    content: String,
}

#[async_trait]
impl Tool for WriteFileTool {
    fn id(&self) -> &str {
        "writeFile"
    }

    fn description(&self) -> &str {
        "Write content to a file. Creates the file if it does not exist, creates parent directories as needed."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["path", "content"],
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path where the file should be written"
                },
                "content": {
                    "type": "string",
                    "description": "Content to write to the file"
                }
            }
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult<ToolOutput> {
        let args: WriteArgs = parse_args(args)?;
        let file_path = ctx.resolve(&args.path);

        if let Some(pattern) = secret_match(&args.content) {
            warn!(path = %args.path, pattern = %pattern, "Written content looks like it contains a secret");
        }

        let existed = file_path.is_file();
        if existed {
            let previous = tokio::fs::read_to_string(&file_path).await?;
            ctx.history.lock().await.push(file_path.clone(), previous);
        }

        if let Some(parent) = file_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&file_path, &args.content).await?;

        debug!(path = %file_path.display(), bytes = args.content.len(), "Wrote file");

        Ok(ToolOutput::new(
            format!("Wrote {}", args.path),
            format!("SUCCESS: File written to {}", args.path),
        )
        .with_metadata(json!({
            "bytes": args.content.len(),
            "path": file_path.display().to_string(),
            "created": !existed
        })))
    }
}

/// First secret-like token in `content`, if any.
pub fn secret_match(content: &str) -> Option<&str> {
    SECRET_PATTERN
        .as_ref()
        .and_then(|re| re.find(content))
        .map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use deploy_snapshot::FileHistory;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_new_file_creates_parents() {
        let dir = TempDir::new().unwrap();
        let ctx = ToolContext::new(dir.path());

        let result = WriteFileTool
            .execute(json!({"path": "a/b/c.txt", "content": "hello"}), &ctx)
            .await
            .unwrap();

        assert_eq!(result.output, "SUCCESS: File written to a/b/c.txt");
        assert_eq!(
            std::fs::read_to_string(dir.path().join("a/b/c.txt")).unwrap(),
            "hello"
        );
        // Nothing to snapshot for a new file
        assert_eq!(ctx.history.lock().await.undo_len(), 0);
    }

    #[tokio::test]
    async fn test_overwrite_pushes_history_and_undo_restores() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "old").unwrap();

        let history = FileHistory::shared(20);
        let ctx = ToolContext::new(dir.path()).with_history(history.clone());

        WriteFileTool
            .execute(json!({"path": "a.txt", "content": "new"}), &ctx)
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");

        let restored = history.lock().await.undo().await.unwrap();
        assert_eq!(restored.as_deref(), Some(path.as_path()));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "old");
    }

    #[test]
    fn test_secret_match() {
        assert_eq!(secret_match("GROQ_API_KEY=abc"), Some("API_KEY"));
        assert_eq!(secret_match("my password"), Some("password"));
        assert_eq!(secret_match("fn main() {}"), None);
    }
}
