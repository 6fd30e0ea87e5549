//! Search tool - combined filename and content search.

use crate::find::workspace_walker;
use crate::{parse_args, Tool, ToolContext, ToolOutput, ToolResult};
use async_trait::async_trait;
use deploy_util::path::display_relative;
use serde::Deserialize;
use serde_json::{json, Value};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::debug;

/// Maximum hits per section.
const LIMIT: usize = 10;

/// Which sections a search covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchKind {
    File,
    Content,
    #[default]
    Both,
}

impl SearchKind {
    fn filenames(self) -> bool {
        matches!(self, Self::File | Self::Both)
    }

    fn content(self) -> bool {
        matches!(self, Self::Content | Self::Both)
    }
}

/// Search for files and content in the workspace.
pub struct SearchTool;

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
    #[serde(default, rename = "type")]
    kind: Option<SearchKind>,
}

#[async_trait]
impl Tool for SearchTool {
    fn id(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        "Perform an efficient search for files and content. Use this to discover where things are."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["query"],
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search term or pattern"
                },
                "type": {
                    "type": "string",
                    "enum": ["file", "content", "both"],
                    "description": "Whether to search for filenames, content, or both (default both)"
                }
            }
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult<ToolOutput> {
        let args: SearchArgs = parse_args(args)?;
        let kind = args.kind.unwrap_or_default();
        debug!(query = %args.query, kind = ?kind, "Searching workspace");

        let output = search(&ctx.cwd, &args.query, kind, ctx)?;
        Ok(ToolOutput::new(format!("Search: {}", args.query), output))
    }
}

/// Run a search under `base`, formatting the two sections.
///
/// Also backs the `/search` command.
pub fn search(base: &Path, query: &str, kind: SearchKind, ctx: &ToolContext) -> ToolResult<String> {
    let mut name_hits = Vec::new();
    let mut content_hits = Vec::new();

    if !query.is_empty() {
        for entry in workspace_walker(base).filter_map(Result::ok) {
            ctx.check_cancelled()?;
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let path = entry.path();
            let shown = format!("./{}", display_relative(path, base));

            if kind.filenames()
                && name_hits.len() < LIMIT
                && entry.file_name().to_string_lossy().contains(query)
            {
                name_hits.push(shown.clone());
            }

            if kind.content() && content_hits.len() < LIMIT {
                // Unreadable and binary files are skipped
                if let Ok(lines) = matching_lines(path, query, LIMIT - content_hits.len()) {
                    content_hits.extend(
                        lines
                            .into_iter()
                            .map(|(n, line)| format!("{shown}:{n}:{line}")),
                    );
                }
            }

            let names_done = !kind.filenames() || name_hits.len() >= LIMIT;
            let content_done = !kind.content() || content_hits.len() >= LIMIT;
            if names_done && content_done {
                break;
            }
        }
    }

    let mut sections = Vec::new();
    if !name_hits.is_empty() {
        sections.push(format!("Found in filenames:\n{}", name_hits.join("\n")));
    }
    if !content_hits.is_empty() {
        sections.push(format!("Found in content:\n{}", content_hits.join("\n")));
    }

    if sections.is_empty() {
        Ok(format!("No matches found for \"{query}\"."))
    } else {
        Ok(sections.join("\n\n"))
    }
}

/// Lines of `path` containing `needle`, 1-based, at most `max`.
fn matching_lines(path: &Path, needle: &str, max: usize) -> std::io::Result<Vec<(usize, String)>> {
    let reader = BufReader::new(File::open(path)?);
    let mut matches = Vec::new();

    for (line_num, line) in reader.lines().enumerate() {
        // Invalid UTF-8 ends the scan for this file
        let line = line?;
        if line.contains(needle) {
            matches.push((line_num + 1, line));
            if matches.len() >= max {
                break;
            }
        }
    }

    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join("src/session.rs"), "struct Session;\nfn other() {}\n").unwrap();
        std::fs::write(dir.path().join("src/main.rs"), "use session::Session;\n").unwrap();
        std::fs::write(dir.path().join(".git/config"), "Session in git\n").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_search_both() {
        let dir = setup();
        let ctx = ToolContext::new(dir.path());
        let result = SearchTool
            .execute(json!({"query": "ession"}), &ctx)
            .await
            .unwrap();

        assert!(result.output.starts_with("Found in filenames:\n./src/session.rs"));
        assert!(result.output.contains("Found in content:"));
        assert!(result.output.contains("./src/session.rs:1:struct Session;"));
        assert!(result.output.contains("./src/main.rs:1:use session::Session;"));
        assert!(!result.output.contains(".git"));
    }

    #[tokio::test]
    async fn test_search_file_only() {
        let dir = setup();
        let ctx = ToolContext::new(dir.path());
        let result = SearchTool
            .execute(json!({"query": "main", "type": "file"}), &ctx)
            .await
            .unwrap();
        assert_eq!(result.output, "Found in filenames:\n./src/main.rs");
    }

    #[tokio::test]
    async fn test_search_content_only() {
        let dir = setup();
        let ctx = ToolContext::new(dir.path());
        let result = SearchTool
            .execute(json!({"query": "fn other", "type": "content"}), &ctx)
            .await
            .unwrap();
        assert_eq!(
            result.output,
            "Found in content:\n./src/session.rs:2:fn other() {}"
        );
    }

    #[tokio::test]
    async fn test_search_no_matches() {
        let dir = setup();
        let ctx = ToolContext::new(dir.path());
        let result = SearchTool
            .execute(json!({"query": "zzz"}), &ctx)
            .await
            .unwrap();
        assert_eq!(result.output, "No matches found for \"zzz\".");
    }

    #[tokio::test]
    async fn test_search_content_limit() {
        let dir = TempDir::new().unwrap();
        let body = "hit\n".repeat(25);
        std::fs::write(dir.path().join("many.txt"), body).unwrap();
        let ctx = ToolContext::new(dir.path());
        let result = SearchTool
            .execute(json!({"query": "hit", "type": "content"}), &ctx)
            .await
            .unwrap();
        assert_eq!(result.output.lines().count(), 1 + LIMIT);
    }

    #[test]
    fn test_invalid_kind_fails_validation() {
        let err = SearchTool
            .validate(&json!({"query": "x", "type": "everything"}))
            .unwrap_err();
        assert!(err.is_validation());
    }
}
