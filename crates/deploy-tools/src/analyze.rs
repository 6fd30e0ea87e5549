//! Code analysis tool - find definitions and references of a symbol.

use crate::find::workspace_walker;
use crate::{parse_args, Tool, ToolContext, ToolError, ToolOutput, ToolResult};
use async_trait::async_trait;
use deploy_util::path::display_relative;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::debug;

/// Maximum definitions reported.
const MAX_DEFINITIONS: usize = 5;

/// Maximum references reported.
const MAX_REFERENCES: usize = 10;

/// Declaration keywords across the languages commonly found in a project.
const DECLARATION_KEYWORDS: &str =
    "const|let|var|function|class|interface|type|fn|struct|enum|trait|def";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalyzeMode {
    Definitions,
    References,
    #[default]
    Both,
}

/// Find where a symbol is declared and used.
pub struct CodeAnalyzeTool;

#[derive(Debug, Deserialize)]
struct AnalyzeArgs {
    symbol: String,
    #[serde(default)]
    mode: AnalyzeMode,
}

#[async_trait]
impl Tool for CodeAnalyzeTool {
    fn id(&self) -> &str {
        "codeAnalyze"
    }

    fn description(&self) -> &str {
        "Analyze code to find definitions and references of a symbol."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["symbol"],
            "properties": {
                "symbol": {
                    "type": "string",
                    "description": "The symbol or function name to analyze"
                },
                "mode": {
                    "type": "string",
                    "enum": ["definitions", "references", "both"],
                    "description": "What to look for (default both)"
                }
            }
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult<ToolOutput> {
        let args: AnalyzeArgs = parse_args(args)?;
        let symbol = args.symbol.trim();
        if symbol.is_empty() {
            return Err(ToolError::validation("symbol cannot be empty"));
        }
        debug!(symbol, mode = ?args.mode, "Analyzing symbol");

        let definition = Regex::new(&format!(
            r"(export\s+)?(pub(\(\w+\))?\s+)?(async\s+)?({DECLARATION_KEYWORDS})\s+{}\b",
            regex::escape(symbol)
        ))
        .map_err(|e| ToolError::execution_failed(format!("Invalid symbol pattern: {e}")))?;

        let (definitions, references) = scan(&ctx.cwd, symbol, &definition, args.mode, ctx)?;

        let mut sections = Vec::new();
        if !definitions.is_empty() {
            sections.push(format!("Definitions found:\n{}", definitions.join("\n")));
        }
        if !references.is_empty() {
            sections.push(format!("References found:\n{}", references.join("\n")));
        }
        let output = if sections.is_empty() {
            format!("No definitions or references found for \"{symbol}\".")
        } else {
            sections.join("\n\n")
        };

        Ok(
            ToolOutput::new(format!("Analyze: {symbol}"), output).with_metadata(json!({
                "definitions": definitions.len(),
                "references": references.len()
            })),
        )
    }
}

fn scan(
    base: &Path,
    symbol: &str,
    definition: &Regex,
    mode: AnalyzeMode,
    ctx: &ToolContext,
) -> ToolResult<(Vec<String>, Vec<String>)> {
    let want_defs = mode != AnalyzeMode::References;
    let want_refs = mode != AnalyzeMode::Definitions;
    let mut definitions = Vec::new();
    let mut references = Vec::new();

    for entry in workspace_walker(base).filter_map(Result::ok) {
        ctx.check_cancelled()?;
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let shown = format!("./{}", display_relative(entry.path(), base));
        let Ok(file) = File::open(entry.path()) else {
            continue;
        };

        // Stops at the first line that is not UTF-8, which skips binaries
        for (n, line) in BufReader::new(file).lines().map_while(Result::ok).enumerate() {
            if !line.contains(symbol) {
                continue;
            }
            let hit = format!("{shown}:{}:{}", n + 1, line.trim_end());
            if definition.is_match(&line) {
                if want_defs && definitions.len() < MAX_DEFINITIONS {
                    definitions.push(hit);
                }
            } else if want_refs && references.len() < MAX_REFERENCES {
                references.push(hit);
            }
        }

        let defs_done = !want_defs || definitions.len() >= MAX_DEFINITIONS;
        let refs_done = !want_refs || references.len() >= MAX_REFERENCES;
        if defs_done && refs_done {
            break;
        }
    }

    Ok((definitions, references))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, ToolContext) {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::create_dir_all(dir.path().join("node_modules/pkg")).unwrap();
        std::fs::write(
            dir.path().join("src/session.ts"),
            "export class Session {\n  id = 1;\n}\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("src/main.ts"),
            "import { Session } from './session';\nconst s = new Session();\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("node_modules/pkg/index.ts"),
            "class Session {}\n",
        )
        .unwrap();
        let ctx = ToolContext::new(dir.path());
        (dir, ctx)
    }

    #[tokio::test]
    async fn test_definitions_and_references() {
        let (_dir, ctx) = setup();
        let result = CodeAnalyzeTool
            .execute(json!({"symbol": "Session"}), &ctx)
            .await
            .unwrap();

        assert_eq!(
            result.output,
            "Definitions found:\n./src/session.ts:1:export class Session {\n\n\
             References found:\n./src/main.ts:1:import { Session } from './session';\n\
             ./src/main.ts:2:const s = new Session();"
        );
        assert!(!result.output.contains("node_modules"));
    }

    #[tokio::test]
    async fn test_definitions_only() {
        let (_dir, ctx) = setup();
        let result = CodeAnalyzeTool
            .execute(json!({"symbol": "Session", "mode": "definitions"}), &ctx)
            .await
            .unwrap();
        assert_eq!(
            result.output,
            "Definitions found:\n./src/session.ts:1:export class Session {"
        );
        assert_eq!(result.metadata["references"], 0);
    }

    #[tokio::test]
    async fn test_rust_definition() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("lib.rs"), "pub async fn run_loop() {}\n").unwrap();
        let ctx = ToolContext::new(dir.path());
        let result = CodeAnalyzeTool
            .execute(json!({"symbol": "run_loop", "mode": "definitions"}), &ctx)
            .await
            .unwrap();
        assert!(result.output.contains("./lib.rs:1:pub async fn run_loop() {}"));
    }

    #[tokio::test]
    async fn test_no_matches() {
        let (_dir, ctx) = setup();
        let result = CodeAnalyzeTool
            .execute(json!({"symbol": "Nowhere"}), &ctx)
            .await
            .unwrap();
        assert_eq!(
            result.output,
            "No definitions or references found for \"Nowhere\"."
        );
    }

    #[tokio::test]
    async fn test_symbol_is_literal() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "cost is a+b\naxb\n").unwrap();
        let ctx = ToolContext::new(dir.path());
        let result = CodeAnalyzeTool
            .execute(json!({"symbol": "a+b"}), &ctx)
            .await
            .unwrap();
        assert_eq!(result.output, "References found:\n./a.txt:1:cost is a+b");
    }

    #[test]
    fn test_invalid_mode_fails_validation() {
        let err = CodeAnalyzeTool
            .validate(&json!({"symbol": "x", "mode": "everything"}))
            .unwrap_err();
        assert!(err.is_validation());
    }
}
