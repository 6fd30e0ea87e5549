//! Patch tool - apply a unified diff to one or more files.
//!
//! Header paths lose their first component (`a/src/x.rs` becomes
//! `src/x.rs`) and `/dev/null` marks a created or deleted file. Every hunk
//! of every file must apply before anything is written, and each touched
//! file is recorded in the edit history so `/undo` can revert it.

use crate::{parse_args, Tool, ToolContext, ToolError, ToolOutput, ToolResult};
use async_trait::async_trait;
use deploy_snapshot::unified_diff;
use deploy_util::path::join_within;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use std::iter::Peekable;
use std::path::{Path, PathBuf};
use std::str::Lines;
use tokio::fs;
use tracing::debug;

static HUNK_HEADER: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@").ok());

/// Apply unified diffs.
pub struct PatchTool;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PatchArgs {
    patch_content: String,
}

#[derive(Debug, Clone, PartialEq)]
enum Line {
    Context(String),
    Remove(String),
    Add(String),
}

#[derive(Debug, Clone)]
struct Hunk {
    old_start: usize,
    lines: Vec<Line>,
    /// The new side ends without a trailing newline.
    no_newline: bool,
}

impl Hunk {
    fn old_lines(&self) -> Vec<&str> {
        self.lines
            .iter()
            .filter_map(|l| match l {
                Line::Context(s) | Line::Remove(s) => Some(s.as_str()),
                Line::Add(_) => None,
            })
            .collect()
    }

    fn new_lines(&self) -> Vec<String> {
        self.lines
            .iter()
            .filter_map(|l| match l {
                Line::Context(s) | Line::Add(s) => Some(s.clone()),
                Line::Remove(_) => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
struct FilePatch {
    old: Option<String>,
    new: Option<String>,
    hunks: Vec<Hunk>,
}

/// One file's change, checked and ready to write.
struct Planned {
    name: String,
    source: Option<PathBuf>,
    target: Option<PathBuf>,
    before: String,
    /// Previous content of a rename target.
    displaced: String,
    after: String,
}

#[async_trait]
impl Tool for PatchTool {
    fn id(&self) -> &str {
        "patch"
    }

    fn description(&self) -> &str {
        r#"Apply a unified diff patch to files. Use this for multi-file changes.

Usage:
- Provide standard unified diff output (`--- a/path`, `+++ b/path`, `@@` hunks).
- Use /dev/null as the old path to create a file, or as the new path to delete one.
- Paths are relative to the project root; the leading a/ or b/ is stripped.
- Nothing is written unless every hunk applies."#
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["patchContent"],
            "properties": {
                "patchContent": {
                    "type": "string",
                    "description": "Unified diff patch content"
                }
            }
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult<ToolOutput> {
        let args: PatchArgs = parse_args(args)?;
        let patches = parse_patch(&args.patch_content)?;
        if patches.is_empty() {
            return Err(ToolError::validation("No file changes found in patch"));
        }

        let mut planned = Vec::with_capacity(patches.len());
        for patch in &patches {
            planned.push(plan(patch, ctx).await?);
        }
        ctx.check_cancelled()?;

        let mut report = Vec::with_capacity(planned.len());
        let mut diff = String::new();
        {
            let mut history = ctx.history.lock().await;
            for change in &planned {
                if let Some(source) = &change.source {
                    history.push(source.clone(), change.before.clone());
                }
                if let Some(target) = &change.target {
                    if change.source.as_ref() != Some(target) {
                        history.push(target.clone(), change.displaced.clone());
                    }
                }
            }
        }

        for change in &planned {
            match (&change.source, &change.target) {
                (Some(source), Some(target)) if source != target => {
                    write_file(target, &change.after).await?;
                    fs::remove_file(source).await?;
                    report.push(format!("renaming file {}", change.name));
                }
                (_, Some(target)) => {
                    write_file(target, &change.after).await?;
                    report.push(format!("patching file {}", change.name));
                }
                (Some(source), None) => {
                    fs::remove_file(source).await?;
                    report.push(format!("deleting file {}", change.name));
                }
                (None, None) => {}
            }
            let shown = change.target.as_ref().or(change.source.as_ref());
            if let Some(path) = shown {
                diff.push_str(&unified_diff(&change.before, &change.after, path));
            }
        }

        debug!(files = planned.len(), "Applied patch");

        Ok(ToolOutput::new(
            format!("Patched {} file(s)", planned.len()),
            report.join("\n"),
        )
        .with_metadata(json!({
            "files": planned.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            "diff": diff
        })))
    }
}

/// Check one file's hunks against disk and compute its new content.
async fn plan(patch: &FilePatch, ctx: &ToolContext) -> ToolResult<Planned> {
    let within = |rel: &str| {
        join_within(&ctx.cwd, rel).ok_or_else(|| {
            ToolError::permission_denied(format!("{rel} is outside the working directory"))
        })
    };
    let source = patch.old.as_deref().map(within).transpose()?;
    let target = patch.new.as_deref().map(within).transpose()?;
    let name = match (&patch.old, &patch.new) {
        (Some(old), Some(new)) if old != new => format!("{old} -> {new}"),
        (_, Some(name)) | (Some(name), None) => name.clone(),
        (None, None) => return Err(ToolError::validation("Patch header names no file")),
    };

    let before = match &source {
        Some(path) => fs::read_to_string(path)
            .await
            .map_err(|_| ToolError::file_not_found(patch.old.clone().unwrap_or_default()))?,
        None => {
            if target.as_ref().is_some_and(|t| t.exists()) {
                return Err(ToolError::execution_failed(format!(
                    "{name} already exists"
                )));
            }
            String::new()
        }
    };

    let displaced = match (&source, &target) {
        (Some(s), Some(t)) if s != t => fs::read_to_string(t).await.unwrap_or_default(),
        _ => String::new(),
    };

    let after = apply_hunks(&before, &patch.hunks)
        .map_err(|e| ToolError::execution_failed(format!("Failed to apply patch to {name}: {e}")))?;

    Ok(Planned {
        name,
        source,
        target,
        before,
        displaced,
        after,
    })
}

async fn write_file(path: &Path, content: &str) -> ToolResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, content).await?;
    Ok(())
}

fn parse_patch(text: &str) -> ToolResult<Vec<FilePatch>> {
    let mut lines = text.lines().peekable();
    let mut patches: Vec<FilePatch> = Vec::new();

    while let Some(line) = lines.next() {
        if let Some(old) = line.strip_prefix("--- ") {
            let new = match lines.peek().and_then(|l| l.strip_prefix("+++ ")) {
                Some(new) => new.to_string(),
                None => {
                    return Err(ToolError::validation(format!(
                        "Missing +++ header after: {line}"
                    )))
                }
            };
            lines.next();
            patches.push(FilePatch {
                old: header_path(old),
                new: header_path(&new),
                hunks: Vec::new(),
            });
        } else if line.starts_with("@@") {
            let Some(patch) = patches.last_mut() else {
                return Err(ToolError::validation("Hunk found before any file header"));
            };
            let hunk = parse_hunk(line, &mut lines)?;
            patch.hunks.push(hunk);
        }
        // `diff --git`, `index` and free text between files are ignored
    }

    Ok(patches)
}

/// Path from a `---`/`+++` header with the first component stripped.
fn header_path(raw: &str) -> Option<String> {
    // Some tools append a tab and a timestamp.
    let raw = raw.split('\t').next().unwrap_or(raw).trim();
    if raw == "/dev/null" || raw.is_empty() {
        return None;
    }
    let stripped = raw.split_once('/').map(|(_, rest)| rest).unwrap_or(raw);
    Some(stripped.to_string())
}

fn parse_hunk(header: &str, lines: &mut Peekable<Lines<'_>>) -> ToolResult<Hunk> {
    let captures = HUNK_HEADER
        .as_ref()
        .and_then(|re| re.captures(header))
        .ok_or_else(|| ToolError::validation(format!("Malformed hunk header: {header}")))?;
    let number = |i: usize| {
        captures
            .get(i)
            .and_then(|m| m.as_str().parse::<usize>().ok())
            .unwrap_or(1)
    };
    let old_start = number(1);
    let mut old_left = number(2);
    let mut new_left = number(4);

    let mut hunk = Hunk {
        old_start,
        lines: Vec::new(),
        no_newline: false,
    };

    while old_left > 0 || new_left > 0 {
        let Some(line) = lines.next() else {
            return Err(ToolError::validation("Patch ends in the middle of a hunk"));
        };
        let (tag, text) = match line.chars().next() {
            Some(c) => (c, &line[c.len_utf8()..]),
            None => (' ', ""),
        };
        match tag {
            ' ' => {
                old_left = old_left.saturating_sub(1);
                new_left = new_left.saturating_sub(1);
                hunk.lines.push(Line::Context(text.to_string()));
            }
            '-' => {
                old_left = old_left.saturating_sub(1);
                hunk.lines.push(Line::Remove(text.to_string()));
            }
            '+' => {
                new_left = new_left.saturating_sub(1);
                hunk.lines.push(Line::Add(text.to_string()));
            }
            '\\' => {}
            _ => {
                return Err(ToolError::validation(format!(
                    "Malformed hunk line: {line}"
                )))
            }
        }
    }

    if lines.peek().is_some_and(|l| l.starts_with('\\')) {
        lines.next();
        hunk.no_newline = !matches!(hunk.lines.last(), Some(Line::Remove(_)));
    }

    Ok(hunk)
}

/// Apply `hunks` in order, letting each one float to the nearest match.
fn apply_hunks(content: &str, hunks: &[Hunk]) -> Result<String, String> {
    let mut trailing_newline = content.is_empty() || content.ends_with('\n');
    let mut lines: Vec<String> = content.split_terminator('\n').map(str::to_string).collect();
    let mut offset: isize = 0;
    let mut floor = 0;

    for (i, hunk) in hunks.iter().enumerate() {
        let old = hunk.old_lines();
        let new = hunk.new_lines();

        // A pure insertion's start names the line it goes after.
        let base = if old.is_empty() {
            hunk.old_start
        } else {
            hunk.old_start.saturating_sub(1)
        };
        let expected = (base as isize + offset).max(0) as usize;

        let at = locate(&lines, &old, expected, floor)
            .ok_or_else(|| format!("hunk #{} does not match at line {}", i + 1, hunk.old_start))?;

        let end = at + old.len();
        let reaches_end = end == lines.len();
        lines.splice(at..end, new.iter().cloned());

        offset = at as isize - base as isize + new.len() as isize - old.len() as isize;
        floor = at + new.len();
        if reaches_end {
            trailing_newline = !hunk.no_newline;
        }
    }

    let mut result = lines.join("\n");
    if trailing_newline && !lines.is_empty() {
        result.push('\n');
    }
    Ok(result)
}

/// Start index of `old` in `lines`, searching outward from `expected`.
fn locate(lines: &[String], old: &[&str], expected: usize, floor: usize) -> Option<usize> {
    if old.is_empty() {
        return Some(expected.clamp(floor.min(lines.len()), lines.len()));
    }
    let last = lines.len().checked_sub(old.len())?;
    let fits = |at: usize| {
        at >= floor
            && at <= last
            && lines[at..at + old.len()]
                .iter()
                .zip(old)
                .all(|(have, want)| have.trim_end_matches('\r') == want.trim_end_matches('\r'))
    };

    for distance in 0..=lines.len() {
        if let Some(before) = expected.checked_sub(distance) {
            if fits(before) {
                return Some(before);
            }
        }
        if distance > 0 && fits(expected + distance) {
            return Some(expected + distance);
        }
    }
    None
}
