//! Bash tool - execute shell commands.
//!
//! Runs `bash -c <command>` in the context's working directory with:
//! - a timeout (default 2 minutes, max 10 minutes)
//! - a substring denylist for destructive commands
//! - output truncation for large outputs
//! - cancellation through the context's abort token

use crate::{parse_args, truncate_str, Tool, ToolContext, ToolError, ToolOutput, ToolResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Default timeout in milliseconds (2 minutes).
const DEFAULT_TIMEOUT_MS: u64 = 120_000;

/// Maximum timeout in milliseconds (10 minutes).
const MAX_TIMEOUT_MS: u64 = 600_000;

/// Maximum output size in bytes before truncation.
const MAX_OUTPUT_SIZE: usize = 30_000;

/// Substrings that cause a command to be refused outright.
const BLOCKED_PATTERNS: &[&str] = &["rm -rf /", "mkfs", "dd if=", "shutdown", "reboot"];

/// Message returned for refused commands.
pub const BLOCKED_MESSAGE: &str = "ERROR: Command blocked for security reasons.";

/// Message returned when a command prints nothing.
pub const NO_OUTPUT_MESSAGE: &str = "Command executed successfully (no output).";

/// Execute shell commands.
pub struct BashTool;

#[derive(Debug, Deserialize)]
struct BashArgs {
    command: String,
    timeout: Option<u64>,
}

#[async_trait]
impl Tool for BashTool {
    fn id(&self) -> &str {
        "bash"
    }

    fn description(&self) -> &str {
        r#"Execute a bash command in the project root. Be extremely careful with destructive commands.

Usage notes:
- The command argument is required.
- You can specify an optional timeout in milliseconds (up to 600000ms / 10 minutes).
- Commands will time out after 120000ms (2 minutes) by default.
- Returns stdout, or stderr when stdout is empty."#
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["command"],
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The bash command to execute"
                },
                "timeout": {
                    "type": "integer",
                    "description": "Optional timeout in milliseconds (max 600000)"
                }
            }
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult<ToolOutput> {
        let args: BashArgs = parse_args(args)?;

        if args.command.trim().is_empty() {
            return Err(ToolError::validation("Command cannot be empty"));
        }

        if is_blocked(&args.command) {
            warn!(command = %args.command, "Bash command blocked by denylist");
            return Ok(ToolOutput::new(truncate_command(&args.command), BLOCKED_MESSAGE)
                .with_metadata(json!({ "blocked": true })));
        }

        let timeout_ms = args
            .timeout
            .unwrap_or(DEFAULT_TIMEOUT_MS)
            .min(MAX_TIMEOUT_MS);

        debug!(
            command = %args.command,
            workdir = %ctx.cwd.display(),
            timeout_ms = timeout_ms,
            "Executing bash command"
        );

        tokio::select! {
            biased;
            // Dropping the run future kills the child (kill_on_drop).
            _ = ctx.abort.cancelled() => Err(ToolError::Cancelled),
            result = run(&args.command, &ctx.cwd, Duration::from_millis(timeout_ms)) => result,
        }
    }
}

/// Whether `command` contains a denylisted substring.
pub fn is_blocked(command: &str) -> bool {
    BLOCKED_PATTERNS.iter().any(|p| command.contains(p))
}

async fn run(command: &str, workdir: &Path, timeout: Duration) -> ToolResult<ToolOutput> {
    if !workdir.is_dir() {
        return Err(ToolError::validation(format!(
            "Working directory does not exist: {}",
            workdir.display()
        )));
    }

    let mut cmd = Command::new("bash");
    cmd.arg("-c")
        .arg(command)
        .current_dir(workdir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    // Avoid interactive prompts and colour codes
    cmd.env("TERM", "dumb");
    cmd.env("GIT_TERMINAL_PROMPT", "0");
    cmd.env("NO_COLOR", "1");

    let mut child = cmd
        .spawn()
        .map_err(|e| ToolError::execution_failed(format!("Failed to spawn process: {e}")))?;

    let result = tokio::time::timeout(timeout, async {
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let stdout_handle = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(mut stdout) = stdout {
                stdout.read_to_end(&mut buf).await.ok();
            }
            buf
        });

        let stderr_handle = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(mut stderr) = stderr {
                stderr.read_to_end(&mut buf).await.ok();
            }
            buf
        });

        let status = child.wait().await?;

        let stdout_bytes = stdout_handle.await.unwrap_or_default();
        let stderr_bytes = stderr_handle.await.unwrap_or_default();

        Ok::<_, std::io::Error>((status, stdout_bytes, stderr_bytes))
    })
    .await;

    match result {
        Ok(Ok((status, stdout_bytes, stderr_bytes))) => {
            let exit_code = status.code().unwrap_or(-1);
            let stdout = String::from_utf8_lossy(&stdout_bytes);
            let stderr = String::from_utf8_lossy(&stderr_bytes);

            let output = if !stdout.is_empty() {
                stdout.into_owned()
            } else if !stderr.is_empty() {
                stderr.into_owned()
            } else {
                NO_OUTPUT_MESSAGE.to_string()
            };

            let (output, truncated) = truncate_output(&output, MAX_OUTPUT_SIZE);
            if truncated {
                warn!(command = %command, "Output truncated to {} bytes", MAX_OUTPUT_SIZE);
            }

            let title = if status.success() {
                truncate_command(command)
            } else {
                format!("{} (exit code: {})", truncate_command(command), exit_code)
            };

            Ok(ToolOutput::new(title, output).with_metadata(json!({
                "exit_code": exit_code,
                "truncated": truncated
            })))
        }
        Ok(Err(e)) => Err(ToolError::execution_failed(format!("Process error: {e}"))),
        // The child is killed by kill_on_drop
        Err(_) => Err(ToolError::Timeout(timeout)),
    }
}

/// Truncate command for display in title.
fn truncate_command(cmd: &str) -> String {
    let first_line = cmd.lines().next().unwrap_or(cmd);
    if first_line.len() > 50 {
        format!("{}...", truncate_str(first_line, 47))
    } else {
        first_line.to_string()
    }
}

/// Truncate output if too long, keeping the head.
fn truncate_output(output: &str, max_size: usize) -> (String, bool) {
    if output.len() <= max_size {
        return (output.to_string(), false);
    }
    let head = truncate_str(output, max_size);
    (
        format!(
            "{head}\n\n... [{} bytes truncated] ...",
            output.len() - head.len()
        ),
        true,
    )
}
