//! Slash commands.
//!
//! Input starting with `/` is matched against a fixed table before the
//! agent loop is considered. Recognized commands never reach the model.

use std::path::Path;
use std::process::Stdio;
use tokio::process::Command as Process;
use tracing::debug;

/// Built-in commands as `(usage, description)`, in help order.
pub const COMMANDS: &[(&str, &str)] = &[
    ("/login", "Sign in"),
    ("/logout", "Sign out"),
    ("/clear", "Clear chat (alias /reset)"),
    ("/exit", "Exit app (alias /quit)"),
    ("/help", "Show this message"),
    ("/history", "View history"),
    ("/history delete <id>", "Delete a saved session"),
    ("/model [id]", "Show or switch model"),
    ("/undo", "Undo the last file change"),
    ("/redo", "Redo the last undone change"),
    ("/view <path>", "Show a file"),
    ("/search <query>", "Search file names and contents"),
    ("/git status", "Show working tree status"),
    ("/git diff", "Show unstaged changes"),
];

/// What the caller should do after a command ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The command was handled; keep reading input.
    Handled,
    /// Leave the application.
    Exit,
    /// The input is not a command and goes to the agent loop.
    NotACommand,
}

/// Git subcommands exposed through `/git`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitCommand {
    Status,
    Diff,
}

impl GitCommand {
    fn args(self) -> &'static [&'static str] {
        match self {
            GitCommand::Status => &["status"],
            GitCommand::Diff => &["--no-pager", "diff"],
        }
    }
}

/// A parsed slash command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login,
    Logout,
    Clear,
    Help,
    Exit,
    History,
    DeleteSession(Option<String>),
    Model(Option<String>),
    Undo,
    Redo,
    View(Option<String>),
    Search(Option<String>),
    Git(Option<GitCommand>),
    /// A single-token command that is not in the table.
    Unknown(String),
}

impl Command {
    /// Parse user input. Returns `None` for anything that should go to the
    /// model, including unknown commands followed by arguments.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if !input.starts_with('/') {
            return None;
        }

        let (name, rest) = match input.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (input, ""),
        };
        let arg = (!rest.is_empty()).then(|| rest.to_string());

        let command = match name {
            "/login" => Command::Login,
            "/logout" => Command::Logout,
            "/clear" | "/reset" => Command::Clear,
            "/help" => Command::Help,
            "/exit" | "/quit" => Command::Exit,
            "/history" => match rest.split_once(char::is_whitespace) {
                Some(("delete", id)) => Command::DeleteSession(Some(id.trim().to_string())),
                None if rest == "delete" => Command::DeleteSession(None),
                _ => Command::History,
            },
            "/model" => Command::Model(arg),
            "/undo" => Command::Undo,
            "/redo" => Command::Redo,
            "/view" => Command::View(arg),
            "/search" => Command::Search(arg),
            "/git" => Command::Git(match rest {
                "status" => Some(GitCommand::Status),
                "diff" => Some(GitCommand::Diff),
                _ => None,
            }),
            _ if rest.is_empty() => Command::Unknown(name.to_string()),
            _ => return None,
        };
        Some(command)
    }
}

/// Help text listing every command.
pub fn help_text() -> String {
    let mut text = String::from("Available commands:");
    for (usage, description) in COMMANDS {
        text.push_str(&format!("\n{} - {}", usage, description));
    }
    text
}

pub fn unknown_command(name: &str) -> String {
    format!("Command '{}' not recognized or not implemented yet.", name)
}

/// Run a git subcommand in `cwd` and return what it printed.
pub async fn run_git(cwd: &Path, command: GitCommand) -> String {
    debug!(?command, "Running git");
    let output = Process::new("git")
        .args(command.args())
        .current_dir(cwd)
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await;

    match output {
        Ok(output) => {
            let stdout = String::from_utf8_lossy(&output.stdout).trim_end().to_string();
            let stderr = String::from_utf8_lossy(&output.stderr).trim_end().to_string();
            if !output.status.success() {
                format!("Error: {}", if stderr.is_empty() { stdout } else { stderr })
            } else if stdout.is_empty() {
                match command {
                    GitCommand::Diff => "No changes.".to_string(),
                    GitCommand::Status => "Nothing to report.".to_string(),
                }
            } else {
                stdout
            }
        }
        Err(e) => format!("Error: failed to run git: {}", e),
    }
}
