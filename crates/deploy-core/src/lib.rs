//! Core logic for deploy.
//!
//! This crate provides the agent orchestration engine:
//! - Configuration management (multi-source, JSONC support)
//! - Conversation turns and the session aggregate
//! - `@file` context assembly with TOON encoding
//! - The prompt loop that alternates model calls and tool execution
//! - Slash commands and sign-in state
//! - Event bus for observers such as the terminal renderer

pub mod auth;
pub mod bus;
pub mod command;
pub mod config;
pub mod context;
pub mod error;
pub mod instance;
pub mod prompt;
pub mod session;
pub mod toon;
pub mod turn;

pub use bus::{AgentEvent, Bus};
pub use command::{Command, CommandOutcome};
pub use config::Config;
pub use context::{ContextAssembler, ContextBundle, FileEntry};
pub use error::{ConfigError, CoreError, CoreResult};
pub use instance::Instance;
pub use prompt::{PromptConfig, PromptLoop, PromptResult, Termination};
pub use session::{NullSink, Session, SessionSink, StoreSink};
pub use turn::{OutcomeStatus, ToolCallIntent, ToolOutcome, Turn};
