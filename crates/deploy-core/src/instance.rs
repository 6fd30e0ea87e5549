//! Application state for one working directory.
//!
//! An [`Instance`] ties together the configuration, the model provider,
//! the tool registry, the file edit history and the current [`Session`],
//! and routes each line of user input either to a slash command or to the
//! agent loop.
//!
//! # Example
//!
//! ```ignore
//! use deploy_core::Instance;
//!
//! let mut instance = Instance::load("/path/to/project").await?;
//! let mut events = instance.bus().subscribe();
//! instance.submit("/login").await?;
//! instance.submit("@README.md summarize").await?;
//! ```

use crate::auth::{self, Auth};
use crate::bus::Bus;
use crate::command::{self, Command, CommandOutcome};
use crate::config::Config;
use crate::context::ContextAssembler;
use crate::error::CoreResult;
use crate::prompt::{PromptConfig, PromptLoop, PromptResult};
use crate::session::{NullSink, Session, SessionSink, StoreSink};
use crate::turn::Turn;
use deploy_provider::groq::{self, GroqProvider};
use deploy_provider::BoxedLanguageModel;
use deploy_snapshot::{FileHistory, SharedFileHistory};
use deploy_storage::{JsonStorage, SessionStore};
use deploy_tools::read::ReadFileTool;
use deploy_tools::search::{self, SearchKind};
use deploy_tools::{Tool, ToolContext, ToolRegistry};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Saved sessions on disk.
pub type Archive = Arc<SessionStore<JsonStorage>>;

/// State for one working directory.
pub struct Instance {
    directory: PathBuf,
    config: Config,
    provider: BoxedLanguageModel,
    tools: ToolRegistry,
    history: SharedFileHistory,
    bus: Bus,
    session: Session,
    archive: Option<Archive>,
    auth: Auth,
    cancel: CancellationToken,
}

impl Instance {
    /// Create an instance with an explicit provider and no saved sessions.
    pub fn new(directory: impl Into<PathBuf>, config: Config, provider: BoxedLanguageModel) -> Self {
        let bus = Bus::new();
        let session = Session::new(config.model(), bus.clone(), Arc::new(NullSink));
        Self {
            directory: directory.into(),
            history: FileHistory::shared(config.history_capacity()),
            tools: ToolRegistry::with_builtins(),
            config,
            provider,
            bus,
            session,
            archive: None,
            auth: Auth::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Load configuration for `directory` and connect to the configured
    /// provider, saving sessions under the data directory.
    pub async fn load(directory: impl AsRef<Path>) -> CoreResult<Self> {
        let directory = directory.as_ref().to_path_buf();
        let (config, sources) = Config::load(Some(&directory)).await?;
        debug!(?sources, "Configuration sources");
        Self::from_config(directory, config)
    }

    /// Connect to the provider described by `config`.
    pub fn from_config(directory: impl Into<PathBuf>, config: Config) -> CoreResult<Self> {
        let api_key = config.api_key().unwrap_or_default();
        let model = groq::models::find(config.model());
        let provider = match config.base_url() {
            Some(url) => GroqProvider::with_base_url(&api_key, url, model)?,
            None => GroqProvider::new(&api_key, model)?,
        }
        .with_reasoning_format(Some(config.reasoning_format().to_string()));

        let mut instance = Self::new(directory, config, Arc::new(provider));
        if let Some(storage) = JsonStorage::at_data_dir() {
            instance = instance.with_archive(Arc::new(SessionStore::new(storage)));
        }
        Ok(instance)
    }

    /// Override the configured model for this run.
    pub fn set_model(&mut self, model: impl Into<String>) {
        self.session.set_model(model);
    }

    /// Save sessions to `archive` and list them with `/history`.
    pub fn with_archive(mut self, archive: Archive) -> Self {
        let sink: Arc<dyn SessionSink> = Arc::new(StoreSink::new(archive.clone()));
        self.session = Session::new(self.session.model(), self.bus.clone(), sink);
        self.archive = Some(archive);
        self
    }

    /// Replace the tool registry.
    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn history(&self) -> &SharedFileHistory {
        &self.history
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth.is_authenticated()
    }

    /// Token that aborts the running loop and any tool it started.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Sign in without adding a turn. Returns whether it succeeded.
    pub fn login(&mut self) -> bool {
        self.auth.login(self.provider.as_ref())
    }

    /// Restore a saved session. Returns `false` when it does not exist.
    pub async fn resume(&mut self, id: &str) -> CoreResult<bool> {
        let Some(archive) = &self.archive else {
            return Ok(false);
        };
        match archive.load::<Turn>(id).await? {
            Some(saved) => {
                info!(session = %saved.id, turns = saved.turns.len(), "Resumed session");
                self.session.replace(saved.id, saved.turns);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Restore the most recently saved session, if any.
    pub async fn continue_latest(&mut self) -> CoreResult<bool> {
        let Some(archive) = &self.archive else {
            return Ok(false);
        };
        match archive.latest().await? {
            Some(info) => self.resume(&info.id).await,
            None => Ok(false),
        }
    }

    /// Handle one line of user input.
    ///
    /// Returns [`CommandOutcome::Exit`] when the user asked to leave, and
    /// [`CommandOutcome::Handled`] otherwise.
    pub async fn submit(&mut self, input: &str) -> CoreResult<CommandOutcome> {
        if input.trim().is_empty() || self.session.is_processing() {
            return Ok(CommandOutcome::Handled);
        }
        match self.execute_command(input).await? {
            CommandOutcome::NotACommand => {
                self.send_message(input).await;
                Ok(CommandOutcome::Handled)
            }
            outcome => Ok(outcome),
        }
    }

    /// Run `input` as a slash command if it is one.
    pub async fn execute_command(&mut self, input: &str) -> CoreResult<CommandOutcome> {
        let Some(command) = Command::parse(input) else {
            return Ok(CommandOutcome::NotACommand);
        };
        debug!(?command, "Executing command");

        let reply = match command {
            Command::Login => {
                let reply = if self.login() {
                    auth::LOGIN_SUCCESS.to_string()
                } else {
                    auth::missing_credentials()
                };
                self.session.push(Turn::assistant(reply));
                return Ok(CommandOutcome::Handled);
            }
            Command::Logout => {
                self.auth.logout();
                self.session.push(Turn::assistant(auth::LOGOUT_SUCCESS));
                return Ok(CommandOutcome::Handled);
            }
            Command::Clear => {
                self.session.clear();
                return Ok(CommandOutcome::Handled);
            }
            Command::Exit => {
                self.cancel.cancel();
                return Ok(CommandOutcome::Exit);
            }
            Command::Help => command::help_text(),
            Command::History => self.list_sessions().await?,
            Command::DeleteSession(None) => "Usage: /history delete <id>".to_string(),
            Command::DeleteSession(Some(id)) => self.delete_session(&id).await?,
            Command::Model(None) => self.describe_models(),
            Command::Model(Some(id)) => {
                self.session.set_model(&id);
                format!("Switched model to {}.", id)
            }
            Command::Undo => match self.history.lock().await.undo().await? {
                Some(path) => format!("Reverted changes to {}.", self.display(&path)),
                None => "Nothing to undo.".to_string(),
            },
            Command::Redo => match self.history.lock().await.redo().await? {
                Some(path) => format!("Re-applied changes to {}.", self.display(&path)),
                None => "Nothing to redo.".to_string(),
            },
            Command::View(None) => "Usage: /view <path>".to_string(),
            Command::View(Some(path)) => self.view(&path).await,
            Command::Search(None) => "Usage: /search <query>".to_string(),
            Command::Search(Some(query)) => {
                let ctx = self.tool_context();
                search::search(&self.directory, &query, SearchKind::Both, &ctx)
                    .unwrap_or_else(|e| format!("Error: {}", e))
            }
            Command::Git(None) => "Usage: /git status | /git diff".to_string(),
            Command::Git(Some(git)) => command::run_git(&self.directory, git).await,
            Command::Unknown(name) => command::unknown_command(&name),
        };

        self.session.push(Turn::user(input.trim()));
        self.session.push(Turn::assistant(reply));
        Ok(CommandOutcome::Handled)
    }

    /// Send free text to the agent loop. Returns `None` when the user is
    /// not signed in.
    pub async fn send_message(&mut self, input: &str) -> Option<PromptResult> {
        if !self.auth.is_authenticated() {
            self.session.push(Turn::user(input));
            self.session.push(Turn::assistant(auth::LOGIN_REQUIRED));
            return None;
        }

        self.session.push(Turn::user(input));
        let context = ContextAssembler::new(&self.directory, self.config.large_file_threshold())
            .assemble(input)
            .await
            .map(|bundle| bundle.to_turn());

        let prompt = PromptLoop::new(
            self.provider.clone(),
            self.tools.clone(),
            self.history.clone(),
            &self.directory,
            self.cancel.child_token(),
        );
        let config = PromptConfig::from(&self.config);
        Some(prompt.run(&mut self.session, context, &config).await)
    }

    fn tool_context(&self) -> ToolContext {
        ToolContext::new(&self.directory).with_history(self.history.clone())
    }

    fn display(&self, path: &Path) -> String {
        deploy_util::path::display_relative(path, &self.directory)
    }

    async fn view(&self, path: &str) -> String {
        let ctx = self.tool_context();
        match ReadFileTool
            .execute(serde_json::json!({ "path": path }), &ctx)
            .await
        {
            Ok(output) => output.output,
            Err(e) => format!("Error: {}", e),
        }
    }

    async fn list_sessions(&self) -> CoreResult<String> {
        let Some(archive) = &self.archive else {
            return Ok("Session history is not available.".to_string());
        };
        let sessions = archive.list().await?;
        if sessions.is_empty() {
            return Ok("No saved sessions.".to_string());
        }

        let mut text = String::from("Saved sessions:");
        for info in sessions {
            text.push_str(&format!(
                "\n{}  {}  {}",
                info.date.format("%Y-%m-%d %H:%M"),
                info.id,
                info.name
            ));
        }
        Ok(text)
    }

    async fn delete_session(&self, id: &str) -> CoreResult<String> {
        let Some(archive) = &self.archive else {
            return Ok("Session history is not available.".to_string());
        };
        if id == self.session.id() {
            return Ok("Cannot delete the current session. Use /clear first.".to_string());
        }
        if archive.load::<Turn>(id).await?.is_none() {
            return Ok(format!("Session not found: {}", id));
        }
        archive.delete(id).await?;
        info!(session = %id, "Deleted saved session");
        Ok(format!("Deleted session {}.", id))
    }

    fn describe_models(&self) -> String {
        let mut text = format!("Current model: {}\nAvailable models:", self.session.model());
        for model in groq::models::all() {
            text.push_str(&format!("\n{} - {}", model.id, model.name));
        }
        text
    }
}
