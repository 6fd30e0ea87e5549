//! DEPLOY CLI - terminal coding agent.
//!
//! Entry point: parses arguments, loads configuration and runs either a
//! single prompt or the interactive loop.

mod render;
mod repl;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use deploy_core::{Config, Instance};
use deploy_provider::groq;
use deploy_util::log::{self, LogConfig, LogLevel};
use render::Renderer;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "deploy")]
#[command(author, version, about = "Terminal coding agent", long_about = None)]
struct Cli {
    /// Print logs to stderr at debug level
    #[arg(short, long)]
    verbose: bool,

    /// Model to use (overrides configuration)
    #[arg(short, long)]
    model: Option<String>,

    /// Continue the most recent session
    #[arg(short, long, name = "continue")]
    continue_session: bool,

    /// Resume a specific session
    #[arg(short, long)]
    resume: Option<String>,

    /// Send a single message and exit
    #[arg(short, long)]
    prompt: Option<String>,

    /// Working directory (defaults to the current directory)
    #[arg(long)]
    cwd: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List built-in models
    Models,
    /// Print the merged configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cwd = match &cli.cwd {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("Failed to read current directory")?,
    };

    let (config, sources) = Config::load(Some(&cwd)).await?;

    log::init(LogConfig {
        print: cli.verbose,
        level: if cli.verbose {
            LogLevel::Debug
        } else {
            config.log_level()
        },
        ..Default::default()
    })?;
    info!(?sources, cwd = %cwd.display(), "Starting deploy");

    match cli.command {
        Some(Commands::Models) => {
            list_models(&config);
            return Ok(());
        }
        Some(Commands::Config) => {
            print_config(&config)?;
            return Ok(());
        }
        None => {}
    }

    let mut instance = Instance::from_config(&cwd, config)?;
    if let Some(model) = cli.model {
        instance.set_model(model);
    }

    if let Some(id) = &cli.resume {
        if !instance.resume(id).await? {
            bail!("Session not found: {}", id);
        }
    } else if cli.continue_session && !instance.continue_latest().await? {
        eprintln!("No previous session to continue.");
    }

    match cli.prompt {
        Some(prompt) => run_prompt(&mut instance, &prompt).await,
        None => repl::run(&mut instance).await,
    }
}

async fn run_prompt(instance: &mut Instance, prompt: &str) -> anyhow::Result<()> {
    if !instance.login() {
        bail!("{}", deploy_core::auth::missing_credentials());
    }

    let mut events = instance.bus().subscribe();
    let mut renderer = Renderer::new(std::io::stdout()).with_reasoning(false);
    repl::submit_and_render(instance, &mut events, &mut renderer, prompt).await?;
    Ok(())
}

fn list_models(config: &Config) {
    for model in groq::models::all() {
        let marker = if model.id == config.model() { "*" } else { " " };
        let reasoning = if model.reasoning { " (reasoning)" } else { "" };
        println!("{} {:<28} {}{}", marker, model.id, model.name, reasoning);
    }
}

fn print_config(config: &Config) -> anyhow::Result<()> {
    let mut shown = config.clone();
    if let Some(provider) = shown.provider.as_mut() {
        if provider.api_key.is_some() {
            provider.api_key = Some("********".to_string());
        }
    }
    println!("{}", serde_json::to_string_pretty(&shown)?);
    Ok(())
}
