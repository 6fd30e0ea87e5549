//! Line-oriented interactive mode.

use crate::render::Renderer;
use deploy_core::{AgentEvent, CommandOutcome, CoreResult, Instance};
use std::io::{self, Write};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

/// Submit one line and render events while it runs.
pub async fn submit_and_render<W: Write>(
    instance: &mut Instance,
    events: &mut broadcast::Receiver<AgentEvent>,
    renderer: &mut Renderer<W>,
    line: &str,
) -> CoreResult<CommandOutcome> {
    let submit = instance.submit(line);
    tokio::pin!(submit);

    let outcome = loop {
        tokio::select! {
            outcome = &mut submit => break outcome,
            event = events.recv() => match event {
                Ok(event) => render(renderer, &event),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Renderer fell behind"),
                Err(RecvError::Closed) => {}
            },
        }
    };

    // Whatever was published after the last poll.
    while let Ok(event) = events.try_recv() {
        render(renderer, &event);
    }
    outcome
}

fn render<W: Write>(renderer: &mut Renderer<W>, event: &AgentEvent) {
    if let Err(e) = renderer.handle(event) {
        debug!(error = %e, "Failed to render event");
    }
}

/// Read lines from stdin until EOF or `/exit`.
pub async fn run(instance: &mut Instance) -> anyhow::Result<()> {
    println!("DEPLOY CLI v{}", env!("CARGO_PKG_VERSION"));
    println!("Working directory: {}", instance.directory().display());
    println!("Model: {}", instance.session().model());
    if !instance.is_authenticated() {
        println!("Type /login to sign in, /help for commands.");
    }
    println!();

    let mut events = instance.bus().subscribe();
    let mut renderer = Renderer::new(io::stdout());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match submit_and_render(instance, &mut events, &mut renderer, line).await {
            Ok(CommandOutcome::Exit) => break,
            Ok(_) => {}
            Err(e) => eprintln!("Error: {}", e),
        }
    }

    println!("Goodbye.");
    Ok(())
}
