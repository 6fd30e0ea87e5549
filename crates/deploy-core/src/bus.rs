//! Event bus for observing the agent loop.
//!
//! The loop publishes [`AgentEvent`]s as the transcript changes. All events
//! share one broadcast channel, so a subscriber sees them in the order they
//! were published.
//!
//! # Example
//!
//! ```ignore
//! let bus = Bus::new();
//! let mut rx = bus.subscribe();
//! tokio::spawn(async move {
//!     while let Ok(event) = rx.recv().await {
//!         println!("{}", event.event_type());
//!     }
//! });
//! ```

use crate::prompt::Termination;
use crate::turn::Turn;
use serde::Serialize;
use tokio::sync::broadcast;

/// Default channel capacity.
const DEFAULT_CAPACITY: usize = 256;

/// Something that happened during a conversation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// The turn at `index` grew (streamed fragment).
    TurnUpdated { index: usize, turn: Turn },
    /// A turn was appended at `index`.
    TurnAppended { index: usize, turn: Turn },
    /// The transcript was replaced (clear or resume).
    TranscriptReset { len: usize },
    /// A tool is about to run.
    ToolStarted {
        call_id: String,
        tool: String,
        arguments: serde_json::Value,
    },
    /// A tool finished. `title` and `metadata` come from a successful
    /// tool's output; `metadata` is `null` otherwise.
    ToolFinished {
        call_id: String,
        tool: String,
        is_error: bool,
        title: Option<String>,
        metadata: serde_json::Value,
    },
    /// The loop for one user message ended.
    LoopFinished {
        termination: Termination,
        iterations: usize,
    },
}

impl AgentEvent {
    /// Event type name for logging.
    pub fn event_type(&self) -> &'static str {
        match self {
            AgentEvent::TurnUpdated { .. } => "turn.updated",
            AgentEvent::TurnAppended { .. } => "turn.appended",
            AgentEvent::TranscriptReset { .. } => "transcript.reset",
            AgentEvent::ToolStarted { .. } => "tool.started",
            AgentEvent::ToolFinished { .. } => "tool.finished",
            AgentEvent::LoopFinished { .. } => "loop.finished",
        }
    }
}

/// The event bus for pub/sub communication.
#[derive(Debug, Clone)]
pub struct Bus {
    tx: broadcast::Sender<AgentEvent>,
}

impl Bus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: AgentEvent) {
        // Ignore send errors (no receivers)
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}
