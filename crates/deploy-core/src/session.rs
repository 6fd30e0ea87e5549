//! The conversation aggregate.
//!
//! A [`Session`] owns the turn list for one conversation. Every mutation is
//! published on the [`Bus`] and offered to a [`SessionSink`] so the
//! transcript can be saved; saving never blocks the caller.

use crate::bus::{AgentEvent, Bus};
use crate::turn::Turn;
use deploy_provider::Role;
use deploy_storage::{session_name, ChatSession, SessionStore, Storage};
use deploy_util::Identifier;
use std::sync::Arc;
use tracing::{debug, warn};

/// Receives the full transcript after every change.
///
/// Implementations must return quickly; slow work belongs on a spawned task.
#[cfg_attr(test, mockall::automock)]
pub trait SessionSink: Send + Sync {
    fn persist(&self, session_id: &str, turns: Vec<Turn>);
}

/// A sink that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl SessionSink for NullSink {
    fn persist(&self, _session_id: &str, _turns: Vec<Turn>) {}
}

/// Saves sessions through a [`SessionStore`] on a background task.
pub struct StoreSink<S> {
    store: Arc<SessionStore<S>>,
}

impl<S> StoreSink<S> {
    pub fn new(store: Arc<SessionStore<S>>) -> Self {
        Self { store }
    }
}

impl<S: Storage + 'static> SessionSink for StoreSink<S> {
    fn persist(&self, session_id: &str, turns: Vec<Turn>) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(session = %session_id, "No runtime available, session not saved");
            return;
        };
        let name = turns
            .iter()
            .find(|t| t.role == Role::User)
            .map(|t| session_name(t.text()))
            .unwrap_or_else(|| session_name(""));
        let session = ChatSession::new(session_id, name, turns);
        let store = self.store.clone();
        handle.spawn(async move {
            if let Err(e) = store.save(&session).await {
                warn!(session = %session.id, error = %e, "Failed to save session");
            }
        });
    }
}

/// Mutable state of one conversation.
pub struct Session {
    id: String,
    turns: Vec<Turn>,
    model: String,
    iteration: usize,
    processing: bool,
    bus: Bus,
    sink: Arc<dyn SessionSink>,
}

impl Session {
    /// Start an empty conversation.
    pub fn new(model: impl Into<String>, bus: Bus, sink: Arc<dyn SessionSink>) -> Self {
        Self::restore(Identifier::session(), Vec::new(), model, bus, sink)
    }

    /// Resume a saved conversation.
    pub fn restore(
        id: impl Into<String>,
        turns: Vec<Turn>,
        model: impl Into<String>,
        bus: Bus,
        sink: Arc<dyn SessionSink>,
    ) -> Self {
        Self {
            id: id.into(),
            turns,
            model: model.into(),
            iteration: 0,
            processing: false,
            bus,
            sink,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = model.into();
    }

    /// Model calls made for the current user message.
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Whether the agent loop is running.
    pub fn is_processing(&self) -> bool {
        self.processing
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub(crate) fn set_iteration(&mut self, iteration: usize) {
        self.iteration = iteration;
    }

    pub(crate) fn set_processing(&mut self, processing: bool) {
        self.processing = processing;
    }

    /// Append a turn and return its index.
    pub fn push(&mut self, turn: Turn) -> usize {
        let index = self.turns.len();
        self.turns.push(turn.clone());
        self.bus.publish(AgentEvent::TurnAppended { index, turn });
        self.persist();
        index
    }

    /// Publish the in-progress turn that will land at the next index.
    pub fn preview(&self, turn: &Turn) {
        self.bus.publish(AgentEvent::TurnUpdated {
            index: self.turns.len(),
            turn: turn.clone(),
        });
    }

    /// Drop all turns and continue under a fresh ID, leaving the saved
    /// copy of the old conversation in place.
    pub fn clear(&mut self) {
        self.turns.clear();
        self.iteration = 0;
        self.id = Identifier::session();
        debug!(session = %self.id, "Cleared conversation");
        self.bus.publish(AgentEvent::TranscriptReset { len: 0 });
    }

    /// Replace this conversation with a saved one.
    pub fn replace(&mut self, id: impl Into<String>, turns: Vec<Turn>) {
        self.id = id.into();
        self.turns = turns;
        self.iteration = 0;
        self.bus.publish(AgentEvent::TranscriptReset {
            len: self.turns.len(),
        });
    }

    fn persist(&self) {
        if self.turns.is_empty() {
            return;
        }
        self.sink.persist(&self.id, self.turns.clone());
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("turns", &self.turns.len())
            .field("model", &self.model)
            .field("iteration", &self.iteration)
            .field("processing", &self.processing)
            .finish()
    }
}
