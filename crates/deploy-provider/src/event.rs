//! Channel-backed event source over a model stream.
//!
//! A background task drains the provider stream and forwards typed events
//! into a bounded channel. Every source ends with exactly one terminal event:
//! [`ModelEvent::Done`], [`ModelEvent::Error`] or [`ModelEvent::Cancelled`].

use crate::{FinishReason, ProviderResult, StreamChunk, Usage};
use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

const CHANNEL_CAPACITY: usize = 64;

/// An event produced by a model invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelEvent {
    /// Reasoning text to append.
    Reasoning(String),
    /// Visible text to append.
    Text(String),
    /// A complete tool call.
    ToolCall {
        id: String,
        name: String,
        arguments: String,
    },
    /// The stream completed normally.
    Done {
        finish_reason: FinishReason,
        usage: Usage,
    },
    /// The stream failed.
    Error(String),
    /// The consumer's token was cancelled before the stream completed.
    Cancelled,
}

impl ModelEvent {
    /// Whether this event ends the source.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ModelEvent::Done { .. } | ModelEvent::Error(_) | ModelEvent::Cancelled
        )
    }
}

/// Receiving half of a model invocation.
pub struct EventSource {
    rx: mpsc::Receiver<ModelEvent>,
    pump: JoinHandle<()>,
    finished: bool,
}

impl EventSource {
    /// Start draining `stream` on a background task.
    pub fn spawn(
        stream: BoxStream<'static, ProviderResult<StreamChunk>>,
        cancel: CancellationToken,
    ) -> Self {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let pump = tokio::spawn(pump(stream, tx, cancel));
        Self {
            rx,
            pump,
            finished: false,
        }
    }

    /// Receive the next event. Returns `None` once a terminal event has
    /// been delivered.
    pub async fn next(&mut self) -> Option<ModelEvent> {
        if self.finished {
            return None;
        }
        let event = match self.rx.recv().await {
            Some(event) => event,
            // The pump died without a terminal event.
            None => ModelEvent::Error("stream interrupted".to_string()),
        };
        if event.is_terminal() {
            self.finished = true;
        }
        Some(event)
    }
}

impl Drop for EventSource {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

async fn pump(
    mut stream: BoxStream<'static, ProviderResult<StreamChunk>>,
    tx: mpsc::Sender<ModelEvent>,
    cancel: CancellationToken,
) {
    let mut finish: Option<(FinishReason, Usage)> = None;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Model stream cancelled");
                let _ = tx.send(ModelEvent::Cancelled).await;
                return;
            }
            next = stream.next() => next,
        };

        let event = match next {
            Some(Ok(StreamChunk::TextDelta(text))) => ModelEvent::Text(text),
            Some(Ok(StreamChunk::ReasoningDelta(text))) => ModelEvent::Reasoning(text),
            Some(Ok(StreamChunk::ToolCall {
                id,
                name,
                arguments,
            })) => ModelEvent::ToolCall {
                id,
                name,
                arguments,
            },
            Some(Ok(StreamChunk::Finish {
                usage,
                finish_reason,
            })) => {
                trace!(?finish_reason, "Finish step received");
                finish = Some((finish_reason, usage));
                continue;
            }
            Some(Ok(StreamChunk::Error(message))) => ModelEvent::Error(message),
            Some(Err(e)) => ModelEvent::Error(e.to_string()),
            None => {
                let (finish_reason, usage) =
                    finish.take().unwrap_or((FinishReason::Other, Usage::default()));
                ModelEvent::Done {
                    finish_reason,
                    usage,
                }
            }
        };

        let terminal = event.is_terminal();
        if tx.send(event).await.is_err() || terminal {
            return;
        }
    }
}
