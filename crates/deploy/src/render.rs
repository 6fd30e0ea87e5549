//! Plain-text rendering of bus events.
//!
//! Streaming turns are printed incrementally: the renderer remembers how
//! much of the in-progress turn it has already written and only emits the
//! new suffix on each update.

use deploy_core::{AgentEvent, Termination, Turn};
use deploy_provider::Role;
use serde_json::Value;
use std::io::{self, Write};

/// Writes conversation events to a terminal or any other writer.
pub struct Renderer<W> {
    out: W,
    /// Index of the turn being streamed.
    streaming: Option<usize>,
    content_len: usize,
    reasoning_len: usize,
    show_reasoning: bool,
}

impl<W: Write> Renderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            streaming: None,
            content_len: 0,
            reasoning_len: 0,
            show_reasoning: true,
        }
    }

    pub fn with_reasoning(mut self, show: bool) -> Self {
        self.show_reasoning = show;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn handle(&mut self, event: &AgentEvent) -> io::Result<()> {
        match event {
            AgentEvent::TurnUpdated { index, turn } => self.update(*index, turn)?,
            AgentEvent::TurnAppended { index, turn } => self.appended(*index, turn)?,
            AgentEvent::TranscriptReset { len } => {
                self.streaming = None;
                if *len == 0 {
                    writeln!(self.out, "Conversation cleared.")?;
                } else {
                    writeln!(self.out, "Resumed conversation ({} turns).", len)?;
                }
            }
            AgentEvent::ToolStarted { tool, .. } => {
                writeln!(self.out, "[Running tool: {}]", tool)?;
            }
            AgentEvent::ToolFinished {
                is_error,
                title,
                metadata,
                ..
            } => self.tool_finished(*is_error, title.as_deref(), metadata)?,
            AgentEvent::LoopFinished { termination, .. } => {
                if *termination == Termination::Cancelled {
                    writeln!(self.out, "[Cancelled]")?;
                }
            }
        }
        self.out.flush()
    }

    fn tool_finished(
        &mut self,
        is_error: bool,
        title: Option<&str>,
        metadata: &Value,
    ) -> io::Result<()> {
        match (is_error, title) {
            (true, _) => writeln!(self.out, "[Tool failed]")?,
            (false, Some(title)) if !title.is_empty() => {
                writeln!(self.out, "[Tool completed: {}]", title)?
            }
            (false, _) => writeln!(self.out, "[Tool completed]")?,
        }

        // Edits carry a unified diff.
        if let Some(diff) = metadata.get("diff").and_then(Value::as_str) {
            if !diff.is_empty() {
                write!(self.out, "{}", diff)?;
                if !diff.ends_with('\n') {
                    writeln!(self.out)?;
                }
            }
        }
        Ok(())
    }

    fn update(&mut self, index: usize, turn: &Turn) -> io::Result<()> {
        if self.streaming != Some(index) {
            self.streaming = Some(index);
            self.content_len = 0;
            self.reasoning_len = 0;
        }

        if self.show_reasoning {
            if let Some(reasoning) = turn.reasoning.as_deref() {
                if let Some(delta) = reasoning.get(self.reasoning_len..) {
                    if self.reasoning_len == 0 && !delta.is_empty() {
                        write!(self.out, "Thinking: ")?;
                    }
                    write!(self.out, "{}", delta)?;
                }
                self.reasoning_len = reasoning.len();
            }
        }

        let content = turn.text();
        if let Some(delta) = content.get(self.content_len..) {
            let after_reasoning = self.show_reasoning && self.reasoning_len > 0;
            if self.content_len == 0 && !delta.is_empty() && after_reasoning {
                writeln!(self.out)?;
            }
            write!(self.out, "{}", delta)?;
        }
        self.content_len = content.len();
        Ok(())
    }

    fn appended(&mut self, index: usize, turn: &Turn) -> io::Result<()> {
        if turn.role != Role::Assistant {
            self.streaming = None;
            return Ok(());
        }

        if self.streaming == Some(index) {
            // Finish the streamed turn.
            self.update(index, turn)?;
            writeln!(self.out)?;
        } else if !turn.text().is_empty() {
            writeln!(self.out, "{}", turn.text())?;
        }
        self.streaming = None;
        Ok(())
    }
}
