//! Prompt loop - the agent orchestration engine.
//!
//! One call to [`PromptLoop::run`] handles one user message:
//! - Sending the transcript and tool schemas to the provider
//! - Growing a placeholder assistant turn as the stream arrives
//! - Executing the captured tool calls one at a time, in order
//! - Appending all outcomes as a single tool turn and going again
//!
//! The loop stops when a round produces no tool calls, when the model call
//! fails, when the iteration cap is reached, or when it is cancelled.

use crate::bus::AgentEvent;
use crate::session::Session;
use crate::turn::{to_messages, OutcomeStatus, ToolCallIntent, ToolOutcome, Turn};
use deploy_provider::{
    BoxedLanguageModel, EventSource, GenerateOptions, ModelEvent, ToolDefinition,
};
use deploy_snapshot::SharedFileHistory;
use deploy_tools::{Tool, ToolContext, ToolOutput, ToolRegistry};
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Outcome text for calls that name no registered tool.
pub const TOOL_NOT_FOUND: &str = "Tool not found";

/// Outcome text for calls skipped after cancellation.
pub const TOOL_CANCELLED: &str = "Cancelled by user.";

/// Configuration for the prompt loop.
#[derive(Debug, Clone)]
pub struct PromptConfig {
    /// System prompt.
    pub system: String,
    /// Maximum model calls per user message.
    pub max_iterations: usize,
    /// Temperature for sampling.
    pub temperature: Option<f32>,
    /// Maximum tokens to generate per call.
    pub max_tokens: Option<u32>,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            system: crate::config::DEFAULT_SYSTEM_PROMPT.to_string(),
            max_iterations: crate::config::DEFAULT_MAX_ITERATIONS,
            temperature: None,
            max_tokens: None,
        }
    }
}

impl From<&crate::config::Config> for PromptConfig {
    fn from(config: &crate::config::Config) -> Self {
        Self {
            system: config.system_prompt().to_string(),
            max_iterations: config.max_iterations(),
            ..Default::default()
        }
    }
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// A round ended without tool calls.
    Completed,
    /// The iteration cap was reached.
    IterationLimit,
    /// The model call failed.
    ModelError,
    /// The cancellation token fired.
    Cancelled,
}

/// Result of a prompt loop execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptResult {
    pub termination: Termination,
    /// Number of model calls made.
    pub iterations: usize,
}

/// Text of the notice appended when the iteration cap stops the loop.
pub fn iteration_limit_notice(max: usize) -> String {
    format!(
        "Iteration limit reached ({} model calls). The last tool results were not reviewed; send another message to continue.",
        max
    )
}

enum StreamEnd {
    Done,
    Failed(String),
    Cancelled,
}

/// The prompt loop executor.
///
/// # Example
///
/// ```ignore
/// let prompt = PromptLoop::new(provider, registry, history, cwd, cancel);
/// session.push(Turn::user("Hello"));
/// let result = prompt.run(&mut session, None, &PromptConfig::default()).await;
/// ```
pub struct PromptLoop {
    provider: BoxedLanguageModel,
    tools: ToolRegistry,
    history: SharedFileHistory,
    cwd: PathBuf,
    cancel: CancellationToken,
}

impl PromptLoop {
    pub fn new(
        provider: BoxedLanguageModel,
        tools: ToolRegistry,
        history: SharedFileHistory,
        cwd: impl Into<PathBuf>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            provider,
            tools,
            history,
            cwd: cwd.into(),
            cancel,
        }
    }

    fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .list()
            .into_iter()
            .map(|(name, tool)| ToolDefinition {
                name,
                description: tool.description().to_string(),
                parameters: tool.parameters_schema(),
            })
            .collect()
    }

    /// Run the loop for the user turn already at the end of `session`.
    ///
    /// `context` is placed ahead of the transcript for the first model call
    /// only and is never stored.
    pub async fn run(
        &self,
        session: &mut Session,
        context: Option<Turn>,
        config: &PromptConfig,
    ) -> PromptResult {
        session.set_processing(true);
        session.set_iteration(0);

        let (termination, iterations) = self.drive(session, context, config).await;

        session.set_processing(false);
        info!(
            session = %session.id(),
            ?termination,
            iterations,
            "Prompt loop finished"
        );
        session.bus().publish(AgentEvent::LoopFinished {
            termination,
            iterations,
        });

        PromptResult {
            termination,
            iterations,
        }
    }

    async fn drive(
        &self,
        session: &mut Session,
        mut context: Option<Turn>,
        config: &PromptConfig,
    ) -> (Termination, usize) {
        let tool_defs = self.tool_definitions();
        let max_iterations = config.max_iterations.max(1);
        let mut iterations = 0;

        loop {
            if self.cancel.is_cancelled() {
                return (Termination::Cancelled, iterations);
            }

            iterations += 1;
            session.set_iteration(iterations);
            debug!(iteration = iterations, "Starting model call");

            let mut messages = Vec::new();
            if let Some(ctx) = context.take() {
                messages.push(ctx.to_message());
            }
            messages.extend(to_messages(session.turns()));

            let options = GenerateOptions {
                model: Some(session.model().to_string()),
                temperature: config.temperature,
                max_tokens: config.max_tokens,
                system: Some(config.system.clone()),
                tools: tool_defs.clone(),
                abort: Some(self.cancel.clone()),
            };

            let stream = match self.provider.generate(messages, options).await {
                Ok(stream) => stream,
                Err(e) => {
                    warn!(error = %e, "Model call failed");
                    session.push(Turn::assistant(format!("Error: {}", e)));
                    return (Termination::ModelError, iterations);
                }
            };

            let mut source = EventSource::spawn(stream, self.cancel.clone());
            let mut placeholder = Turn::placeholder();
            let end = self.consume(&mut source, session, &mut placeholder).await;

            match end {
                StreamEnd::Done => {
                    session.push(placeholder.clone());
                }
                StreamEnd::Failed(message) => {
                    warn!(error = %message, "Model stream failed");
                    // Intents from a failed round are never dispatched.
                    placeholder.tool_calls.clear();
                    if !placeholder.is_empty() {
                        session.push(placeholder);
                    }
                    session.push(Turn::assistant(format!("Error: {}", message)));
                    return (Termination::ModelError, iterations);
                }
                StreamEnd::Cancelled => {
                    placeholder.tool_calls.clear();
                    if !placeholder.is_empty() {
                        session.push(placeholder);
                    }
                    return (Termination::Cancelled, iterations);
                }
            }

            if placeholder.tool_calls.is_empty() {
                return (Termination::Completed, iterations);
            }

            info!(count = placeholder.tool_calls.len(), "Executing tool calls");
            let mut outcomes = Vec::with_capacity(placeholder.tool_calls.len());
            for intent in &placeholder.tool_calls {
                let outcome = if self.cancel.is_cancelled() {
                    ToolOutcome::with_status(intent, TOOL_CANCELLED, OutcomeStatus::Error)
                } else {
                    self.dispatch(session, intent).await
                };
                outcomes.push(outcome);
            }
            session.push(Turn::tool(outcomes));

            if self.cancel.is_cancelled() {
                return (Termination::Cancelled, iterations);
            }

            if iterations >= max_iterations {
                warn!(max_iterations, "Iteration limit reached");
                session.push(Turn::assistant(iteration_limit_notice(max_iterations)));
                return (Termination::IterationLimit, iterations);
            }
        }
    }

    /// Drain one model stream into `placeholder`, publishing each fragment.
    async fn consume(
        &self,
        source: &mut EventSource,
        session: &Session,
        placeholder: &mut Turn,
    ) -> StreamEnd {
        loop {
            let Some(event) = source.next().await else {
                return StreamEnd::Failed("stream ended unexpectedly".to_string());
            };
            if self.cancel.is_cancelled() {
                return StreamEnd::Cancelled;
            }

            match event {
                ModelEvent::Reasoning(delta) => placeholder.push_reasoning(&delta),
                ModelEvent::Text(delta) => placeholder.push_content(&delta),
                ModelEvent::ToolCall {
                    id,
                    name,
                    arguments,
                } => {
                    debug!(id = %id, name = %name, "Tool call captured");
                    placeholder
                        .tool_calls
                        .push(ToolCallIntent::from_raw(id, name, &arguments));
                }
                ModelEvent::Done {
                    finish_reason,
                    usage,
                } => {
                    debug!(
                        reason = ?finish_reason,
                        input = usage.input_tokens,
                        output = usage.output_tokens,
                        "Model call finished"
                    );
                    return StreamEnd::Done;
                }
                ModelEvent::Error(message) => return StreamEnd::Failed(message),
                ModelEvent::Cancelled => return StreamEnd::Cancelled,
            }
            session.preview(placeholder);
        }
    }

    /// Execute one intent. Never fails: every problem becomes an outcome.
    async fn dispatch(&self, session: &Session, intent: &ToolCallIntent) -> ToolOutcome {
        session.bus().publish(AgentEvent::ToolStarted {
            call_id: intent.call_id.clone(),
            tool: intent.tool_name.clone(),
            arguments: intent.arguments.clone(),
        });

        let (outcome, output) = self.execute(intent).await;
        debug!(
            tool = %intent.tool_name,
            call = %intent.call_id,
            status = ?outcome.status,
            "Tool call finished"
        );

        let (title, metadata) = match output {
            Some(output) => (Some(output.title), output.metadata),
            None => (None, Value::Null),
        };
        session.bus().publish(AgentEvent::ToolFinished {
            call_id: intent.call_id.clone(),
            tool: intent.tool_name.clone(),
            is_error: outcome.status.is_error(),
            title,
            metadata,
        });
        outcome
    }

    /// Run the tool. The [`ToolOutput`] is returned alongside the outcome
    /// when the tool succeeded, so observers can show its title and
    /// metadata.
    async fn execute(&self, intent: &ToolCallIntent) -> (ToolOutcome, Option<ToolOutput>) {
        let Some(tool) = self.tools.get(&intent.tool_name) else {
            warn!(tool = %intent.tool_name, "Model called an unknown tool");
            let outcome = ToolOutcome::with_status(
                intent,
                format!("{}: {}", TOOL_NOT_FOUND, intent.tool_name),
                OutcomeStatus::NotFound,
            );
            return (outcome, None);
        };

        if let Err(e) = tool.validate(&intent.arguments) {
            let outcome =
                ToolOutcome::with_status(intent, format!("Error: {}", e), OutcomeStatus::Invalid);
            return (outcome, None);
        }

        let mut ctx = ToolContext::new(&self.cwd).with_history(self.history.clone());
        ctx.abort = self.cancel.clone();

        match tool.execute(intent.arguments.clone(), &ctx).await {
            Ok(output) => (ToolOutcome::success(intent, output.output.clone()), Some(output)),
            Err(e) if e.is_validation() => (
                ToolOutcome::with_status(intent, format!("Error: {}", e), OutcomeStatus::Invalid),
                None,
            ),
            Err(e) => (
                ToolOutcome::with_status(intent, format!("Error: {}", e), OutcomeStatus::Error),
                None,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::Bus;
    use crate::session::NullSink;
    use async_trait::async_trait;
    use deploy_provider::mock::{MockProvider, MockResponse};
    use deploy_provider::ModelInfo;
    use deploy_provider::Role;
    use deploy_snapshot::FileHistory;
    use deploy_tools::{ToolError, ToolOutput, ToolResult};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        provider: Arc<MockProvider>,
        history: SharedFileHistory,
        cancel: CancellationToken,
        session: Session,
    }

    impl Fixture {
        fn new() -> Self {
            let provider = Arc::new(MockProvider::new(ModelInfo::new("test-model", "mock")));
            Self {
                dir: TempDir::new().unwrap(),
                provider,
                history: FileHistory::shared(20),
                cancel: CancellationToken::new(),
                session: Session::new("test-model", Bus::new(), Arc::new(NullSink)),
            }
        }

        fn prompt(&self, tools: ToolRegistry) -> PromptLoop {
            PromptLoop::new(
                self.provider.clone(),
                tools,
                self.history.clone(),
                self.dir.path(),
                self.cancel.clone(),
            )
        }

        async fn send(&mut self, tools: ToolRegistry, text: &str) -> PromptResult {
            self.session.push(Turn::user(text));
            let prompt = self.prompt(tools);
            prompt
                .run(&mut self.session, None, &PromptConfig::default())
                .await
        }
    }

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn id(&self) -> &str {
            "explode"
        }

        fn description(&self) -> &str {
            "Always fails"
        }

        fn parameters_schema(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }

        async fn execute(&self, _args: Value, _ctx: &ToolContext) -> ToolResult<ToolOutput> {
            Err(ToolError::execution_failed("boom"))
        }
    }

    /// Cancels the loop's token as a side effect of running.
    struct StopTool;

    #[async_trait]
    impl Tool for StopTool {
        fn id(&self) -> &str {
            "stop"
        }

        fn description(&self) -> &str {
            "Cancels the conversation"
        }

        fn parameters_schema(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }

        async fn execute(&self, _args: Value, ctx: &ToolContext) -> ToolResult<ToolOutput> {
            ctx.abort.cancel();
            Ok(ToolOutput::new("Stopped", "stopped"))
        }
    }

    #[tokio::test]
    async fn test_text_only_completes_in_one_iteration() {
        let mut fx = Fixture::new();
        fx.provider.expect(MockResponse::Sequence(vec![
            MockResponse::Reasoning("thinking".to_string()),
            MockResponse::Text("Hello".to_string()),
            MockResponse::Text(" there".to_string()),
        ]));

        let result = fx.send(ToolRegistry::new(), "hi").await;

        assert_eq!(result.termination, Termination::Completed);
        assert_eq!(result.iterations, 1);
        assert_eq!(fx.provider.call_count(), 1);
        let last = fx.session.last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.text(), "Hello there");
        assert_eq!(last.reasoning.as_deref(), Some("thinking"));
        assert!(!fx.session.is_processing());
    }

    #[tokio::test]
    async fn test_request_carries_system_prompt_model_and_tools() {
        let mut fx = Fixture::new();
        fx.provider.expect_text("ok");

        fx.send(ToolRegistry::with_builtins(), "hi").await;

        let request = &fx.provider.requests()[0];
        assert_eq!(request.system.as_deref(), Some(crate::config::DEFAULT_SYSTEM_PROMPT));
        assert_eq!(request.model.as_deref(), Some("test-model"));
        assert!(request.tool_names.contains(&"readFile".to_string()));
        assert!(request.tool_names.contains(&"bash".to_string()));
    }

    #[tokio::test]
    async fn test_unknown_tool_yields_not_found_outcome() {
        let mut fx = Fixture::new();
        fx.provider.expect_tool_call("call_1", "doesNotExist", "{}");
        fx.provider.expect_text("Sorry, that tool does not exist.");

        let result = fx.send(ToolRegistry::new(), "do it").await;

        assert_eq!(result.termination, Termination::Completed);
        assert_eq!(result.iterations, 2);
        let tool_turn = &fx.session.turns()[2];
        assert_eq!(tool_turn.role, Role::Tool);
        let outcome = tool_turn.outcome("call_1").unwrap();
        assert_eq!(outcome.status, OutcomeStatus::NotFound);
        assert!(outcome.result.contains("Tool not found"));
    }

    #[tokio::test]
    async fn test_every_intent_gets_one_outcome() {
        let mut fx = Fixture::new();
        std::fs::write(fx.dir.path().join("a.txt"), "alpha").unwrap();
        fx.provider.expect(MockResponse::Sequence(vec![
            MockResponse::tool_call("c1", "readFile", r#"{"path":"a.txt"}"#),
            MockResponse::tool_call("c2", "missingTool", "{}"),
            MockResponse::tool_call("c3", "explode", "{}"),
            MockResponse::tool_call("c4", "readFile", r#"{"path": 5}"#),
            MockResponse::tool_call("c5", "readFile", "not json"),
        ]));
        fx.provider.expect_text("done");

        let mut tools = ToolRegistry::with_builtins();
        tools.register(Arc::new(FailingTool));
        let result = fx.send(tools, "go").await;
        assert_eq!(result.termination, Termination::Completed);

        let assistant = &fx.session.turns()[1];
        let tool_turn = &fx.session.turns()[2];
        assert_eq!(assistant.tool_calls.len(), 5);
        assert_eq!(tool_turn.tool_results.len(), 5);
        for intent in &assistant.tool_calls {
            assert!(tool_turn.outcome(&intent.call_id).is_some());
        }

        assert_eq!(tool_turn.outcome("c1").unwrap().result, "alpha");
        assert_eq!(tool_turn.outcome("c1").unwrap().status, OutcomeStatus::Success);
        assert_eq!(tool_turn.outcome("c2").unwrap().status, OutcomeStatus::NotFound);
        let failed = tool_turn.outcome("c3").unwrap();
        assert_eq!(failed.status, OutcomeStatus::Error);
        assert!(failed.result.contains("boom"));
        assert_eq!(tool_turn.outcome("c4").unwrap().status, OutcomeStatus::Invalid);
        assert_eq!(tool_turn.outcome("c5").unwrap().status, OutcomeStatus::Invalid);

        // The second request sees the outcomes.
        let second = &fx.provider.requests()[1];
        assert_eq!(second.messages.last().unwrap().role, Role::Tool);
    }

    #[tokio::test]
    async fn test_tools_run_sequentially_in_order() {
        let mut fx = Fixture::new();
        fx.provider.expect(MockResponse::Sequence(vec![
            MockResponse::tool_call("w", "writeFile", r#"{"path":"x.txt","content":"fresh"}"#),
            MockResponse::tool_call("r", "readFile", r#"{"path":"x.txt"}"#),
        ]));
        fx.provider.expect_text("done");

        fx.send(ToolRegistry::with_builtins(), "write then read").await;

        let tool_turn = &fx.session.turns()[2];
        assert_eq!(tool_turn.tool_results[0].call_id, "w");
        assert_eq!(tool_turn.outcome("r").unwrap().result, "fresh");
    }

    #[tokio::test]
    async fn test_model_error_surfaces_single_error_turn() {
        let mut fx = Fixture::new();
        fx.provider.expect_error("rate limited");

        let result = fx.send(ToolRegistry::new(), "hi").await;

        assert_eq!(result.termination, Termination::ModelError);
        assert_eq!(fx.session.len(), 2);
        let last = fx.session.last().unwrap();
        assert!(last.text().starts_with("Error: "));
        assert!(last.text().contains("rate limited"));
    }

    #[tokio::test]
    async fn test_stream_error_skips_tool_dispatch() {
        let mut fx = Fixture::new();
        std::fs::write(fx.dir.path().join("a.txt"), "keep").unwrap();
        fx.provider.expect(MockResponse::Sequence(vec![
            MockResponse::Text("partial".to_string()),
            MockResponse::tool_call("c1", "writeFile", r#"{"path":"a.txt","content":"lost"}"#),
            MockResponse::StreamError("connection reset".to_string()),
        ]));

        let result = fx.send(ToolRegistry::with_builtins(), "hi").await;

        assert_eq!(result.termination, Termination::ModelError);
        assert_eq!(std::fs::read_to_string(fx.dir.path().join("a.txt")).unwrap(), "keep");
        let turns = fx.session.turns();
        assert_eq!(turns[1].text(), "partial");
        assert!(turns[1].tool_calls.is_empty());
        assert!(turns[2].text().contains("connection reset"));
    }

    #[tokio::test]
    async fn test_iteration_cap_stops_after_ten_calls() {
        let mut fx = Fixture::new();
        for i in 0..12 {
            fx.provider
                .expect_tool_call(format!("call_{}", i), "question", r#"{"text":"again?"}"#);
        }

        let result = fx.send(ToolRegistry::with_builtins(), "loop forever").await;

        assert_eq!(result.termination, Termination::IterationLimit);
        assert_eq!(result.iterations, 10);
        assert_eq!(fx.provider.call_count(), 10);

        let turns = fx.session.turns();
        let tool_turn = &turns[turns.len() - 2];
        assert_eq!(tool_turn.role, Role::Tool);
        assert!(tool_turn.outcome("call_9").is_some());
        assert_eq!(turns.last().unwrap().text(), iteration_limit_notice(10));
    }

    #[tokio::test]
    async fn test_context_turn_only_on_first_call() {
        let mut fx = Fixture::new();
        fx.provider.expect_tool_call("c1", "question", r#"{"text":"which?"}"#);
        fx.provider.expect_text("done");

        fx.session.push(Turn::user("@notes.txt summarize"));
        let prompt = fx.prompt(ToolRegistry::with_builtins());
        prompt
            .run(
                &mut fx.session,
                Some(Turn::system("context bundle")),
                &PromptConfig::default(),
            )
            .await;

        let requests = fx.provider.requests();
        assert_eq!(requests[0].messages[0].role, Role::System);
        assert_eq!(requests[0].messages[0].text(), "context bundle");
        assert_eq!(requests[1].messages[0].role, Role::User);
        assert!(fx.session.turns().iter().all(|t| t.role != Role::System));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let mut fx = Fixture::new();
        fx.cancel.cancel();

        let result = fx.send(ToolRegistry::new(), "hi").await;

        assert_eq!(result.termination, Termination::Cancelled);
        assert_eq!(result.iterations, 0);
        assert_eq!(fx.provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_loop_finished_event() {
        let mut fx = Fixture::new();
        let mut rx = fx.session.bus().subscribe();
        fx.provider.expect_text("hello");

        fx.send(ToolRegistry::new(), "hi").await;

        let mut saw_update = false;
        loop {
            match rx.recv().await.unwrap() {
                AgentEvent::TurnUpdated { index, turn } => {
                    assert_eq!(index, 1);
                    assert_eq!(turn.text(), "hello");
                    saw_update = true;
                }
                AgentEvent::LoopFinished {
                    termination,
                    iterations,
                } => {
                    assert_eq!(termination, Termination::Completed);
                    assert_eq!(iterations, 1);
                    break;
                }
                _ => {}
            }
        }
        assert!(saw_update);
    }

    #[tokio::test]
    async fn test_tool_finished_carries_title_and_diff() {
        let mut fx = Fixture::new();
        std::fs::write(fx.dir.path().join("a.txt"), "old\n").unwrap();
        let mut rx = fx.session.bus().subscribe();
        fx.provider.expect_tool_call(
            "e1",
            "edit",
            r#"{"path":"a.txt","oldText":"old","newText":"new"}"#,
        );
        fx.provider.expect_text("done");

        fx.send(ToolRegistry::with_builtins(), "edit it").await;

        loop {
            match rx.recv().await.unwrap() {
                AgentEvent::ToolFinished {
                    call_id,
                    is_error,
                    title,
                    metadata,
                    ..
                } => {
                    assert_eq!(call_id, "e1");
                    assert!(!is_error);
                    assert_eq!(title.as_deref(), Some("Edited a.txt"));
                    assert!(metadata["diff"].as_str().unwrap().contains("+new"));
                    break;
                }
                AgentEvent::LoopFinished { .. } => panic!("no tool.finished event"),
                _ => {}
            }
        }
    }

    #[tokio::test]
    async fn test_failed_tool_has_no_title() {
        let mut fx = Fixture::new();
        let mut rx = fx.session.bus().subscribe();
        fx.provider.expect_tool_call("x1", "explode", "{}");
        fx.provider.expect_text("done");

        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(FailingTool));
        fx.send(tools, "go").await;

        loop {
            if let AgentEvent::ToolFinished {
                is_error,
                title,
                metadata,
                ..
            } = rx.recv().await.unwrap()
            {
                assert!(is_error);
                assert_eq!(title, None);
                assert_eq!(metadata, Value::Null);
                break;
            }
        }
    }

    #[tokio::test]
    async fn test_intents_after_cancellation_are_marked_cancelled() {
        let mut fx = Fixture::new();
        fx.provider.expect(MockResponse::Sequence(vec![
            MockResponse::tool_call("s1", "stop", "{}"),
            MockResponse::tool_call("s2", "question", r#"{"text":"still here?"}"#),
        ]));

        let mut tools = ToolRegistry::with_builtins();
        tools.register(Arc::new(StopTool));
        let result = fx.send(tools, "go").await;

        assert_eq!(result.termination, Termination::Cancelled);
        let tool_turn = fx.session.last().unwrap();
        assert_eq!(tool_turn.outcome("s1").unwrap().status, OutcomeStatus::Success);
        let skipped = tool_turn.outcome("s2").unwrap();
        assert_eq!(skipped.status, OutcomeStatus::Error);
        assert_eq!(skipped.result, "Cancelled by user.");
        assert_eq!(fx.provider.call_count(), 1);
    }
}
