//! Scripted provider for tests.

use crate::{
    error::ProviderError,
    message::Message,
    model::ModelInfo,
    stream::{FinishReason, StreamChunk, Usage},
    GenerateOptions, LanguageModel, ProviderResult,
};
use async_stream::try_stream;
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::sync::{Arc, Mutex, MutexGuard};

/// A scripted response for one `generate` call.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Stream a text response.
    Text(String),
    /// Stream a reasoning delta.
    Reasoning(String),
    /// Stream a tool call.
    ToolCall {
        id: String,
        name: String,
        arguments: String,
    },
    /// Fail the `generate` call itself.
    Error(String),
    /// Fail partway through the stream.
    StreamError(String),
    /// Stream several items within one response.
    Sequence(Vec<MockResponse>),
}

impl MockResponse {
    /// Convenience constructor for a tool call.
    pub fn tool_call(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self::ToolCall {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    fn has_tool_call(&self) -> bool {
        match self {
            MockResponse::ToolCall { .. } => true,
            MockResponse::Sequence(items) => items.iter().any(|i| i.has_tool_call()),
            _ => false,
        }
    }
}

/// A request observed by the mock.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub messages: Vec<Message>,
    pub system: Option<String>,
    pub tool_names: Vec<String>,
    pub model: Option<String>,
}

/// Mock provider for testing.
#[derive(Clone)]
pub struct MockProvider {
    model: ModelInfo,
    responses: Arc<Mutex<Vec<MockResponse>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    credentials: bool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockProvider {
    /// Create a new mock provider.
    pub fn new(model: ModelInfo) -> Self {
        Self {
            model,
            responses: Arc::new(Mutex::new(Vec::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
            credentials: true,
        }
    }

    /// Create a mock provider that reports no credentials.
    pub fn without_credentials(model: ModelInfo) -> Self {
        Self {
            credentials: false,
            ..Self::new(model)
        }
    }

    /// Queue any scripted response.
    pub fn expect(&self, response: MockResponse) {
        lock(&self.responses).push(response);
    }

    /// Expect a text response.
    pub fn expect_text(&self, text: impl Into<String>) {
        self.expect(MockResponse::Text(text.into()));
    }

    /// Expect a tool call response.
    pub fn expect_tool_call(
        &self,
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) {
        self.expect(MockResponse::tool_call(id, name, arguments));
    }

    /// Expect an error from `generate`.
    pub fn expect_error(&self, error: impl Into<String>) {
        self.expect(MockResponse::Error(error.into()));
    }

    /// Get the number of times generate was called.
    pub fn call_count(&self) -> usize {
        lock(&self.requests).len()
    }

    /// All requests seen so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl LanguageModel for MockProvider {
    async fn generate(
        &self,
        messages: Vec<Message>,
        options: GenerateOptions,
    ) -> ProviderResult<BoxStream<'static, ProviderResult<StreamChunk>>> {
        lock(&self.requests).push(RecordedRequest {
            messages,
            system: options.system.clone(),
            tool_names: options.tools.iter().map(|t| t.name.clone()).collect(),
            model: options.model.clone(),
        });

        let response = {
            let mut responses = lock(&self.responses);
            if responses.is_empty() {
                MockResponse::Text("Mock response".to_string())
            } else {
                responses.remove(0)
            }
        };

        if let MockResponse::Error(msg) = response {
            return Err(ProviderError::internal(msg));
        }

        let finish_reason = if response.has_tool_call() {
            FinishReason::ToolUse
        } else {
            FinishReason::EndTurn
        };
        let items = match response {
            MockResponse::Sequence(items) => items,
            other => vec![other],
        };

        Ok(Box::pin(try_stream! {
            for item in items {
                match item {
                    MockResponse::Text(text) => {
                        yield StreamChunk::TextDelta(text);
                    }
                    MockResponse::Reasoning(text) => {
                        yield StreamChunk::ReasoningDelta(text);
                    }
                    MockResponse::ToolCall { id, name, arguments } => {
                        yield StreamChunk::ToolCall { id, name, arguments };
                    }
                    MockResponse::StreamError(msg) | MockResponse::Error(msg) => {
                        Err(ProviderError::internal(msg))?;
                    }
                    MockResponse::Sequence(_) => {}
                }
            }
            yield StreamChunk::Finish {
                usage: Usage::new(100, 50),
                finish_reason,
            };
        }))
    }

    fn model_info(&self) -> &ModelInfo {
        &self.model
    }

    fn provider_id(&self) -> &str {
        "mock"
    }

    fn has_credentials(&self) -> bool {
        self.credentials
    }
}
