//! Groq provider implementation.
//!
//! Groq serves an OpenAI-compatible chat completions API. Reasoning models
//! such as GPT-OSS return their deliberation in a separate `reasoning`
//! delta when the request asks for `reasoning_format: "parsed"`.

use crate::{
    error::ProviderError,
    message::{ContentPart, Message, Role},
    model::{ModelInfo, DEFAULT_MODEL},
    stream::{FinishReason, StreamChunk, Usage},
    GenerateOptions, LanguageModel, ProviderResult, ToolDefinition,
};
use async_stream::try_stream;
use async_trait::async_trait;
use deploy_util::Identifier;
use futures::stream::BoxStream;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Default Groq API endpoint.
pub const GROQ_API_URL: &str = "https://api.groq.com/openai/v1";

/// Environment variable holding the Groq API key.
pub const GROQ_API_KEY_ENV: &str = "GROQ_API_KEY";

/// Groq provider.
pub struct GroqProvider {
    client: reqwest::Client,
    base_url: String,
    model: ModelInfo,
    has_key: bool,
    reasoning_format: Option<String>,
}

impl GroqProvider {
    /// Create a new Groq provider.
    pub fn new(api_key: &str, model: ModelInfo) -> ProviderResult<Self> {
        Self::with_base_url(api_key, GROQ_API_URL, model)
    }

    /// Create a provider against a custom OpenAI-compatible endpoint.
    pub fn with_base_url(
        api_key: &str,
        base_url: impl Into<String>,
        model: ModelInfo,
    ) -> ProviderResult<Self> {
        let mut headers = HeaderMap::new();
        let has_key = !api_key.trim().is_empty();
        if has_key {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", api_key.trim()))
                    .map_err(|_| ProviderError::invalid_api_key("groq"))?,
            );
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| ProviderError::internal(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model,
            has_key,
            reasoning_format: Some("parsed".to_string()),
        })
    }

    /// Override the reasoning format (`parsed`, `raw`, `hidden`, or none).
    pub fn with_reasoning_format(mut self, format: Option<String>) -> Self {
        self.reasoning_format = format;
        self
    }

    /// Convert our messages to OpenAI format.
    fn convert_messages(messages: &[Message], system: Option<&str>) -> Vec<Value> {
        let mut result = Vec::new();

        if let Some(sys) = system {
            result.push(json!({
                "role": "system",
                "content": sys
            }));
        }

        for msg in messages {
            if msg.role == Role::Tool {
                for part in &msg.content {
                    if let ContentPart::ToolResult {
                        tool_use_id,
                        content,
                        ..
                    } = part
                    {
                        result.push(json!({
                            "role": "tool",
                            "tool_call_id": tool_use_id,
                            "content": content
                        }));
                    }
                }
                continue;
            }

            let content = convert_content(&msg.content);
            let tool_calls = if msg.role == Role::Assistant {
                convert_tool_calls(&msg.content)
            } else {
                None
            };

            if content.is_null() && tool_calls.is_none() {
                continue;
            }

            let mut message = json!({
                "role": msg.role.as_str(),
                "content": content
            });
            if let Some(tool_calls) = tool_calls {
                message["tool_calls"] = tool_calls;
            }
            result.push(message);
        }

        result
    }

    /// Convert tools to OpenAI format.
    fn convert_tools(tools: &[ToolDefinition]) -> Vec<Value> {
        tools
            .iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.parameters
                    }
                })
            })
            .collect()
    }

    fn error_for_status(
        status: reqwest::StatusCode,
        retry_after: Option<Duration>,
        body: String,
    ) -> ProviderError {
        match status.as_u16() {
            401 => ProviderError::invalid_api_key("groq"),
            429 => ProviderError::RateLimited { retry_after },
            code => {
                let message = serde_json::from_str::<ErrorEnvelope>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);
                ProviderError::api_error(code, message)
            }
        }
    }
}

/// Text parts joined into a single string; reasoning is never sent back.
fn convert_content(parts: &[ContentPart]) -> Value {
    let text: Vec<&str> = parts
        .iter()
        .filter_map(|part| match part {
            ContentPart::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect();

    if text.is_empty() {
        Value::Null
    } else {
        Value::String(text.concat())
    }
}

/// Convert tool calls to OpenAI format.
fn convert_tool_calls(parts: &[ContentPart]) -> Option<Value> {
    let calls: Vec<Value> = parts
        .iter()
        .filter_map(|part| {
            if let ContentPart::ToolUse { id, name, input } = part {
                Some(json!({
                    "id": id,
                    "type": "function",
                    "function": {
                        "name": name,
                        "arguments": input.to_string()
                    }
                }))
            } else {
                None
            }
        })
        .collect();

    if calls.is_empty() {
        None
    } else {
        Some(Value::Array(calls))
    }
}

/// OpenAI chat completion request.
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning_format: Option<String>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// One SSE payload: either a completion chunk or an in-band error.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SseEvent {
    Chunk(ChatChunk),
    Error(ErrorEnvelope),
}

/// OpenAI streaming chunk.
#[derive(Debug, Deserialize)]
struct ChatChunk {
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    usage: Option<ChunkUsage>,
    #[serde(default)]
    x_groq: Option<GroqExtra>,
}

#[derive(Debug, Deserialize)]
struct GroqExtra {
    #[serde(default)]
    usage: Option<ChunkUsage>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    delta: ChunkDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallDelta>>,
}

#[derive(Debug, Deserialize)]
struct ToolCallDelta {
    index: usize,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<FunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct FunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

/// A tool call assembled from index-keyed fragments.
#[derive(Debug, Default)]
struct PendingCall {
    id: String,
    name: String,
    arguments: String,
}

#[async_trait]
impl LanguageModel for GroqProvider {
    async fn generate(
        &self,
        messages: Vec<Message>,
        options: GenerateOptions,
    ) -> ProviderResult<BoxStream<'static, ProviderResult<StreamChunk>>> {
        if !self.has_key {
            return Err(ProviderError::missing_api_key("groq"));
        }

        let model = options.model.clone().unwrap_or_else(|| self.model.id.clone());
        let request = ChatRequest {
            model: model.clone(),
            messages: Self::convert_messages(&messages, options.system.as_deref()),
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            tools: Self::convert_tools(&options.tools),
            reasoning_format: self.reasoning_format.clone(),
            stream: true,
        };

        debug!(model = %model, tools = request.tools.len(), "Sending Groq request");
        trace!(request = ?request, "Full request");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            let error_text = response.text().await.unwrap_or_default();
            warn!(status = %status, error = %error_text, "Groq API error");
            return Err(Self::error_for_status(status, retry_after, error_text));
        }

        let byte_stream = response.bytes_stream();
        let abort = options.abort.clone();

        Ok(Box::pin(try_stream! {
            use futures::StreamExt;
            use tokio::io::AsyncBufReadExt;
            use tokio_util::io::StreamReader;

            let reader = StreamReader::new(
                byte_stream.map(|r| r.map_err(std::io::Error::other))
            );
            let mut lines = reader.lines();

            let mut pending: Vec<PendingCall> = Vec::new();
            let mut finish_reason: Option<FinishReason> = None;
            let mut usage = Usage::default();
            let mut failed = false;

            while let Some(line) = lines.next_line().await? {
                if let Some(ref token) = abort {
                    if token.is_cancelled() {
                        Err(ProviderError::Cancelled)?;
                    }
                }

                let line = line.trim();
                if line.is_empty() || line.starts_with(':') {
                    continue;
                }

                let data = line.strip_prefix("data:").map(str::trim_start).unwrap_or(line);
                if data == "[DONE]" {
                    break;
                }

                let chunk = match serde_json::from_str::<SseEvent>(data) {
                    Ok(SseEvent::Chunk(c)) => c,
                    Ok(SseEvent::Error(e)) => {
                        yield StreamChunk::Error(e.error.message);
                        failed = true;
                        break;
                    }
                    Err(e) => {
                        trace!(error = %e, data = %data, "Failed to parse chunk");
                        continue;
                    }
                };

                let reported = chunk
                    .usage
                    .as_ref()
                    .or(chunk.x_groq.as_ref().and_then(|x| x.usage.as_ref()));
                if let Some(u) = reported {
                    usage = Usage::new(u.prompt_tokens, u.completion_tokens);
                }

                for choice in chunk.choices {
                    if let Some(reasoning) = choice.delta.reasoning {
                        if !reasoning.is_empty() {
                            yield StreamChunk::ReasoningDelta(reasoning);
                        }
                    }

                    if let Some(content) = choice.delta.content {
                        if !content.is_empty() {
                            yield StreamChunk::TextDelta(content);
                        }
                    }

                    if let Some(tool_deltas) = choice.delta.tool_calls {
                        for delta in tool_deltas {
                            while pending.len() <= delta.index {
                                pending.push(PendingCall::default());
                            }
                            let call = &mut pending[delta.index];
                            if let Some(id) = delta.id {
                                call.id = id;
                            }
                            if let Some(func) = delta.function {
                                if let Some(name) = func.name {
                                    call.name = name;
                                }
                                if let Some(args) = func.arguments {
                                    call.arguments.push_str(&args);
                                }
                            }
                        }
                    }

                    if let Some(reason) = choice.finish_reason {
                        // Calls are only complete once the choice finishes.
                        for call in pending.drain(..) {
                            if call.name.is_empty() {
                                continue;
                            }
                            let id = if call.id.is_empty() { Identifier::call() } else { call.id };
                            let arguments = if call.arguments.trim().is_empty() {
                                "{}".to_string()
                            } else {
                                call.arguments
                            };
                            yield StreamChunk::ToolCall { id, name: call.name, arguments };
                        }
                        finish_reason = Some(FinishReason::parse(&reason));
                    }
                }
            }

            if !failed {
                match finish_reason {
                    Some(finish_reason) => yield StreamChunk::Finish { usage, finish_reason },
                    None => Err(ProviderError::StreamInterrupted)?,
                }
            }
        }))
    }

    fn model_info(&self) -> &ModelInfo {
        &self.model
    }

    fn provider_id(&self) -> &str {
        "groq"
    }

    fn has_credentials(&self) -> bool {
        self.has_key
    }
}

/// Built-in model definitions for Groq.
pub mod models {
    use super::DEFAULT_MODEL;
    use crate::model::ModelInfo;

    /// GPT-OSS 120B (reasoning).
    pub fn gpt_oss_120b() -> ModelInfo {
        ModelInfo::new(DEFAULT_MODEL, "groq")
            .with_name("GPT-OSS 120B")
            .with_reasoning(true)
            .with_context(131_072)
    }

    /// GPT-OSS 20B (reasoning).
    pub fn gpt_oss_20b() -> ModelInfo {
        ModelInfo::new("openai/gpt-oss-20b", "groq")
            .with_name("GPT-OSS 20B")
            .with_reasoning(true)
            .with_context(131_072)
    }

    /// Qwen3 32B (reasoning).
    pub fn qwen3_32b() -> ModelInfo {
        ModelInfo::new("qwen/qwen3-32b", "groq")
            .with_name("Qwen3 32B")
            .with_reasoning(true)
            .with_context(131_072)
    }

    /// Llama 3.3 70B (versatile, fast).
    pub fn llama_3_3_70b() -> ModelInfo {
        ModelInfo::new("llama-3.3-70b-versatile", "groq")
            .with_name("Llama 3.3 70B")
            .with_context(128_000)
    }

    /// Llama 3.1 8B (instant).
    pub fn llama_3_1_8b() -> ModelInfo {
        ModelInfo::new("llama-3.1-8b-instant", "groq")
            .with_name("Llama 3.1 8B")
            .with_context(128_000)
    }

    /// All built-in models.
    pub fn all() -> Vec<ModelInfo> {
        vec![
            gpt_oss_120b(),
            gpt_oss_20b(),
            qwen3_32b(),
            llama_3_3_70b(),
            llama_3_1_8b(),
        ]
    }

    /// Look up a built-in model by id, or describe an unknown one.
    pub fn find(id: &str) -> ModelInfo {
        all()
            .into_iter()
            .find(|m| m.id == id)
            .unwrap_or_else(|| ModelInfo::new(id, "groq"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sse(events: &[&str]) -> String {
        let mut body = String::new();
        for event in events {
            body.push_str("data: ");
            body.push_str(event);
            body.push_str("\n\n");
        }
        body.push_str("data: [DONE]\n\n");
        body
    }

    async fn collect(provider: &GroqProvider) -> Vec<ProviderResult<StreamChunk>> {
        let stream = provider
            .generate(vec![Message::user("hi")], GenerateOptions::default())
            .await
            .unwrap();
        stream.collect().await
    }

    #[test]
    fn test_convert_messages() {
        let messages = vec![Message::user("Hello, world!")];

        let converted = GroqProvider::convert_messages(&messages, Some("You are helpful"));

        assert_eq!(converted.len(), 2);
        assert_eq!(converted[0]["role"], "system");
        assert_eq!(converted[1]["role"], "user");
        assert_eq!(converted[1]["content"], "Hello, world!");
    }

    #[test]
    fn test_convert_assistant_tool_calls_and_results() {
        let messages = vec![
            Message::new(Role::Assistant)
                .with_part(ContentPart::Thinking {
                    text: "private".to_string(),
                })
                .with_part(ContentPart::tool_use("call_1", "list", json!({"path": "."}))),
            Message::new(Role::Tool)
                .with_part(ContentPart::tool_result("call_1", "[]"))
                .with_part(ContentPart::tool_error("call_2", "nope")),
        ];

        let converted = GroqProvider::convert_messages(&messages, None);

        assert_eq!(converted.len(), 3);
        assert_eq!(converted[0]["role"], "assistant");
        assert!(converted[0]["content"].is_null());
        assert_eq!(converted[0]["tool_calls"][0]["id"], "call_1");
        assert_eq!(
            converted[0]["tool_calls"][0]["function"]["arguments"],
            r#"{"path":"."}"#
        );
        assert_eq!(converted[1]["tool_call_id"], "call_1");
        assert_eq!(converted[2]["tool_call_id"], "call_2");
    }

    #[test]
    fn test_convert_tools() {
        let tools = vec![ToolDefinition {
            name: "readFile".to_string(),
            description: "Read a file".to_string(),
            parameters: json!({"type": "object", "properties": {"path": {"type": "string"}}}),
        }];

        let converted = GroqProvider::convert_tools(&tools);

        assert_eq!(converted.len(), 1);
        assert_eq!(converted[0]["type"], "function");
        assert_eq!(converted[0]["function"]["name"], "readFile");
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_request() {
        let provider = GroqProvider::new("", models::gpt_oss_120b()).unwrap();
        assert!(!provider.has_credentials());

        let result = provider
            .generate(vec![Message::user("hi")], GenerateOptions::default())
            .await;
        assert!(matches!(result, Err(ProviderError::MissingApiKey(_))));
    }

    #[tokio::test]
    async fn test_streams_reasoning_text_and_tool_calls() {
        let server = MockServer::start().await;
        let body = sse(&[
            r#"{"choices":[{"delta":{"reasoning":"Think"},"finish_reason":null}]}"#,
            r#"{"choices":[{"delta":{"content":"Hello"},"finish_reason":null}]}"#,
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_a","function":{"name":"readFile","arguments":"{\"pa"}}]},"finish_reason":null}]}"#,
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"th\":\"a.txt\"}"}}]},"finish_reason":null}]}"#,
            r#"{"choices":[{"delta":{},"finish_reason":"tool_calls"}],"x_groq":{"usage":{"prompt_tokens":12,"completion_tokens":7}}}"#,
        ]);
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let provider =
            GroqProvider::with_base_url("test-key", server.uri(), models::gpt_oss_120b()).unwrap();
        let chunks: Vec<StreamChunk> = collect(&provider)
            .await
            .into_iter()
            .map(|c| c.unwrap())
            .collect();

        assert_eq!(
            chunks,
            vec![
                StreamChunk::reasoning("Think"),
                StreamChunk::text("Hello"),
                StreamChunk::tool_call("call_a", "readFile", r#"{"path":"a.txt"}"#),
                StreamChunk::Finish {
                    usage: Usage::new(12, 7),
                    finish_reason: FinishReason::ToolUse,
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_in_band_error_event() {
        let server = MockServer::start().await;
        let body = sse(&[r#"{"error":{"message":"model overloaded"}}"#]);
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let provider =
            GroqProvider::with_base_url("test-key", server.uri(), models::gpt_oss_120b()).unwrap();
        let chunks = collect(&provider).await;

        assert_eq!(chunks.len(), 1);
        assert!(matches!(&chunks[0], Ok(StreamChunk::Error(msg)) if msg == "model overloaded"));
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_string(r#"{"error":{"message":"bad tool schema"}}"#),
            )
            .mount(&server)
            .await;

        let provider =
            GroqProvider::with_base_url("test-key", server.uri(), models::gpt_oss_120b()).unwrap();
        let result = provider
            .generate(vec![Message::user("hi")], GenerateOptions::default())
            .await;

        match result {
            Err(ProviderError::ApiError { status, message }) => {
                assert_eq!(status, 400);
                assert_eq!(message, "bad tool schema");
            }
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "3"))
            .mount(&server)
            .await;

        let provider =
            GroqProvider::with_base_url("test-key", server.uri(), models::gpt_oss_120b()).unwrap();
        let result = provider
            .generate(vec![Message::user("hi")], GenerateOptions::default())
            .await;

        assert!(matches!(
            result,
            Err(ProviderError::RateLimited { retry_after: Some(d) }) if d == Duration::from_secs(3)
        ));
    }

    #[test]
    fn test_find_model() {
        assert!(models::find(DEFAULT_MODEL).reasoning);
        let unknown = models::find("custom/model");
        assert_eq!(unknown.id, "custom/model");
        assert_eq!(unknown.provider_id, "groq");
    }
}
