//! Full conversations through the public API.

use deploy_core::{
    AgentEvent, Bus, Config, Instance, NullSink, OutcomeStatus, PromptConfig, PromptLoop,
    Session, Termination, Turn,
};
use deploy_provider::groq::{models, GroqProvider};
use deploy_provider::mock::{MockProvider, MockResponse};
use deploy_provider::{ModelInfo, Role};
use deploy_snapshot::FileHistory;
use deploy_tools::ToolRegistry;
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string_contains, method, path};
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

fn signed_in(dir: &TempDir, provider: Arc<MockProvider>) -> Instance {
    let mut instance = Instance::new(dir.path(), Config::default(), provider);
    assert!(instance.login());
    instance
}

#[tokio::test]
async fn file_reference_is_summarized_in_one_iteration() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("notes.txt"), "ship it!!!").unwrap();
    let provider = Arc::new(MockProvider::new(models::gpt_oss_120b()));
    provider.expect_text("The note says to ship it.");
    let mut instance = signed_in(&dir, provider.clone());
    let mut events = instance.bus().subscribe();

    instance.submit("@notes.txt summarize").await.unwrap();

    let request = &provider.requests()[0];
    assert_eq!(request.messages[0].role, Role::System);
    let bundle = request.messages[0].text();
    assert!(bundle.contains("files[1]"));
    assert!(bundle.contains("ship it!!!"));

    let last = instance.session().last().unwrap();
    assert_eq!(last.text(), "The note says to ship it.");
    assert!(last.tool_calls.is_empty());

    let mut finished = None;
    while let Ok(event) = events.try_recv() {
        if let AgentEvent::LoopFinished {
            termination,
            iterations,
        } = event
        {
            finished = Some((termination, iterations));
        }
    }
    assert_eq!(finished, Some((Termination::Completed, 1)));
}

#[tokio::test]
async fn unknown_tool_is_reported_and_loop_continues() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(MockProvider::new(models::gpt_oss_120b()));
    provider.expect_tool_call("call_x", "doesNotExist", "{}");
    provider.expect_text("I cannot do that.");
    let mut instance = signed_in(&dir, provider.clone());

    instance.submit("use a strange tool").await.unwrap();

    assert_eq!(provider.call_count(), 2);
    let tool_turn = instance
        .session()
        .turns()
        .iter()
        .find(|t| t.role == Role::Tool)
        .unwrap();
    let outcome = tool_turn.outcome("call_x").unwrap();
    assert_eq!(outcome.status, OutcomeStatus::NotFound);
    assert!(outcome.result.contains("not found"));
}

#[tokio::test]
async fn undo_after_model_write() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("a.txt");
    std::fs::write(&file, "old").unwrap();
    let provider = Arc::new(MockProvider::new(models::gpt_oss_120b()));
    provider.expect_tool_call("w1", "writeFile", r#"{"path":"a.txt","content":"new"}"#);
    provider.expect_text("Updated a.txt.");
    let mut instance = signed_in(&dir, provider);

    instance.submit("replace a.txt").await.unwrap();
    assert_eq!(std::fs::read_to_string(&file).unwrap(), "new");

    instance.submit("/undo").await.unwrap();
    assert_eq!(std::fs::read_to_string(&file).unwrap(), "old");
}

#[tokio::test]
async fn model_patch_is_undoable() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("a.txt");
    std::fs::write(&file, "one\ntwo\n").unwrap();
    let provider = Arc::new(MockProvider::new(models::gpt_oss_120b()));
    let patch = serde_json::json!({
        "patchContent": "--- a/a.txt\n+++ b/a.txt\n@@ -1,2 +1,2 @@\n one\n-two\n+2\n"
    });
    provider.expect_tool_call("p1", "patch", &patch.to_string());
    provider.expect_text("Patched.");
    let mut instance = signed_in(&dir, provider);

    instance.submit("fix line two").await.unwrap();
    assert_eq!(std::fs::read_to_string(&file).unwrap(), "one\n2\n");

    instance.submit("/undo").await.unwrap();
    assert_eq!(std::fs::read_to_string(&file).unwrap(), "one\ntwo\n");
}

#[tokio::test]
async fn iteration_cap_leaves_unresolved_outcomes() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(MockProvider::new(models::gpt_oss_120b()));
    for i in 0..15 {
        provider.expect(MockResponse::tool_call(
            format!("loop_{}", i),
            "todoread",
            "{}",
        ));
    }
    let mut instance = signed_in(&dir, provider.clone());

    let result = instance.send_message("keep going").await.unwrap();

    assert_eq!(result.termination, Termination::IterationLimit);
    assert_eq!(provider.call_count(), 10);
    let tool_turns = instance
        .session()
        .turns()
        .iter()
        .filter(|t| t.role == Role::Tool)
        .count();
    assert_eq!(tool_turns, 10);
}

#[tokio::test]
async fn configured_iteration_cap_is_respected() {
    let dir = TempDir::new().unwrap();
    let provider = Arc::new(MockProvider::new(ModelInfo::new("m", "mock")));
    for i in 0..5 {
        provider.expect_tool_call(format!("c{}", i), "todoread", "{}");
    }
    let config = Config::parse_jsonc(r#"{"max_iterations": 3}"#, "test").unwrap();
    let mut instance = Instance::new(dir.path(), config, provider.clone());
    instance.login();

    let result = instance.send_message("go").await.unwrap();

    assert_eq!(result.iterations, 3);
    assert_eq!(provider.call_count(), 3);
}

#[tokio::test]
async fn groq_stream_drives_tool_round_trip() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("a.txt"), "from disk").unwrap();

    let server = MockServer::start().await;
    let first = sse(&[
        r#"{"choices":[{"delta":{"reasoning":"Need the file."},"finish_reason":null}]}"#,
        r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_a","function":{"name":"readFile","arguments":"{\"path\":\"a.txt\"}"}}]},"finish_reason":null}]}"#,
        r#"{"choices":[{"delta":{},"finish_reason":"tool_calls"}]}"#,
    ]);
    let second = sse(&[
        r#"{"choices":[{"delta":{"content":"It says: from disk"},"finish_reason":null}]}"#,
        r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#,
    ]);
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("tool_call_id"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(second, "text/event-stream"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(first, "text/event-stream"))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    let provider =
        GroqProvider::with_base_url("gsk_test", server.uri(), models::gpt_oss_120b()).unwrap();
    let mut session = Session::new("openai/gpt-oss-120b", Bus::new(), Arc::new(NullSink));
    session.push(Turn::user("what is in a.txt?"));

    let prompt = PromptLoop::new(
        Arc::new(provider),
        ToolRegistry::with_builtins(),
        FileHistory::shared(20),
        dir.path(),
        CancellationToken::new(),
    );
    let result = prompt
        .run(&mut session, None, &PromptConfig::default())
        .await;

    assert_eq!(result.termination, Termination::Completed);
    assert_eq!(result.iterations, 2);

    let turns = session.turns();
    assert_eq!(turns[1].reasoning.as_deref(), Some("Need the file."));
    assert_eq!(turns[2].outcome("call_a").unwrap().result, "from disk");
    assert_eq!(turns[3].text(), "It says: from disk");
}
