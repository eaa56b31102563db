//! End-to-end tests for the `/api/*` routes, driven through the axum router
//! with a mock Generative Language endpoint on a local port.

use std::sync::{Arc, Mutex};

use axum::{
    Router,
    body::{Body, Bytes},
    extract::{Path, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
};
use serde_json::{Value, json};
use tower::ServiceExt;

use chat_relay::config::{Config, ConventionPreference};
use chat_relay::llm::LlmProvider;
use chat_relay::llm::providers::dummy::DummyProvider;
use chat_relay::llm::providers::gemini::GeminiProvider;
use chat_relay::subsystems::chat::ChatRelay;
use chat_relay::subsystems::chat::credential::{CredentialSource, CredentialSources};
use chat_relay::subsystems::comms::build_router;
use chat_relay::subsystems::memory::SessionManager;

const UNSET: &str = "CHAT_RELAY_TEST_DEFINITELY_UNSET_KEY";

// ── Mock provider ─────────────────────────────────────────────────────────────

type Canned = (StatusCode, Value);

#[derive(Clone)]
struct MockGemini {
    structured: Canned,
    bare: Canned,
    bodies: Arc<Mutex<Vec<Value>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

async fn mock_generate(
    State(mock): State<MockGemini>,
    Path(call): Path<String>,
    body: Bytes,
) -> Response {
    let parsed = serde_json::from_slice(&body).unwrap_or(Value::Null);
    mock.bodies.lock().unwrap().push(parsed);
    let (status, reply) = if call.ends_with(":generateText") { &mock.bare } else { &mock.structured };
    mock.calls.lock().unwrap().push(call);
    (*status, reply.to_string()).into_response()
}

/// Mock answering `:generateContent` with `structured` and `:generateText`
/// with `bare`. Returns the base URL, request bodies and call names.
async fn spawn_gemini_split(
    structured: Canned,
    bare: Canned,
) -> (String, Arc<Mutex<Vec<Value>>>, Arc<Mutex<Vec<String>>>) {
    let bodies = Arc::new(Mutex::new(Vec::new()));
    let calls = Arc::new(Mutex::new(Vec::new()));
    let mock = MockGemini { structured, bare, bodies: bodies.clone(), calls: calls.clone() };
    let router = Router::new()
        .route("/v1beta/models/{call}", post(mock_generate))
        .with_state(mock);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (format!("http://{addr}"), bodies, calls)
}

async fn spawn_gemini(status: StatusCode, reply: Value) -> (String, Arc<Mutex<Vec<Value>>>) {
    let (base, bodies, _) = spawn_gemini_split((status, reply.clone()), (status, reply)).await;
    (base, bodies)
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn app(provider: LlmProvider, credentials: CredentialSources, include_history: bool) -> Router {
    let mut cfg = Config::test_default();
    cfg.chat.include_history = include_history;
    let sessions = Arc::new(SessionManager::new(&cfg.chat.system_prompt, &cfg.memory));
    build_router(Arc::new(ChatRelay::new(provider, credentials, sessions, &cfg.chat)))
}

fn dummy_app() -> Router {
    app(LlmProvider::Dummy(DummyProvider), CredentialSources::default(), false)
}

fn gemini(base: &str, preference: ConventionPreference) -> LlmProvider {
    let mut cfg = Config::test_default().llm.gemini;
    cfg.api_base_url = base.to_string();
    cfg.call_convention = preference;
    cfg.timeout_seconds = 5;
    LlmProvider::Gemini(GeminiProvider::new(&cfg))
}

fn key() -> CredentialSources {
    CredentialSources::new(vec![
        CredentialSource::Env(UNSET.into()),
        CredentialSource::Literal("key123".into()),
    ])
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn post_chat(app: &Router, body: impl Into<Body>) -> (StatusCode, Value) {
    let req = Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap();
    send(app, req).await
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, req).await
}

async fn transcript_len(app: &Router, session: &str) -> usize {
    let (status, body) = get(app, &format!("/api/sessions/{session}/transcript")).await;
    if status == StatusCode::NOT_FOUND {
        return 0;
    }
    body["entries"].as_array().map(Vec::len).unwrap_or(0)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn dummy_round_trip() {
    let app = dummy_app();
    let (status, body) = post_chat(&app, json!({"message": "hi"}).to_string()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"message": "[echo] Respond very briefly (1-2 lines): hi"}));

    let (status, body) = get(&app, "/api/sessions/default/transcript").await;
    assert_eq!(status, StatusCode::OK);
    let roles: Vec<&str> = body["entries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["role"].as_str().unwrap())
        .collect();
    assert_eq!(roles, vec!["system", "user", "assistant"]);
    assert_eq!(body["entries"][0]["content"], "Give short, concise answers");
}

#[tokio::test]
async fn invalid_messages_are_rejected_without_side_effects() {
    let app = dummy_app();
    let bad_bodies = [
        json!({}).to_string(),
        json!({"message": ""}).to_string(),
        json!({"message": 42}).to_string(),
        json!({"message": null}).to_string(),
        json!({"message": {"text": "hi"}}).to_string(),
        json!(["hi"]).to_string(),
        "{not json".to_string(),
        String::new(),
    ];
    for bad in bad_bodies {
        let (status, body) = post_chat(&app, bad.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body {bad:?}");
        assert_eq!(body, json!({"error": "Missing or invalid 'message' in request body"}));
    }
    assert_eq!(transcript_len(&app, "default").await, 0);
}

#[tokio::test]
async fn each_success_adds_exactly_two_entries() {
    let app = dummy_app();
    post_chat(&app, json!({"message": "one"}).to_string()).await;
    let before = transcript_len(&app, "default").await;
    let (status, _) = post_chat(&app, json!({"message": "two"}).to_string()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(transcript_len(&app, "default").await, before + 2);
}

#[tokio::test]
async fn explicit_sessions_are_isolated() {
    let app = dummy_app();
    post_chat(&app, json!({"message": "a", "session_id": "alice"}).to_string()).await;
    post_chat(&app, json!({"message": "b", "session_id": "bob"}).to_string()).await;
    post_chat(&app, json!({"message": "c", "session_id": "bob"}).to_string()).await;
    assert_eq!(transcript_len(&app, "alice").await, 3);
    assert_eq!(transcript_len(&app, "bob").await, 5);
    assert_eq!(transcript_len(&app, "default").await, 0);
}

#[tokio::test]
async fn gemini_reply_is_decoded_and_sanitised() {
    let (base, bodies) = spawn_gemini(StatusCode::OK, json!({"text": "*4*"})).await;
    let app = app(gemini(&base, ConventionPreference::Auto), key(), false);

    let (status, body) = post_chat(&app, json!({"message": "What is 2+2?"}).to_string()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"message": "4"}));
    assert_eq!(transcript_len(&app, "default").await, 3);

    let sent = bodies.lock().unwrap()[0].clone();
    assert_eq!(
        sent,
        json!({"contents": [{
            "role": "user",
            "parts": [{"text": "Respond very briefly (1-2 lines): What is 2+2?"}]
        }]})
    );
}

#[tokio::test]
async fn native_gemini_shape_is_understood() {
    let (base, _) = spawn_gemini(
        StatusCode::OK,
        json!({"candidates": [{"content": {"role": "model", "parts": [{"text": " Paris. "}]}}]}),
    )
    .await;
    let app = app(gemini(&base, ConventionPreference::Structured), key(), false);
    let (_, body) = post_chat(&app, json!({"message": "Capital of France?"}).to_string()).await;
    assert_eq!(body, json!({"message": "Paris."}));
}

#[tokio::test]
async fn pinned_bare_convention_reply_is_decoded() {
    let (base, bodies, calls) = spawn_gemini_split(
        (StatusCode::INTERNAL_SERVER_ERROR, json!({"error": "unused"})),
        (StatusCode::OK, json!({"candidates": [{"output": "*Four.*"}]})),
    )
    .await;
    let app = app(gemini(&base, ConventionPreference::Bare), key(), false);

    let (status, body) = post_chat(&app, json!({"message": "2+2?"}).to_string()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"message": "Four."}));
    assert_eq!(*calls.lock().unwrap(), vec!["gemini-pro:generateText"]);
    assert_eq!(
        bodies.lock().unwrap()[0],
        json!({"prompt": {"text": "Respond very briefly (1-2 lines): 2+2?"}})
    );
}

#[tokio::test]
async fn auto_falls_back_to_legacy_call_and_remembers_it() {
    let (base, _, calls) = spawn_gemini_split(
        (StatusCode::NOT_FOUND, json!({"error": {"message": "no such method"}})),
        (StatusCode::OK, json!({"candidates": [{"output": "legacy reply"}]})),
    )
    .await;
    let app = app(gemini(&base, ConventionPreference::Auto), key(), false);

    let (status, body) = post_chat(&app, json!({"message": "first"}).to_string()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"message": "legacy reply"}));
    assert_eq!(
        *calls.lock().unwrap(),
        vec!["gemini-pro:generateContent", "gemini-pro:generateText"]
    );

    calls.lock().unwrap().clear();
    let (status, body) = post_chat(&app, json!({"message": "second"}).to_string()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"message": "legacy reply"}));
    assert_eq!(*calls.lock().unwrap(), vec!["gemini-pro:generateText"]);
    assert_eq!(transcript_len(&app, "default").await, 5);
}

#[tokio::test]
async fn unknown_shape_is_echoed_as_json() {
    let (base, _) = spawn_gemini(StatusCode::OK, json!({"unexpected": true})).await;
    let app = app(gemini(&base, ConventionPreference::Structured), key(), false);
    let (status, body) = post_chat(&app, json!({"message": "hi"}).to_string()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"message": "{\"unexpected\":true}"}));
}

#[tokio::test]
async fn missing_credential_is_server_error() {
    let app = app(
        gemini("http://127.0.0.1:1", ConventionPreference::Auto),
        CredentialSources::from_env_names(&[UNSET]),
        false,
    );
    let (status, body) = post_chat(&app, json!({"message": "hi"}).to_string()).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": format!("Server missing GEMINI API key (set {UNSET})")}));

    let (_, transcript) = get(&app, "/api/sessions/default/transcript").await;
    let entries = transcript["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1]["role"], "user");
    assert_eq!(entries[1]["content"], "hi");
}

#[tokio::test]
async fn provider_error_payload_is_forwarded_as_detail() {
    let (base, bodies) =
        spawn_gemini(StatusCode::TOO_MANY_REQUESTS, json!({"error": {"message": "quota"}})).await;
    let app = app(gemini(&base, ConventionPreference::Auto), key(), false);

    let (status, body) = post_chat(&app, json!({"message": "hi"}).to_string()).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body,
        json!({"error": "Failed to generate response", "detail": {"error": {"message": "quota"}}})
    );
    // Structured attempt, then the bare fallback.
    assert_eq!(bodies.lock().unwrap().len(), 2);
    assert_eq!(transcript_len(&app, "default").await, 2);
}

#[tokio::test]
async fn history_is_forwarded_when_enabled() {
    let (base, bodies) = spawn_gemini(StatusCode::OK, json!({"text": "ok"})).await;
    let app = app(gemini(&base, ConventionPreference::Structured), key(), true);

    post_chat(&app, json!({"message": "first"}).to_string()).await;
    post_chat(&app, json!({"message": "second"}).to_string()).await;

    let second = bodies.lock().unwrap()[1].clone();
    assert_eq!(
        second["contents"],
        json!([
            {"role": "user", "parts": [{"text": "first"}]},
            {"role": "model", "parts": [{"text": "ok"}]},
            {"role": "user", "parts": [{"text": "Respond very briefly (1-2 lines): second"}]},
        ])
    );
    assert_eq!(
        second["systemInstruction"],
        json!({"parts": [{"text": "Give short, concise answers"}]})
    );
}

#[tokio::test]
async fn health_reports_provider() {
    let app = dummy_app();
    let (status, body) = get(&app, "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["provider"], "dummy");
    assert_eq!(body["sessions"], 0);
}

#[tokio::test]
async fn unknown_session_transcript_is_not_found() {
    let app = dummy_app();
    let (status, body) = get(&app, "/api/sessions/ghost/transcript").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("ghost"));
}
