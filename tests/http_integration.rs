//! HTTP integration tests for the chat-completions provider and the Sheets
//! outcome log.
//!
//! Each test spins up an Axum stub on a random port and points the real
//! client at it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::TcpListener;

use haro_assist::error::{LlmError, OutcomeLogError};
use haro_assist::llm::{
    ChatCompletionsProvider, ChatMessage, CompletionRequest, LlmBackend, LlmConfig, LlmProvider,
    create_provider,
};
use haro_assist::pipeline::{OutcomeLog, OutcomeStatus, QueryRecord};
use haro_assist::store::sheets::HEADERS;
use haro_assist::store::{SheetsConfig, SheetsOutcomeLog};

/// Serve `app` on 127.0.0.1 with a random port; returns the base URL.
async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

// ── Chat completions ────────────────────────────────────────────────

#[derive(Default)]
struct ChatState {
    requests: Mutex<Vec<Value>>,
}

/// Answers every model except "broken", echoing the model name.
async fn chat_handler(
    State(state): State<Arc<ChatState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.requests.lock().unwrap().push(body.clone());

    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if auth != "Bearer test-key" {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let model = body["model"].as_str().unwrap_or_default();
    match model {
        "limited" => (
            StatusCode::TOO_MANY_REQUESTS,
            [("retry-after", "7")],
            "slow down",
        )
            .into_response(),
        "broken" => (StatusCode::INTERNAL_SERVER_ERROR, "model unavailable").into_response(),
        _ => Json(json!({
            "choices": [{
                "message": {"role": "assistant", "content": format!("hello from {model}")},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 12, "completion_tokens": 5}
        }))
        .into_response(),
    }
}

async fn chat_stub() -> (String, Arc<ChatState>) {
    let state = Arc::new(ChatState::default());
    let app = Router::new()
        .route("/v1/chat/completions", post(chat_handler))
        .with_state(state.clone());
    (format!("{}/v1", serve(app).await), state)
}

fn request() -> CompletionRequest {
    CompletionRequest::new(vec![
        ChatMessage::system("You write pitches."),
        ChatMessage::user("Energy prices?"),
    ])
    .with_temperature(0.7)
    .with_max_tokens(600)
}

#[tokio::test]
async fn chat_completion_round_trip() {
    let (base, state) = chat_stub().await;
    let provider =
        ChatCompletionsProvider::new("groq", base, SecretString::from("test-key"), "llama");

    let response = provider.complete(request()).await.unwrap();
    assert_eq!(response.content, "hello from llama");
    assert_eq!(response.input_tokens, 12);
    assert_eq!(response.output_tokens, 5);

    let sent = state.requests.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["model"], "llama");
    assert_eq!(sent[0]["max_tokens"], 600);
    assert_eq!(sent[0]["messages"][0]["role"], "system");
    assert_eq!(sent[0]["messages"][1]["content"], "Energy prices?");
}

#[tokio::test]
async fn rate_limit_carries_retry_after() {
    let (base, _) = chat_stub().await;
    let provider =
        ChatCompletionsProvider::new("groq", base, SecretString::from("test-key"), "limited");

    match provider.complete(request()).await {
        Err(LlmError::RateLimited {
            provider,
            retry_after,
        }) => {
            assert_eq!(provider, "groq");
            assert_eq!(retry_after, Some(Duration::from_secs(7)));
        }
        other => panic!("expected RateLimited, got {:?}", other.map(|r| r.content)),
    }
}

#[tokio::test]
async fn bad_key_is_auth_failure() {
    let (base, _) = chat_stub().await;
    let provider =
        ChatCompletionsProvider::new("groq", base, SecretString::from("wrong"), "llama");

    assert!(matches!(
        provider.complete(request()).await,
        Err(LlmError::AuthFailed { .. })
    ));
}

#[tokio::test]
async fn configured_fallback_model_answers_when_primary_fails() {
    let (base, state) = chat_stub().await;
    let config = LlmConfig {
        backend: LlmBackend::Groq,
        api_key: SecretString::from("test-key"),
        base_url: Some(base),
        model: "broken".into(),
        fallback_model: Some("small".into()),
    };

    let provider = create_provider(&config).unwrap();
    let response = provider.complete(request()).await.unwrap();
    assert_eq!(response.content, "hello from small");

    let models: Vec<String> = state
        .requests
        .lock()
        .unwrap()
        .iter()
        .map(|r| r["model"].as_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(models, vec!["broken", "small"]);
}

// ── Google Sheets ───────────────────────────────────────────────────

#[derive(Default)]
struct SheetsState {
    reject_token: bool,
    token_requests: Mutex<Vec<HashMap<String, String>>>,
    rows: Mutex<Vec<Vec<String>>>,
    bearer_tokens: Mutex<Vec<String>>,
}

async fn token_handler(
    State(state): State<Arc<SheetsState>>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    state.token_requests.lock().unwrap().push(form);
    if state.reject_token {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "invalid_grant"})),
        )
            .into_response();
    }
    Json(json!({"access_token": "access-1", "expires_in": 3600, "token_type": "Bearer"}))
        .into_response()
}

fn record_bearer(state: &SheetsState, headers: &HeaderMap) {
    if let Some(auth) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        state.bearer_tokens.lock().unwrap().push(auth.to_string());
    }
}

async fn values_get(
    State(state): State<Arc<SheetsState>>,
    Path((_id, range)): Path<(String, String)>,
    headers: HeaderMap,
) -> Json<Value> {
    record_bearer(&state, &headers);
    let rows = state.rows.lock().unwrap();
    match rows.first() {
        Some(first) => Json(json!({"range": range, "values": [first]})),
        None => Json(json!({"range": range})),
    }
}

async fn values_append(
    State(state): State<Arc<SheetsState>>,
    Path((_id, range)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    record_bearer(&state, &headers);
    assert!(range.ends_with(":append"), "unexpected range {range}");
    let appended: Vec<Vec<String>> = serde_json::from_value(body["values"].clone()).unwrap();
    state.rows.lock().unwrap().extend(appended);
    Json(json!({"updates": {"updatedRows": 1}}))
}

async fn sheets_stub(state: SheetsState) -> (SheetsOutcomeLog, Arc<SheetsState>) {
    let state = Arc::new(state);
    let app = Router::new()
        .route("/token", post(token_handler))
        .route(
            "/v4/spreadsheets/{id}/values/{range}",
            get(values_get).post(values_append),
        )
        .with_state(state.clone());
    let base = serve(app).await;

    let log = SheetsOutcomeLog::new(SheetsConfig {
        spreadsheet_id: "sheet-123".into(),
        client_id: "client-id".into(),
        client_secret: SecretString::from("client-secret"),
        refresh_token: SecretString::from("refresh-token"),
        sheet: "Sheet1".into(),
        token_url: format!("{base}/token"),
        api_base: base,
    });
    (log, state)
}

fn query() -> QueryRecord {
    QueryRecord {
        title: "Energy billing expert".into(),
        publication: "Personal Finance".into(),
        query_text: "How can consumers cut smart meter costs?".into(),
        reply_to: Some("reply-1@example.com".into()),
    }
}

#[tokio::test]
async fn empty_sheet_gets_headers_then_row() {
    let (log, state) = sheets_stub(SheetsState::default()).await;

    log.record(&query(), "Here is my pitch.", OutcomeStatus::Sent)
        .await
        .unwrap();

    let rows = state.rows.lock().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0], HEADERS.map(String::from).to_vec());
    assert_eq!(rows[1][1], "Energy billing expert");
    assert_eq!(rows[1][4], "reply-1@example.com");
    assert_eq!(rows[1][5], "Here is my pitch.");
    assert_eq!(rows[1][6], "Sent");

    let tokens = state.token_requests.lock().unwrap();
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0]["grant_type"], "refresh_token");
    assert_eq!(tokens[0]["refresh_token"], "refresh-token");
    assert!(
        state
            .bearer_tokens
            .lock()
            .unwrap()
            .iter()
            .all(|t| t == "Bearer access-1")
    );
}

#[tokio::test]
async fn existing_headers_are_not_repeated_and_token_is_cached() {
    let state = SheetsState::default();
    state
        .rows
        .lock()
        .unwrap()
        .push(HEADERS.map(String::from).to_vec());
    let (log, state) = sheets_stub(state).await;

    log.record(&query(), "", OutcomeStatus::Skipped).await.unwrap();
    log.record(&query(), "Second pitch", OutcomeStatus::Failed)
        .await
        .unwrap();

    let rows = state.rows.lock().unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[1][6], "Skipped");
    assert_eq!(rows[2][6], "Failed");
    assert_eq!(state.token_requests.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn rejected_refresh_token_is_auth_error() {
    let (log, state) = sheets_stub(SheetsState {
        reject_token: true,
        ..SheetsState::default()
    })
    .await;

    let err = log
        .record(&query(), "pitch", OutcomeStatus::Sent)
        .await
        .unwrap_err();
    assert!(matches!(err, OutcomeLogError::Auth(_)));
    assert!(state.rows.lock().unwrap().is_empty());
}
