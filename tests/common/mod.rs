//! Shared test utilities: a stub upstream server and request helpers.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Json, Router,
    body::Body,
    extract::{DefaultBodyLimit, Path, State},
    http::{HeaderMap, Request, StatusCode, header::CONTENT_TYPE},
    response::IntoResponse,
    routing::post,
};
use portfolio_api::{AppState, Settings};
use serde_json::{Value, json};
use tower::ServiceExt;

/// One call the stub upstream received.
#[derive(Debug, Clone)]
pub struct Seen {
    pub call: String,
    pub api_key: Option<String>,
    pub body: Value,
}

#[derive(Clone)]
struct StubState {
    status: StatusCode,
    body: String,
    delay: Duration,
    seen: Arc<Mutex<Vec<Seen>>>,
}

pub struct StubUpstream {
    pub url: String,
    seen: Arc<Mutex<Vec<Seen>>>,
}

impl StubUpstream {
    pub fn requests(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }

    pub fn hits(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn last(&self) -> Seen {
        self.requests().pop().expect("stub upstream was never called")
    }
}

async fn generate(
    State(stub): State<StubState>,
    Path(call): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    stub.seen.lock().unwrap().push(Seen {
        call,
        api_key: headers
            .get("x-goog-api-key")
            .and_then(|v| v.to_str().ok())
            .map(String::from),
        body,
    });

    if !stub.delay.is_zero() {
        tokio::time::sleep(stub.delay).await;
    }

    (stub.status, [(CONTENT_TYPE, "application/json")], stub.body)
}

/// Start a stub upstream that answers every call with `status` and `body`.
pub async fn spawn_upstream_raw(status: StatusCode, body: String, delay: Duration) -> StubUpstream {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let state = StubState {
        status,
        body,
        delay,
        seen: seen.clone(),
    };

    let app = Router::new()
        .route("/v1beta/models/{call}", post(generate))
        .layer(DefaultBodyLimit::disable())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind stub upstream");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    StubUpstream {
        url: format!("http://{addr}"),
        seen,
    }
}

pub async fn spawn_upstream(status: StatusCode, body: Value) -> StubUpstream {
    spawn_upstream_raw(status, body.to_string(), Duration::ZERO).await
}

/// Upstream success payload with a single text part.
pub fn text_reply(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP"
        }]
    })
}

pub fn upstream_error(code: u16, message: &str) -> Value {
    json!({"error": {"code": code, "message": message, "status": "ERROR"}})
}

/// Settings pointing at `url` with a test credential and no sweeper.
pub fn settings_for(url: &str) -> Settings {
    Settings {
        upstream_url: url.to_string(),
        api_key: Some("test-key".to_string()),
        sweep_interval: None,
        ..Settings::default()
    }
}

pub fn build_app(settings: Settings) -> Router {
    let state = AppState::new(settings).expect("failed to build app state");
    portfolio_api::app(Arc::new(state))
}

/// App whose upstream is unreachable and whose credential is missing.
pub fn unconfigured_app() -> Router {
    build_app(Settings {
        upstream_url: "http://127.0.0.1:9".to_string(),
        api_key: None,
        sweep_interval: None,
        ..Settings::default()
    })
}

// chat body with `turns` history entries of `turn_len` chars each
pub fn long_chat(turns: usize, turn_len: usize) -> Value {
    let history: Vec<Value> = (0..turns)
        .map(|i| {
            let role = if i % 2 == 0 { "user" } else { "model" };
            json!({"role": role, "parts": [{"text": "x".repeat(turn_len)}]})
        })
        .collect();
    json!({"prompt": "hi", "conversationHistory": history})
}

pub fn post_json(uri: &str, client: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", client)
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub json: Value,
}

pub async fn send(app: &Router, request: Request<Body>) -> TestResponse {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(Value::Null)
    };

    TestResponse {
        status,
        headers,
        json,
    }
}
