//! Mock onboarding backend shared by the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde_json::{Value, json};
use tokio::net::TcpListener;

/// Maximum time any test is allowed to run before we consider it hung.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// How long the `slow` app id stalls before answering.
pub const SLOW_DELAY: Duration = Duration::from_secs(2);

#[derive(Clone, Default)]
pub struct MockState {
    /// Raw request paths, in arrival order.
    pub hits: Arc<Mutex<Vec<String>>>,
    /// Bodies and `x-app-id` headers received on `/events`.
    pub events: Arc<Mutex<Vec<(Option<String>, Value)>>>,
}

impl MockState {
    pub fn hits(&self) -> Vec<String> {
        self.hits.lock().unwrap().clone()
    }

    pub fn events(&self) -> Vec<(Option<String>, Value)> {
        self.events.lock().unwrap().clone()
    }
}

/// A document in the shape the production backend serves.
pub fn jakir_board() -> Value {
    json!({
        "_id": "68a16fed4fc91007bd28ff9f",
        "appId": "jakir-board",
        "screens": [{
            "id": "screen1",
            "type": "text",
            "content": {
                "title": "Welcome to Our App (jakir)!",
                "subtitle": "Let's get you started with a quick setup",
                "color": "#333333",
                "background": "#ffffff",
                "fontSize": "xl",
                "size": "md"
            },
            "actions": [{
                "type": "button",
                "label": "Next",
                "color": "#ffffff",
                "background": "#007AFF",
                "target": "screen2"
            }]
        }],
        "createdAt": "2025-08-17T06:00:13.277Z",
        "updatedAt": "2025-08-17T06:00:13.277Z",
        "__v": 0
    })
}

async fn onboarding(
    State(state): State<MockState>,
    Path(app_id): Path<String>,
    uri: Uri,
) -> Response {
    state.hits.lock().unwrap().push(uri.path().to_string());
    match app_id.as_str() {
        "missing" => StatusCode::NOT_FOUND.into_response(),
        "bad-request" => StatusCode::BAD_REQUEST.into_response(),
        "broken" => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        "teapot" => StatusCode::IM_A_TEAPOT.into_response(),
        "slow" => {
            tokio::time::sleep(SLOW_DELAY).await;
            Json(json!({ "success": true, "data": jakir_board() })).into_response()
        }
        "bad-envelope" => Json(json!({ "success": false })).into_response(),
        "bad-screens" => {
            Json(json!({ "success": true, "data": { "appId": "x", "screens": {} } })).into_response()
        }
        "not-json" => "<html>oops</html>".into_response(),
        other => {
            let mut doc = jakir_board();
            doc["appId"] = Value::String(other.to_string());
            Json(json!({ "success": true, "data": doc })).into_response()
        }
    }
}

async fn events(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let app = headers
        .get("x-app-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state.events.lock().unwrap().push((app, body));
    (StatusCode::CREATED, Json(json!({ "ok": true })))
}

async fn always_fails() -> impl IntoResponse {
    StatusCode::SERVICE_UNAVAILABLE
}

/// Start the mock backend on a random port. Returns its base URL
/// (`http://127.0.0.1:<port>`) and shared state.
pub async fn start_server() -> (String, MockState) {
    let state = MockState::default();
    let app = Router::new()
        .route("/api/onboarding/{app_id}", get(onboarding))
        .route("/onboarding/{app_id}", get(onboarding))
        .route("/events", post(events))
        .route("/fail", post(always_fails))
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    (format!("http://127.0.0.1:{port}"), state)
}

/// A base URL on which nothing is listening.
pub async fn closed_base_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}")
}
