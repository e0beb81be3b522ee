//! In-process mock of the LikeBot backend for client tests.
//!
//! Responses are scripted per `(method, path)`; unscripted routes answer
//! 404. A scripted sequence is consumed in order and its last entry repeats.
//! Every request is recorded for assertions.

use axum::{
    body::Bytes,
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::client::ApiClient;
use crate::session::SessionStore;

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    /// Percent-decoded path
    pub path: String,
    pub query: HashMap<String, String>,
    pub body: String,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
}

impl RecordedRequest {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }
}

/// Scripted WebSocket frame for `/ws/logs`
#[derive(Debug, Clone)]
pub enum WsFrame {
    Text(String),
    Close(u16, String),
}

#[derive(Default)]
struct MockState {
    routes: Mutex<HashMap<(String, String), VecDeque<(u16, Value)>>>,
    requests: Mutex<Vec<RecordedRequest>>,
    ws_frames: Mutex<Vec<WsFrame>>,
}

pub struct MockBackend {
    addr: SocketAddr,
    state: Arc<MockState>,
}

impl MockBackend {
    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());
        let app = Router::new()
            .route("/ws/logs", get(ws_logs))
            .fallback(handle)
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Client with an in-memory session pointed at this backend
    pub fn client(&self) -> ApiClient {
        ApiClient::new(
            &self.url(),
            Duration::from_secs(5),
            Arc::new(SessionStore::in_memory()),
        )
        .unwrap()
    }

    /// Always answer `method path` with `status` and `body`
    pub fn respond(&self, method: &str, path: &str, status: u16, body: Value) {
        self.respond_seq(method, path, vec![(status, body)]);
    }

    /// Answer successive calls with the given responses; the last repeats
    pub fn respond_seq(&self, method: &str, path: &str, responses: Vec<(u16, Value)>) {
        self.state
            .routes
            .lock()
            .unwrap()
            .insert((method.to_string(), path.to_string()), responses.into());
    }

    pub fn ws_frames(&self, frames: Vec<WsFrame>) {
        *self.state.ws_frames.lock().unwrap() = frames;
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, method: &str, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.path == path)
            .collect()
    }
}

fn record(state: &MockState, method: &Method, uri: &Uri, headers: &HeaderMap, body: &[u8]) -> RecordedRequest {
    let path = urlencoding::decode(uri.path())
        .map(|p| p.into_owned())
        .unwrap_or_else(|_| uri.path().to_string());

    let query = reqwest::Url::parse(&format!("http://mock{}", uri))
        .map(|url| url.query_pairs().into_owned().collect())
        .unwrap_or_default();

    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    let request = RecordedRequest {
        method: method.to_string(),
        path,
        query,
        body: String::from_utf8_lossy(body).into_owned(),
        authorization: header("authorization"),
        content_type: header("content-type"),
    };
    state.requests.lock().unwrap().push(request.clone());
    request
}

async fn handle(
    State(state): State<Arc<MockState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = record(&state, &method, &uri, &headers, &body);

    let scripted = {
        let mut routes = state.routes.lock().unwrap();
        routes
            .get_mut(&(request.method.clone(), request.path.clone()))
            .and_then(|queue| {
                if queue.len() > 1 {
                    queue.pop_front()
                } else {
                    queue.front().cloned()
                }
            })
    };

    match scripted {
        Some((status, body)) => {
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            if body.is_null() {
                status.into_response()
            } else {
                (status, Json(body)).into_response()
            }
        }
        None => (StatusCode::NOT_FOUND, Json(json!({"detail": "Not Found"}))).into_response(),
    }
}

async fn ws_logs(
    State(state): State<Arc<MockState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    record(&state, &method, &uri, &headers, &[]);
    let frames = state.ws_frames.lock().unwrap().clone();
    ws.on_upgrade(move |socket| replay(socket, frames))
}

async fn replay(mut socket: WebSocket, frames: Vec<WsFrame>) {
    for frame in frames {
        let message = match frame {
            WsFrame::Text(text) => Message::Text(text),
            WsFrame::Close(code, reason) => Message::Close(Some(CloseFrame {
                code,
                reason: reason.into(),
            })),
        };
        if socket.send(message).await.is_err() {
            return;
        }
    }
    // Keep the socket open until the client goes away
    while let Some(Ok(_)) = socket.recv().await {}
}
