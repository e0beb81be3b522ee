//! Live Log Streaming
//!
//! Tails the backend's `/ws/logs` WebSocket. Text frames carry one or more
//! log lines; a JSON frame of type `error` reports a server-side problem.

use futures_util::StreamExt;
use reqwest::Url;
use serde::Deserialize;
use std::collections::VecDeque;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

/// Used when no usable API URL is configured
pub const DEFAULT_WS_BASE: &str = "ws://localhost:8000";

/// Most recent entries kept by a [`LogBuffer`]
pub const DEFAULT_BUFFER_CAPACITY: usize = 2000;

/// Largest `tail` the backend accepts
pub const MAX_TAIL: u32 = 1000;

const ABNORMAL_CLOSE: u16 = 1006;
const NO_STATUS: u16 = 1005;

#[derive(Error, Debug)]
pub enum LogStreamError {
    #[error("tail must be between 0 and 1000, got {0}")]
    InvalidTail(u32),

    #[error("Invalid log stream URL: {0}")]
    InvalidUrl(String),

    #[error("Log stream connection failed: {0}")]
    Connect(#[from] tokio_tungstenite::tungstenite::Error),
}

/// What happened on the stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEvent {
    Open,
    Line(String),
    Error(String),
    Close { code: u16, reason: String },
}

/// WebSocket origin for the log stream: the explicit URL when given, else
/// the API URL's origin with `http` mapped to `ws` and `https` to `wss`
pub fn ws_base(api_url: &str, explicit: Option<&str>) -> String {
    if let Some(url) = explicit.map(str::trim).filter(|u| !u.is_empty()) {
        return url.trim_end_matches('/').to_string();
    }

    let Ok(url) = Url::parse(api_url.trim()) else {
        return DEFAULT_WS_BASE.to_string();
    };
    let scheme = match url.scheme() {
        "https" => "wss",
        "http" => "ws",
        _ => return DEFAULT_WS_BASE.to_string(),
    };
    match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{}://{}:{}", scheme, host, port),
        (Some(host), None) => format!("{}://{}", scheme, host),
        _ => DEFAULT_WS_BASE.to_string(),
    }
}

/// Full `/ws/logs` URL with the optional query parameters
pub fn stream_url(
    base: &str,
    log_file: Option<&str>,
    tail: Option<u32>,
) -> Result<String, LogStreamError> {
    if let Some(tail) = tail {
        if tail > MAX_TAIL {
            return Err(LogStreamError::InvalidTail(tail));
        }
    }

    let mut url = Url::parse(&format!("{}/ws/logs", base.trim_end_matches('/')))
        .map_err(|e| LogStreamError::InvalidUrl(e.to_string()))?;
    {
        let mut query = url.query_pairs_mut();
        if let Some(file) = log_file.filter(|f| !f.is_empty()) {
            query.append_pair("log_file", file);
        }
        if let Some(tail) = tail {
            query.append_pair("tail", &tail.to_string());
        }
    }
    if url.query() == Some("") {
        url.set_query(None);
    }
    Ok(url.to_string())
}

#[derive(Deserialize)]
struct ErrorFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    message: Option<String>,
}

/// Turn one text frame into events
pub fn parse_frame(text: &str) -> Vec<LogEvent> {
    if let Ok(frame) = serde_json::from_str::<ErrorFrame>(text) {
        if frame.kind == "error" {
            let message = frame
                .message
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "Log stream error".to_string());
            return vec![LogEvent::Error(message)];
        }
    }
    split_lines(text).into_iter().map(LogEvent::Line).collect()
}

/// Split on `\r?\n`; only a trailing empty segment is dropped
fn split_lines(text: &str) -> Vec<String> {
    let mut lines: Vec<String> = text
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
        .collect();
    if lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines
}

/// Bounded tail of the most recent log lines
#[derive(Debug, Clone)]
pub struct LogBuffer {
    lines: VecDeque<String>,
    capacity: usize,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_CAPACITY)
    }
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity.min(DEFAULT_BUFFER_CAPACITY)),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, line: String) {
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

/// An open log stream
pub struct LogStream {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    pending: VecDeque<LogEvent>,
    done: bool,
}

impl LogStream {
    pub async fn connect(url: &str) -> Result<Self, LogStreamError> {
        tracing::info!(url, "Connecting to log stream");
        let (ws, _) = tokio_tungstenite::connect_async(url).await?;
        Ok(Self {
            ws,
            pending: VecDeque::from([LogEvent::Open]),
            done: false,
        })
    }

    /// Next event; `None` once the stream has closed
    pub async fn next_event(&mut self) -> Option<LogEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            if self.done {
                return None;
            }

            match self.ws.next().await {
                Some(Ok(Message::Text(text))) => self.pending.extend(parse_frame(&text)),
                Some(Ok(Message::Binary(bytes))) => {
                    self.pending
                        .extend(parse_frame(&String::from_utf8_lossy(&bytes)));
                }
                Some(Ok(Message::Close(frame))) => {
                    self.done = true;
                    let (code, reason) = frame
                        .map(|f| (u16::from(f.code), f.reason.into_owned()))
                        .unwrap_or((NO_STATUS, String::new()));
                    tracing::info!(code, reason = %reason, "Log stream closed");
                    return Some(LogEvent::Close { code, reason });
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Log stream error");
                    self.done = true;
                    self.pending.push_back(LogEvent::Close {
                        code: ABNORMAL_CLOSE,
                        reason: String::new(),
                    });
                    return Some(LogEvent::Error(e.to_string()));
                }
                None => {
                    self.done = true;
                    return Some(LogEvent::Close {
                        code: ABNORMAL_CLOSE,
                        reason: String::new(),
                    });
                }
            }
        }
    }

    /// Close from our side
    pub async fn close(mut self) {
        if !self.done {
            let _ = self.ws.close(None).await;
        }
    }
}
