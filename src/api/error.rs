//! API Error Types
//!
//! Errors surfaced by the HTTP client layer. Backend failures are
//! classified by status code; the human-readable message follows the
//! backend's `{"detail": "..."}` convention.

use serde::Deserialize;
use thiserror::Error;

/// Client-side API error types
#[derive(Error, Debug)]
pub enum ApiError {
    /// Backend could not be reached
    #[error("LikeBot backend unavailable: {0}")]
    Unavailable(String),

    /// Request timed out
    #[error("Request timeout")]
    Timeout,

    /// Transport failure not covered above
    #[error("Request failed: {0}")]
    Request(reqwest::Error),

    /// 401: token missing, expired or rejected. The local session is cleared.
    #[error("Unauthorized: {detail}. Please log in again")]
    Unauthorized { detail: String },

    /// 403: authenticated but not allowed (usually an unverified user)
    #[error("Forbidden: {detail}")]
    Forbidden { detail: String },

    /// 404
    #[error("Not found: {detail}")]
    NotFound { detail: String },

    /// 5xx
    #[error("Server error {status}: {detail}")]
    Server { status: u16, detail: String },

    /// Any other non-success status
    #[error("API error {status}: {detail}")]
    Status { status: u16, detail: String },

    /// Response body did not match the expected shape
    #[error("Invalid response: {0}")]
    Decode(String),

    /// Invalid input caught before a request was sent
    #[error("Validation error: {0}")]
    Validation(String),

    /// Local guard rejected the call
    #[error("{0}")]
    Access(#[from] crate::session::AccessError),

    /// IO error (session file, uploads)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ApiError::Timeout
        } else if e.is_connect() {
            ApiError::Unavailable(e.to_string())
        } else if e.is_decode() {
            ApiError::Decode(e.to_string())
        } else {
            ApiError::Request(e)
        }
    }
}

/// Error body returned by the backend
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ApiError {
    /// Build an error from a non-success status and raw response body
    pub fn from_status(status: u16, body: &str) -> Self {
        let detail = extract_detail(body);

        match status {
            401 => ApiError::Unauthorized { detail },
            403 => ApiError::Forbidden { detail },
            404 => ApiError::NotFound { detail },
            500..=599 => ApiError::Server { status, detail },
            _ => ApiError::Status { status, detail },
        }
    }

    /// HTTP status, when the error came from a response
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized { .. } => Some(401),
            ApiError::Forbidden { .. } => Some(403),
            ApiError::NotFound { .. } => Some(404),
            ApiError::Server { status, .. } | ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// User-facing message: the backend detail when present, else the
    /// error's own description.
    pub fn detail(&self) -> String {
        match self {
            ApiError::Unauthorized { detail }
            | ApiError::Forbidden { detail }
            | ApiError::NotFound { detail }
            | ApiError::Server { detail, .. }
            | ApiError::Status { detail, .. } => detail.clone(),
            other => other.to_string(),
        }
    }

    /// Whether the failure happened before any response was received
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ApiError::Unavailable(_) | ApiError::Timeout | ApiError::Request(_)
        )
    }
}

/// Pull the `detail` text out of an error body.
///
/// FastAPI-style validation errors carry a list under `detail`; those are
/// joined by `msg`. Non-JSON bodies are used verbatim.
fn extract_detail(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "Unknown error".to_string();
    }

    match serde_json::from_str::<ErrorBody>(trimmed) {
        Ok(ErrorBody {
            detail: Some(serde_json::Value::String(s)),
            ..
        }) => s,
        Ok(ErrorBody {
            detail: Some(serde_json::Value::Array(items)),
            ..
        }) => {
            let messages: Vec<String> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(|m| m.as_str()))
                .map(str::to_string)
                .collect();
            if messages.is_empty() {
                "Unknown error".to_string()
            } else {
                messages.join("; ")
            }
        }
        Ok(ErrorBody {
            detail: Some(other),
            ..
        }) => other.to_string(),
        Ok(ErrorBody {
            detail: None,
            message: Some(m),
        }) => m,
        Ok(_) => "Unknown error".to_string(),
        Err(_) => trimmed.to_string(),
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            ApiError::from_status(401, r#"{"detail":"Token expired"}"#),
            ApiError::Unauthorized { .. }
        ));
        assert!(matches!(
            ApiError::from_status(403, ""),
            ApiError::Forbidden { .. }
        ));
        assert!(matches!(
            ApiError::from_status(404, ""),
            ApiError::NotFound { .. }
        ));
        assert!(matches!(
            ApiError::from_status(502, ""),
            ApiError::Server { status: 502, .. }
        ));
        assert!(matches!(
            ApiError::from_status(409, ""),
            ApiError::Status { status: 409, .. }
        ));
    }

    #[test]
    fn test_detail_extraction() {
        let err = ApiError::from_status(400, r#"{"detail":"Proxy already exists"}"#);
        assert_eq!(err.detail(), "Proxy already exists");
        assert_eq!(err.status(), Some(400));

        let err = ApiError::from_status(
            422,
            r#"{"detail":[{"msg":"field required"},{"msg":"value is not a valid integer"}]}"#,
        );
        assert_eq!(err.detail(), "field required; value is not a valid integer");

        let err = ApiError::from_status(500, "Internal Server Error");
        assert_eq!(err.detail(), "Internal Server Error");

        let err = ApiError::from_status(500, "");
        assert_eq!(err.detail(), "Unknown error");
    }

    #[test]
    fn test_transport_errors_have_no_status() {
        assert_eq!(ApiError::Timeout.status(), None);
        assert!(ApiError::Timeout.is_transport());
        assert!(!ApiError::from_status(404, "").is_transport());
    }
}
