//! Login state machine
//!
//! Pure transitions: every backend response, failure or clock tick goes in,
//! a [`Step`] telling the driver what to do next comes out.

use std::time::Duration;
use tokio::time::Instant;

use crate::api::dto::{LoginResponse, LoginStatus};
use crate::api::ApiError;

const TWO_FA_REQUIRED: &str =
    "Two-factor password required. Please restart login and provide the 2FA password in the initial form.";

/// Polling parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginPolicy {
    pub poll_interval: Duration,
    pub timeout: Duration,
    pub max_consecutive_errors: u32,
}

impl Default for LoginPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1000),
            timeout: Duration::from_secs(10 * 60),
            max_consecutive_errors: 5,
        }
    }
}

/// How a login ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Completed,
    Failed(String),
    /// The backend wants the 2FA password, which must be given at start
    NeedsPassword(String),
    SessionExpired,
    /// The backend answered a status poll with a 500
    ServerError,
    TimedOut,
    TooManyErrors(String),
    Cancelled,
}

impl LoginOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, LoginOutcome::Completed)
    }

    /// The account list changed and should be fetched again
    pub fn needs_refresh(&self) -> bool {
        self.is_success()
    }

    pub fn message(&self) -> String {
        match self {
            LoginOutcome::Completed => "Account created successfully!".to_string(),
            LoginOutcome::Failed(msg) | LoginOutcome::NeedsPassword(msg) => msg.clone(),
            LoginOutcome::SessionExpired => {
                "Login session expired or not found. Please start the login process again."
                    .to_string()
            }
            LoginOutcome::ServerError => {
                "Server error during login process. Please try starting a new login session."
                    .to_string()
            }
            LoginOutcome::TimedOut => {
                "Login timed out waiting for completion. Please start again.".to_string()
            }
            LoginOutcome::TooManyErrors(last) => {
                format!("Stopped checking login status after repeated errors: {}", last)
            }
            LoginOutcome::Cancelled => "Login cancelled".to_string(),
        }
    }
}

/// What the driver should do next
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Keep waiting for the next tick
    Poll,
    /// Ask the operator for the login code; polling continues meanwhile
    PromptCode,
    Finish(LoginOutcome),
}

/// One login attempt
#[derive(Debug, Clone)]
pub struct LoginFlow {
    policy: LoginPolicy,
    session_id: Option<String>,
    code: Option<String>,
    in_progress: bool,
    message: Option<String>,
    error: Option<String>,
    polling_since: Option<Instant>,
    consecutive_errors: u32,
    code_prompted: bool,
    outcome: Option<LoginOutcome>,
}

impl LoginFlow {
    pub fn new(policy: LoginPolicy) -> Self {
        Self {
            policy,
            session_id: None,
            code: None,
            in_progress: false,
            message: None,
            error: None,
            polling_since: None,
            consecutive_errors: 0,
            code_prompted: false,
            outcome: None,
        }
    }

    pub fn policy(&self) -> &LoginPolicy {
        &self.policy
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn in_progress(&self) -> bool {
        self.in_progress
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    pub fn is_polling(&self) -> bool {
        self.polling_since.is_some()
    }

    pub fn outcome(&self) -> Option<&LoginOutcome> {
        self.outcome.as_ref()
    }

    /// Response to `start`
    pub fn on_start(&mut self, response: &LoginResponse, now: Instant) -> Step {
        self.session_id = response.login_session_id.clone().filter(|s| !s.is_empty());
        self.message = response.message.clone();
        self.error = None;

        match response.login_status() {
            Some(LoginStatus::WaitCode) | Some(LoginStatus::Processing)
                if self.session_id.is_none() =>
            {
                self.finish(LoginOutcome::Failed(
                    "Backend did not return a login session id".to_string(),
                ))
            }
            Some(LoginStatus::WaitCode) => {
                self.code_prompted = true;
                self.in_progress = false;
                self.polling_since = Some(now);
                Step::PromptCode
            }
            Some(LoginStatus::Processing) => {
                self.in_progress = true;
                self.polling_since = Some(now);
                Step::Poll
            }
            Some(LoginStatus::Wait2fa) => {
                let msg = response
                    .message
                    .clone()
                    .unwrap_or_else(|| TWO_FA_REQUIRED.to_string());
                self.reset();
                self.finish(LoginOutcome::NeedsPassword(msg))
            }
            Some(status) => self.on_final_status(status, response),
            None => self.finish(LoginOutcome::Failed(
                "Received invalid status response from server".to_string(),
            )),
        }
    }

    pub fn on_start_error(&mut self, error: &ApiError) -> Step {
        self.finish(LoginOutcome::Failed(format!(
            "Failed to start login: {}",
            error.detail()
        )))
    }

    /// Operator entered a code; returns false when the code is blank or
    /// there is no session to verify
    pub fn submit_code(&mut self, code: &str) -> bool {
        let code = code.trim();
        if code.is_empty() || self.session_id.is_none() || self.outcome.is_some() {
            return false;
        }
        self.code = Some(code.to_string());
        self.in_progress = true;
        self.error = None;
        true
    }

    /// Response to `verify`
    pub fn on_verify(&mut self, response: &LoginResponse, now: Instant) -> Step {
        if let Some(message) = &response.message {
            self.message = Some(message.clone());
        }
        match response.login_status() {
            Some(LoginStatus::Processing) => {
                self.in_progress = true;
                if self.polling_since.is_none() {
                    self.polling_since = Some(now);
                }
                Step::Poll
            }
            Some(LoginStatus::WaitCode) => {
                self.in_progress = false;
                Step::PromptCode
            }
            Some(LoginStatus::Wait2fa) => {
                self.reset();
                self.finish(LoginOutcome::NeedsPassword(TWO_FA_REQUIRED.to_string()))
            }
            Some(status) => self.on_final_status(status, response),
            None => {
                self.in_progress = false;
                self.error = Some("Received invalid status response from server".to_string());
                Step::PromptCode
            }
        }
    }

    /// `verify` failed in transport or with an error status; the session is
    /// kept so the code can be entered again
    pub fn on_verify_error(&mut self, error: &ApiError) -> Step {
        self.in_progress = false;
        self.error = Some(format!("Verification failed: {}", error.detail()));
        Step::PromptCode
    }

    /// Response to a `status` poll
    pub fn on_status(&mut self, response: &LoginResponse) -> Step {
        let Some(status) = response.login_status() else {
            return self.count_error("Received invalid status response from server".to_string());
        };
        self.consecutive_errors = 0;

        match status {
            LoginStatus::WaitCode => {
                self.message = response.message.clone();
                if self.code_prompted {
                    Step::Poll
                } else {
                    self.code_prompted = true;
                    self.in_progress = false;
                    Step::PromptCode
                }
            }
            LoginStatus::Wait2fa => {
                let msg = response
                    .message
                    .clone()
                    .unwrap_or_else(|| TWO_FA_REQUIRED.to_string());
                self.reset();
                self.finish(LoginOutcome::NeedsPassword(msg))
            }
            LoginStatus::Processing => {
                self.in_progress = true;
                self.message = Some(
                    response
                        .message
                        .clone()
                        .unwrap_or_else(|| "Processing...".to_string()),
                );
                Step::Poll
            }
            other => self.on_final_status(other, response),
        }
    }

    /// A `status` poll failed. 404 means the login session is gone and 500
    /// means the backend gave up on it; both stop at once.
    pub fn on_poll_error(&mut self, error: &ApiError) -> Step {
        match error.status() {
            Some(404) => return self.finish(LoginOutcome::SessionExpired),
            Some(500) => return self.finish(LoginOutcome::ServerError),
            _ => {}
        }
        self.count_error(format!("Failed to check status: {}", error.detail()))
    }

    /// Clock tick; `Poll` means a status request is due
    pub fn on_tick(&mut self, now: Instant) -> Step {
        if let Some(outcome) = &self.outcome {
            return Step::Finish(outcome.clone());
        }
        match self.polling_since {
            Some(since) if now.duration_since(since) >= self.policy.timeout => {
                self.finish(LoginOutcome::TimedOut)
            }
            _ => Step::Poll,
        }
    }

    /// Discard the attempt unless a request is in flight. Repeated calls are
    /// harmless.
    pub fn cancel(&mut self) -> bool {
        if self.in_progress {
            return false;
        }
        self.reset();
        true
    }

    fn on_final_status(&mut self, status: LoginStatus, response: &LoginResponse) -> Step {
        match status {
            LoginStatus::Done => self.finish(LoginOutcome::Completed),
            LoginStatus::Failed => {
                let msg = response
                    .error
                    .clone()
                    .filter(|e| !e.is_empty())
                    .unwrap_or_else(|| "Login failed".to_string());
                self.finish(LoginOutcome::Failed(msg))
            }
            LoginStatus::Other(s) => {
                self.finish(LoginOutcome::Failed(format!("Unknown status received: {}", s)))
            }
            // Non-final states are handled by the callers
            _ => Step::Poll,
        }
    }

    fn count_error(&mut self, message: String) -> Step {
        self.consecutive_errors += 1;
        self.in_progress = false;
        self.error = Some(message.clone());
        if self.consecutive_errors >= self.policy.max_consecutive_errors {
            self.finish(LoginOutcome::TooManyErrors(message))
        } else {
            Step::Poll
        }
    }

    fn finish(&mut self, outcome: LoginOutcome) -> Step {
        self.polling_since = None;
        self.in_progress = false;
        if !outcome.is_success() {
            self.error = Some(outcome.message());
        }
        self.outcome = Some(outcome.clone());
        Step::Finish(outcome)
    }

    fn reset(&mut self) {
        self.session_id = None;
        self.code = None;
        self.message = None;
        self.error = None;
        self.polling_since = None;
        self.consecutive_errors = 0;
        self.code_prompted = false;
        self.in_progress = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(value: serde_json::Value) -> LoginResponse {
        serde_json::from_value(value).unwrap()
    }

    fn started(now: Instant) -> LoginFlow {
        let mut flow = LoginFlow::new(LoginPolicy::default());
        let step = flow.on_start(
            &response(json!({"status": "wait_code", "login_session_id": "abc"})),
            now,
        );
        assert_eq!(step, Step::PromptCode);
        flow
    }

    #[test]
    fn test_start_statuses() {
        let now = Instant::now();
        let mut flow = LoginFlow::new(LoginPolicy::default());
        assert_eq!(
            flow.on_start(&response(json!({"status": "done", "login_session_id": "x"})), now),
            Step::Finish(LoginOutcome::Completed)
        );

        let mut flow = LoginFlow::new(LoginPolicy::default());
        let step = flow.on_start(
            &response(json!({"status": "wait_2fa", "login_session_id": "x"})),
            now,
        );
        assert!(matches!(step, Step::Finish(LoginOutcome::NeedsPassword(_))));
        assert!(flow.session_id().is_none());
        assert!(!flow.is_polling());

        let mut flow = LoginFlow::new(LoginPolicy::default());
        let step = flow.on_start(
            &response(json!({"status": "processing", "login_session_id": "x"})),
            now,
        );
        assert_eq!(step, Step::Poll);
        assert!(flow.in_progress());
        assert!(flow.is_polling());

        let mut flow = LoginFlow::new(LoginPolicy::default());
        let step = flow.on_start(&response(json!({"status": "wait_code"})), now);
        assert!(matches!(step, Step::Finish(LoginOutcome::Failed(_))));
    }

    #[test]
    fn test_status_transitions() {
        let now = Instant::now();
        let mut flow = started(now);

        // Code was already requested at start
        assert_eq!(
            flow.on_status(&response(json!({"status": "wait_code"}))),
            Step::Poll
        );
        assert_eq!(
            flow.on_status(&response(json!({"status": "processing"}))),
            Step::Poll
        );
        assert_eq!(flow.message(), Some("Processing..."));
        assert_eq!(
            flow.on_status(&response(json!({"status": "failed", "error": "PHONE_CODE_INVALID"}))),
            Step::Finish(LoginOutcome::Failed("PHONE_CODE_INVALID".into()))
        );

        let mut flow = started(now);
        assert_eq!(
            flow.on_status(&response(json!({"status": "exploded"}))),
            Step::Finish(LoginOutcome::Failed("Unknown status received: exploded".into()))
        );
    }

    #[test]
    fn test_successful_status_resets_error_count() {
        let mut flow = started(Instant::now());
        let err = ApiError::from_status(502, "");
        for _ in 0..4 {
            assert_eq!(flow.on_poll_error(&err), Step::Poll);
        }
        assert_eq!(flow.consecutive_errors(), 4);
        flow.on_status(&response(json!({"status": "processing"})));
        assert_eq!(flow.consecutive_errors(), 0);
    }

    #[test]
    fn test_breaker_trips_on_fifth_error() {
        let mut flow = started(Instant::now());
        let err = ApiError::Timeout;
        for _ in 0..4 {
            assert_eq!(flow.on_poll_error(&err), Step::Poll);
        }
        // Invalid bodies count as errors too
        let step = flow.on_status(&response(json!({"message": "no status here"})));
        assert!(matches!(step, Step::Finish(LoginOutcome::TooManyErrors(_))));
    }

    #[test]
    fn test_missing_session_stops_immediately() {
        let mut flow = started(Instant::now());
        let step = flow.on_poll_error(&ApiError::from_status(404, r#"{"detail":"Not found"}"#));
        assert_eq!(step, Step::Finish(LoginOutcome::SessionExpired));
    }

    #[test]
    fn test_server_error_stops_immediately() {
        let mut flow = started(Instant::now());
        let step = flow.on_poll_error(&ApiError::from_status(500, r#"{"detail":"boom"}"#));
        assert_eq!(step, Step::Finish(LoginOutcome::ServerError));
        assert!(!flow.is_polling());
        assert!(flow.error().unwrap().starts_with("Server error during login process"));
    }

    #[test]
    fn test_blank_code_is_ignored() {
        let mut flow = started(Instant::now());
        assert!(!flow.submit_code("   "));
        assert!(!flow.submit_code(""));
        assert!(flow.code().is_none());
        assert!(!flow.in_progress());

        assert!(flow.submit_code(" 12345 "));
        assert_eq!(flow.code(), Some("12345"));
    }

    #[test]
    fn test_timeout() {
        let start = Instant::now();
        let mut flow = started(start);
        assert_eq!(flow.on_tick(start + Duration::from_secs(599)), Step::Poll);
        assert_eq!(
            flow.on_tick(start + Duration::from_secs(600)),
            Step::Finish(LoginOutcome::TimedOut)
        );
    }

    #[test]
    fn test_verify_error_keeps_session() {
        let mut flow = started(Instant::now());
        assert!(flow.submit_code("123456"));
        assert!(flow.in_progress());

        let step = flow.on_verify_error(&ApiError::Unavailable("down".into()));
        assert_eq!(step, Step::PromptCode);
        assert_eq!(flow.session_id(), Some("abc"));
        assert!(!flow.in_progress());
        assert!(flow.error().unwrap().contains("Verification failed"));
    }

    #[test]
    fn test_cancel_is_idempotent_and_blocked_in_progress() {
        let mut flow = started(Instant::now());
        flow.submit_code("111");
        assert!(!flow.cancel());
        assert_eq!(flow.session_id(), Some("abc"));

        flow.on_verify_error(&ApiError::Timeout);
        assert!(flow.cancel());
        assert!(flow.session_id().is_none());
        assert!(flow.code().is_none());
        assert!(flow.error().is_none());
        assert!(flow.message().is_none());

        assert!(flow.cancel());
        assert!(flow.session_id().is_none());
        assert!(flow.error().is_none());
    }
}
