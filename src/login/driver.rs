//! Login driver
//!
//! Runs a [`LoginFlow`] against a [`LoginApi`]: polls `status` on a fixed
//! interval, forwards operator codes to `verify` and reports progress on an
//! optional event channel.

use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};

use super::machine::{LoginFlow, LoginOutcome, LoginPolicy, Step};
use super::LoginApi;
use crate::api::dto::LoginStart;
use crate::services::accounts::normalize_phone;

/// Operator input during a login
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginInput {
    Code(String),
    Cancel,
}

/// Progress notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginEvent {
    SessionStarted { session_id: String },
    CodeRequested { message: Option<String> },
    Progress { message: String },
    Error { message: String },
    Finished(LoginOutcome),
}

pub struct LoginDriver<A> {
    api: A,
    policy: LoginPolicy,
    events: Option<mpsc::UnboundedSender<LoginEvent>>,
}

impl<A: LoginApi> LoginDriver<A> {
    pub fn new(api: A, policy: LoginPolicy) -> Self {
        Self {
            api,
            policy,
            events: None,
        }
    }

    pub fn with_events(mut self, events: mpsc::UnboundedSender<LoginEvent>) -> Self {
        self.events = Some(events);
        self
    }

    fn emit(&self, event: LoginEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    /// Drive one login to its outcome.
    ///
    /// A closed input channel means no more codes will arrive; polling
    /// carries on until the backend or the clock ends the login.
    pub async fn run(
        &self,
        request: LoginStart,
        mut inputs: mpsc::Receiver<LoginInput>,
    ) -> LoginOutcome {
        let mut flow = LoginFlow::new(self.policy);

        let Some(phone_number) = normalize_phone(&request.phone_number) else {
            return self.finish(LoginOutcome::Failed("Phone number is required".to_string()));
        };
        let request = LoginStart {
            phone_number,
            ..request
        };

        tracing::info!(phone = %request.phone_number, "Starting account login");
        let mut step = match self.api.start(&request).await {
            Ok(response) => flow.on_start(&response, Instant::now()),
            Err(e) => flow.on_start_error(&e),
        };
        if let Some(session_id) = flow.session_id() {
            self.emit(LoginEvent::SessionStarted {
                session_id: session_id.to_string(),
            });
        }

        let interval = self.policy.poll_interval;
        let mut ticker = time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut inputs_open = true;

        loop {
            match step {
                Step::Finish(outcome) => return self.finish(outcome),
                Step::PromptCode => {
                    if let Some(error) = flow.error() {
                        self.emit(LoginEvent::Error {
                            message: error.to_string(),
                        });
                    }
                    self.emit(LoginEvent::CodeRequested {
                        message: flow.message().map(str::to_string),
                    });
                }
                Step::Poll => {}
            }

            step = tokio::select! {
                _ = ticker.tick() => self.poll(&mut flow).await,
                input = inputs.recv(), if inputs_open => match input {
                    Some(LoginInput::Code(code)) => self.verify(&mut flow, &code).await,
                    Some(LoginInput::Cancel) => {
                        if flow.cancel() {
                            Step::Finish(LoginOutcome::Cancelled)
                        } else {
                            self.emit(LoginEvent::Error {
                                message: "Login is in progress and cannot be cancelled".to_string(),
                            });
                            Step::Poll
                        }
                    }
                    None => {
                        tracing::debug!("Login input closed");
                        inputs_open = false;
                        Step::Poll
                    }
                },
            };
        }
    }

    async fn poll(&self, flow: &mut LoginFlow) -> Step {
        match flow.on_tick(Instant::now()) {
            Step::Poll => {}
            other => return other,
        }
        let Some(session_id) = flow.session_id().map(str::to_string) else {
            return Step::Poll;
        };

        match self.api.status(&session_id).await {
            Ok(response) => {
                let step = flow.on_status(&response);
                if step == Step::Poll {
                    if let Some(message) = flow.message() {
                        self.emit(LoginEvent::Progress {
                            message: message.to_string(),
                        });
                    }
                }
                step
            }
            Err(e) => {
                tracing::warn!(error = %e, "Login status check failed");
                let step = flow.on_poll_error(&e);
                if step == Step::Poll {
                    if let Some(error) = flow.error() {
                        self.emit(LoginEvent::Error {
                            message: error.to_string(),
                        });
                    }
                }
                step
            }
        }
    }

    async fn verify(&self, flow: &mut LoginFlow, code: &str) -> Step {
        if !flow.submit_code(code) {
            return Step::Poll;
        }
        let Some(session_id) = flow.session_id().map(str::to_string) else {
            return Step::Poll;
        };

        match self.api.verify(&session_id, flow.code(), None).await {
            Ok(response) => flow.on_verify(&response, Instant::now()),
            Err(e) => {
                tracing::warn!(error = %e, "Login code verification failed");
                flow.on_verify_error(&e)
            }
        }
    }

    fn finish(&self, outcome: LoginOutcome) -> LoginOutcome {
        if outcome.is_success() {
            tracing::info!("Account login completed");
        } else {
            tracing::warn!(outcome = %outcome.message(), "Account login ended");
        }
        self.emit(LoginEvent::Finished(outcome.clone()));
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::dto::LoginResponse;
    use crate::api::{ApiError, ApiResult};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    enum Reply {
        Status(&'static str),
        Body(serde_json::Value),
        Fail(u16),
    }

    impl Reply {
        fn into_result(self) -> ApiResult<LoginResponse> {
            match self {
                Reply::Status(s) => Ok(serde_json::from_value(json!({"status": s})).unwrap()),
                Reply::Body(v) => Ok(serde_json::from_value(v).unwrap()),
                Reply::Fail(code) => Err(ApiError::from_status(code, "")),
            }
        }
    }

    /// Scripted backend; the last status reply repeats
    struct FakeApi {
        start: Mutex<Option<Reply>>,
        verify: Mutex<VecDeque<Reply>>,
        statuses: Mutex<VecDeque<Reply>>,
        last_status: Mutex<Option<serde_json::Value>>,
        status_calls: Mutex<u32>,
        verify_calls: Mutex<Vec<(String, Option<String>)>>,
    }

    impl FakeApi {
        fn new(start: Reply, statuses: Vec<Reply>) -> Self {
            Self {
                start: Mutex::new(Some(start)),
                verify: Mutex::new(VecDeque::new()),
                statuses: Mutex::new(statuses.into()),
                last_status: Mutex::new(None),
                status_calls: Mutex::new(0),
                verify_calls: Mutex::new(Vec::new()),
            }
        }

        fn with_verify(self, replies: Vec<Reply>) -> Self {
            *self.verify.lock().unwrap() = replies.into();
            self
        }

        fn status_calls(&self) -> u32 {
            *self.status_calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl<'a> LoginApi for &'a FakeApi {
        async fn start(&self, _request: &LoginStart) -> ApiResult<LoginResponse> {
            self.start
                .lock()
                .unwrap()
                .take()
                .expect("start called twice")
                .into_result()
        }

        async fn verify(
            &self,
            session_id: &str,
            code: Option<&str>,
            _password_2fa: Option<&str>,
        ) -> ApiResult<LoginResponse> {
            self.verify_calls
                .lock()
                .unwrap()
                .push((session_id.to_string(), code.map(str::to_string)));
            self.verify
                .lock()
                .unwrap()
                .pop_front()
                .map(Reply::into_result)
                .unwrap_or_else(|| Ok(LoginResponse::default()))
        }

        async fn status(&self, _session_id: &str) -> ApiResult<LoginResponse> {
            *self.status_calls.lock().unwrap() += 1;
            let mut queue = self.statuses.lock().unwrap();
            let reply = match queue.pop_front() {
                Some(Reply::Status(s)) => {
                    let body = json!({"status": s});
                    *self.last_status.lock().unwrap() = Some(body.clone());
                    Reply::Body(body)
                }
                Some(other) => other,
                None => Reply::Body(
                    self.last_status
                        .lock()
                        .unwrap()
                        .clone()
                        .unwrap_or_else(|| json!({"status": "processing"})),
                ),
            };
            reply.into_result()
        }
    }

    fn started() -> Reply {
        Reply::Body(json!({"status": "wait_code", "login_session_id": "abc"}))
    }

    fn request() -> LoginStart {
        LoginStart {
            phone_number: "+1 (555) 010-0000".into(),
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_code_then_done() {
        let api = FakeApi::new(started(), vec![]).with_verify(vec![Reply::Status("done")]);
        let (tx, rx) = mpsc::channel(4);
        let (events_tx, mut events) = mpsc::unbounded_channel();
        tx.send(LoginInput::Code(" 123456 ".into())).await.unwrap();

        let outcome = LoginDriver::new(&api, LoginPolicy::default())
            .with_events(events_tx)
            .run(request(), rx)
            .await;

        assert_eq!(outcome, LoginOutcome::Completed);
        assert!(outcome.needs_refresh());
        assert_eq!(
            api.verify_calls.lock().unwrap().as_slice(),
            &[("abc".to_string(), Some("123456".to_string()))]
        );
        assert_eq!(api.status_calls(), 0);

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        assert_eq!(
            seen.first(),
            Some(&LoginEvent::SessionStarted {
                session_id: "abc".into()
            })
        );
        assert!(seen
            .iter()
            .any(|e| matches!(e, LoginEvent::CodeRequested { .. })));
        assert_eq!(seen.last(), Some(&LoginEvent::Finished(LoginOutcome::Completed)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_stops_on_terminal_status() {
        let api = FakeApi::new(
            started(),
            vec![
                Reply::Status("wait_code"),
                Reply::Status("processing"),
                Reply::Status("processing"),
                Reply::Body(json!({"status": "failed", "error": "FLOOD_WAIT"})),
                Reply::Status("done"),
            ],
        );
        let (_tx, rx) = mpsc::channel(1);

        let outcome = LoginDriver::new(&api, LoginPolicy::default())
            .run(request(), rx)
            .await;

        assert_eq!(outcome, LoginOutcome::Failed("FLOOD_WAIT".into()));
        assert_eq!(api.status_calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_breaker_after_five_errors() {
        let api = FakeApi::new(
            started(),
            (0..6).map(|_| Reply::Fail(502)).collect(),
        );
        let (_tx, rx) = mpsc::channel(1);

        let outcome = LoginDriver::new(&api, LoginPolicy::default())
            .run(request(), rx)
            .await;

        assert!(matches!(outcome, LoginOutcome::TooManyErrors(_)));
        assert_eq!(api.status_calls(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_session_stops_polling() {
        let api = FakeApi::new(started(), vec![Reply::Status("processing"), Reply::Fail(404)]);
        let (_tx, rx) = mpsc::channel(1);

        let outcome = LoginDriver::new(&api, LoginPolicy::default())
            .run(request(), rx)
            .await;

        assert_eq!(outcome, LoginOutcome::SessionExpired);
        assert_eq!(api.status_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_error_stops_polling() {
        let api = FakeApi::new(
            started(),
            vec![Reply::Status("processing"), Reply::Fail(500), Reply::Status("done")],
        );
        let (_tx, rx) = mpsc::channel(1);

        let outcome = LoginDriver::new(&api, LoginPolicy::default())
            .run(request(), rx)
            .await;

        assert_eq!(outcome, LoginOutcome::ServerError);
        assert_eq!(api.status_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_code_is_not_verified() {
        let api = FakeApi::new(started(), vec![]).with_verify(vec![Reply::Status("done")]);
        let (tx, rx) = mpsc::channel(4);
        tx.send(LoginInput::Code("   ".into())).await.unwrap();
        tx.send(LoginInput::Code("4242".into())).await.unwrap();

        let outcome = LoginDriver::new(&api, LoginPolicy::default())
            .run(request(), rx)
            .await;

        assert_eq!(outcome, LoginOutcome::Completed);
        assert_eq!(
            api.verify_calls.lock().unwrap().as_slice(),
            &[("abc".to_string(), Some("4242".to_string()))]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_after_ten_minutes() {
        let api = FakeApi::new(started(), vec![Reply::Status("processing")]);
        let (_tx, rx) = mpsc::channel(1);
        let begun = Instant::now();

        let outcome = LoginDriver::new(&api, LoginPolicy::default())
            .run(request(), rx)
            .await;

        assert_eq!(outcome, LoginOutcome::TimedOut);
        let elapsed = begun.elapsed();
        assert!(elapsed >= Duration::from_secs(600));
        assert!(elapsed < Duration::from_secs(602));
        assert!(api.status_calls() >= 598);
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_factor_required() {
        let api = FakeApi::new(started(), vec![Reply::Status("wait_2fa")]);
        let (_tx, rx) = mpsc::channel(1);

        let outcome = LoginDriver::new(&api, LoginPolicy::default())
            .run(request(), rx)
            .await;

        assert!(matches!(outcome, LoginOutcome::NeedsPassword(_)));
        assert_eq!(api.status_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_waiting_for_code() {
        let api = FakeApi::new(started(), vec![Reply::Status("wait_code")]);
        let (tx, rx) = mpsc::channel(1);
        tx.send(LoginInput::Cancel).await.unwrap();

        let outcome = LoginDriver::new(&api, LoginPolicy::default())
            .run(request(), rx)
            .await;

        assert_eq!(outcome, LoginOutcome::Cancelled);
        assert_eq!(api.status_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_code_can_be_retried() {
        let api = FakeApi::new(started(), vec![Reply::Status("wait_code")])
            .with_verify(vec![Reply::Fail(400), Reply::Status("done")]);
        let (tx, rx) = mpsc::channel(4);
        tx.send(LoginInput::Code("000000".into())).await.unwrap();
        tx.send(LoginInput::Code("123456".into())).await.unwrap();

        let outcome = LoginDriver::new(&api, LoginPolicy::default())
            .run(request(), rx)
            .await;

        assert_eq!(outcome, LoginOutcome::Completed);
        let calls = api.verify_calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].1.as_deref(), Some("123456"));
    }

    #[tokio::test]
    async fn test_blank_phone_makes_no_calls() {
        let api = FakeApi::new(started(), vec![]);
        let (_tx, rx) = mpsc::channel(1);
        let outcome = LoginDriver::new(&api, LoginPolicy::default())
            .run(
                LoginStart {
                    phone_number: "  ".into(),
                    ..Default::default()
                },
                rx,
            )
            .await;
        assert!(matches!(outcome, LoginOutcome::Failed(_)));
        assert!(api.start.lock().unwrap().is_some());
    }
}
