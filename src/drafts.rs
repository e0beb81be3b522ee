//! Task Drafts
//!
//! Client-side state for building a task in three stages:
//! 1. details: name, description and action
//! 2. posts: Telegram post links, reconciled against posts already known to the backend
//! 3. accounts: ACTIVE accounts picked by hand or at random
//!
//! Submitting creates any new posts in bulk, then the task itself.

use std::sync::LazyLock;

use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;
use thiserror::Error;

use crate::api::dto::{Account, Post, Task, TaskAction, TaskCreated};
use crate::api::{ApiError, ApiResult};
use crate::services::{AccountsService, PostFilter, PostsService, TasksService};

/// Accepted post link shape
pub const POST_URL_PATTERN: &str = r"^https://t\.me/[^\s]+$";

static POST_URL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(POST_URL_PATTERN).expect("Invalid post link regex"));

pub const FIRST_STAGE: u8 = 1;
pub const LAST_STAGE: u8 = 3;

#[derive(Error, Debug)]
pub enum DraftError {
    #[error("{0}")]
    Invalid(String),

    #[error("Failed to create posts: {}", .0.detail())]
    Posts(ApiError),

    #[error("Failed to create task: {}", .0.detail())]
    Task(ApiError),
}

fn invalid(msg: impl Into<String>) -> DraftError {
    DraftError::Invalid(msg.into())
}

pub fn is_valid_post_url(url: &str) -> bool {
    POST_URL_REGEX.is_match(url)
}

/// A post link staged in the draft
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedPost {
    pub message_link: String,
    /// Backend id when the link is already a known post
    pub post_id: Option<i64>,
}

impl StagedPost {
    pub fn is_existing(&self) -> bool {
        self.post_id.is_some()
    }
}

/// Result of adding several links at once
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkAdd {
    pub added: Vec<String>,
    pub duplicates: Vec<String>,
}

impl BulkAdd {
    pub fn duplicate_message(&self) -> Option<String> {
        if self.duplicates.is_empty() {
            None
        } else {
            Some(format!(
                "These URLs are already in the list: {}",
                self.duplicates.join(", ")
            ))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionMode {
    Manual,
    #[default]
    Count,
}

#[derive(Debug, Clone)]
pub struct TaskDraft {
    stage: u8,
    name: String,
    description: Option<String>,
    action: TaskAction,
    posts: Vec<StagedPost>,
    available_accounts: Vec<String>,
    selected_accounts: Vec<String>,
    mode: SelectionMode,
}

impl Default for TaskDraft {
    fn default() -> Self {
        Self {
            stage: FIRST_STAGE,
            name: String::new(),
            description: None,
            action: TaskAction::default(),
            posts: Vec::new(),
            available_accounts: Vec::new(),
            selected_accounts: Vec::new(),
            mode: SelectionMode::default(),
        }
    }
}

impl TaskDraft {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard everything and return to the first stage
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn stage(&self) -> u8 {
        self.stage
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn action(&self) -> &TaskAction {
        &self.action
    }

    pub fn posts(&self) -> &[StagedPost] {
        &self.posts
    }

    pub fn available_accounts(&self) -> &[String] {
        &self.available_accounts
    }

    pub fn selected_accounts(&self) -> &[String] {
        &self.selected_accounts
    }

    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    // ------------------------------------------------------------------
    // Stage 1
    // ------------------------------------------------------------------

    pub fn set_details(&mut self, name: &str, description: Option<&str>, action: TaskAction) {
        self.name = name.trim().to_string();
        self.description = description
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string);
        self.action = action;
    }

    pub fn validate_details(&self) -> Result<(), DraftError> {
        if self.name.trim().is_empty() {
            return Err(invalid("Task name is required"));
        }
        match &self.action {
            TaskAction::React { palette } if palette.trim().is_empty() => {
                Err(invalid("A palette is required for react tasks"))
            }
            TaskAction::Comment { content } if content.trim().is_empty() => {
                Err(invalid("Comment content is required for comment tasks"))
            }
            _ => Ok(()),
        }
    }

    /// Validate the current stage and move to the next one
    pub fn proceed(&mut self) -> Result<u8, DraftError> {
        match self.stage {
            1 => self.validate_details()?,
            2 => self.validate_posts()?,
            _ => return Err(invalid("Already at the last stage; submit the task")),
        }
        self.stage += 1;
        Ok(self.stage)
    }

    pub fn back(&mut self) -> u8 {
        if self.stage > FIRST_STAGE {
            self.stage -= 1;
        }
        self.stage
    }

    // ------------------------------------------------------------------
    // Stage 2
    // ------------------------------------------------------------------

    /// Stage one link locally, unreconciled
    pub fn add_post(&mut self, url: &str) -> Result<(), DraftError> {
        let url = url.trim();
        if !is_valid_post_url(url) {
            return Err(invalid("Invalid Telegram URL format"));
        }
        if self.has_post(url) {
            return Err(invalid("This post URL is already in the list"));
        }
        self.posts.push(StagedPost {
            message_link: url.to_string(),
            post_id: None,
        });
        Ok(())
    }

    /// Stage newline-separated links. Any invalid link rejects the whole
    /// batch; duplicates are skipped and reported.
    pub fn add_posts_bulk(&mut self, text: &str) -> Result<BulkAdd, DraftError> {
        let urls: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();

        let bad: Vec<&str> = urls
            .iter()
            .copied()
            .filter(|url| !is_valid_post_url(url))
            .collect();
        if !bad.is_empty() {
            return Err(invalid(format!("Invalid URLs: {}", bad.join(", "))));
        }

        let mut outcome = BulkAdd::default();
        for url in urls {
            if self.has_post(url) {
                outcome.duplicates.push(url.to_string());
            } else {
                self.posts.push(StagedPost {
                    message_link: url.to_string(),
                    post_id: None,
                });
                outcome.added.push(url.to_string());
            }
        }
        Ok(outcome)
    }

    /// Stage one link and look it up on the backend
    pub async fn stage_post(&mut self, posts: &PostsService, url: &str) -> Result<(), DraftError> {
        self.add_post(url)?;
        let url = url.trim();
        match posts.find_by_link(url).await {
            Ok(found) => self.mark_existing(url, found.as_ref()),
            Err(e) => {
                tracing::warn!(url, error = %e, "Post lookup failed; staging as new");
            }
        }
        Ok(())
    }

    /// Stage several links and reconcile them with a single listing
    pub async fn stage_posts_bulk(
        &mut self,
        posts: &PostsService,
        text: &str,
    ) -> Result<BulkAdd, DraftError> {
        let outcome = self.add_posts_bulk(text)?;
        if outcome.added.is_empty() {
            return Ok(outcome);
        }

        match posts.list(&PostFilter::default()).await {
            Ok(known) => {
                for url in &outcome.added {
                    let found = known.iter().find(|p| &p.message_link == url);
                    self.mark_existing(url, found);
                }
            }
            Err(e) => {
                tracing::warn!(count = outcome.added.len(), error = %e, "Post lookup failed; staging as new");
            }
        }
        Ok(outcome)
    }

    pub fn remove_post(&mut self, url: &str) -> bool {
        let before = self.posts.len();
        self.posts.retain(|p| p.message_link != url.trim());
        self.posts.len() != before
    }

    pub fn validate_posts(&self) -> Result<(), DraftError> {
        if self.posts.is_empty() {
            Err(invalid("Please select at least one post before proceeding"))
        } else {
            Ok(())
        }
    }

    fn has_post(&self, url: &str) -> bool {
        self.posts.iter().any(|p| p.message_link == url)
    }

    fn mark_existing(&mut self, url: &str, found: Option<&Post>) {
        let Some(post_id) = found.and_then(|p| p.post_id) else {
            return;
        };
        if let Some(staged) = self.posts.iter_mut().find(|p| p.message_link == url) {
            staged.post_id = Some(post_id);
        }
    }

    // ------------------------------------------------------------------
    // Stage 3
    // ------------------------------------------------------------------

    /// Replace the selectable accounts with the ACTIVE ones from `accounts`,
    /// pruning any selection that is no longer selectable
    pub fn set_available_accounts(&mut self, accounts: &[Account]) {
        self.available_accounts = accounts
            .iter()
            .filter(|a| a.is_active())
            .map(|a| a.phone_number.clone())
            .collect();

        let available = &self.available_accounts;
        let before = self.selected_accounts.len();
        self.selected_accounts.retain(|phone| available.contains(phone));
        if self.selected_accounts.len() != before {
            tracing::debug!(
                pruned = before - self.selected_accounts.len(),
                "Dropped accounts that are no longer ACTIVE"
            );
        }
    }

    pub async fn load_accounts(&mut self, accounts: &AccountsService) -> ApiResult<()> {
        let all = accounts.list(None).await?;
        self.set_available_accounts(&all);
        Ok(())
    }

    pub fn set_mode(&mut self, mode: SelectionMode) {
        if self.mode != mode {
            self.mode = mode;
            self.selected_accounts.clear();
        }
    }

    /// Flip one account in or out of the selection; returns whether it is
    /// now selected
    pub fn toggle_account(&mut self, phone_number: &str) -> Result<bool, DraftError> {
        if !self.available_accounts.iter().any(|p| p == phone_number) {
            return Err(invalid(format!(
                "Account {} is not ACTIVE and cannot be selected",
                phone_number
            )));
        }
        if let Some(index) = self.selected_accounts.iter().position(|p| p == phone_number) {
            self.selected_accounts.remove(index);
            Ok(false)
        } else {
            self.selected_accounts.push(phone_number.to_string());
            Ok(true)
        }
    }

    /// Pick `count` accounts at random; the count is clamped to what is
    /// available. Returns the number selected.
    pub fn select_random<R: Rng + ?Sized>(&mut self, count: usize, rng: &mut R) -> usize {
        let count = count.min(self.available_accounts.len());
        let mut pool = self.available_accounts.clone();
        pool.shuffle(rng);
        pool.truncate(count);
        self.selected_accounts = pool;
        count
    }

    pub fn validate_accounts(&self) -> Result<(), DraftError> {
        if self.selected_accounts.is_empty() {
            Err(invalid(
                "Only ACTIVE accounts can be used to create a task. Please select at least one ACTIVE account.",
            ))
        } else {
            Ok(())
        }
    }

    // ------------------------------------------------------------------
    // Submission
    // ------------------------------------------------------------------

    /// Create new posts, then the task. The draft is reset on success and
    /// kept untouched on failure.
    pub async fn submit(
        &mut self,
        posts: &PostsService,
        tasks: &TasksService,
    ) -> Result<TaskCreated, DraftError> {
        self.validate_details()?;
        if self.posts.is_empty() {
            return Err(invalid("No posts selected. Please go back and add posts."));
        }
        let available = &self.available_accounts;
        let accounts: Vec<String> = self
            .selected_accounts
            .iter()
            .filter(|phone| available.contains(phone))
            .cloned()
            .collect();
        if accounts.is_empty() {
            return Err(invalid(
                "Only ACTIVE accounts can be used to create a task. Please select at least one ACTIVE account.",
            ));
        }

        let new_links: Vec<String> = self
            .posts
            .iter()
            .filter(|p| !p.is_existing())
            .map(|p| p.message_link.clone())
            .collect();

        if !new_links.is_empty() {
            let response = posts
                .bulk_create(&new_links)
                .await
                .map_err(DraftError::Posts)?;
            // Results follow request order
            let mut created = 0;
            for (link, result) in new_links.iter().zip(&response.results) {
                let Some(post_id) = result.post_id.filter(|_| result.is_success()) else {
                    continue;
                };
                if let Some(staged) = self.posts.iter_mut().find(|p| &p.message_link == link) {
                    staged.post_id = Some(post_id);
                    created += 1;
                }
            }
            if created < new_links.len() {
                tracing::warn!(
                    requested = new_links.len(),
                    created,
                    "Some posts could not be created"
                );
            }
        }

        let post_ids: Vec<i64> = self.posts.iter().filter_map(|p| p.post_id).collect();
        if post_ids.is_empty() {
            return Err(invalid("None of the posts could be created; the task was not submitted"));
        }

        let task = Task {
            task_id: None,
            name: self.name.trim().to_string(),
            description: self.description.clone(),
            post_ids,
            accounts,
            action: self.action.clone(),
            status: None,
            created_at: None,
            updated_at: None,
        };

        let created = tasks.create(&task).await.map_err(DraftError::Task)?;
        tracing::info!(task_id = created.task_id, name = %task.name, "Task created");
        self.reset();
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::MockBackend;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;

    fn account(phone: &str, status: &str) -> Account {
        serde_json::from_value(json!({"phone_number": phone, "status": status})).unwrap()
    }

    fn ready_draft() -> TaskDraft {
        let mut draft = TaskDraft::new();
        draft.set_details("Morning likes", Some("  "), TaskAction::default());
        draft.set_available_accounts(&[
            account("+100", "ACTIVE"),
            account("+200", "ACTIVE"),
            account("+300", "BANNED"),
        ]);
        draft.set_mode(SelectionMode::Manual);
        draft.toggle_account("+100").unwrap();
        draft
    }

    #[test]
    fn test_details_validation() {
        let mut draft = TaskDraft::new();
        assert_eq!(draft.action(), &TaskAction::default());
        assert!(matches!(draft.proceed(), Err(DraftError::Invalid(_))));
        assert_eq!(draft.stage(), 1);

        draft.set_details("Campaign", None, TaskAction::React { palette: " ".into() });
        assert!(draft.validate_details().is_err());

        draft.set_details("Campaign", None, TaskAction::Comment { content: "".into() });
        assert!(draft.validate_details().is_err());

        draft.set_details("Campaign", None, TaskAction::Comment { content: "Nice".into() });
        assert_eq!(draft.proceed().unwrap(), 2);

        let err = draft.proceed().unwrap_err();
        assert_eq!(err.to_string(), "Please select at least one post before proceeding");

        draft.add_post("https://t.me/chan/1").unwrap();
        assert_eq!(draft.proceed().unwrap(), 3);
        assert!(draft.proceed().is_err());
        assert_eq!(draft.back(), 2);
    }

    #[test]
    fn test_add_post_rules() {
        let mut draft = TaskDraft::new();
        let err = draft.add_post("http://t.me/chan/1").unwrap_err();
        assert_eq!(err.to_string(), "Invalid Telegram URL format");
        assert!(draft.add_post("https://t.me/chan 1").is_err());

        draft.add_post(" https://t.me/chan/1 ").unwrap();
        let err = draft.add_post("https://t.me/chan/1").unwrap_err();
        assert_eq!(err.to_string(), "This post URL is already in the list");
        assert_eq!(draft.posts().len(), 1);

        assert!(draft.remove_post("https://t.me/chan/1"));
        assert!(!draft.remove_post("https://t.me/chan/1"));
    }

    #[test]
    fn test_bulk_add() {
        let mut draft = TaskDraft::new();
        draft.add_post("https://t.me/chan/1").unwrap();

        let err = draft
            .add_posts_bulk("https://t.me/chan/2\nnot-a-url\n")
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid URLs: not-a-url");
        assert_eq!(draft.posts().len(), 1);

        let outcome = draft
            .add_posts_bulk("https://t.me/chan/1\r\n\n  https://t.me/chan/2  \nhttps://t.me/chan/3")
            .unwrap();
        assert_eq!(outcome.added, vec!["https://t.me/chan/2", "https://t.me/chan/3"]);
        assert_eq!(
            outcome.duplicate_message().as_deref(),
            Some("These URLs are already in the list: https://t.me/chan/1")
        );
        assert_eq!(draft.posts().len(), 3);
    }

    #[test]
    fn test_account_selection() {
        let mut draft = TaskDraft::new();
        draft.set_available_accounts(&[
            account("+100", "ACTIVE"),
            account("+200", "ACTIVE"),
            account("+300", "NEW"),
        ]);
        assert_eq!(draft.available_accounts(), &["+100", "+200"]);
        assert_eq!(draft.mode(), SelectionMode::Count);

        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(draft.select_random(10, &mut rng), 2);
        assert_eq!(draft.selected_accounts().len(), 2);

        draft.set_mode(SelectionMode::Manual);
        assert!(draft.selected_accounts().is_empty());

        assert!(draft.toggle_account("+300").is_err());
        assert!(draft.toggle_account("+200").unwrap());
        assert!(draft.toggle_account("+100").unwrap());
        assert!(!draft.toggle_account("+200").unwrap());
        assert_eq!(draft.selected_accounts(), &["+100"]);

        // +100 was banned since the list was loaded
        draft.set_available_accounts(&[account("+100", "BANNED"), account("+200", "ACTIVE")]);
        assert!(draft.selected_accounts().is_empty());
        assert!(draft.validate_accounts().is_err());
    }

    #[tokio::test]
    async fn test_staging_reconciles_with_backend() {
        let mock = MockBackend::start().await;
        mock.respond_seq(
            "GET",
            "/posts",
            vec![
                (200, json!([{"post_id": 7, "message_link": "https://t.me/chan/1"}])),
                (500, json!({"detail": "db down"})),
            ],
        );
        let posts = PostsService::new(mock.client());
        let mut draft = TaskDraft::new();

        draft.stage_post(&posts, "https://t.me/chan/1").await.unwrap();
        assert_eq!(draft.posts()[0].post_id, Some(7));

        // Lookup failure stages the post as new
        draft.stage_post(&posts, "https://t.me/chan/2").await.unwrap();
        assert!(!draft.posts()[1].is_existing());
    }

    #[tokio::test]
    async fn test_bulk_staging_lists_once() {
        let mock = MockBackend::start().await;
        mock.respond(
            "GET",
            "/posts",
            200,
            json!([{"post_id": 9, "message_link": "https://t.me/chan/2"}]),
        );
        let posts = PostsService::new(mock.client());
        let mut draft = TaskDraft::new();

        draft
            .stage_posts_bulk(&posts, "https://t.me/chan/1\nhttps://t.me/chan/2")
            .await
            .unwrap();
        assert_eq!(mock.requests_to("GET", "/posts").len(), 1);
        assert_eq!(draft.posts()[0].post_id, None);
        assert_eq!(draft.posts()[1].post_id, Some(9));
    }

    #[tokio::test]
    async fn test_submit_creates_posts_then_task() {
        let mock = MockBackend::start().await;
        mock.respond(
            "POST",
            "/posts/bulk",
            200,
            json!({
                "message": "done",
                "results": [
                    {"status": "success", "post_id": 11},
                    {"status": "error", "error": "bad link"}
                ]
            }),
        );
        mock.respond("POST", "/tasks", 200, json!({"message": "ok", "task_id": 3}));
        let client = mock.client();
        let posts = PostsService::new(client.clone());
        let tasks = TasksService::new(client);

        let mut draft = ready_draft();
        draft.add_post("https://t.me/chan/1").unwrap();
        draft.add_post("https://t.me/chan/2").unwrap();
        draft.add_post("https://t.me/chan/3").unwrap();
        draft.mark_existing(
            "https://t.me/chan/1",
            Some(&serde_json::from_value(json!({"post_id": 7, "message_link": "https://t.me/chan/1"})).unwrap()),
        );

        let created = draft.submit(&posts, &tasks).await.unwrap();
        assert_eq!(created.task_id, 3);

        let bulk = &mock.requests_to("POST", "/posts/bulk")[0];
        assert_eq!(
            bulk.json(),
            json!([
                {"message_link": "https://t.me/chan/2"},
                {"message_link": "https://t.me/chan/3"}
            ])
        );

        let task = mock.requests_to("POST", "/tasks")[0].json();
        assert_eq!(task["name"], "Morning likes");
        assert_eq!(task["post_ids"], json!([7, 11]));
        assert_eq!(task["accounts"], json!(["+100"]));
        assert_eq!(task["action"], json!({"type": "react", "palette": "positive"}));
        assert!(task.get("description").is_none());

        // Reset after success
        assert_eq!(draft.stage(), 1);
        assert!(draft.posts().is_empty());
        assert!(draft.name().is_empty());
    }

    #[tokio::test]
    async fn test_failed_submit_keeps_draft() {
        let mock = MockBackend::start().await;
        mock.respond("POST", "/tasks", 400, json!({"detail": "Palette not found"}));
        let client = mock.client();
        let posts = PostsService::new(client.clone());
        let tasks = TasksService::new(client);

        let mut draft = ready_draft();
        draft.add_post("https://t.me/chan/1").unwrap();
        draft.mark_existing(
            "https://t.me/chan/1",
            Some(&serde_json::from_value(json!({"post_id": 7, "message_link": "https://t.me/chan/1"})).unwrap()),
        );

        let err = draft.submit(&posts, &tasks).await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to create task: Palette not found");
        assert!(mock.requests_to("POST", "/posts/bulk").is_empty());
        assert_eq!(draft.name(), "Morning likes");
        assert_eq!(draft.posts().len(), 1);
    }

    #[tokio::test]
    async fn test_retry_after_failed_task_reuses_created_posts() {
        let mock = MockBackend::start().await;
        mock.respond_seq(
            "POST",
            "/posts/bulk",
            vec![
                (200, json!({"results": [{"status": "success", "post_id": 11}]})),
                (200, json!({"results": [{"status": "error", "error": "Post already exists"}]})),
            ],
        );
        mock.respond_seq(
            "POST",
            "/tasks",
            vec![
                (500, json!({"detail": "db down"})),
                (200, json!({"message": "ok", "task_id": 4})),
            ],
        );
        let client = mock.client();
        let posts = PostsService::new(client.clone());
        let tasks = TasksService::new(client);

        let mut draft = ready_draft();
        draft.add_post("https://t.me/chan/1").unwrap();

        assert!(matches!(draft.submit(&posts, &tasks).await, Err(DraftError::Task(_))));
        assert_eq!(draft.posts()[0].post_id, Some(11));

        let created = draft.submit(&posts, &tasks).await.unwrap();
        assert_eq!(created.task_id, 4);
        assert_eq!(mock.requests_to("POST", "/posts/bulk").len(), 1);
        let task = mock.requests_to("POST", "/tasks")[1].json();
        assert_eq!(task["post_ids"], json!([11]));
    }

    #[tokio::test]
    async fn test_submit_without_any_created_post_is_rejected() {
        let mock = MockBackend::start().await;
        mock.respond(
            "POST",
            "/posts/bulk",
            200,
            json!({"results": [{"status": "error", "error": "bad link"}]}),
        );
        let client = mock.client();
        let posts = PostsService::new(client.clone());
        let tasks = TasksService::new(client);

        let mut draft = ready_draft();
        draft.add_post("https://t.me/chan/1").unwrap();

        assert!(matches!(draft.submit(&posts, &tasks).await, Err(DraftError::Invalid(_))));
        assert!(mock.requests_to("POST", "/tasks").is_empty());
        assert_eq!(draft.name(), "Morning likes");
    }
}
