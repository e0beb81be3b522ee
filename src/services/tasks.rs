//! Tasks Service
//!
//! Task CRUD, execution control, runs and reports.

use crate::api::dto::{
    AllRuns, MessageResponse, RunsDeleted, Task, TaskCreated, TaskReport, TaskRuns, TaskStatus,
    TaskStatusResponse, TaskUpdate,
};
use crate::api::{ApiClient, ApiResult, Query};

/// Filters for listing tasks
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub task_id: Option<i64>,
    pub status: Option<TaskStatus>,
    pub name: Option<String>,
}

/// Report query; `report_type` defaults to `all`
#[derive(Debug, Clone)]
pub struct ReportQuery {
    pub report_type: String,
    pub run_id: Option<String>,
}

impl Default for ReportQuery {
    fn default() -> Self {
        Self {
            report_type: "all".to_string(),
            run_id: None,
        }
    }
}

#[derive(Clone)]
pub struct TasksService {
    client: ApiClient,
}

impl TasksService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn list(&self, filter: &TaskFilter) -> ApiResult<Vec<Task>> {
        let mut query = Query::new();
        if let Some(id) = filter.task_id {
            query.push(("task_id", id.to_string()));
        }
        if let Some(status) = filter.status {
            query.push(("status", status.to_string()));
        }
        if let Some(name) = filter.name.as_ref().filter(|n| !n.is_empty()) {
            query.push(("name", name.clone()));
        }
        self.client.get("/tasks", &query).await
    }

    pub async fn get(&self, task_id: i64) -> ApiResult<Task> {
        self.client
            .get(&format!("/tasks/{}", task_id), &Query::new())
            .await
    }

    pub async fn create(&self, task: &Task) -> ApiResult<TaskCreated> {
        self.client.post_json("/tasks", task).await
    }

    pub async fn update(&self, task_id: i64, update: &TaskUpdate) -> ApiResult<MessageResponse> {
        self.client
            .put_json(&format!("/tasks/{}", task_id), update)
            .await
    }

    pub async fn delete(&self, task_id: i64) -> ApiResult<MessageResponse> {
        self.client.delete(&format!("/tasks/{}", task_id)).await
    }

    pub async fn start(&self, task_id: i64) -> ApiResult<MessageResponse> {
        self.control(task_id, "start").await
    }

    pub async fn pause(&self, task_id: i64) -> ApiResult<MessageResponse> {
        self.control(task_id, "pause").await
    }

    pub async fn resume(&self, task_id: i64) -> ApiResult<MessageResponse> {
        self.control(task_id, "resume").await
    }

    async fn control(&self, task_id: i64, action: &str) -> ApiResult<MessageResponse> {
        tracing::info!(task_id, action, "Task control");
        self.client
            .post_json(
                &format!("/tasks/{}/{}", task_id, action),
                &serde_json::json!({}),
            )
            .await
    }

    pub async fn status(&self, task_id: i64) -> ApiResult<TaskStatusResponse> {
        self.client
            .get(&format!("/tasks/{}/status", task_id), &Query::new())
            .await
    }

    pub async fn runs(&self, task_id: i64) -> ApiResult<TaskRuns> {
        self.client
            .get(&format!("/tasks/{}/runs", task_id), &Query::new())
            .await
    }

    pub async fn delete_run(&self, task_id: i64, run_id: &str) -> ApiResult<RunsDeleted> {
        self.client
            .delete(&format!(
                "/tasks/{}/runs/{}",
                task_id,
                ApiClient::segment(run_id)
            ))
            .await
    }

    pub async fn delete_all_runs(&self, task_id: i64) -> ApiResult<RunsDeleted> {
        self.client
            .delete(&format!("/tasks/{}/runs", task_id))
            .await
    }

    /// Runs across all tasks
    pub async fn all_runs(&self) -> ApiResult<AllRuns> {
        self.client.get("/runs", &Query::new()).await
    }

    /// Task-level report, or run-level when `run_id` is set
    pub async fn report(&self, task_id: i64, query: &ReportQuery) -> ApiResult<TaskReport> {
        let path = match &query.run_id {
            Some(run_id) => format!(
                "/tasks/{}/runs/{}/report",
                task_id,
                ApiClient::segment(run_id)
            ),
            None => format!("/tasks/{}/report", task_id),
        };
        let params: Query = vec![("report_type", query.report_type.clone())];
        self.client.get(&path, &params).await
    }
}
