//! Task CRUD endpoints. All of them require a bearer token.

use super::client::ApiClient;
use super::error::ApiError;
use super::types::{CompletionUpdate, Task, TaskDraft};

#[async_trait::async_trait]
pub trait TaskApi: Send + Sync {
    async fn list_tasks(&self) -> Result<Vec<Task>, ApiError>;
    async fn create_task(&self, draft: &TaskDraft) -> Result<Task, ApiError>;
    async fn get_task(&self, id: i64) -> Result<Task, ApiError>;
    /// Replace title and description. Completion is changed with [`TaskApi::set_completed`].
    async fn update_task(&self, id: i64, draft: &TaskDraft) -> Result<Task, ApiError>;
    async fn delete_task(&self, id: i64) -> Result<(), ApiError>;
    async fn set_completed(&self, id: i64, completed: bool) -> Result<Task, ApiError>;
}

#[async_trait::async_trait]
impl TaskApi for ApiClient {
    async fn list_tasks(&self) -> Result<Vec<Task>, ApiError> {
        self.get("/api/tasks").await
    }

    async fn create_task(&self, draft: &TaskDraft) -> Result<Task, ApiError> {
        self.post("/api/tasks", draft).await
    }

    async fn get_task(&self, id: i64) -> Result<Task, ApiError> {
        self.get(&format!("/api/tasks/{id}")).await
    }

    async fn update_task(&self, id: i64, draft: &TaskDraft) -> Result<Task, ApiError> {
        self.put(&format!("/api/tasks/{id}"), draft).await
    }

    async fn delete_task(&self, id: i64) -> Result<(), ApiError> {
        self.delete(&format!("/api/tasks/{id}")).await
    }

    async fn set_completed(&self, id: i64, completed: bool) -> Result<Task, ApiError> {
        self.patch(&format!("/api/tasks/{id}/complete"), &CompletionUpdate { completed })
            .await
    }
}
