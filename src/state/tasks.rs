//! Cached task list for the dashboard.
//!
//! Mutations never patch the cache locally: each successful create, update,
//! delete, or completion toggle is followed by a full refetch, so the list
//! always mirrors what the backend returned last. An `Auth` rejection from
//! any task call hands over to the session's forced invalidation.

use std::sync::Arc;

use tokio::sync::watch;

use super::session::SessionController;
use crate::net::error::ApiError;
use crate::net::tasks::TaskApi;
use crate::net::types::{Task, TaskDraft};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TaskListState {
    pub tasks: Vec<Task>,
    /// `false` until the first successful fetch.
    pub loaded: bool,
}

impl TaskListState {
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.tasks.iter().filter(|t| !t.completed).count()
    }

    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.completed).count()
    }

    #[must_use]
    pub fn find(&self, id: i64) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }
}

pub struct TaskList {
    api: Arc<dyn TaskApi>,
    session: Arc<SessionController>,
    state: watch::Sender<TaskListState>,
}

impl TaskList {
    #[must_use]
    pub fn new(api: Arc<dyn TaskApi>, session: Arc<SessionController>) -> Self {
        let (state, _) = watch::channel(TaskListState::default());
        Self { api, session, state }
    }

    #[must_use]
    pub fn snapshot(&self) -> TaskListState {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<TaskListState> {
        self.state.subscribe()
    }

    /// Fetch the full list and replace the cache.
    ///
    /// # Errors
    ///
    /// Returns the API error; the cache keeps its previous contents.
    pub async fn refresh(&self) -> Result<Vec<Task>, ApiError> {
        let tasks = self.guard(self.api.list_tasks().await)?;
        tracing::debug!(count = tasks.len(), "task list refreshed");
        self.state.send_replace(TaskListState { tasks: tasks.clone(), loaded: true });
        Ok(tasks)
    }

    /// Fetch a single task without touching the cache.
    ///
    /// # Errors
    ///
    /// Returns the API error (`NotFound` for tasks owned by someone else).
    pub async fn get(&self, id: i64) -> Result<Task, ApiError> {
        self.guard(self.api.get_task(id).await)
    }

    /// # Errors
    ///
    /// Returns the API error from the create call or the follow-up refetch.
    pub async fn create(&self, draft: &TaskDraft) -> Result<Task, ApiError> {
        let task = self.guard(self.api.create_task(draft).await)?;
        tracing::info!(task_id = task.id, "task created");
        self.refresh().await?;
        Ok(task)
    }

    /// # Errors
    ///
    /// Returns the API error from the update call or the follow-up refetch.
    pub async fn update(&self, id: i64, draft: &TaskDraft) -> Result<Task, ApiError> {
        let task = self.guard(self.api.update_task(id, draft).await)?;
        tracing::info!(task_id = id, "task updated");
        self.refresh().await?;
        Ok(task)
    }

    /// # Errors
    ///
    /// Returns the API error from the delete call or the follow-up refetch.
    pub async fn delete(&self, id: i64) -> Result<(), ApiError> {
        self.guard(self.api.delete_task(id).await)?;
        tracing::info!(task_id = id, "task deleted");
        self.refresh().await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns the API error from the toggle call or the follow-up refetch.
    pub async fn set_completed(&self, id: i64, completed: bool) -> Result<Task, ApiError> {
        let task = self.guard(self.api.set_completed(id, completed).await)?;
        tracing::info!(task_id = id, completed, "task completion changed");
        self.refresh().await?;
        Ok(task)
    }

    fn guard<T>(&self, result: Result<T, ApiError>) -> Result<T, ApiError> {
        if let Err(err) = &result {
            if err.is_auth_error() {
                self.session.invalidate();
                self.state.send_replace(TaskListState::default());
            }
        }
        result
    }
}

#[cfg(test)]
#[path = "tasks_test.rs"]
mod tests;
