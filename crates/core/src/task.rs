//! Task tracking: the external record the planning middleware reconciles
//! the model's todo list against.
//!
//! Implementations: in-memory (below). A durable tracker implements the same
//! trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::TaskError;
use crate::state::TodoStatus;

/// A tracked task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub title: String,
    pub status: TodoStatus,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait TaskTracker: Send + Sync {
    /// Create a task and assign it an identifier.
    async fn create(
        &self,
        title: &str,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Result<TaskRecord, TaskError>;

    /// Update the status of an existing task.
    async fn set_status(&self, id: &str, status: TodoStatus) -> Result<(), TaskError>;

    /// Look a task up by identifier.
    async fn get(&self, id: &str) -> Result<Option<TaskRecord>, TaskError>;
}

/// A task tracker that keeps records in a map. Useful for tests and for
/// agents whose plans don't need to outlive the process.
#[derive(Clone, Default)]
pub struct InMemoryTaskTracker {
    tasks: Arc<RwLock<HashMap<String, TaskRecord>>>,
}

impl InMemoryTaskTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.tasks.read().await.len()
    }
}

#[async_trait]
impl TaskTracker for InMemoryTaskTracker {
    async fn create(
        &self,
        title: &str,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Result<TaskRecord, TaskError> {
        let now = Utc::now();
        let record = TaskRecord {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            status: TodoStatus::Pending,
            metadata,
            created_at: now,
            updated_at: now,
        };
        self.tasks
            .write()
            .await
            .insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn set_status(&self, id: &str, status: TodoStatus) -> Result<(), TaskError> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(id)
            .ok_or_else(|| TaskError::NotFound(id.to_string()))?;
        task.status = status;
        task.updated_at = Utc::now();
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<TaskRecord>, TaskError> {
        Ok(self.tasks.read().await.get(id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_assigns_distinct_ids() {
        let tracker = InMemoryTaskTracker::new();
        let a = tracker.create("a", Default::default()).await.unwrap();
        let b = tracker.create("b", Default::default()).await.unwrap();
        assert!(!a.id.is_empty());
        assert_ne!(a.id, b.id);
        assert_eq!(tracker.count().await, 2);
    }

    #[tokio::test]
    async fn set_status_updates_record() {
        let tracker = InMemoryTaskTracker::new();
        let task = tracker.create("a", Default::default()).await.unwrap();
        tracker
            .set_status(&task.id, TodoStatus::Completed)
            .await
            .unwrap();
        let stored = tracker.get(&task.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TodoStatus::Completed);
    }

    #[tokio::test]
    async fn set_status_on_unknown_id_fails() {
        let tracker = InMemoryTaskTracker::new();
        let err = tracker
            .set_status("nope", TodoStatus::InProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::NotFound(_)));
    }
}
