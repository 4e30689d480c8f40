//! In-memory task store (non-persistent).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use super::{StoreError, TaskStore};
use crate::task::{now_string, Task, TaskEvent};

/// In-memory backend. Each task lives behind its own lock so appends on
/// different ids never contend; the outer map lock is held only long enough
/// to resolve the entry.
#[derive(Clone, Default)]
pub struct InMemoryTaskStore {
    tasks: Arc<RwLock<HashMap<String, Arc<Mutex<Task>>>>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn entry(&self, id: &str) -> Result<Arc<Mutex<Task>>, StoreError> {
        self.tasks
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn create(&self, task: Task) -> Result<(), StoreError> {
        let mut tasks = self.tasks.write().await;
        if tasks.contains_key(&task.id) {
            return Err(StoreError::DuplicateTask(task.id));
        }
        tasks.insert(task.id.clone(), Arc::new(Mutex::new(task)));
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Task, StoreError> {
        let entry = self.entry(id).await?;
        let task = entry.lock().await;
        Ok(task.clone())
    }

    async fn append_event(&self, event: &TaskEvent) -> Result<Task, StoreError> {
        let entry = self.entry(event.task_id()).await?;
        let mut task = entry.lock().await;
        match event {
            TaskEvent::Status {
                status, message, ..
            } => {
                if !task.status.can_transition_to(*status) {
                    return Err(StoreError::InvalidTransition {
                        task_id: task.id.clone(),
                        from: task.status,
                        to: *status,
                    });
                }
                task.status = *status;
                if let Some(message) = message {
                    task.status_message = Some(message.clone());
                }
            }
            TaskEvent::Message { message, .. } => {
                if task.status.is_terminal() {
                    return Err(StoreError::InvalidTransition {
                        task_id: task.id.clone(),
                        from: task.status,
                        to: task.status,
                    });
                }
                task.history.push(message.clone());
            }
            TaskEvent::Artifact { artifact, .. } => {
                if task.status.is_terminal() {
                    return Err(StoreError::InvalidTransition {
                        task_id: task.id.clone(),
                        from: task.status,
                        to: task.status,
                    });
                }
                task.artifacts.push(artifact.clone());
            }
        }
        task.updated_at = now_string();
        Ok(task.clone())
    }

    async fn list(&self, context_id: Option<&str>) -> Result<Vec<Task>, StoreError> {
        let entries: Vec<Arc<Mutex<Task>>> = self.tasks.read().await.values().cloned().collect();
        let mut tasks = Vec::with_capacity(entries.len());
        for entry in entries {
            let task = entry.lock().await;
            if context_id.is_none() || task.context_id.as_deref() == context_id {
                tasks.push(task.clone());
            }
        }
        tasks.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(tasks)
    }
}
