//! Task storage with pluggable backends.
//!
//! The store is the single source of truth for task state. All mutation goes
//! through [`TaskStore::append_event`], which is where the lifecycle state
//! machine is enforced: an event implying an unreachable status is rejected
//! before any part of it is applied.

mod memory;

pub use memory::InMemoryTaskStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::task::{Task, TaskEvent, TaskStatus};

/// Errors surfaced by task store operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("task {0} not found")]
    NotFound(String),

    #[error("task {0} already exists")]
    DuplicateTask(String),

    #[error("invalid transition for task {task_id}: {from} -> {to}")]
    InvalidTransition {
        task_id: String,
        from: TaskStatus,
        to: TaskStatus,
    },
}

/// Task store trait - implemented by all storage backends.
///
/// Mutating calls are linearizable per task id: two concurrent
/// `append_event` calls for the same task serialize, never interleave.
/// Calls for different ids must not block one another.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Insert a new task. Fails if the id is already taken.
    async fn create(&self, task: Task) -> Result<(), StoreError>;

    /// Get a task snapshot by id.
    async fn get(&self, id: &str) -> Result<Task, StoreError>;

    /// Apply an event's effect (status change, history append, artifact
    /// append) atomically and return the updated snapshot.
    async fn append_event(&self, event: &TaskEvent) -> Result<Task, StoreError>;

    /// List tasks, optionally filtered by context id, newest first.
    async fn list(&self, context_id: Option<&str>) -> Result<Vec<Task>, StoreError>;
}
