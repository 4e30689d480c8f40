//! Task data model and lifecycle state machine.
//!
//! A task is the unit of work tracked from submission to a terminal outcome.
//! Executors report progress as [`TaskEvent`]s; the store applies each event
//! to the task record and the fan-out replicates it to subscribers.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Get current timestamp as RFC3339 string.
pub fn now_string() -> String {
    Utc::now().to_rfc3339()
}

/// Task status.
///
/// Transitions follow `Submitted → Working → {InputRequired → Working}* →
/// {Completed | Failed | Canceled}`. Terminal states are immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Task accepted, executor not yet started
    Submitted,
    /// Executor is running
    Working,
    /// Executor paused waiting for more caller input
    InputRequired,
    /// Task finished successfully
    Completed,
    /// Task was canceled before finishing
    Canceled,
    /// Task failed with an error
    Failed,
}

impl TaskStatus {
    /// Whether no further transition is permitted from this status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Canceled | TaskStatus::Failed
        )
    }

    /// Whether a transition from `self` to `next` is permitted.
    ///
    /// Repeating a non-terminal status is allowed (progress refresh).
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if *self == next {
            return true;
        }
        match self {
            TaskStatus::Submitted => matches!(
                next,
                TaskStatus::Working | TaskStatus::Canceled | TaskStatus::Failed
            ),
            TaskStatus::Working => matches!(
                next,
                TaskStatus::InputRequired
                    | TaskStatus::Completed
                    | TaskStatus::Canceled
                    | TaskStatus::Failed
            ),
            TaskStatus::InputRequired => matches!(
                next,
                TaskStatus::Working | TaskStatus::Canceled | TaskStatus::Failed
            ),
            _ => false,
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Submitted => "submitted",
            TaskStatus::Working => "working",
            TaskStatus::InputRequired => "input_required",
            TaskStatus::Completed => "completed",
            TaskStatus::Canceled => "canceled",
            TaskStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Agent,
}

/// A single exchange in the task history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn agent(content: impl Into<String>) -> Self {
        Self {
            role: Role::Agent,
            content: content.into(),
        }
    }
}

/// An output chunk produced by the executor.
///
/// Artifacts accumulate in emission order; a task streaming a large result
/// appends one artifact per chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    /// Display name for the artifact
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Artifact payload
    pub content: String,
}

/// A task tracked through its lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Opaque unique identifier, caller- or server-assigned
    pub id: String,
    /// Groups related tasks (a conversation)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
    pub status: TaskStatus,
    /// Message attached to the most recent status change
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_message: Option<Message>,
    /// Ordered caller/agent exchanges, append-only
    pub history: Vec<Message>,
    /// Ordered output chunks, append-only
    pub artifacts: Vec<Artifact>,
    pub created_at: String,
    pub updated_at: String,
}

impl Task {
    /// Create a new task in `Submitted` state with an initial user message.
    pub fn new(id: String, context_id: Option<String>, message: Message) -> Self {
        let now = now_string();
        Self {
            id,
            context_id,
            status: TaskStatus::Submitted,
            status_message: None,
            history: vec![message],
            artifacts: Vec::new(),
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// An update emitted by the executor for a task.
///
/// Events for a given task are strictly ordered; the store applies each one
/// atomically and subscribers observe them in emission order. A `Status`
/// event carrying a terminal status is the last event of the task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskEvent {
    /// Status change, optionally carrying an explanatory message
    Status {
        task_id: String,
        status: TaskStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<Message>,
    },
    /// An exchange appended to the task history
    Message { task_id: String, message: Message },
    /// An output chunk appended to the task artifacts
    Artifact { task_id: String, artifact: Artifact },
}

impl TaskEvent {
    pub fn status(task_id: impl Into<String>, status: TaskStatus) -> Self {
        TaskEvent::Status {
            task_id: task_id.into(),
            status,
            message: None,
        }
    }

    pub fn status_with_message(
        task_id: impl Into<String>,
        status: TaskStatus,
        message: Message,
    ) -> Self {
        TaskEvent::Status {
            task_id: task_id.into(),
            status,
            message: Some(message),
        }
    }

    pub fn message(task_id: impl Into<String>, message: Message) -> Self {
        TaskEvent::Message {
            task_id: task_id.into(),
            message,
        }
    }

    pub fn artifact(task_id: impl Into<String>, artifact: Artifact) -> Self {
        TaskEvent::Artifact {
            task_id: task_id.into(),
            artifact,
        }
    }

    /// Id of the task this event belongs to.
    pub fn task_id(&self) -> &str {
        match self {
            TaskEvent::Status { task_id, .. }
            | TaskEvent::Message { task_id, .. }
            | TaskEvent::Artifact { task_id, .. } => task_id,
        }
    }

    /// Whether this event closes the task's event stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskEvent::Status { status, .. } if status.is_terminal())
    }

    /// SSE event name for this event.
    pub fn event_name(&self) -> &'static str {
        match self {
            TaskEvent::Status { .. } => "status",
            TaskEvent::Message { .. } => "message",
            TaskEvent::Artifact { .. } => "artifact",
        }
    }
}
