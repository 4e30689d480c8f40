//! API request and response types.

use serde::{Deserialize, Serialize};

/// Request to submit work: a new task, or follow-up input for an existing
/// one waiting in `input_required`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitTaskRequest {
    /// The caller's message for this turn
    pub message: String,

    /// Existing task to continue, or a caller-chosen id for the new task
    #[serde(default)]
    pub task_id: Option<String>,

    /// Conversation grouping for new tasks
    #[serde(default)]
    pub context_id: Option<String>,
}

/// Query parameters for listing tasks.
#[derive(Debug, Deserialize)]
pub struct ListTasksQuery {
    #[serde(default)]
    pub context_id: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,

    /// Name advertised on the agent card
    pub agent: String,
}
