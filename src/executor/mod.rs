//! Executor contract.
//!
//! An executor performs the actual reasoning work for a task and reports
//! progress as a stream of [`TaskEvent`]s over a channel, ending with
//! exactly one terminal event. The dispatch core treats executors as
//! opaque, long-running, cancellable collaborators; it never depends on a
//! concrete executor's internals.

mod reasoner;

pub use reasoner::ChatExecutor;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::task::{Task, TaskEvent};

/// Events the executor can buffer before emission backpressures it.
pub const EXECUTOR_CHANNEL_CAPACITY: usize = 64;

/// Inputs for one executor invocation.
#[derive(Clone)]
pub struct ExecutionContext {
    /// Snapshot of the task at invocation time, including full history
    pub task: Task,
    /// Cooperative cancellation signal. The executor is expected to wind
    /// down and emit a `Canceled` terminal event when this fires.
    pub cancel: CancellationToken,
}

/// Errors raised before an invocation produces its event stream.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("executor failed to start: {0}")]
    StartFailed(String),
}

/// The capability every concrete agent implements: drive a task, emit
/// events.
///
/// The returned receiver yields events in emission order; the join handle
/// resolves when the invocation is done. If the channel closes without a
/// terminal event (crash, panic, logic bug), the dispatch core synthesizes
/// a `Failed` terminal event so the task never dangles.
#[async_trait]
pub trait AgentExecutor: Send + Sync {
    /// Short identifier for logs.
    fn id(&self) -> &str;

    /// Start working on the task described by `ctx`.
    async fn execute(
        &self,
        ctx: ExecutionContext,
    ) -> Result<(mpsc::Receiver<TaskEvent>, JoinHandle<()>), ExecutorError>;
}
