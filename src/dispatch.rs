//! Dispatch core.
//!
//! Receives inbound requests, resolves new-task vs continuation, drives the
//! executor, records every state transition in the task store, and
//! republishes events to attached subscribers. All task mutation funnels
//! through the store's per-id atomic appends, so a task reaches a terminal
//! status exactly once no matter how submission, cancellation, and executor
//! completion interleave.

use std::collections::HashMap;
use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::executor::{AgentExecutor, ExecutionContext};
use crate::fanout::EventFanout;
use crate::notify::PushRegistry;
use crate::store::{StoreError, TaskStore};
use crate::task::{Message, Task, TaskEvent, TaskStatus};

/// Errors surfaced by dispatch operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("task {0} not found")]
    NotFound(String),

    #[error("task {0} already exists")]
    DuplicateTask(String),

    #[error("operation not allowed for task {task_id} in status {status}")]
    InvalidTransition {
        task_id: String,
        status: TaskStatus,
    },
}

impl From<StoreError> for DispatchError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => DispatchError::NotFound(id),
            StoreError::DuplicateTask(id) => DispatchError::DuplicateTask(id),
            StoreError::InvalidTransition { task_id, from, .. } => {
                DispatchError::InvalidTransition {
                    task_id,
                    status: from,
                }
            }
        }
    }
}

/// An inbound work request: either a new task or a continuation of an
/// existing one.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    /// Caller input for this turn
    pub message: String,
    /// Existing task to continue, or a caller-chosen id for a new task
    pub task_id: Option<String>,
    /// Conversation grouping for new tasks
    pub context_id: Option<String>,
}

/// The dispatch core. One per process, shared by all request handlers.
pub struct Dispatcher {
    store: Arc<dyn TaskStore>,
    executor: Arc<dyn AgentExecutor>,
    fanout: EventFanout,
    notifier: PushRegistry,
    /// Cancellation tokens for in-flight executor invocations, keyed by
    /// task id. Also serves as the guard against double execution.
    running: Mutex<HashMap<String, CancellationToken>>,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn TaskStore>,
        executor: Arc<dyn AgentExecutor>,
        fanout: EventFanout,
        notifier: PushRegistry,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            executor,
            fanout,
            notifier,
            running: Mutex::new(HashMap::new()),
        })
    }

    pub fn notifier(&self) -> &PushRegistry {
        &self.notifier
    }

    /// Accept a work request.
    ///
    /// A request without a task id (or with an unknown caller-chosen id)
    /// creates the task, moves it to `Working`, starts the executor, and
    /// returns the snapshot immediately; non-streaming callers then poll
    /// [`Dispatcher::get`]. A request naming an existing task is only valid
    /// while that task waits in `InputRequired`: the new input is appended
    /// and the executor re-invoked with the accumulated history.
    pub async fn submit(self: &Arc<Self>, req: SubmitRequest) -> Result<Task, DispatchError> {
        let id = req
            .task_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        if req.task_id.is_some() {
            match self.store.get(&id).await {
                Ok(existing) => return self.resume(existing, req.message).await,
                Err(StoreError::NotFound(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }
        self.start(id, req).await
    }

    /// Current snapshot of a task.
    pub async fn get(&self, id: &str) -> Result<Task, DispatchError> {
        Ok(self.store.get(id).await?)
    }

    /// List known tasks, optionally filtered by context id.
    pub async fn list(&self, context_id: Option<&str>) -> Result<Vec<Task>, DispatchError> {
        Ok(self.store.list(context_id).await?)
    }

    /// Request cancellation of a task.
    ///
    /// Fire-and-forget: an in-flight invocation is signaled and the actual
    /// transition is left to the `Canceled` event it emits. A task parked in
    /// `InputRequired` has no invocation to signal, so the terminal event is
    /// appended directly. Terminal tasks are rejected untouched.
    pub async fn cancel(&self, id: &str) -> Result<(), DispatchError> {
        let task = self.store.get(id).await?;
        if task.status.is_terminal() {
            return Err(DispatchError::InvalidTransition {
                task_id: id.to_string(),
                status: task.status,
            });
        }

        let token = self.running.lock().await.get(id).cloned();
        match token {
            Some(token) => {
                tracing::info!("signaling cancellation for task {}", id);
                token.cancel();
                Ok(())
            }
            None => {
                let event = TaskEvent::status_with_message(
                    id,
                    TaskStatus::Canceled,
                    Message::agent("Task canceled"),
                );
                match self.store.append_event(&event).await {
                    Ok(snapshot) => {
                        self.fanout.publish(event).await;
                        self.notifier.notify_terminal(&snapshot).await;
                        Ok(())
                    }
                    // Lost the race against another terminal event.
                    Err(e) => Err(e.into()),
                }
            }
        }
    }

    /// Attach to a task's live event stream.
    ///
    /// Replays every event published since submission, then delivers live
    /// events until the terminal event closes the stream. If the fan-out
    /// buffer has already been reclaimed, the stream yields one synthesized
    /// terminal status from the stored snapshot.
    pub async fn subscribe(
        &self,
        id: &str,
    ) -> Result<BoxStream<'static, TaskEvent>, DispatchError> {
        let task = self.store.get(id).await?;

        if let Some(live) = self.fanout.subscribe(id).await {
            return Ok(live);
        }
        if !task.status.is_terminal() {
            // Channel not set up yet (submission still in flight); attach
            // before any event can be published.
            self.fanout.register(id).await;
            if let Some(live) = self.fanout.subscribe(id).await {
                return Ok(live);
            }
        }

        let event = TaskEvent::Status {
            task_id: task.id,
            status: task.status,
            message: task.status_message,
        };
        Ok(stream::iter(vec![event]).boxed())
    }

    /// Signal every in-flight invocation to wind down (graceful shutdown).
    pub async fn shutdown(&self) {
        let running = self.running.lock().await;
        if running.is_empty() {
            return;
        }
        tracing::info!("canceling {} in-flight tasks for shutdown", running.len());
        for token in running.values() {
            token.cancel();
        }
    }

    /// Create a fresh task and kick off the executor.
    async fn start(
        self: &Arc<Self>,
        id: String,
        req: SubmitRequest,
    ) -> Result<Task, DispatchError> {
        let task = Task::new(id.clone(), req.context_id, Message::user(req.message));
        self.store.create(task).await?;
        self.fanout.register(&id).await;

        let cancel = self.claim_invocation(&id).await?;
        match self.apply(TaskEvent::status(&id, TaskStatus::Working)).await {
            Ok(snapshot) => {
                self.spawn_invocation(snapshot.clone(), cancel);
                Ok(snapshot)
            }
            Err(e) => {
                self.running.lock().await.remove(&id);
                Err(e)
            }
        }
    }

    /// Append follow-up input to a paused task and re-invoke the executor.
    async fn resume(
        self: &Arc<Self>,
        existing: Task,
        message: String,
    ) -> Result<Task, DispatchError> {
        if existing.status != TaskStatus::InputRequired {
            return Err(DispatchError::InvalidTransition {
                task_id: existing.id,
                status: existing.status,
            });
        }
        let id = existing.id;
        let cancel = self.claim_invocation(&id).await?;
        self.fanout.register(&id).await;

        let result = async {
            self.apply(TaskEvent::message(&id, Message::user(message)))
                .await?;
            self.apply(TaskEvent::status(&id, TaskStatus::Working)).await
        }
        .await;

        match result {
            Ok(snapshot) => {
                self.spawn_invocation(snapshot.clone(), cancel);
                Ok(snapshot)
            }
            Err(e) => {
                self.running.lock().await.remove(&id);
                Err(e)
            }
        }
    }

    /// Reserve the single execution slot for a task.
    async fn claim_invocation(&self, id: &str) -> Result<CancellationToken, DispatchError> {
        let mut running = self.running.lock().await;
        if running.contains_key(id) {
            return Err(DispatchError::InvalidTransition {
                task_id: id.to_string(),
                status: TaskStatus::Working,
            });
        }
        let cancel = CancellationToken::new();
        running.insert(id.to_string(), cancel.clone());
        Ok(cancel)
    }

    /// Record an event and replicate it to subscribers.
    async fn apply(&self, event: TaskEvent) -> Result<Task, DispatchError> {
        let snapshot = self.store.append_event(&event).await?;
        self.fanout.publish(event).await;
        Ok(snapshot)
    }

    /// Drive one executor invocation to quiescence in the background.
    fn spawn_invocation(self: &Arc<Self>, task: Task, cancel: CancellationToken) {
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move {
            let id = task.id.clone();
            let ctx = ExecutionContext {
                task,
                cancel,
            };

            let mut terminal: Option<Task> = None;
            let mut failure_detail: Option<String> = None;

            match dispatcher.executor.execute(ctx).await {
                Ok((mut rx, handle)) => {
                    while let Some(event) = rx.recv().await {
                        let is_terminal = event.is_terminal();
                        match dispatcher.store.append_event(&event).await {
                            Ok(snapshot) => {
                                dispatcher.fanout.publish(event).await;
                                if is_terminal {
                                    terminal = Some(snapshot);
                                }
                            }
                            Err(StoreError::InvalidTransition { .. }) if terminal.is_some() => {
                                // First terminal event won; later ones are no-ops.
                                tracing::debug!("ignoring event after terminal for task {}", id);
                            }
                            Err(e) => {
                                tracing::warn!("failed to apply event for task {}: {}", id, e);
                            }
                        }
                    }
                    if let Err(e) = handle.await {
                        failure_detail = Some(format!("executor invocation aborted: {}", e));
                    }
                }
                Err(e) => {
                    failure_detail = Some(e.to_string());
                }
            }

            // Release the execution slot before settling so a paused task is
            // immediately resumable/cancelable.
            dispatcher.running.lock().await.remove(&id);

            if terminal.is_none() {
                terminal = dispatcher.settle(&id, failure_detail).await;
            }

            if let Some(snapshot) = terminal {
                dispatcher.notifier.notify_terminal(&snapshot).await;
            }
        });
    }

    /// Resolve a task whose invocation ended without a terminal event:
    /// either a legitimate `InputRequired` pause, or a silent executor
    /// death that gets a synthesized `Failed`.
    async fn settle(&self, id: &str, failure_detail: Option<String>) -> Option<Task> {
        let current = match self.store.get(id).await {
            Ok(task) => task,
            Err(e) => {
                tracing::warn!("task {} vanished during settlement: {}", id, e);
                return None;
            }
        };
        if current.status.is_terminal() {
            return None;
        }
        if current.status == TaskStatus::InputRequired && failure_detail.is_none() {
            tracing::debug!("task {} paused for caller input", id);
            return None;
        }

        let detail = failure_detail
            .unwrap_or_else(|| "executor terminated without a terminal event".to_string());
        tracing::error!("task {} failed: {}", id, detail);
        let event =
            TaskEvent::status_with_message(id, TaskStatus::Failed, Message::agent(detail));
        match self.store.append_event(&event).await {
            Ok(snapshot) => {
                self.fanout.publish(event).await;
                Some(snapshot)
            }
            Err(e) => {
                tracing::warn!("failed to record failure for task {}: {}", id, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{ExecutorError, EXECUTOR_CHANNEL_CAPACITY};
    use crate::store::InMemoryTaskStore;
    use crate::task::Artifact;
    use async_trait::async_trait;
    use futures::StreamExt;
    use std::collections::VecDeque;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::task::JoinHandle;

    /// What a scripted invocation should do.
    #[derive(Debug, Clone)]
    enum Script {
        /// Emit a question and pause in `InputRequired`
        AskForInput(&'static str),
        /// Emit a message + artifact and complete
        Complete(&'static str),
        /// Hold until canceled, then emit the `Canceled` terminal
        WaitForCancel,
        /// Close the event channel without any terminal event
        Crash,
    }

    /// Test executor that plays back scripts.
    ///
    /// Scripts can be keyed by task id (for tests running several tasks
    /// concurrently, where invocation start order is not deterministic) or
    /// queued globally for single-task tests, where invocations of the same
    /// task are strictly sequential.
    struct ScriptedExecutor {
        by_task: Mutex<HashMap<String, VecDeque<Script>>>,
        fallback: Mutex<VecDeque<Script>>,
    }

    impl ScriptedExecutor {
        fn new(scripts: Vec<Script>) -> Arc<Self> {
            Arc::new(Self {
                by_task: Mutex::new(HashMap::new()),
                fallback: Mutex::new(scripts.into()),
            })
        }

        fn keyed(entries: Vec<(&str, Vec<Script>)>) -> Arc<Self> {
            Arc::new(Self {
                by_task: Mutex::new(
                    entries
                        .into_iter()
                        .map(|(id, scripts)| (id.to_string(), scripts.into()))
                        .collect(),
                ),
                fallback: Mutex::new(VecDeque::new()),
            })
        }
    }

    #[async_trait]
    impl AgentExecutor for ScriptedExecutor {
        fn id(&self) -> &str {
            "scripted"
        }

        async fn execute(
            &self,
            ctx: ExecutionContext,
        ) -> Result<(mpsc::Receiver<TaskEvent>, JoinHandle<()>), ExecutorError> {
            let keyed = self
                .by_task
                .lock()
                .await
                .get_mut(&ctx.task.id)
                .and_then(VecDeque::pop_front);
            let script = match keyed {
                Some(script) => script,
                None => self
                    .fallback
                    .lock()
                    .await
                    .pop_front()
                    .ok_or_else(|| ExecutorError::StartFailed("no script left".to_string()))?,
            };
            let (tx, rx) = mpsc::channel(EXECUTOR_CHANNEL_CAPACITY);
            let id = ctx.task.id.clone();
            let cancel = ctx.cancel.clone();

            let handle = tokio::spawn(async move {
                match script {
                    Script::AskForInput(question) => {
                        let _ = tx
                            .send(TaskEvent::message(&id, Message::agent(question)))
                            .await;
                        let _ = tx
                            .send(TaskEvent::status_with_message(
                                &id,
                                TaskStatus::InputRequired,
                                Message::agent(question),
                            ))
                            .await;
                    }
                    Script::Complete(answer) => {
                        let _ = tx
                            .send(TaskEvent::message(&id, Message::agent(answer)))
                            .await;
                        let _ = tx
                            .send(TaskEvent::artifact(
                                &id,
                                Artifact {
                                    name: Some("response".to_string()),
                                    content: answer.to_string(),
                                },
                            ))
                            .await;
                        let _ = tx.send(TaskEvent::status(&id, TaskStatus::Completed)).await;
                    }
                    Script::WaitForCancel => {
                        cancel.cancelled().await;
                        let _ = tx
                            .send(TaskEvent::status_with_message(
                                &id,
                                TaskStatus::Canceled,
                                Message::agent("Task canceled"),
                            ))
                            .await;
                    }
                    Script::Crash => {}
                }
            });
            Ok((rx, handle))
        }
    }

    fn dispatcher(scripts: Vec<Script>) -> Arc<Dispatcher> {
        Dispatcher::new(
            Arc::new(InMemoryTaskStore::new()),
            ScriptedExecutor::new(scripts),
            EventFanout::new(64, Duration::from_secs(5)),
            PushRegistry::new(false),
        )
    }

    fn request(message: &str, task_id: Option<&str>) -> SubmitRequest {
        SubmitRequest {
            message: message.to_string(),
            task_id: task_id.map(str::to_string),
            context_id: None,
        }
    }

    async fn wait_for_status(dispatcher: &Arc<Dispatcher>, id: &str, status: TaskStatus) -> Task {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let task = dispatcher.get(id).await.unwrap();
                if task.status == status {
                    return task;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("task {} never reached {:?}", id, status))
    }

    #[tokio::test]
    async fn test_submit_returns_working_snapshot() {
        let dispatcher = dispatcher(vec![Script::Complete("done")]);
        let task = dispatcher.submit(request("hello", None)).await.unwrap();
        assert_eq!(task.status, TaskStatus::Working);
        assert_eq!(task.history.len(), 1);
        assert!(!task.id.is_empty());
    }

    #[tokio::test]
    async fn test_full_lifecycle_with_input_pause() {
        let dispatcher = dispatcher(vec![
            Script::AskForInput("USD to what currency?"),
            Script::Complete("1 USD = 0.79 GBP"),
        ]);

        let task = dispatcher
            .submit(request("convert 1 USD", Some("t1")))
            .await
            .unwrap();
        assert_eq!(task.status, TaskStatus::Working);

        // Collect the stream in the background until it closes.
        let stream = dispatcher.subscribe("t1").await.unwrap();
        let collector = tokio::spawn(async move {
            tokio::pin!(stream);
            let events: Vec<TaskEvent> = stream.collect().await;
            events
        });

        wait_for_status(&dispatcher, "t1", TaskStatus::InputRequired).await;

        let resumed = dispatcher
            .submit(request("to GBP", Some("t1")))
            .await
            .unwrap();
        assert_eq!(resumed.status, TaskStatus::Working);

        let done = wait_for_status(&dispatcher, "t1", TaskStatus::Completed).await;
        assert_eq!(done.artifacts.len(), 1);
        assert_eq!(done.artifacts[0].content, "1 USD = 0.79 GBP");
        // Initial input, question, follow-up input, answer.
        assert_eq!(done.history.len(), 4);

        let events = collector.await.unwrap();
        assert!(events.last().unwrap().is_terminal());
        let statuses: Vec<TaskStatus> = events
            .iter()
            .filter_map(|e| match e {
                TaskEvent::Status { status, .. } => Some(*status),
                _ => None,
            })
            .collect();
        assert_eq!(
            statuses,
            vec![
                TaskStatus::Working,
                TaskStatus::InputRequired,
                TaskStatus::Working,
                TaskStatus::Completed
            ]
        );

        // Snapshots after the terminal state are deterministic.
        let again = dispatcher.get("t1").await.unwrap();
        assert_eq!(again.status, done.status);
        assert_eq!(again.history, done.history);
        assert_eq!(again.artifacts, done.artifacts);
        assert_eq!(again.updated_at, done.updated_at);
    }

    #[tokio::test]
    async fn test_cancel_in_flight_task() {
        let dispatcher = dispatcher(vec![Script::WaitForCancel]);
        dispatcher
            .submit(request("long job", Some("t1")))
            .await
            .unwrap();

        dispatcher.cancel("t1").await.unwrap();
        let task = wait_for_status(&dispatcher, "t1", TaskStatus::Canceled).await;
        assert!(task.status.is_terminal());

        // Cancel on a terminal task is rejected and mutates nothing.
        let err = dispatcher.cancel("t1").await.unwrap_err();
        assert!(matches!(err, DispatchError::InvalidTransition { .. }));
        let after = dispatcher.get("t1").await.unwrap();
        assert_eq!(after.updated_at, task.updated_at);
    }

    #[tokio::test]
    async fn test_cancel_unknown_task() {
        let dispatcher = dispatcher(vec![]);
        let err = dispatcher.cancel("missing").await.unwrap_err();
        assert_eq!(err, DispatchError::NotFound("missing".to_string()));
    }

    #[tokio::test]
    async fn test_cancel_parked_input_required_task() {
        let dispatcher = dispatcher(vec![Script::AskForInput("which one?")]);
        dispatcher
            .submit(request("ambiguous", Some("t1")))
            .await
            .unwrap();
        wait_for_status(&dispatcher, "t1", TaskStatus::InputRequired).await;

        // Cancellation is fire-and-forget; a signal can land in the sliver
        // between the pause becoming visible and the invocation slot being
        // released, so drive it until the terminal state sticks.
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let _ = dispatcher.cancel("t1").await;
                if dispatcher.get("t1").await.unwrap().status == TaskStatus::Canceled {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("task never canceled");

        let task = dispatcher.get("t1").await.unwrap();
        assert_eq!(task.status, TaskStatus::Canceled);
    }

    #[tokio::test]
    async fn test_silent_executor_death_synthesizes_failed() {
        let dispatcher = dispatcher(vec![Script::Crash]);
        dispatcher
            .submit(request("doomed", Some("t1")))
            .await
            .unwrap();

        let task = wait_for_status(&dispatcher, "t1", TaskStatus::Failed).await;
        let detail = task.status_message.unwrap();
        assert!(detail.content.contains("terminal event"));
    }

    #[tokio::test]
    async fn test_concurrent_submits_same_id_one_winner() {
        let dispatcher = dispatcher(vec![Script::WaitForCancel, Script::WaitForCancel]);

        let mut handles = Vec::new();
        for _ in 0..4 {
            let dispatcher = Arc::clone(&dispatcher);
            handles.push(tokio::spawn(async move {
                dispatcher.submit(request("same id", Some("t1"))).await
            }));
        }
        let mut ok = 0;
        let mut rejected = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => ok += 1,
                Err(DispatchError::DuplicateTask(_))
                | Err(DispatchError::InvalidTransition { .. }) => rejected += 1,
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(rejected, 3);
    }

    #[tokio::test]
    async fn test_resubmit_terminal_task_rejected() {
        let dispatcher = dispatcher(vec![Script::Complete("done")]);
        dispatcher
            .submit(request("job", Some("t1")))
            .await
            .unwrap();
        wait_for_status(&dispatcher, "t1", TaskStatus::Completed).await;

        let err = dispatcher
            .submit(request("again", Some("t1")))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_resubmit_working_task_rejected() {
        let dispatcher = dispatcher(vec![Script::WaitForCancel]);
        dispatcher
            .submit(request("job", Some("t1")))
            .await
            .unwrap();

        let err = dispatcher
            .submit(request("impatient", Some("t1")))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::InvalidTransition { .. }));

        dispatcher.cancel("t1").await.unwrap();
    }

    #[tokio::test]
    async fn test_subscribe_unknown_task() {
        let dispatcher = dispatcher(vec![]);
        let err = dispatcher.subscribe("missing").await.err().unwrap();
        assert_eq!(err, DispatchError::NotFound("missing".to_string()));
    }

    #[tokio::test]
    async fn test_independent_tasks_do_not_cross_streams() {
        let dispatcher = Dispatcher::new(
            Arc::new(InMemoryTaskStore::new()),
            ScriptedExecutor::keyed(vec![
                ("t1", vec![Script::WaitForCancel]),
                ("t2", vec![Script::Complete("two")]),
            ]),
            EventFanout::new(64, Duration::from_secs(5)),
            PushRegistry::new(false),
        );
        dispatcher
            .submit(request("first", Some("t1")))
            .await
            .unwrap();
        dispatcher
            .submit(request("second", Some("t2")))
            .await
            .unwrap();

        let stream = dispatcher.subscribe("t2").await.unwrap();
        tokio::pin!(stream);
        let events: Vec<TaskEvent> = stream.collect().await;
        assert!(!events.is_empty());
        for event in &events {
            assert_eq!(event.task_id(), "t2");
        }

        dispatcher.cancel("t1").await.unwrap();
        wait_for_status(&dispatcher, "t1", TaskStatus::Canceled).await;
    }

    #[tokio::test]
    async fn test_subscribe_after_buffer_reclaim_yields_terminal_snapshot() {
        let dispatcher = Dispatcher::new(
            Arc::new(InMemoryTaskStore::new()),
            ScriptedExecutor::new(vec![Script::Complete("done")]),
            EventFanout::new(64, Duration::from_millis(10)),
            PushRegistry::new(false),
        );
        dispatcher
            .submit(request("job", Some("t1")))
            .await
            .unwrap();
        wait_for_status(&dispatcher, "t1", TaskStatus::Completed).await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        let stream = dispatcher.subscribe("t1").await.unwrap();
        tokio::pin!(stream);
        let events: Vec<TaskEvent> = stream.collect().await;
        assert_eq!(events.len(), 1);
        assert!(events[0].is_terminal());
    }

    #[tokio::test]
    async fn test_shutdown_cancels_in_flight_tasks() {
        let dispatcher = dispatcher(vec![Script::WaitForCancel]);
        dispatcher
            .submit(request("job", Some("t1")))
            .await
            .unwrap();

        dispatcher.shutdown().await;
        let task = wait_for_status(&dispatcher, "t1", TaskStatus::Canceled).await;
        assert!(task.status.is_terminal());
    }
}
