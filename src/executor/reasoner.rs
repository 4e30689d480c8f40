//! Chat-based reasoning executor.
//!
//! Drives one chat completion per turn against the reasoning provider. The
//! model is instructed to answer with a JSON envelope declaring whether the
//! turn finished the task or needs more caller input; that envelope maps
//! directly onto the task lifecycle.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{AgentExecutor, ExecutionContext, ExecutorError, EXECUTOR_CHANNEL_CAPACITY};
use crate::llm::{ChatMessage, LlmClient};
use crate::task::{Artifact, Message, Role, Task, TaskEvent, TaskStatus};

const SYSTEM_PROMPT: &str = "\
You are a helpful assistant answering on behalf of an automated agent. \
Respond to the conversation so far with a single JSON object and nothing \
else, shaped as {\"status\": \"completed\" | \"input_required\", \"reply\": \
\"...\"}. Use \"input_required\" only when you cannot proceed without more \
information from the caller, and put your question in \"reply\". Otherwise \
use \"completed\" with the final answer in \"reply\".";

/// Executor backed by a chat-completion provider.
pub struct ChatExecutor {
    client: Arc<dyn LlmClient>,
    model: String,
}

impl ChatExecutor {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    /// Map the task history onto provider chat messages.
    fn build_messages(task: &Task) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(task.history.len() + 1);
        messages.push(ChatMessage::system(SYSTEM_PROMPT));
        for entry in &task.history {
            match entry.role {
                Role::User => messages.push(ChatMessage::user(entry.content.clone())),
                Role::Agent => messages.push(ChatMessage::assistant(entry.content.clone())),
            }
        }
        messages
    }

    /// Parse the model's status envelope.
    ///
    /// Models occasionally wrap the JSON in a code fence or answer in plain
    /// prose; both degrade gracefully to a completed reply.
    fn parse_reply(content: &str) -> ReasonerReply {
        let trimmed = content.trim();
        let stripped = trimmed
            .strip_prefix("```json")
            .or_else(|| trimmed.strip_prefix("```"))
            .and_then(|s| s.strip_suffix("```"))
            .map(str::trim)
            .unwrap_or(trimmed);

        match serde_json::from_str::<ReasonerReply>(stripped) {
            Ok(reply) => reply,
            Err(_) => ReasonerReply {
                status: ReplyStatus::Completed,
                reply: trimmed.to_string(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct ReasonerReply {
    status: ReplyStatus,
    reply: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ReplyStatus {
    Completed,
    InputRequired,
}

#[async_trait]
impl AgentExecutor for ChatExecutor {
    fn id(&self) -> &str {
        "chat-reasoner"
    }

    async fn execute(
        &self,
        ctx: ExecutionContext,
    ) -> Result<(mpsc::Receiver<TaskEvent>, JoinHandle<()>), ExecutorError> {
        let (tx, rx) = mpsc::channel(EXECUTOR_CHANNEL_CAPACITY);
        let client = Arc::clone(&self.client);
        let model = self.model.clone();

        let handle = tokio::spawn(async move {
            let task_id = ctx.task.id.clone();

            let _ = tx
                .send(TaskEvent::status_with_message(
                    &task_id,
                    TaskStatus::Working,
                    Message::agent("Reasoning over the request"),
                ))
                .await;

            let messages = ChatExecutor::build_messages(&ctx.task);
            let result = tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => {
                    tracing::info!("task {} canceled while waiting on provider", task_id);
                    let _ = tx
                        .send(TaskEvent::status_with_message(
                            &task_id,
                            TaskStatus::Canceled,
                            Message::agent("Task canceled"),
                        ))
                        .await;
                    return;
                }
                result = client.chat_completion(&model, &messages) => result,
            };

            match result {
                Ok(response) => {
                    let content = response.content.unwrap_or_default();
                    let parsed = ChatExecutor::parse_reply(&content);
                    let _ = tx
                        .send(TaskEvent::message(
                            &task_id,
                            Message::agent(parsed.reply.clone()),
                        ))
                        .await;
                    match parsed.status {
                        ReplyStatus::Completed => {
                            let _ = tx
                                .send(TaskEvent::artifact(
                                    &task_id,
                                    Artifact {
                                        name: Some("response".to_string()),
                                        content: parsed.reply,
                                    },
                                ))
                                .await;
                            let _ = tx
                                .send(TaskEvent::status(&task_id, TaskStatus::Completed))
                                .await;
                        }
                        ReplyStatus::InputRequired => {
                            let _ = tx
                                .send(TaskEvent::status_with_message(
                                    &task_id,
                                    TaskStatus::InputRequired,
                                    Message::agent(parsed.reply),
                                ))
                                .await;
                        }
                    }
                }
                Err(e) => {
                    tracing::error!("provider call failed for task {}: {}", task_id, e);
                    let _ = tx
                        .send(TaskEvent::status_with_message(
                            &task_id,
                            TaskStatus::Failed,
                            Message::agent(format!("Reasoning provider error: {}", e)),
                        ))
                        .await;
                }
            }
        });

        Ok((rx, handle))
    }
}
