//! Push-notification registration and terminal-event webhook delivery.
//!
//! Callers that do not want to hold a stream open may register a callback
//! URL per task; when the task reaches a terminal state, its snapshot is
//! POSTed there once. Delivery is best-effort: failures are logged, not
//! retried. The whole feature sits behind the agent card's
//! `push_notifications` capability flag.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::task::Task;

/// A registered callback for one task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushConfig {
    /// URL that receives the terminal task snapshot as JSON
    pub url: String,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PushError {
    #[error("push notifications are not supported by this agent")]
    Unsupported,
}

/// Per-task callback registry plus the webhook sender.
pub struct PushRegistry {
    enabled: bool,
    configs: RwLock<HashMap<String, PushConfig>>,
    client: reqwest::Client,
}

impl PushRegistry {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            configs: RwLock::new(HashMap::new()),
            client: reqwest::Client::new(),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Register (or replace) the callback for a task.
    pub async fn set(&self, task_id: &str, config: PushConfig) -> Result<(), PushError> {
        if !self.enabled {
            return Err(PushError::Unsupported);
        }
        self.configs
            .write()
            .await
            .insert(task_id.to_string(), config);
        Ok(())
    }

    /// Read back the registered callback, if any.
    pub async fn get(&self, task_id: &str) -> Result<Option<PushConfig>, PushError> {
        if !self.enabled {
            return Err(PushError::Unsupported);
        }
        Ok(self.configs.read().await.get(task_id).cloned())
    }

    /// Deliver the terminal snapshot to the registered callback, if any.
    ///
    /// The POST runs in the background; the caller (the dispatch core's
    /// event pump) is never blocked on a slow callback endpoint.
    pub async fn notify_terminal(&self, task: &Task) {
        if !self.enabled {
            return;
        }
        let Some(config) = self.configs.write().await.remove(&task.id) else {
            return;
        };

        let client = self.client.clone();
        let task = task.clone();
        tokio::spawn(async move {
            tracing::info!(
                "delivering terminal notification for task {} to {}",
                task.id,
                config.url
            );
            match client.post(&config.url).json(&task).send().await {
                Ok(response) if response.status().is_success() => {}
                Ok(response) => {
                    tracing::warn!(
                        "push notification for task {} got HTTP {}",
                        task.id,
                        response.status()
                    );
                }
                Err(e) => {
                    tracing::warn!("push notification for task {} failed: {}", task.id, e);
                }
            }
        });
    }
}
