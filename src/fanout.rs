//! Streaming fan-out: replicates a task's event sequence to any number of
//! attached consumers, in order, without blocking the publisher.
//!
//! Every task gets an ordered event buffer plus a broadcast channel. A
//! subscriber first replays the buffer, then switches to live delivery; the
//! snapshot and the live attach happen under one lock, so a late subscriber
//! never misses or double-sees an event. Slow subscribers that fall behind
//! the bounded backlog are disconnected, never the publisher.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{BoxStream, StreamExt};
use tokio::sync::{broadcast, RwLock};

use crate::task::TaskEvent;

/// Per-task event replication state.
struct TaskChannel {
    /// Every event published so far, in emission order
    buffer: Vec<TaskEvent>,
    tx: broadcast::Sender<TaskEvent>,
    /// Set once the terminal event has been published
    finished: bool,
}

/// Event fan-out for all live tasks.
pub struct EventFanout {
    channels: Arc<RwLock<HashMap<String, TaskChannel>>>,
    /// Broadcast backlog per subscriber before disconnect
    capacity: usize,
    /// How long the buffer outlives the terminal event
    retention: Duration,
}

impl EventFanout {
    pub fn new(capacity: usize, retention: Duration) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            capacity,
            retention,
        }
    }

    /// Create the channel for a task. Must happen before the first publish;
    /// idempotent so a resumed task keeps its existing buffer.
    pub async fn register(&self, task_id: &str) {
        let mut channels = self.channels.write().await;
        channels.entry(task_id.to_string()).or_insert_with(|| {
            let (tx, _) = broadcast::channel(self.capacity);
            TaskChannel {
                buffer: Vec::new(),
                tx,
                finished: false,
            }
        });
    }

    /// Append an event to the task's buffer and forward it to every live
    /// subscriber. After the terminal event, the buffer is retained for the
    /// configured grace period and then reclaimed.
    pub async fn publish(&self, event: TaskEvent) {
        let task_id = event.task_id().to_string();
        let terminal = event.is_terminal();

        let mut channels = self.channels.write().await;
        let Some(channel) = channels.get_mut(&task_id) else {
            tracing::warn!("dropping event for unregistered task {}", task_id);
            return;
        };
        if channel.finished {
            tracing::debug!("dropping event after terminal for task {}", task_id);
            return;
        }
        channel.buffer.push(event.clone());
        // Send failure just means no subscriber is attached right now.
        let _ = channel.tx.send(event);

        if terminal {
            channel.finished = true;
            let channels = Arc::clone(&self.channels);
            let retention = self.retention;
            tokio::spawn(async move {
                tokio::time::sleep(retention).await;
                channels.write().await.remove(&task_id);
                tracing::debug!("reclaimed event buffer for task {}", task_id);
            });
        }
    }

    /// Attach a consumer: replay the buffered events from the beginning,
    /// then deliver live events until the terminal event closes the stream.
    ///
    /// Returns `None` if the task's buffer has already been reclaimed.
    pub async fn subscribe(&self, task_id: &str) -> Option<BoxStream<'static, TaskEvent>> {
        // The read lock excludes publishers, so the backlog snapshot and the
        // live attach are a single atomic step.
        let channels = self.channels.read().await;
        let channel = channels.get(task_id)?;
        let backlog = channel.buffer.clone();
        let rx = if channel.finished {
            None
        } else {
            Some(channel.tx.subscribe())
        };
        drop(channels);

        let task_id = task_id.to_string();
        let stream = async_stream::stream! {
            for event in backlog {
                let terminal = event.is_terminal();
                yield event;
                if terminal {
                    return;
                }
            }
            let Some(mut rx) = rx else { return };
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        let terminal = event.is_terminal();
                        yield event;
                        if terminal {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(
                            "subscriber for task {} lagged {} events behind, disconnecting",
                            task_id,
                            skipped
                        );
                        break;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        };
        Some(stream.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Artifact, Message, TaskStatus};
    use futures::StreamExt;

    fn fanout() -> EventFanout {
        EventFanout::new(64, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_live_delivery_in_order() {
        let fanout = fanout();
        fanout.register("t1").await;

        let stream = fanout.subscribe("t1").await.unwrap();
        tokio::pin!(stream);

        fanout
            .publish(TaskEvent::status("t1", TaskStatus::Working))
            .await;
        fanout
            .publish(TaskEvent::message("t1", Message::agent("hi")))
            .await;
        fanout
            .publish(TaskEvent::status("t1", TaskStatus::Completed))
            .await;

        let events: Vec<TaskEvent> = stream.collect().await;
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].event_name(), "status");
        assert_eq!(events[1].event_name(), "message");
        assert!(events[2].is_terminal());
    }

    #[tokio::test]
    async fn test_late_subscriber_replays_then_lives() {
        let fanout = fanout();
        fanout.register("t1").await;

        fanout
            .publish(TaskEvent::status("t1", TaskStatus::Working))
            .await;
        fanout
            .publish(TaskEvent::artifact(
                "t1",
                Artifact {
                    name: None,
                    content: "chunk-1".to_string(),
                },
            ))
            .await;

        // Attach after two events, then publish two more.
        let stream = fanout.subscribe("t1").await.unwrap();
        tokio::pin!(stream);

        fanout
            .publish(TaskEvent::artifact(
                "t1",
                Artifact {
                    name: None,
                    content: "chunk-2".to_string(),
                },
            ))
            .await;
        fanout
            .publish(TaskEvent::status("t1", TaskStatus::Completed))
            .await;

        let events: Vec<TaskEvent> = stream.collect().await;
        assert_eq!(events.len(), 4);
        let chunks: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                TaskEvent::Artifact { artifact, .. } => Some(artifact.content.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(chunks, vec!["chunk-1", "chunk-2"]);
        assert!(events.last().unwrap().is_terminal());
    }

    #[tokio::test]
    async fn test_subscribe_after_terminal_replays_full_buffer() {
        let fanout = fanout();
        fanout.register("t1").await;
        fanout
            .publish(TaskEvent::status("t1", TaskStatus::Working))
            .await;
        fanout
            .publish(TaskEvent::status("t1", TaskStatus::Completed))
            .await;

        let stream = fanout.subscribe("t1").await.unwrap();
        tokio::pin!(stream);
        let events: Vec<TaskEvent> = stream.collect().await;
        assert_eq!(events.len(), 2);
        assert!(events[1].is_terminal());
    }

    #[tokio::test]
    async fn test_buffer_reclaimed_after_retention() {
        let fanout = EventFanout::new(64, Duration::from_millis(20));
        fanout.register("t1").await;
        fanout
            .publish(TaskEvent::status("t1", TaskStatus::Completed))
            .await;

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(fanout.subscribe("t1").await.is_none());
    }

    #[tokio::test]
    async fn test_events_do_not_cross_tasks() {
        let fanout = fanout();
        fanout.register("t1").await;
        fanout.register("t2").await;

        let stream = fanout.subscribe("t2").await.unwrap();
        tokio::pin!(stream);

        fanout
            .publish(TaskEvent::status("t1", TaskStatus::Working))
            .await;
        fanout
            .publish(TaskEvent::status("t1", TaskStatus::Completed))
            .await;
        fanout
            .publish(TaskEvent::status("t2", TaskStatus::Working))
            .await;
        fanout
            .publish(TaskEvent::status("t2", TaskStatus::Canceled))
            .await;

        let events: Vec<TaskEvent> = stream.collect().await;
        assert_eq!(events.len(), 2);
        for event in &events {
            assert_eq!(event.task_id(), "t2");
        }
    }

    #[tokio::test]
    async fn test_slow_subscriber_disconnected_not_publisher() {
        let fanout = EventFanout::new(4, Duration::from_secs(5));
        fanout.register("t1").await;

        let stream = fanout.subscribe("t1").await.unwrap();
        tokio::pin!(stream);

        // Overflow the per-subscriber backlog without polling the stream.
        for i in 0..32 {
            fanout
                .publish(TaskEvent::message("t1", Message::agent(format!("m{}", i))))
                .await;
        }

        // The lagged subscriber is cut off; the stream ends without the
        // publisher ever having blocked.
        let events: Vec<TaskEvent> = stream.collect().await;
        assert!(events.len() < 32);
    }

    #[tokio::test]
    async fn test_publish_after_terminal_is_dropped() {
        let fanout = fanout();
        fanout.register("t1").await;
        fanout
            .publish(TaskEvent::status("t1", TaskStatus::Completed))
            .await;
        fanout
            .publish(TaskEvent::message("t1", Message::agent("late")))
            .await;

        let stream = fanout.subscribe("t1").await.unwrap();
        tokio::pin!(stream);
        let events: Vec<TaskEvent> = stream.collect().await;
        assert_eq!(events.len(), 1);
        assert!(events[0].is_terminal());
    }
}
