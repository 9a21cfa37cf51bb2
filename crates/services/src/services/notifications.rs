//! Task events and their delivery.
//!
//! Write paths publish onto an in-process broadcast bus after their
//! transaction commits. A worker persists events as notification rows. A
//! failed or absent subscriber never affects the write that emitted the event.

use db::models::notification::{CreateNotification, Notification};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tokio::{sync::broadcast, task::JoinHandle};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskEvent {
    Assigned {
        tenant_id: Uuid,
        task_id: Uuid,
        task_title: String,
        user_id: Uuid,
        assigned_by: Uuid,
    },
    Completed {
        tenant_id: Uuid,
        task_id: Uuid,
        task_title: String,
        recipients: Vec<Uuid>,
        completed_by: Uuid,
    },
}

impl TaskEvent {
    pub fn task_id(&self) -> Uuid {
        match self {
            TaskEvent::Assigned { task_id, .. } | TaskEvent::Completed { task_id, .. } => *task_id,
        }
    }
}

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<TaskEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, event: TaskEvent) {
        if self.sender.send(event).is_err() {
            tracing::debug!("No notification subscribers; event dropped");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.sender.subscribe()
    }
}

/// Write notification rows for one event.
pub async fn persist_event(pool: &SqlitePool, event: &TaskEvent) -> Result<Vec<Notification>, sqlx::Error> {
    let rows = match event {
        TaskEvent::Assigned {
            tenant_id,
            task_id,
            task_title,
            user_id,
            ..
        } => vec![CreateNotification {
            tenant_id: *tenant_id,
            user_id: *user_id,
            kind: "task_assigned".to_string(),
            title: "New task assigned".to_string(),
            message: format!("You have been assigned to \"{}\".", task_title),
            task_id: Some(*task_id),
        }],
        TaskEvent::Completed {
            tenant_id,
            task_id,
            task_title,
            recipients,
            ..
        } => recipients
            .iter()
            .map(|user_id| CreateNotification {
                tenant_id: *tenant_id,
                user_id: *user_id,
                kind: "task_completed".to_string(),
                title: "Task completed".to_string(),
                message: format!("\"{}\" has been marked as completed.", task_title),
                task_id: Some(*task_id),
            })
            .collect(),
    };

    let mut created = Vec::with_capacity(rows.len());
    for row in &rows {
        created.push(Notification::create(pool, row).await?);
    }
    Ok(created)
}

pub fn spawn_notification_worker(pool: SqlitePool, bus: &EventBus) -> JoinHandle<()> {
    let mut receiver = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    if let Err(e) = persist_event(&pool, &event).await {
                        tracing::warn!(task_id = %event.task_id(), "Failed to persist notification: {}", e);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Notification worker lagged; {} events skipped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
