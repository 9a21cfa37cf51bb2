use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TaskMessage {
    pub id: Uuid,
    pub task_id: Uuid,
    pub sender_id: Option<Uuid>,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl TaskMessage {
    pub async fn create(
        pool: &SqlitePool,
        task_id: Uuid,
        sender_id: Uuid,
        message: &str,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, TaskMessage>(
            r#"INSERT INTO task_messages (id, task_id, sender_id, message)
               VALUES (?1, ?2, ?3, ?4)
               RETURNING *"#,
        )
        .bind(Uuid::new_v4())
        .bind(task_id)
        .bind(sender_id)
        .bind(message)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_task(pool: &SqlitePool, task_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, TaskMessage>(
            "SELECT * FROM task_messages WHERE task_id = ?1 ORDER BY created_at, rowid",
        )
        .bind(task_id)
        .fetch_all(pool)
        .await
    }

    pub async fn latest_for_task(
        pool: &SqlitePool,
        task_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, TaskMessage>(
            "SELECT * FROM task_messages WHERE task_id = ?1 ORDER BY created_at DESC, rowid DESC LIMIT ?2",
        )
        .bind(task_id)
        .bind(limit)
        .fetch_all(pool)
        .await
    }
}
