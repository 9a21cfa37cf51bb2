use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub task_id: Option<Uuid>,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateNotification {
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub task_id: Option<Uuid>,
}

impl Notification {
    pub async fn create(pool: &SqlitePool, data: &CreateNotification) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Notification>(
            r#"INSERT INTO notifications (id, tenant_id, user_id, kind, title, message, task_id)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
               RETURNING *"#,
        )
        .bind(Uuid::new_v4())
        .bind(data.tenant_id)
        .bind(data.user_id)
        .bind(&data.kind)
        .bind(&data.title)
        .bind(&data.message)
        .bind(data.task_id)
        .fetch_one(pool)
        .await
    }

    pub async fn find_for_user(pool: &SqlitePool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Notification>(
            "SELECT * FROM notifications WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }
}
