use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct TaskType {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub task_type: String,
    pub created_at: DateTime<Utc>,
}

impl TaskType {
    pub async fn find_in_tenant(
        pool: &SqlitePool,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, TaskType>("SELECT * FROM task_types WHERE id = ?1 AND tenant_id = ?2")
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_by_tenant(pool: &SqlitePool, tenant_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, TaskType>(
            "SELECT * FROM task_types WHERE tenant_id = ?1 ORDER BY task_type",
        )
        .bind(tenant_id)
        .fetch_all(pool)
        .await
    }

    pub async fn create(pool: &SqlitePool, tenant_id: Uuid, task_type: &str) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, TaskType>(
            "INSERT INTO task_types (id, tenant_id, task_type) VALUES (?1, ?2, ?3) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(tenant_id)
        .bind(task_type)
        .fetch_one(pool)
        .await
    }

    pub async fn usage_count(pool: &SqlitePool, id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM tasks WHERE task_type_id = ?1")
            .bind(id)
            .fetch_one(pool)
            .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM task_types WHERE id = ?1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
