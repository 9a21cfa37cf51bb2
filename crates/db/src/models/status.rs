use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool};
use uuid::Uuid;

pub const COMPLETED_SLUG: &str = "completed";
pub const REJECTED_SLUG: &str = "rejected";

/// Tenant-defined task status. Only the `completed` and `rejected` slugs
/// carry business meaning.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Status {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub title: String,
    pub slug: String,
    pub position: i64,
    pub created_at: DateTime<Utc>,
}

impl Status {
    pub fn is_completed(&self) -> bool {
        self.slug == COMPLETED_SLUG
    }

    pub fn is_rejected(&self) -> bool {
        self.slug == REJECTED_SLUG
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Status>("SELECT * FROM statuses WHERE id = ?1")
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn find_in_tenant(
        pool: &SqlitePool,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Status>("SELECT * FROM statuses WHERE id = ?1 AND tenant_id = ?2")
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_slug<'e, E>(
        executor: E,
        tenant_id: Uuid,
        slug: &str,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Status>("SELECT * FROM statuses WHERE tenant_id = ?1 AND slug = ?2")
            .bind(tenant_id)
            .bind(slug)
            .fetch_optional(executor)
            .await
    }

    pub async fn rejected(pool: &SqlitePool, tenant_id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        Self::find_by_slug(pool, tenant_id, REJECTED_SLUG).await
    }

    /// Lowest-positioned status, used for freshly generated occurrences.
    pub async fn default_for_tenant<'e, E>(
        executor: E,
        tenant_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Status>(
            "SELECT * FROM statuses WHERE tenant_id = ?1 ORDER BY position, created_at LIMIT 1",
        )
        .bind(tenant_id)
        .fetch_optional(executor)
        .await
    }

    pub async fn list_by_tenant(pool: &SqlitePool, tenant_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Status>(
            "SELECT * FROM statuses WHERE tenant_id = ?1 ORDER BY position, title",
        )
        .bind(tenant_id)
        .fetch_all(pool)
        .await
    }

    pub async fn create(
        pool: &SqlitePool,
        tenant_id: Uuid,
        title: &str,
        slug: &str,
        position: i64,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Status>(
            r#"INSERT INTO statuses (id, tenant_id, title, slug, position)
               VALUES (?1, ?2, ?3, ?4, ?5)
               RETURNING *"#,
        )
        .bind(Uuid::new_v4())
        .bind(tenant_id)
        .bind(title)
        .bind(slug)
        .bind(position)
        .fetch_one(pool)
        .await
    }

    pub async fn usage_count(pool: &SqlitePool, id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM tasks WHERE status_id = ?1")
            .bind(id)
            .fetch_one(pool)
            .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM statuses WHERE id = ?1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
