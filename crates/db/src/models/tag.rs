use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Tag {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

impl Tag {
    pub async fn create(pool: &SqlitePool, tenant_id: Uuid, title: &str) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Tag>("INSERT INTO tags (id, tenant_id, title) VALUES (?1, ?2, ?3) RETURNING *")
            .bind(Uuid::new_v4())
            .bind(tenant_id)
            .bind(title)
            .fetch_one(pool)
            .await
    }

    pub async fn find_many(pool: &SqlitePool, ids: &[Uuid]) -> Result<Vec<Self>, sqlx::Error> {
        let mut tags = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(tag) = sqlx::query_as::<_, Tag>("SELECT * FROM tags WHERE id = ?1")
                .bind(id)
                .fetch_optional(pool)
                .await?
            {
                tags.push(tag);
            }
        }
        Ok(tags)
    }
}
