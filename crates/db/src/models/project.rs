use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub client_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProject {
    pub tenant_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub client_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
}

impl Project {
    pub async fn find_in_tenant(
        pool: &SqlitePool,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE id = ?1 AND tenant_id = ?2")
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_by_tenant(pool: &SqlitePool, tenant_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE tenant_id = ?1 ORDER BY title")
            .bind(tenant_id)
            .fetch_all(pool)
            .await
    }

    /// Projects a user created or is a member of.
    pub async fn list_for_member(
        pool: &SqlitePool,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Project>(
            r#"SELECT p.* FROM projects p
               WHERE p.tenant_id = ?1
                 AND (p.created_by = ?2
                      OR EXISTS (SELECT 1 FROM project_users pu
                                 WHERE pu.project_id = p.id AND pu.user_id = ?2))
               ORDER BY p.title"#,
        )
        .bind(tenant_id)
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    pub async fn create(pool: &SqlitePool, data: &CreateProject) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Project>(
            r#"INSERT INTO projects (id, tenant_id, title, description, client_id, created_by)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6)
               RETURNING *"#,
        )
        .bind(Uuid::new_v4())
        .bind(data.tenant_id)
        .bind(&data.title)
        .bind(&data.description)
        .bind(data.client_id)
        .bind(data.created_by)
        .fetch_one(pool)
        .await
    }

    pub async fn add_member(pool: &SqlitePool, project_id: Uuid, user_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT OR IGNORE INTO project_users (project_id, user_id) VALUES (?1, ?2)")
            .bind(project_id)
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{seed_tenant, setup_test_pool};

    #[tokio::test]
    async fn membership_scoped_listing() {
        let pool = setup_test_pool().await;
        let seed = seed_tenant(&pool).await;

        let own = Project::create(
            &pool,
            &CreateProject {
                tenant_id: seed.tenant_id,
                title: "Requester launch".into(),
                description: None,
                client_id: None,
                created_by: Some(seed.requester.id),
            },
        )
        .await
        .unwrap();

        let visible = Project::list_for_member(&pool, seed.tenant_id, seed.requester.id)
            .await
            .unwrap();
        assert_eq!(visible.iter().map(|p| p.id).collect::<Vec<_>>(), vec![own.id]);

        Project::add_member(&pool, seed.project.id, seed.requester.id).await.unwrap();
        let visible = Project::list_for_member(&pool, seed.tenant_id, seed.requester.id)
            .await
            .unwrap();
        assert_eq!(visible.len(), 2);
    }
}
