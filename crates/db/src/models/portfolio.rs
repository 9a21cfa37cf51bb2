use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool, types::Json};
use uuid::Uuid;

use super::deliverable::DeliverableType;

/// Client-facing copy of a deliverable. Written once when the deliverable is
/// created and never synced back.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Portfolio {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub client_id: Uuid,
    pub project_id: Option<Uuid>,
    pub task_id: Option<Uuid>,
    pub deliverable_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub deliverable_type: DeliverableType,
    pub google_link: Option<String>,
    pub external_link: Option<String>,
    pub files: Json<Vec<String>>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreatePortfolio {
    pub tenant_id: Uuid,
    pub client_id: Uuid,
    pub project_id: Option<Uuid>,
    pub task_id: Uuid,
    pub deliverable_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub deliverable_type: DeliverableType,
    pub google_link: Option<String>,
    pub external_link: Option<String>,
    pub files: Vec<String>,
    pub created_by: Uuid,
}

impl Portfolio {
    pub async fn create<'e, E>(executor: E, data: &CreatePortfolio) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Portfolio>(
            r#"INSERT INTO portfolios
                   (id, tenant_id, client_id, project_id, task_id, deliverable_id, title,
                    description, deliverable_type, google_link, external_link, files, created_by)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
               RETURNING *"#,
        )
        .bind(Uuid::new_v4())
        .bind(data.tenant_id)
        .bind(data.client_id)
        .bind(data.project_id)
        .bind(data.task_id)
        .bind(data.deliverable_id)
        .bind(&data.title)
        .bind(&data.description)
        .bind(data.deliverable_type)
        .bind(&data.google_link)
        .bind(&data.external_link)
        .bind(Json(data.files.clone()))
        .bind(data.created_by)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_deliverable(
        pool: &SqlitePool,
        deliverable_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Portfolio>("SELECT * FROM portfolios WHERE deliverable_id = ?1")
            .bind(deliverable_id)
            .fetch_optional(pool)
            .await
    }
}
