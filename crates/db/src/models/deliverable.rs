use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool, Type};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize, Default)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DeliverableType {
    Design,
    Document,
    Presentation,
    File,
    Link,
    #[default]
    Other,
}

impl std::str::FromStr for DeliverableType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "design" => Ok(Self::Design),
            "document" => Ok(Self::Document),
            "presentation" => Ok(Self::Presentation),
            "file" => Ok(Self::File),
            "link" => Ok(Self::Link),
            "other" | "" => Ok(Self::Other),
            other => Err(format!("Unknown deliverable type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TaskDeliverable {
    pub id: Uuid,
    pub task_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub deliverable_type: DeliverableType,
    pub google_link: Option<String>,
    pub external_link: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct DeliverableFile {
    pub id: Uuid,
    pub deliverable_id: Uuid,
    pub file_path: String,
    pub original_name: String,
    pub mime_type: Option<String>,
    pub size_bytes: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateDeliverable {
    pub task_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub deliverable_type: DeliverableType,
    pub google_link: Option<String>,
    pub external_link: Option<String>,
    pub created_by: Uuid,
}

#[derive(Debug, Clone)]
pub struct NewDeliverableFile {
    pub file_path: String,
    pub original_name: String,
    pub mime_type: Option<String>,
    pub size_bytes: i64,
}

impl TaskDeliverable {
    pub async fn create<'e, E>(executor: E, data: &CreateDeliverable) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, TaskDeliverable>(
            r#"INSERT INTO task_deliverables
                   (id, task_id, title, description, deliverable_type, google_link, external_link, created_by)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
               RETURNING *"#,
        )
        .bind(Uuid::new_v4())
        .bind(data.task_id)
        .bind(&data.title)
        .bind(&data.description)
        .bind(data.deliverable_type)
        .bind(&data.google_link)
        .bind(&data.external_link)
        .bind(data.created_by)
        .fetch_one(executor)
        .await
    }

    pub async fn add_file<'e, E>(
        executor: E,
        deliverable_id: Uuid,
        file: &NewDeliverableFile,
    ) -> Result<DeliverableFile, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, DeliverableFile>(
            r#"INSERT INTO task_deliverable_files
                   (id, deliverable_id, file_path, original_name, mime_type, size_bytes)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6)
               RETURNING *"#,
        )
        .bind(Uuid::new_v4())
        .bind(deliverable_id)
        .bind(&file.file_path)
        .bind(&file.original_name)
        .bind(&file.mime_type)
        .bind(file.size_bytes)
        .fetch_one(executor)
        .await
    }

    pub async fn find_in_task(
        pool: &SqlitePool,
        task_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, TaskDeliverable>(
            "SELECT * FROM task_deliverables WHERE id = ?1 AND task_id = ?2",
        )
        .bind(id)
        .bind(task_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_task(pool: &SqlitePool, task_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, TaskDeliverable>(
            "SELECT * FROM task_deliverables WHERE task_id = ?1 ORDER BY created_at, rowid",
        )
        .bind(task_id)
        .fetch_all(pool)
        .await
    }

    pub async fn files(pool: &SqlitePool, deliverable_id: Uuid) -> Result<Vec<DeliverableFile>, sqlx::Error> {
        sqlx::query_as::<_, DeliverableFile>(
            "SELECT * FROM task_deliverable_files WHERE deliverable_id = ?1 ORDER BY created_at, rowid",
        )
        .bind(deliverable_id)
        .fetch_all(pool)
        .await
    }

    pub async fn mark_completed(
        pool: &SqlitePool,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, TaskDeliverable>(
            "UPDATE task_deliverables SET completed_at = ?2, updated_at = ?2 WHERE id = ?1 RETURNING *",
        )
        .bind(id)
        .bind(at)
        .fetch_one(pool)
        .await
    }
}
