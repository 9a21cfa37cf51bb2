use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, types::Json};
use uuid::Uuid;

/// Reusable task skeleton. Tasks snapshot its contents at creation time.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Template {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub title: String,
    pub standard_brief: Option<String>,
    pub description: Option<String>,
    pub deliverable_quantity: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TemplateQuestion {
    pub id: Uuid,
    pub template_id: Uuid,
    pub question_text: String,
    pub question_type: String,
    pub options: Option<Json<Vec<String>>>,
    pub position: i64,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TemplateChecklist {
    pub id: Uuid,
    pub template_id: Uuid,
    pub title: Option<String>,
    pub items: Json<Vec<String>>,
    pub position: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTemplate {
    pub tenant_id: Uuid,
    pub title: String,
    pub standard_brief: Option<String>,
    pub description: Option<String>,
    pub deliverable_quantity: Option<i64>,
}

impl Template {
    pub async fn find_in_tenant(
        pool: &SqlitePool,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Template>("SELECT * FROM templates WHERE id = ?1 AND tenant_id = ?2")
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn questions(pool: &SqlitePool, template_id: Uuid) -> Result<Vec<TemplateQuestion>, sqlx::Error> {
        sqlx::query_as::<_, TemplateQuestion>(
            "SELECT * FROM template_questions WHERE template_id = ?1 ORDER BY position",
        )
        .bind(template_id)
        .fetch_all(pool)
        .await
    }

    pub async fn checklists(
        pool: &SqlitePool,
        template_id: Uuid,
    ) -> Result<Vec<TemplateChecklist>, sqlx::Error> {
        sqlx::query_as::<_, TemplateChecklist>(
            "SELECT * FROM template_checklists WHERE template_id = ?1 ORDER BY position",
        )
        .bind(template_id)
        .fetch_all(pool)
        .await
    }

    pub async fn create(pool: &SqlitePool, data: &CreateTemplate) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Template>(
            r#"INSERT INTO templates (id, tenant_id, title, standard_brief, description, deliverable_quantity)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6)
               RETURNING *"#,
        )
        .bind(Uuid::new_v4())
        .bind(data.tenant_id)
        .bind(&data.title)
        .bind(&data.standard_brief)
        .bind(&data.description)
        .bind(data.deliverable_quantity)
        .fetch_one(pool)
        .await
    }

    pub async fn add_question(
        pool: &SqlitePool,
        template_id: Uuid,
        question_text: &str,
        question_type: &str,
        options: Option<Vec<String>>,
        position: i64,
    ) -> Result<TemplateQuestion, sqlx::Error> {
        sqlx::query_as::<_, TemplateQuestion>(
            r#"INSERT INTO template_questions (id, template_id, question_text, question_type, options, position)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6)
               RETURNING *"#,
        )
        .bind(Uuid::new_v4())
        .bind(template_id)
        .bind(question_text)
        .bind(question_type)
        .bind(options.map(Json))
        .bind(position)
        .fetch_one(pool)
        .await
    }

    pub async fn add_checklist(
        pool: &SqlitePool,
        template_id: Uuid,
        title: Option<&str>,
        items: Vec<String>,
        position: i64,
    ) -> Result<TemplateChecklist, sqlx::Error> {
        sqlx::query_as::<_, TemplateChecklist>(
            r#"INSERT INTO template_checklists (id, template_id, title, items, position)
               VALUES (?1, ?2, ?3, ?4, ?5)
               RETURNING *"#,
        )
        .bind(Uuid::new_v4())
        .bind(template_id)
        .bind(title)
        .bind(Json(items))
        .bind(position)
        .fetch_one(pool)
        .await
    }

    pub async fn update_checklist_items(
        pool: &SqlitePool,
        checklist_id: Uuid,
        items: Vec<String>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE template_checklists SET items = ?2 WHERE id = ?1")
            .bind(checklist_id)
            .bind(Json(items))
            .execute(pool)
            .await?;
        Ok(())
    }
}
