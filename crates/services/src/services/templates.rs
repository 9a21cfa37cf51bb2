//! Brief template application.
//!
//! A template's questions and checklist items are copied onto the task at
//! creation time. Later edits to the template do not reach existing tasks.

use db::models::{
    task::{ChecklistSnapshot, QuestionSnapshot},
    template::Template,
};
use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateSnapshot {
    pub template_id: Uuid,
    pub title: String,
    pub standard_brief: Option<String>,
    pub description: Option<String>,
    pub deliverable_quantity: Option<i64>,
    pub questions: Vec<QuestionSnapshot>,
    pub checklist: Vec<ChecklistSnapshot>,
}

impl TemplateSnapshot {
    /// Text that becomes the task description: the standard brief when the
    /// template has one, its description otherwise.
    pub fn brief(&self) -> Option<String> {
        self.standard_brief
            .clone()
            .filter(|b| !b.trim().is_empty())
            .or_else(|| self.description.clone())
    }
}

#[derive(Clone)]
pub struct BriefTemplateApplier {
    pool: SqlitePool,
}

impl BriefTemplateApplier {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Snapshot a template. Returns `None` when the id does not resolve in the
    /// tenant or the lookup fails, so callers fall back to raw request fields.
    pub async fn apply(&self, tenant_id: Uuid, template_id: Uuid) -> Option<TemplateSnapshot> {
        match self.snapshot(tenant_id, template_id).await {
            Ok(Some(snapshot)) => Some(snapshot),
            Ok(None) => {
                tracing::warn!(%template_id, "Template not found; using request fields");
                None
            }
            Err(e) => {
                tracing::warn!(%template_id, "Template lookup failed; using request fields: {}", e);
                None
            }
        }
    }

    async fn snapshot(
        &self,
        tenant_id: Uuid,
        template_id: Uuid,
    ) -> Result<Option<TemplateSnapshot>, sqlx::Error> {
        let Some(template) = Template::find_in_tenant(&self.pool, tenant_id, template_id).await? else {
            return Ok(None);
        };

        let questions = Template::questions(&self.pool, template.id)
            .await?
            .into_iter()
            .map(|q| QuestionSnapshot {
                id: q.id,
                question_text: q.question_text,
                question_type: q.question_type,
                options: q.options.map(|o| o.0).unwrap_or_default(),
            })
            .collect();

        let checklist = Template::checklists(&self.pool, template.id)
            .await?
            .into_iter()
            .map(|c| ChecklistSnapshot {
                id: c.id,
                title: c.title,
                items: c.items.0,
            })
            .collect();

        Ok(Some(TemplateSnapshot {
            template_id: template.id,
            title: template.title,
            standard_brief: template.standard_brief,
            description: template.description,
            deliverable_quantity: template.deliverable_quantity,
            questions,
            checklist,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use db::{
        models::template::CreateTemplate,
        test_utils::{seed_tenant, setup_test_pool},
    };

    #[tokio::test]
    async fn snapshot_copies_questions_and_checklist() {
        let pool = setup_test_pool().await;
        let seed = seed_tenant(&pool).await;
        let template = Template::create(
            &pool,
            &CreateTemplate {
                tenant_id: seed.tenant_id,
                title: "Social post".into(),
                standard_brief: Some("Do X".into()),
                description: Some("Longer description".into()),
                deliverable_quantity: Some(3),
            },
        )
        .await
        .unwrap();
        Template::add_question(&pool, template.id, "Tone?", "select", Some(vec!["Fun".into()]), 0)
            .await
            .unwrap();
        Template::add_checklist(&pool, template.id, Some("Copy"), vec!["Draft copy".into()], 0)
            .await
            .unwrap();

        let snapshot = BriefTemplateApplier::new(pool.clone())
            .apply(seed.tenant_id, template.id)
            .await
            .expect("snapshot");

        assert_eq!(snapshot.brief().as_deref(), Some("Do X"));
        assert_eq!(snapshot.questions[0].options, vec!["Fun".to_string()]);
        assert_eq!(snapshot.checklist[0].items, vec!["Draft copy".to_string()]);
    }

    #[tokio::test]
    async fn unknown_template_falls_back() {
        let pool = setup_test_pool().await;
        let seed = seed_tenant(&pool).await;
        let applier = BriefTemplateApplier::new(pool.clone());
        assert!(applier.apply(seed.tenant_id, Uuid::new_v4()).await.is_none());
    }
}
