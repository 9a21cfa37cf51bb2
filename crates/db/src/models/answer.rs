use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

/// One user's state for one checklist item on one task.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ChecklistAnswer {
    pub id: Uuid,
    pub task_id: Uuid,
    pub checklist_id: Uuid,
    pub item_index: i64,
    pub user_id: Uuid,
    pub completed: bool,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuestionAnswer {
    pub id: Uuid,
    pub task_id: Uuid,
    pub question_id: Uuid,
    pub user_id: Uuid,
    pub answer: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChecklistAnswer {
    /// Insert or overwrite the answer keyed by (task, checklist, item, user).
    pub async fn upsert(
        pool: &SqlitePool,
        task_id: Uuid,
        checklist_id: Uuid,
        item_index: i64,
        user_id: Uuid,
        completed: bool,
        notes: Option<&str>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, ChecklistAnswer>(
            r#"INSERT INTO checklist_answers (id, task_id, checklist_id, item_index, user_id, completed, notes)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
               ON CONFLICT (task_id, checklist_id, item_index, user_id) DO UPDATE
               SET completed = excluded.completed,
                   notes = excluded.notes,
                   updated_at = datetime('now', 'subsec')
               RETURNING *"#,
        )
        .bind(Uuid::new_v4())
        .bind(task_id)
        .bind(checklist_id)
        .bind(item_index)
        .bind(user_id)
        .bind(completed)
        .bind(notes)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_task(pool: &SqlitePool, task_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, ChecklistAnswer>(
            "SELECT * FROM checklist_answers WHERE task_id = ?1 ORDER BY checklist_id, item_index, user_id",
        )
        .bind(task_id)
        .fetch_all(pool)
        .await
    }
}

impl QuestionAnswer {
    pub async fn upsert(
        pool: &SqlitePool,
        task_id: Uuid,
        question_id: Uuid,
        user_id: Uuid,
        answer: &str,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, QuestionAnswer>(
            r#"INSERT INTO question_answers (id, task_id, question_id, user_id, answer)
               VALUES (?1, ?2, ?3, ?4, ?5)
               ON CONFLICT (task_id, question_id, user_id) DO UPDATE
               SET answer = excluded.answer,
                   updated_at = datetime('now', 'subsec')
               RETURNING *"#,
        )
        .bind(Uuid::new_v4())
        .bind(task_id)
        .bind(question_id)
        .bind(user_id)
        .bind(answer)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_task(pool: &SqlitePool, task_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, QuestionAnswer>(
            "SELECT * FROM question_answers WHERE task_id = ?1 ORDER BY created_at, rowid",
        )
        .bind(task_id)
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::task::Task;
    use crate::test_utils::{seed_tenant, setup_test_pool};

    #[tokio::test]
    async fn checklist_upsert_overwrites_single_row() {
        let pool = setup_test_pool().await;
        let seed = seed_tenant(&pool).await;
        let task = Task::insert(&pool, &seed.new_task("Checklist")).await.unwrap();
        let checklist_id = Uuid::new_v4();

        let first = ChecklistAnswer::upsert(&pool, task.id, checklist_id, 2, seed.tasker.id, true, None)
            .await
            .unwrap();
        let second =
            ChecklistAnswer::upsert(&pool, task.id, checklist_id, 2, seed.tasker.id, false, Some("redo"))
                .await
                .unwrap();

        assert_eq!(first.id, second.id);
        let rows = ChecklistAnswer::find_by_task(&pool, task.id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(!rows[0].completed);
        assert_eq!(rows[0].notes.as_deref(), Some("redo"));
    }

    #[tokio::test]
    async fn question_answers_are_per_user() {
        let pool = setup_test_pool().await;
        let seed = seed_tenant(&pool).await;
        let task = Task::insert(&pool, &seed.new_task("Brief")).await.unwrap();
        let question_id = Uuid::new_v4();

        QuestionAnswer::upsert(&pool, task.id, question_id, seed.tasker.id, "Blue")
            .await
            .unwrap();
        QuestionAnswer::upsert(&pool, task.id, question_id, seed.admin.id, "Red")
            .await
            .unwrap();
        QuestionAnswer::upsert(&pool, task.id, question_id, seed.tasker.id, "Green")
            .await
            .unwrap();

        let answers = QuestionAnswer::find_by_task(&pool, task.id).await.unwrap();
        assert_eq!(answers.len(), 2);
        assert!(answers.iter().any(|a| a.user_id == seed.tasker.id && a.answer == "Green"));
    }
}
