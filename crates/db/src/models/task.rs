use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, QueryBuilder, Sqlite, SqliteConnection, SqlitePool, Type, types::Json};
use uuid::Uuid;

use super::status::REJECTED_SLUG;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RepeatFrequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl std::str::FromStr for RepeatFrequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            other => Err(format!("Unknown repeat frequency: {}", other)),
        }
    }
}

/// Template question text frozen onto a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionSnapshot {
    pub id: Uuid,
    pub question_text: String,
    pub question_type: String,
    #[serde(default)]
    pub options: Vec<String>,
}

/// Template checklist frozen onto a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistSnapshot {
    pub id: Uuid,
    pub title: Option<String>,
    pub items: Vec<String>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status_id: Uuid,
    pub priority_id: Uuid,
    pub task_type_id: Option<Uuid>,
    pub project_id: Uuid,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub close_deadline: bool,
    pub is_repeating: bool,
    pub repeat_frequency: Option<RepeatFrequency>,
    pub repeat_interval: i64,
    pub repeat_until: Option<DateTime<Utc>>,
    pub repeat_active: bool,
    pub parent_task_id: Option<Uuid>,
    pub last_repeated_at: Option<DateTime<Utc>>,
    pub template_id: Option<Uuid>,
    pub template_questions: Option<Json<Vec<QuestionSnapshot>>>,
    pub template_checklist: Option<Json<Vec<ChecklistSnapshot>>>,
    pub template_standard_brief: Option<String>,
    pub template_description: Option<String>,
    pub template_deliverable_quantity: Option<i64>,
    pub deliverable_quantity: Option<i64>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fully validated row data for an insert.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub tenant_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status_id: Uuid,
    pub priority_id: Uuid,
    pub task_type_id: Option<Uuid>,
    pub project_id: Uuid,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub close_deadline: bool,
    pub is_repeating: bool,
    pub repeat_frequency: Option<RepeatFrequency>,
    pub repeat_interval: i64,
    pub repeat_until: Option<DateTime<Utc>>,
    pub parent_task_id: Option<Uuid>,
    pub template_id: Option<Uuid>,
    pub template_questions: Option<Vec<QuestionSnapshot>>,
    pub template_checklist: Option<Vec<ChecklistSnapshot>>,
    pub template_standard_brief: Option<String>,
    pub template_description: Option<String>,
    pub template_deliverable_quantity: Option<i64>,
    pub deliverable_quantity: Option<i64>,
    pub created_by: Option<Uuid>,
}

/// Row-level restriction derived from the caller's roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskVisibility {
    All,
    CreatedOrAssigned(Uuid),
    AssignedTo(Uuid),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskFilter {
    pub search: Option<String>,
    pub user_id: Option<Uuid>,
    pub status_id: Option<Uuid>,
    pub priority_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    /// Instant the strict-deadline correction is evaluated at; defaults to now.
    #[serde(skip)]
    pub as_of: Option<DateTime<Utc>>,
}

impl Task {
    pub fn questions(&self) -> &[QuestionSnapshot] {
        self.template_questions.as_ref().map(|q| q.0.as_slice()).unwrap_or(&[])
    }

    pub fn checklist(&self) -> &[ChecklistSnapshot] {
        self.template_checklist.as_ref().map(|c| c.0.as_slice()).unwrap_or(&[])
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = ?1")
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn find_in_tenant(
        pool: &SqlitePool,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = ?1 AND tenant_id = ?2")
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn insert<'e, E>(executor: E, data: &NewTask) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Task>(
            r#"INSERT INTO tasks (
                   id, tenant_id, title, description, status_id, priority_id, task_type_id,
                   project_id, start_date, end_date, close_deadline, is_repeating,
                   repeat_frequency, repeat_interval, repeat_until, parent_task_id,
                   template_id, template_questions, template_checklist,
                   template_standard_brief, template_description,
                   template_deliverable_quantity, deliverable_quantity, created_by
               )
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                       ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24)
               RETURNING *"#,
        )
        .bind(Uuid::new_v4())
        .bind(data.tenant_id)
        .bind(&data.title)
        .bind(&data.description)
        .bind(data.status_id)
        .bind(data.priority_id)
        .bind(data.task_type_id)
        .bind(data.project_id)
        .bind(data.start_date)
        .bind(data.end_date)
        .bind(data.close_deadline)
        .bind(data.is_repeating)
        .bind(data.repeat_frequency)
        .bind(data.repeat_interval.max(1))
        .bind(data.repeat_until)
        .bind(data.parent_task_id)
        .bind(data.template_id)
        .bind(data.template_questions.clone().map(Json))
        .bind(data.template_checklist.clone().map(Json))
        .bind(&data.template_standard_brief)
        .bind(&data.template_description)
        .bind(data.template_deliverable_quantity)
        .bind(data.deliverable_quantity)
        .bind(data.created_by)
        .fetch_one(executor)
        .await
    }

    /// Persist the mutable scalar columns of an already-loaded task.
    pub async fn save<'e, E>(executor: E, task: &Task) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Task>(
            r#"UPDATE tasks
               SET title = ?2, description = ?3, status_id = ?4, priority_id = ?5,
                   task_type_id = ?6, project_id = ?7, start_date = ?8, end_date = ?9,
                   close_deadline = ?10, is_repeating = ?11, repeat_frequency = ?12,
                   repeat_interval = ?13, repeat_until = ?14, deliverable_quantity = ?15,
                   updated_at = ?16
               WHERE id = ?1
               RETURNING *"#,
        )
        .bind(task.id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.status_id)
        .bind(task.priority_id)
        .bind(task.task_type_id)
        .bind(task.project_id)
        .bind(task.start_date)
        .bind(task.end_date)
        .bind(task.close_deadline)
        .bind(task.is_repeating)
        .bind(task.repeat_frequency)
        .bind(task.repeat_interval.max(1))
        .bind(task.repeat_until)
        .bind(task.deliverable_quantity)
        .bind(Utc::now())
        .fetch_one(executor)
        .await
    }

    pub async fn update_status<'e, E>(executor: E, id: Uuid, status_id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("UPDATE tasks SET status_id = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(status_id)
            .bind(Utc::now())
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    /// Move an expired task to the rejected status unless it is already there.
    pub async fn reject_if_not<'e, E>(executor: E, id: Uuid, rejected_id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            "UPDATE tasks SET status_id = ?2, updated_at = ?3 WHERE id = ?1 AND status_id != ?2",
        )
        .bind(id)
        .bind(rejected_id)
        .bind(Utc::now())
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn set_repeat_active(pool: &SqlitePool, id: Uuid, active: bool) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE tasks SET repeat_active = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(active)
            .bind(Utc::now())
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn set_last_repeated_at<'e, E>(
        executor: E,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query("UPDATE tasks SET last_repeated_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(at)
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    /// Parents eligible for occurrence generation.
    pub async fn find_repeating_parents(
        pool: &SqlitePool,
        tenant_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(
            r#"SELECT * FROM tasks
               WHERE tenant_id = ?1 AND is_repeating = 1 AND repeat_active = 1
                 AND parent_task_id IS NULL AND repeat_frequency IS NOT NULL
               ORDER BY created_at"#,
        )
        .bind(tenant_id)
        .fetch_all(pool)
        .await
    }

    pub async fn latest_child<'e, E>(executor: E, parent_id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Task>(
            "SELECT * FROM tasks WHERE parent_task_id = ?1 ORDER BY start_date DESC, created_at DESC LIMIT 1",
        )
        .bind(parent_id)
        .fetch_optional(executor)
        .await
    }

    pub async fn children(pool: &SqlitePool, parent_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(
            "SELECT * FROM tasks WHERE parent_task_id = ?1 ORDER BY start_date, created_at",
        )
        .bind(parent_id)
        .fetch_all(pool)
        .await
    }

    /// Candidates for deadline enforcement; expiry itself is decided by the caller.
    pub async fn find_strict_deadline(pool: &SqlitePool, tenant_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(
            "SELECT * FROM tasks WHERE tenant_id = ?1 AND close_deadline = 1 AND end_date IS NOT NULL",
        )
        .bind(tenant_id)
        .fetch_all(pool)
        .await
    }

    fn push_conditions<'a>(
        builder: &mut QueryBuilder<'a, Sqlite>,
        tenant_id: Uuid,
        visibility: TaskVisibility,
        filter: &'a TaskFilter,
    ) {
        builder.push(" WHERE t.tenant_id = ").push_bind(tenant_id);

        match visibility {
            TaskVisibility::All => {}
            TaskVisibility::CreatedOrAssigned(user_id) => {
                builder
                    .push(" AND (t.created_by = ")
                    .push_bind(user_id)
                    .push(" OR EXISTS (SELECT 1 FROM task_users tu WHERE tu.task_id = t.id AND tu.user_id = ")
                    .push_bind(user_id)
                    .push("))");
            }
            TaskVisibility::AssignedTo(user_id) => {
                builder
                    .push(" AND EXISTS (SELECT 1 FROM task_users tu WHERE tu.task_id = t.id AND tu.user_id = ")
                    .push_bind(user_id)
                    .push(")");
            }
        }

        if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
            let pattern = utils::text::like_pattern(search);
            builder
                .push(" AND (t.title LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR t.description LIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '\\')");
        }
        if let Some(user_id) = filter.user_id {
            builder
                .push(" AND EXISTS (SELECT 1 FROM task_users fu WHERE fu.task_id = t.id AND fu.user_id = ")
                .push_bind(user_id)
                .push(")");
        }
        if let Some(client_id) = filter.client_id {
            builder
                .push(" AND EXISTS (SELECT 1 FROM task_clients fc WHERE fc.task_id = t.id AND fc.client_id = ")
                .push_bind(client_id)
                .push(")");
        }
        if let Some(status_id) = filter.status_id {
            // Match on the deadline-corrected status so expired strict tasks
            // filter as Rejected.
            let now = filter.as_of.unwrap_or_else(Utc::now);
            builder
                .push(
                    " AND COALESCE(CASE WHEN t.close_deadline = 1 AND t.end_date IS NOT NULL \
                     AND julianday(t.end_date) < julianday(",
                )
                .push_bind(now)
                .push(
                    ") THEN (SELECT rs.id FROM statuses rs WHERE rs.tenant_id = t.tenant_id AND rs.slug = ",
                )
                .push_bind(REJECTED_SLUG)
                .push(") END, t.status_id) = ")
                .push_bind(status_id);
        }
        if let Some(priority_id) = filter.priority_id {
            builder.push(" AND t.priority_id = ").push_bind(priority_id);
        }
        if let Some(project_id) = filter.project_id {
            builder.push(" AND t.project_id = ").push_bind(project_id);
        }
    }

    /// One page of tasks visible under `visibility`, newest first, plus the total.
    pub async fn find_filtered(
        pool: &SqlitePool,
        tenant_id: Uuid,
        visibility: TaskVisibility,
        filter: &TaskFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM tasks t");
        Self::push_conditions(&mut count, tenant_id, visibility, filter);
        let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

        let mut select = QueryBuilder::<Sqlite>::new("SELECT t.* FROM tasks t");
        Self::push_conditions(&mut select, tenant_id, visibility, filter);
        select
            .push(" ORDER BY t.created_at DESC, t.id LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
        let tasks = select.build_query_as::<Task>().fetch_all(pool).await?;

        Ok((tasks, total))
    }

    /// Every visible task, unpaginated. Used by dashboard and resolver lookups.
    pub async fn find_visible(
        pool: &SqlitePool,
        tenant_id: Uuid,
        visibility: TaskVisibility,
        filter: &TaskFilter,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut select = QueryBuilder::<Sqlite>::new("SELECT t.* FROM tasks t");
        Self::push_conditions(&mut select, tenant_id, visibility, filter);
        select.push(" ORDER BY t.created_at, t.id");
        select.build_query_as::<Task>().fetch_all(pool).await
    }

    pub async fn user_ids<'e, E>(executor: E, task_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_scalar::<_, Uuid>("SELECT user_id FROM task_users WHERE task_id = ?1 ORDER BY rowid")
            .bind(task_id)
            .fetch_all(executor)
            .await
    }

    pub async fn client_ids<'e, E>(executor: E, task_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT client_id FROM task_clients WHERE task_id = ?1 ORDER BY rowid",
        )
        .bind(task_id)
        .fetch_all(executor)
        .await
    }

    pub async fn tag_ids<'e, E>(executor: E, task_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_scalar::<_, Uuid>("SELECT tag_id FROM task_tags WHERE task_id = ?1 ORDER BY rowid")
            .bind(task_id)
            .fetch_all(executor)
            .await
    }

    /// Replace the assignee set. Returns the ids that were not assigned before.
    pub async fn sync_users(
        conn: &mut SqliteConnection,
        task_id: Uuid,
        user_ids: &[Uuid],
    ) -> Result<Vec<Uuid>, sqlx::Error> {
        Self::sync_pivot(conn, "task_users", "user_id", task_id, user_ids).await
    }

    pub async fn sync_clients(
        conn: &mut SqliteConnection,
        task_id: Uuid,
        client_ids: &[Uuid],
    ) -> Result<Vec<Uuid>, sqlx::Error> {
        Self::sync_pivot(conn, "task_clients", "client_id", task_id, client_ids).await
    }

    pub async fn sync_tags(
        conn: &mut SqliteConnection,
        task_id: Uuid,
        tag_ids: &[Uuid],
    ) -> Result<Vec<Uuid>, sqlx::Error> {
        Self::sync_pivot(conn, "task_tags", "tag_id", task_id, tag_ids).await
    }

    async fn sync_pivot(
        conn: &mut SqliteConnection,
        table: &'static str,
        column: &'static str,
        task_id: Uuid,
        ids: &[Uuid],
    ) -> Result<Vec<Uuid>, sqlx::Error> {
        let existing: Vec<Uuid> =
            sqlx::query_scalar(&format!("SELECT {column} FROM {table} WHERE task_id = ?1"))
                .bind(task_id)
                .fetch_all(&mut *conn)
                .await?;

        sqlx::query(&format!("DELETE FROM {table} WHERE task_id = ?1"))
            .bind(task_id)
            .execute(&mut *conn)
            .await?;

        let mut added = Vec::new();
        let mut seen = Vec::with_capacity(ids.len());
        for id in ids {
            if seen.contains(id) {
                continue;
            }
            seen.push(*id);
            sqlx::query(&format!("INSERT INTO {table} (task_id, {column}) VALUES (?1, ?2)"))
                .bind(task_id)
                .bind(id)
                .execute(&mut *conn)
                .await?;
            if !existing.contains(id) {
                added.push(*id);
            }
        }
        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{seed_tenant, setup_test_pool};

    #[tokio::test]
    async fn sync_replaces_membership_and_reports_additions() {
        let pool = setup_test_pool().await;
        let seed = seed_tenant(&pool).await;
        let task = Task::insert(&pool, &seed.new_task("Sync me")).await.unwrap();

        let mut conn = pool.acquire().await.unwrap();
        let added = Task::sync_users(&mut *conn, task.id, &[seed.admin.id, seed.tasker.id])
            .await
            .unwrap();
        assert_eq!(added, vec![seed.admin.id, seed.tasker.id]);

        let added = Task::sync_users(&mut *conn, task.id, &[seed.tasker.id, seed.requester.id])
            .await
            .unwrap();
        assert_eq!(added, vec![seed.requester.id]);
        drop(conn);

        let users = Task::user_ids(&pool, task.id).await.unwrap();
        assert_eq!(users, vec![seed.tasker.id, seed.requester.id]);
    }

    #[tokio::test]
    async fn visibility_scopes_rows() {
        let pool = setup_test_pool().await;
        let seed = seed_tenant(&pool).await;

        let mut created = seed.new_task("Requester owned");
        created.created_by = Some(seed.requester.id);
        let owned = Task::insert(&pool, &created).await.unwrap();

        let assigned = Task::insert(&pool, &seed.new_task("Assigned to tasker")).await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        Task::sync_users(&mut *conn, assigned.id, &[seed.tasker.id]).await.unwrap();
        drop(conn);

        let filter = TaskFilter::default();
        let (all, total) = Task::find_filtered(&pool, seed.tenant_id, TaskVisibility::All, &filter, 15, 0)
            .await
            .unwrap();
        assert_eq!((all.len(), total), (2, 2));

        let (mine, _) = Task::find_filtered(
            &pool,
            seed.tenant_id,
            TaskVisibility::CreatedOrAssigned(seed.requester.id),
            &filter,
            15,
            0,
        )
        .await
        .unwrap();
        assert_eq!(mine.iter().map(|t| t.id).collect::<Vec<_>>(), vec![owned.id]);

        let (assigned_only, _) = Task::find_filtered(
            &pool,
            seed.tenant_id,
            TaskVisibility::AssignedTo(seed.tasker.id),
            &filter,
            15,
            0,
        )
        .await
        .unwrap();
        assert_eq!(assigned_only.iter().map(|t| t.id).collect::<Vec<_>>(), vec![assigned.id]);
    }

    #[tokio::test]
    async fn search_filter_matches_title_literally() {
        let pool = setup_test_pool().await;
        let seed = seed_tenant(&pool).await;
        Task::insert(&pool, &seed.new_task("Check cursor install")).await.unwrap();
        Task::insert(&pool, &seed.new_task("100% coverage")).await.unwrap();

        let filter = TaskFilter {
            search: Some("cursor".into()),
            ..Default::default()
        };
        let (found, total) = Task::find_filtered(&pool, seed.tenant_id, TaskVisibility::All, &filter, 15, 0)
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(found[0].title, "Check cursor install");

        let filter = TaskFilter {
            search: Some("0%".into()),
            ..Default::default()
        };
        let (found, _) = Task::find_filtered(&pool, seed.tenant_id, TaskVisibility::All, &filter, 15, 0)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn reject_if_not_is_idempotent() {
        let pool = setup_test_pool().await;
        let seed = seed_tenant(&pool).await;
        let task = Task::insert(&pool, &seed.new_task("Late")).await.unwrap();

        assert!(Task::reject_if_not(&pool, task.id, seed.rejected.id).await.unwrap());
        assert!(!Task::reject_if_not(&pool, task.id, seed.rejected.id).await.unwrap());
    }

    #[tokio::test]
    async fn status_filter_uses_deadline_corrected_status() {
        let pool = setup_test_pool().await;
        let seed = seed_tenant(&pool).await;
        let now = Utc::now();

        let mut strict = seed.new_task("Expired strict");
        strict.close_deadline = true;
        strict.end_date = Some(now - chrono::Duration::days(1));
        let expired = Task::insert(&pool, &strict).await.unwrap();

        let mut lenient = seed.new_task("Late but lenient");
        lenient.end_date = Some(now - chrono::Duration::days(1));
        let late = Task::insert(&pool, &lenient).await.unwrap();

        let by_status = |status_id: Uuid| TaskFilter {
            status_id: Some(status_id),
            as_of: Some(now),
            ..Default::default()
        };

        let (rejected, _) =
            Task::find_filtered(&pool, seed.tenant_id, TaskVisibility::All, &by_status(seed.rejected.id), 15, 0)
                .await
                .unwrap();
        assert_eq!(rejected.iter().map(|t| t.id).collect::<Vec<_>>(), vec![expired.id]);

        let (pending, total) =
            Task::find_filtered(&pool, seed.tenant_id, TaskVisibility::All, &by_status(seed.pending.id), 15, 0)
                .await
                .unwrap();
        assert_eq!(total, 1);
        assert_eq!(pending[0].id, late.id);
    }
}
