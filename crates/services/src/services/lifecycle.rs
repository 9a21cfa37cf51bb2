//! Task lifecycle: creation, updates, status transitions, repetition toggles,
//! deletion and the collaborative write paths (messages, deliverables,
//! checklist and question answers).
//!
//! Every operation takes an explicit [`Principal`]. Relation syncs run inside
//! one transaction per request; events are published only after commit.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use db::models::{
    answer::{ChecklistAnswer, QuestionAnswer},
    client::Client,
    deliverable::{
        CreateDeliverable, DeliverableFile, DeliverableType, NewDeliverableFile, TaskDeliverable,
    },
    message::TaskMessage,
    portfolio::{CreatePortfolio, Portfolio},
    priority::Priority,
    project::Project,
    status::Status,
    tag::Tag,
    task::{ChecklistSnapshot, NewTask, QuestionSnapshot, RepeatFrequency, Task, TaskFilter},
    task_type::TaskType,
    user::{User, UserSummary},
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use uuid::Uuid;

use super::{
    deadline::{self, DeadlineError, DeadlineEvaluator},
    notifications::{EventBus, TaskEvent},
    principal::Principal,
    reference::{BulkDeleteReport, SkippedItem},
    templates::{BriefTemplateApplier, TemplateSnapshot},
    validation::{FieldErrors, Validator, double_option},
    visibility::{self, EntityKind},
};

pub const DEFAULT_PER_PAGE: i64 = 15;
pub const MAX_PER_PAGE: i64 = 100;
const MAX_TITLE_LEN: usize = 255;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("Validation failed")]
    Validation(FieldErrors),
    #[error("Task not found")]
    TaskNotFound,
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    #[error(transparent)]
    Deadline(#[from] DeadlineError),
    #[error("{0}")]
    BadRequest(String),
    #[error("Failed to store upload: {0}")]
    Storage(#[from] std::io::Error),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateTaskInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status_id: Option<Uuid>,
    pub priority_id: Option<Uuid>,
    pub task_type_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub template_id: Option<Uuid>,
    #[serde(default)]
    pub user_ids: Vec<Uuid>,
    #[serde(default)]
    pub client_ids: Vec<Uuid>,
    #[serde(default)]
    pub tag_ids: Vec<Uuid>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    #[serde(default)]
    pub is_repeating: bool,
    pub repeat_frequency: Option<String>,
    pub repeat_interval: Option<i64>,
    pub repeat_until: Option<String>,
    #[serde(default)]
    pub close_deadline: bool,
    pub deliverable_quantity: Option<i64>,
}

/// Partial update. `None` leaves a field alone; for nullable fields
/// `Some(None)` clears it. Presence of an id list replaces that membership.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTaskInput {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub status_id: Option<Uuid>,
    pub priority_id: Option<Uuid>,
    #[serde(default, deserialize_with = "double_option")]
    pub task_type_id: Option<Option<Uuid>>,
    pub project_id: Option<Uuid>,
    pub user_ids: Option<Vec<Uuid>>,
    pub client_ids: Option<Vec<Uuid>>,
    pub tag_ids: Option<Vec<Uuid>>,
    #[serde(default, deserialize_with = "double_option")]
    pub start_date: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub end_date: Option<Option<String>>,
    pub is_repeating: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub repeat_frequency: Option<Option<String>>,
    pub repeat_interval: Option<i64>,
    #[serde(default, deserialize_with = "double_option")]
    pub repeat_until: Option<Option<String>>,
    pub close_deadline: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub deliverable_quantity: Option<Option<i64>>,
}

/// A task with its relations and the deadline-corrected status.
#[derive(Debug, Clone, Serialize)]
pub struct TaskView {
    #[serde(flatten)]
    pub task: Task,
    pub effective_status_id: Uuid,
    pub is_expired: bool,
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    #[serde(rename = "taskType")]
    pub task_type: Option<TaskType>,
    pub project: Option<Project>,
    pub users: Vec<UserSummary>,
    pub clients: Vec<Client>,
    pub tags: Vec<Tag>,
}

impl TaskView {
    pub fn user_ids(&self) -> Vec<Uuid> {
        self.users.iter().map(|u| u.id).collect()
    }

    pub fn redact(&mut self) {
        self.users.iter_mut().for_each(UserSummary::redact);
        self.clients.iter_mut().for_each(Client::redact);
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskPage {
    pub data: Vec<TaskView>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub last_page: i64,
}

#[derive(Debug, Clone)]
pub struct DeliverableUpload {
    pub original_name: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct DeliverableInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub deliverable_type: Option<String>,
    pub google_link: Option<String>,
    pub external_link: Option<String>,
    pub files: Vec<DeliverableUpload>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeliverableView {
    #[serde(flatten)]
    pub deliverable: TaskDeliverable,
    pub files: Vec<DeliverableFile>,
    pub portfolio_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChecklistAnswerInput {
    pub checklist_id: Option<Uuid>,
    pub item_index: Option<i64>,
    #[serde(default)]
    pub completed: bool,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuestionAnswerInput {
    pub question_id: Option<Uuid>,
    pub answer: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChecklistItemStatus {
    pub index: i64,
    pub text: String,
    pub completed: bool,
    pub notes: Option<String>,
    pub answered_by: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChecklistGroupStatus {
    pub checklist_id: Uuid,
    pub title: Option<String>,
    pub items: Vec<ChecklistItemStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChecklistStatus {
    pub checklists: Vec<ChecklistGroupStatus>,
    pub completed_items: usize,
    pub total_items: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionWithAnswers {
    #[serde(flatten)]
    pub question: QuestionSnapshot,
    pub answers: Vec<QuestionAnswer>,
}

#[derive(Clone)]
pub struct TaskLifecycleManager {
    pool: SqlitePool,
    events: EventBus,
    templates: BriefTemplateApplier,
    deadlines: DeadlineEvaluator,
    uploads_dir: PathBuf,
}

impl TaskLifecycleManager {
    pub fn new(pool: SqlitePool, events: EventBus) -> Self {
        Self {
            templates: BriefTemplateApplier::new(pool.clone()),
            deadlines: DeadlineEvaluator::new(pool.clone()),
            pool,
            events,
            uploads_dir: utils::assets::uploads_dir(),
        }
    }

    pub fn with_uploads_dir(mut self, uploads_dir: PathBuf) -> Self {
        self.uploads_dir = uploads_dir;
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn deadlines(&self) -> &DeadlineEvaluator {
        &self.deadlines
    }

    // ----- reads -------------------------------------------------------------

    pub async fn get(&self, principal: &Principal, id: Uuid) -> Result<TaskView, LifecycleError> {
        let (task, _) = self.load_visible(principal, id).await?;
        let rejected = self.rejected_status_id(principal.tenant_id).await?;
        self.view_for(principal, task, Utc::now(), rejected).await
    }

    pub async fn list(
        &self,
        principal: &Principal,
        filter: &TaskFilter,
        page: Option<i64>,
        per_page: Option<i64>,
    ) -> Result<TaskPage, LifecycleError> {
        let per_page = per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE);
        let page = page.unwrap_or(1).max(1);
        let visibility = visibility::scope(principal, EntityKind::Task).task_visibility();
        let now = filter.as_of.unwrap_or_else(Utc::now);
        let filter = TaskFilter {
            as_of: Some(now),
            ..filter.clone()
        };

        let (tasks, total) = Task::find_filtered(
            &self.pool,
            principal.tenant_id,
            visibility,
            &filter,
            per_page,
            (page - 1) * per_page,
        )
        .await?;

        let rejected = self.rejected_status_id(principal.tenant_id).await?;
        let mut data = Vec::with_capacity(tasks.len());
        for task in tasks {
            data.push(self.view_for(principal, task, now, rejected).await?);
        }

        Ok(TaskPage {
            data,
            total,
            page,
            per_page,
            last_page: ((total + per_page - 1) / per_page).max(1),
        })
    }

    /// Every visible task matching `filter`, unpaginated.
    pub async fn list_all(&self, principal: &Principal, filter: &TaskFilter) -> Result<Vec<TaskView>, LifecycleError> {
        let visibility = visibility::scope(principal, EntityKind::Task).task_visibility();
        let now = filter.as_of.unwrap_or_else(Utc::now);
        let filter = TaskFilter {
            as_of: Some(now),
            ..filter.clone()
        };
        let tasks = Task::find_visible(&self.pool, principal.tenant_id, visibility, &filter).await?;

        let rejected = self.rejected_status_id(principal.tenant_id).await?;
        let mut views = Vec::with_capacity(tasks.len());
        for task in tasks {
            views.push(self.view_for(principal, task, now, rejected).await?);
        }
        Ok(views)
    }

    // ----- create / update ---------------------------------------------------

    pub async fn create(
        &self,
        principal: &Principal,
        input: CreateTaskInput,
    ) -> Result<TaskView, LifecycleError> {
        if !visibility::can_create_task(principal) {
            return Err(LifecycleError::Forbidden(
                "Your role does not allow creating tasks".to_string(),
            ));
        }

        let snapshot = match input.template_id {
            Some(template_id) => self.templates.apply(principal.tenant_id, template_id).await,
            None => None,
        };

        let mut v = Validator::new();
        let title = match &snapshot {
            Some(s) => s.title.clone(),
            None => input.title.clone().unwrap_or_default(),
        };
        check_title(&mut v, &title);

        let start_date = v.date("start_date", input.start_date.as_deref());
        let end_date = v.date("end_date", input.end_date.as_deref());
        let repeat_until = v.date("repeat_until", input.repeat_until.as_deref());
        let repeat_frequency = parse_frequency(&mut v, input.repeat_frequency.as_deref());
        let repeat_interval = input.repeat_interval.unwrap_or(1);
        check_schedule(
            &mut v,
            start_date,
            end_date,
            input.is_repeating,
            repeat_frequency,
            repeat_interval,
            repeat_until,
        );
        check_quantity(&mut v, input.deliverable_quantity);

        let refs = RefIds {
            creating: true,
            status_id: input.status_id,
            priority_id: input.priority_id,
            project_id: input.project_id,
            task_type_id: input.task_type_id,
            user_ids: Some(&input.user_ids),
            client_ids: Some(&input.client_ids),
            tag_ids: Some(&input.tag_ids),
        };
        self.check_references(principal.tenant_id, &mut v, &refs).await?;
        v.finish().map_err(LifecycleError::Validation)?;

        let (Some(status_id), Some(priority_id), Some(project_id)) =
            (input.status_id, input.priority_id, input.project_id)
        else {
            return Err(LifecycleError::BadRequest("Missing required references".to_string()));
        };

        let new_task = build_new_task(
            principal,
            &input,
            snapshot.as_ref(),
            title,
            (status_id, priority_id, project_id),
            (start_date, end_date, repeat_until),
            repeat_frequency,
            repeat_interval,
        );

        let mut tx = self.pool.begin().await?;
        let task = Task::insert(&mut *tx, &new_task).await?;
        let added_users = Task::sync_users(&mut *tx, task.id, &input.user_ids).await?;
        Task::sync_clients(&mut *tx, task.id, &input.client_ids).await?;
        Task::sync_tags(&mut *tx, task.id, &input.tag_ids).await?;
        tx.commit().await?;

        tracing::info!(
            task_id = %task.id,
            tenant_id = %task.tenant_id,
            template = snapshot.is_some(),
            "Task created"
        );
        self.emit_assigned(principal, &task, &added_users);

        let rejected = self.rejected_status_id(principal.tenant_id).await?;
        self.view_for(principal, task, Utc::now(), rejected).await
    }

    pub async fn update(
        &self,
        principal: &Principal,
        id: Uuid,
        input: UpdateTaskInput,
    ) -> Result<TaskView, LifecycleError> {
        let (mut task, assignees) = self.load_visible(principal, id).await?;
        if !visibility::can_edit_task(principal, &task, &assignees) {
            return Err(LifecycleError::Forbidden(
                "You can only update tasks you created or are assigned to".to_string(),
            ));
        }
        let now = Utc::now();
        let rejected = self.rejected_status_id(principal.tenant_id).await?;
        task.status_id = deadline::effective_status(&task, now, rejected);
        let previous_status = task.status_id;

        let mut v = Validator::new();
        let mut next = task.clone();
        if let Some(title) = &input.title {
            check_title(&mut v, title);
            next.title = title.trim().to_string();
        }
        if let Some(description) = input.description {
            next.description = description;
        }
        if let Some(status_id) = input.status_id {
            next.status_id = status_id;
        }
        if let Some(priority_id) = input.priority_id {
            next.priority_id = priority_id;
        }
        if let Some(task_type_id) = input.task_type_id {
            next.task_type_id = task_type_id;
        }
        if let Some(project_id) = input.project_id {
            next.project_id = project_id;
        }
        if let Some(start) = &input.start_date {
            next.start_date = v.date("start_date", start.as_deref());
        }
        if let Some(end) = &input.end_date {
            next.end_date = v.date("end_date", end.as_deref());
        }
        if let Some(until) = &input.repeat_until {
            next.repeat_until = v.date("repeat_until", until.as_deref());
        }
        if let Some(frequency) = &input.repeat_frequency {
            next.repeat_frequency = parse_frequency(&mut v, frequency.as_deref());
        }
        if let Some(is_repeating) = input.is_repeating {
            next.is_repeating = is_repeating;
        }
        if let Some(interval) = input.repeat_interval {
            next.repeat_interval = interval;
        }
        if let Some(close_deadline) = input.close_deadline {
            next.close_deadline = close_deadline;
        }
        if let Some(quantity) = input.deliverable_quantity {
            check_quantity(&mut v, quantity);
            next.deliverable_quantity = quantity;
        }
        check_schedule(
            &mut v,
            next.start_date,
            next.end_date,
            next.is_repeating,
            next.repeat_frequency,
            next.repeat_interval,
            next.repeat_until,
        );

        let refs = RefIds {
            creating: false,
            status_id: input.status_id,
            priority_id: input.priority_id,
            project_id: input.project_id,
            task_type_id: input.task_type_id.flatten(),
            user_ids: input.user_ids.as_deref(),
            client_ids: input.client_ids.as_deref(),
            tag_ids: input.tag_ids.as_deref(),
        };
        self.check_references(principal.tenant_id, &mut v, &refs).await?;
        v.finish().map_err(LifecycleError::Validation)?;

        let mut tx = self.pool.begin().await?;
        let saved = Task::save(&mut *tx, &next).await?;
        let added_users = match &input.user_ids {
            Some(ids) => Task::sync_users(&mut *tx, saved.id, ids).await?,
            None => Vec::new(),
        };
        if let Some(ids) = &input.client_ids {
            Task::sync_clients(&mut *tx, saved.id, ids).await?;
        }
        if let Some(ids) = &input.tag_ids {
            Task::sync_tags(&mut *tx, saved.id, ids).await?;
        }
        tx.commit().await?;

        tracing::info!(task_id = %saved.id, "Task updated");
        self.emit_assigned(principal, &saved, &added_users);
        self.emit_completed_if_transitioned(principal, &saved, previous_status)
            .await?;

        self.view_for(principal, saved, now, rejected).await
    }

    pub async fn update_status(
        &self,
        principal: &Principal,
        id: Uuid,
        status_id: Uuid,
    ) -> Result<TaskView, LifecycleError> {
        let (mut task, assignees) = self.load_visible(principal, id).await?;
        if !visibility::can_edit_task(principal, &task, &assignees) {
            return Err(LifecycleError::Forbidden(
                "You can only change the status of tasks you created or are assigned to".to_string(),
            ));
        }
        if Status::find_in_tenant(&self.pool, principal.tenant_id, status_id)
            .await?
            .is_none()
        {
            return Err(field_error("status_id", "The selected status id is invalid."));
        }

        let now = Utc::now();
        let rejected = self.rejected_status_id(principal.tenant_id).await?;
        let previous_status = deadline::effective_status(&task, now, rejected);

        let mut tx = self.pool.begin().await?;
        Task::update_status(&mut *tx, task.id, status_id).await?;
        tx.commit().await?;
        task.status_id = status_id;
        tracing::info!(task_id = %task.id, from = %previous_status, to = %status_id, "Task status changed");

        self.emit_completed_if_transitioned(principal, &task, previous_status)
            .await?;

        let task = Task::find_by_id(&self.pool, id)
            .await?
            .ok_or(LifecycleError::TaskNotFound)?;
        self.view_for(principal, task, now, rejected).await
    }

    pub async fn stop_repetition(&self, principal: &Principal, id: Uuid) -> Result<TaskView, LifecycleError> {
        self.set_repetition(principal, id, false).await
    }

    pub async fn resume_repetition(&self, principal: &Principal, id: Uuid) -> Result<TaskView, LifecycleError> {
        self.set_repetition(principal, id, true).await
    }

    async fn set_repetition(
        &self,
        principal: &Principal,
        id: Uuid,
        active: bool,
    ) -> Result<TaskView, LifecycleError> {
        let (task, _) = self.load_visible(principal, id).await?;
        if !visibility::can_toggle_repetition(principal, &task) {
            return Err(LifecycleError::Forbidden(
                "Only admins, requesters or the task creator can change repetition".to_string(),
            ));
        }
        if !task.is_repeating {
            return Err(LifecycleError::BadRequest(
                "This task is not a repeating task".to_string(),
            ));
        }

        Task::set_repeat_active(&self.pool, task.id, active).await?;
        tracing::info!(task_id = %task.id, active, "Task repetition toggled");

        let task = Task::find_by_id(&self.pool, id)
            .await?
            .ok_or(LifecycleError::TaskNotFound)?;
        let rejected = self.rejected_status_id(principal.tenant_id).await?;
        self.view_for(principal, task, Utc::now(), rejected).await
    }

    // ----- delete ------------------------------------------------------------

    pub async fn delete(&self, principal: &Principal, id: Uuid) -> Result<(), LifecycleError> {
        let (task, _) = self.load_visible(principal, id).await?;
        if !visibility::can_delete_task(principal, &task) {
            return Err(LifecycleError::Forbidden(
                "You can only delete tasks you created".to_string(),
            ));
        }
        Task::delete(&self.pool, task.id).await?;
        tracing::info!(task_id = %task.id, "Task deleted");
        Ok(())
    }

    /// Best effort: each id is deleted independently and failures are reported
    /// per id instead of failing the batch.
    pub async fn delete_multiple(&self, principal: &Principal, ids: &[Uuid]) -> BulkDeleteReport {
        let mut report = BulkDeleteReport::default();
        for id in ids {
            match self.delete(principal, *id).await {
                Ok(()) => report.deleted.push(*id),
                Err(LifecycleError::Database(e)) => {
                    tracing::error!(task_id = %id, "Bulk task delete failed: {}", e);
                    report.skipped.push(SkippedItem {
                        id: *id,
                        reason: "Could not delete task".to_string(),
                    });
                }
                Err(e) => report.skipped.push(SkippedItem {
                    id: *id,
                    reason: e.to_string(),
                }),
            }
        }
        report
    }

    // ----- messages ----------------------------------------------------------

    pub async fn add_message(
        &self,
        principal: &Principal,
        id: Uuid,
        message: &str,
    ) -> Result<TaskMessage, LifecycleError> {
        let task = self.load_writable(principal, id).await?;
        if message.trim().is_empty() {
            return Err(field_error("message", "The message field is required."));
        }
        let created = TaskMessage::create(&self.pool, task.id, principal.user_id, message.trim()).await?;
        tracing::info!(task_id = %task.id, message_id = %created.id, "Task message added");
        Ok(created)
    }

    pub async fn messages(&self, principal: &Principal, id: Uuid) -> Result<Vec<TaskMessage>, LifecycleError> {
        let (task, _) = self.load_visible(principal, id).await?;
        Ok(TaskMessage::find_by_task(&self.pool, task.id).await?)
    }

    // ----- deliverables ------------------------------------------------------

    pub async fn add_deliverable(
        &self,
        principal: &Principal,
        id: Uuid,
        input: DeliverableInput,
    ) -> Result<DeliverableView, LifecycleError> {
        let task = self.load_writable(principal, id).await?;

        let mut v = Validator::new();
        let title = input.title.as_deref().map(str::trim).unwrap_or_default().to_string();
        check_title(&mut v, &title);
        let deliverable_type = match input.deliverable_type.as_deref() {
            None => DeliverableType::default(),
            Some(raw) => raw.parse::<DeliverableType>().unwrap_or_else(|_| {
                v.add("type", "The selected type is invalid.");
                DeliverableType::default()
            }),
        };
        v.finish().map_err(LifecycleError::Validation)?;

        let project = Project::find_in_tenant(&self.pool, principal.tenant_id, task.project_id).await?;

        let stored = self.store_uploads(task.id, &input.files).await?;

        let mut tx = self.pool.begin().await?;
        let deliverable = TaskDeliverable::create(
            &mut *tx,
            &CreateDeliverable {
                task_id: task.id,
                title,
                description: input.description.clone(),
                deliverable_type,
                google_link: input.google_link.clone(),
                external_link: input.external_link.clone(),
                created_by: principal.user_id,
            },
        )
        .await?;
        let mut files = Vec::with_capacity(stored.len());
        for file in &stored {
            files.push(TaskDeliverable::add_file(&mut *tx, deliverable.id, file).await?);
        }

        let portfolio = match project.as_ref().and_then(|p| p.client_id.map(|c| (p, c))) {
            Some((project, client_id)) => Some(
                Portfolio::create(
                    &mut *tx,
                    &CreatePortfolio {
                        tenant_id: principal.tenant_id,
                        client_id,
                        project_id: Some(project.id),
                        task_id: task.id,
                        deliverable_id: deliverable.id,
                        title: deliverable.title.clone(),
                        description: deliverable.description.clone(),
                        deliverable_type: deliverable.deliverable_type,
                        google_link: deliverable.google_link.clone(),
                        external_link: deliverable.external_link.clone(),
                        files: files.iter().map(|f| f.file_path.clone()).collect(),
                        created_by: principal.user_id,
                    },
                )
                .await?,
            ),
            None => None,
        };
        tx.commit().await?;

        tracing::info!(
            task_id = %task.id,
            deliverable_id = %deliverable.id,
            files = files.len(),
            portfolio = portfolio.is_some(),
            "Deliverable added"
        );

        Ok(DeliverableView {
            deliverable,
            files,
            portfolio_id: portfolio.map(|p| p.id),
        })
    }

    pub async fn deliverables(
        &self,
        principal: &Principal,
        id: Uuid,
    ) -> Result<Vec<DeliverableView>, LifecycleError> {
        let (task, _) = self.load_visible(principal, id).await?;
        let mut views = Vec::new();
        for deliverable in TaskDeliverable::find_by_task(&self.pool, task.id).await? {
            views.push(self.deliverable_view(deliverable).await?);
        }
        Ok(views)
    }

    pub async fn complete_deliverable(
        &self,
        principal: &Principal,
        id: Uuid,
        deliverable_id: Uuid,
    ) -> Result<DeliverableView, LifecycleError> {
        let task = self.load_writable(principal, id).await?;
        let Some(existing) = TaskDeliverable::find_in_task(&self.pool, task.id, deliverable_id).await? else {
            return Err(LifecycleError::NotFound("Deliverable not found".to_string()));
        };
        let updated = match existing.completed_at {
            Some(_) => existing,
            None => TaskDeliverable::mark_completed(&self.pool, existing.id, Utc::now()).await?,
        };
        self.deliverable_view(updated).await
    }

    async fn deliverable_view(&self, deliverable: TaskDeliverable) -> Result<DeliverableView, LifecycleError> {
        let files = TaskDeliverable::files(&self.pool, deliverable.id).await?;
        let portfolio_id = Portfolio::find_by_deliverable(&self.pool, deliverable.id)
            .await?
            .map(|p| p.id);
        Ok(DeliverableView {
            deliverable,
            files,
            portfolio_id,
        })
    }

    async fn store_uploads(
        &self,
        task_id: Uuid,
        uploads: &[DeliverableUpload],
    ) -> Result<Vec<NewDeliverableFile>, LifecycleError> {
        if uploads.is_empty() {
            return Ok(Vec::new());
        }
        let dir = self.uploads_dir.join("deliverables").join(task_id.to_string());
        tokio::fs::create_dir_all(&dir).await?;

        let mut stored = Vec::with_capacity(uploads.len());
        for upload in uploads {
            let name = sanitize_file_name(&upload.original_name);
            let path = dir.join(format!("{}_{}", Uuid::new_v4(), name));
            tokio::fs::write(&path, &upload.bytes).await?;
            stored.push(NewDeliverableFile {
                file_path: path.to_string_lossy().into_owned(),
                original_name: upload.original_name.clone(),
                mime_type: upload.mime_type.clone(),
                size_bytes: upload.bytes.len() as i64,
            });
        }
        Ok(stored)
    }

    // ----- answers -----------------------------------------------------------

    pub async fn submit_checklist_answer(
        &self,
        principal: &Principal,
        id: Uuid,
        input: ChecklistAnswerInput,
    ) -> Result<ChecklistAnswer, LifecycleError> {
        let task = self.load_writable(principal, id).await?;

        let mut v = Validator::new();
        match (input.checklist_id, input.item_index) {
            (None, _) => v.required("checklist_id"),
            (_, None) => v.required("item_index"),
            (Some(checklist_id), Some(index)) => {
                match task.checklist().iter().find(|c| c.id == checklist_id) {
                    None => v.add("checklist_id", "The selected checklist id is invalid."),
                    Some(checklist) if index < 0 || index as usize >= checklist.items.len() => {
                        v.add("item_index", "The item index is out of range.")
                    }
                    Some(_) => {}
                }
            }
        }
        v.finish().map_err(LifecycleError::Validation)?;
        let (Some(checklist_id), Some(item_index)) = (input.checklist_id, input.item_index) else {
            return Err(LifecycleError::BadRequest("Missing checklist item".to_string()));
        };

        let answer = ChecklistAnswer::upsert(
            &self.pool,
            task.id,
            checklist_id,
            item_index,
            principal.user_id,
            input.completed,
            input.notes.as_deref(),
        )
        .await?;
        tracing::debug!(task_id = %task.id, %checklist_id, item_index, completed = input.completed, "Checklist answer saved");
        Ok(answer)
    }

    /// Per-item status. When several users answered the same item, the most
    /// recently updated answer wins.
    pub async fn checklist_status(&self, principal: &Principal, id: Uuid) -> Result<ChecklistStatus, LifecycleError> {
        let (task, _) = self.load_visible(principal, id).await?;
        let answers = ChecklistAnswer::find_by_task(&self.pool, task.id).await?;
        Ok(build_checklist_status(task.checklist(), &answers))
    }

    pub async fn submit_question_answer(
        &self,
        principal: &Principal,
        id: Uuid,
        input: QuestionAnswerInput,
    ) -> Result<QuestionAnswer, LifecycleError> {
        let task = self.load_writable(principal, id).await?;

        let mut v = Validator::new();
        match input.question_id {
            None => v.required("question_id"),
            Some(question_id) if !task.questions().iter().any(|q| q.id == question_id) => {
                v.add("question_id", "The selected question id is invalid.")
            }
            Some(_) => {}
        }
        let answer = input.answer.as_deref().map(str::trim).unwrap_or_default();
        if answer.is_empty() {
            v.required("answer");
        }
        v.finish().map_err(LifecycleError::Validation)?;
        let Some(question_id) = input.question_id else {
            return Err(LifecycleError::BadRequest("Missing question".to_string()));
        };

        Ok(QuestionAnswer::upsert(&self.pool, task.id, question_id, principal.user_id, answer).await?)
    }

    pub async fn question_answers(
        &self,
        principal: &Principal,
        id: Uuid,
    ) -> Result<Vec<QuestionWithAnswers>, LifecycleError> {
        let (task, _) = self.load_visible(principal, id).await?;
        let answers = QuestionAnswer::find_by_task(&self.pool, task.id).await?;
        Ok(task
            .questions()
            .iter()
            .map(|question| QuestionWithAnswers {
                question: question.clone(),
                answers: answers
                    .iter()
                    .filter(|a| a.question_id == question.id)
                    .cloned()
                    .collect(),
            })
            .collect())
    }

    // ----- helpers -----------------------------------------------------------

    async fn rejected_status_id(&self, tenant_id: Uuid) -> Result<Option<Uuid>, sqlx::Error> {
        Ok(Status::rejected(&self.pool, tenant_id).await?.map(|s| s.id))
    }

    /// Load a tenant task the principal may see, with its assignee ids.
    pub async fn load_visible(&self, principal: &Principal, id: Uuid) -> Result<(Task, Vec<Uuid>), LifecycleError> {
        let task = Task::find_in_tenant(&self.pool, principal.tenant_id, id)
            .await?
            .ok_or(LifecycleError::TaskNotFound)?;
        let assignees = Task::user_ids(&self.pool, task.id).await?;
        if !visibility::scope(principal, EntityKind::Task).admits_task(&task, &assignees) {
            return Err(LifecycleError::Forbidden(
                "You do not have access to this task".to_string(),
            ));
        }
        Ok((task, assignees))
    }

    /// Load for a collaborative write: persist any pending deadline rejection,
    /// then refuse if the strict deadline has passed. Runs before payload
    /// validation so an expired task always answers with the deadline denial.
    async fn load_writable(&self, principal: &Principal, id: Uuid) -> Result<Task, LifecycleError> {
        let (mut task, _) = self.load_visible(principal, id).await?;
        let now = Utc::now();
        self.deadlines.enforce_for_tenant(&mut task, now).await?;
        deadline::ensure_writable(&task, now)?;
        Ok(task)
    }

    pub async fn view_for(
        &self,
        principal: &Principal,
        task: Task,
        now: DateTime<Utc>,
        rejected_status_id: Option<Uuid>,
    ) -> Result<TaskView, LifecycleError> {
        let mut view = self.load_view(task, now, rejected_status_id).await?;
        if !visibility::shows_personal_details(principal) {
            view.redact();
        }
        Ok(view)
    }

    async fn load_view(
        &self,
        mut task: Task,
        now: DateTime<Utc>,
        rejected_status_id: Option<Uuid>,
    ) -> Result<TaskView, sqlx::Error> {
        let effective_status_id = deadline::effective_status(&task, now, rejected_status_id);
        let is_expired = deadline::is_expired(&task, now);
        task.status_id = effective_status_id;

        let status = Status::find_by_id(&self.pool, effective_status_id).await?;
        let priority = Priority::find_in_tenant(&self.pool, task.tenant_id, task.priority_id).await?;
        let task_type = match task.task_type_id {
            Some(type_id) => TaskType::find_in_tenant(&self.pool, task.tenant_id, type_id).await?,
            None => None,
        };
        let project = Project::find_in_tenant(&self.pool, task.tenant_id, task.project_id).await?;
        let user_ids = Task::user_ids(&self.pool, task.id).await?;
        let users = User::summaries_for_ids(&self.pool, &user_ids).await?;
        let client_ids = Task::client_ids(&self.pool, task.id).await?;
        let clients = Client::find_many(&self.pool, &client_ids).await?;
        let tag_ids = Task::tag_ids(&self.pool, task.id).await?;
        let tags = Tag::find_many(&self.pool, &tag_ids).await?;

        Ok(TaskView {
            task,
            effective_status_id,
            is_expired,
            status,
            priority,
            task_type,
            project,
            users,
            clients,
            tags,
        })
    }

    async fn check_references(
        &self,
        tenant_id: Uuid,
        v: &mut Validator,
        refs: &RefIds<'_>,
    ) -> Result<(), sqlx::Error> {
        match refs.status_id {
            None if refs.creating => v.required("status_id"),
            Some(id) if Status::find_in_tenant(&self.pool, tenant_id, id).await?.is_none() => {
                v.add("status_id", "The selected status id is invalid.")
            }
            _ => {}
        }
        match refs.priority_id {
            None if refs.creating => v.required("priority_id"),
            Some(id) if Priority::find_in_tenant(&self.pool, tenant_id, id).await?.is_none() => {
                v.add("priority_id", "The selected priority id is invalid.")
            }
            _ => {}
        }
        match refs.project_id {
            None if refs.creating => v.required("project_id"),
            Some(id) if Project::find_in_tenant(&self.pool, tenant_id, id).await?.is_none() => {
                v.add("project_id", "The selected project id is invalid.")
            }
            _ => {}
        }
        if let Some(id) = refs.task_type_id {
            if TaskType::find_in_tenant(&self.pool, tenant_id, id).await?.is_none() {
                v.add("task_type_id", "The selected task type id is invalid.");
            }
        }
        if let Some(ids) = refs.user_ids {
            let found = User::ids_in_tenant(&self.pool, tenant_id, ids).await?;
            if ids.iter().any(|id| !found.contains(id)) {
                v.add("user_ids", "One or more selected users are invalid.");
            }
        }
        if let Some(ids) = refs.client_ids {
            let found = Client::find_many(&self.pool, ids).await?;
            if ids
                .iter()
                .any(|id| !found.iter().any(|c| c.id == *id && c.tenant_id == tenant_id))
            {
                v.add("client_ids", "One or more selected clients are invalid.");
            }
        }
        if let Some(ids) = refs.tag_ids {
            let found = Tag::find_many(&self.pool, ids).await?;
            if ids
                .iter()
                .any(|id| !found.iter().any(|t| t.id == *id && t.tenant_id == tenant_id))
            {
                v.add("tag_ids", "One or more selected tags are invalid.");
            }
        }
        Ok(())
    }

    fn emit_assigned(&self, principal: &Principal, task: &Task, added_users: &[Uuid]) {
        for user_id in added_users {
            self.events.publish(TaskEvent::Assigned {
                tenant_id: task.tenant_id,
                task_id: task.id,
                task_title: task.title.clone(),
                user_id: *user_id,
                assigned_by: principal.user_id,
            });
        }
    }

    async fn emit_completed_if_transitioned(
        &self,
        principal: &Principal,
        task: &Task,
        previous_status: Uuid,
    ) -> Result<(), sqlx::Error> {
        if previous_status == task.status_id {
            return Ok(());
        }
        let was_completed = Status::find_by_id(&self.pool, previous_status)
            .await?
            .is_some_and(|s| s.is_completed());
        let is_completed = Status::find_by_id(&self.pool, task.status_id)
            .await?
            .is_some_and(|s| s.is_completed());
        if was_completed || !is_completed {
            return Ok(());
        }

        let mut recipients: Vec<Uuid> = task.created_by.into_iter().collect();
        for user_id in Task::user_ids(&self.pool, task.id).await? {
            if !recipients.contains(&user_id) {
                recipients.push(user_id);
            }
        }
        recipients.retain(|id| *id != principal.user_id);

        tracing::info!(task_id = %task.id, recipients = recipients.len(), "Task completed");
        self.events.publish(TaskEvent::Completed {
            tenant_id: task.tenant_id,
            task_id: task.id,
            task_title: task.title.clone(),
            recipients,
            completed_by: principal.user_id,
        });
        Ok(())
    }
}

struct RefIds<'a> {
    creating: bool,
    status_id: Option<Uuid>,
    priority_id: Option<Uuid>,
    project_id: Option<Uuid>,
    task_type_id: Option<Uuid>,
    user_ids: Option<&'a [Uuid]>,
    client_ids: Option<&'a [Uuid]>,
    tag_ids: Option<&'a [Uuid]>,
}

fn field_error(field: &str, message: &str) -> LifecycleError {
    let mut errors = FieldErrors::new();
    errors.insert(field.to_string(), vec![message.to_string()]);
    LifecycleError::Validation(errors)
}

fn check_title(v: &mut Validator, title: &str) {
    let title = title.trim();
    if title.is_empty() {
        v.required("title");
    } else if title.chars().count() > MAX_TITLE_LEN {
        v.add("title", "The title may not be greater than 255 characters.");
    }
}

fn check_quantity(v: &mut Validator, quantity: Option<i64>) {
    if quantity.is_some_and(|q| q < 0) {
        v.add("deliverable_quantity", "The deliverable quantity must be at least 0.");
    }
}

fn parse_frequency(v: &mut Validator, raw: Option<&str>) -> Option<RepeatFrequency> {
    let raw = raw.map(str::trim).filter(|r| !r.is_empty())?;
    match raw.parse() {
        Ok(frequency) => Some(frequency),
        Err(_) => {
            v.add("repeat_frequency", "The selected repeat frequency is invalid.");
            None
        }
    }
}

fn check_schedule(
    v: &mut Validator,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    is_repeating: bool,
    repeat_frequency: Option<RepeatFrequency>,
    repeat_interval: i64,
    repeat_until: Option<DateTime<Utc>>,
) {
    if matches!((start_date, end_date), (Some(start), Some(end)) if end < start) {
        v.add("end_date", "The end date must be a date after or equal to start date.");
    }
    if repeat_interval < 1 {
        v.add("repeat_interval", "The repeat interval must be at least 1.");
    }
    if is_repeating && repeat_frequency.is_none() && !v.has("repeat_frequency") {
        v.add(
            "repeat_frequency",
            "The repeat frequency field is required when is repeating is true.",
        );
    }
    if matches!((start_date, repeat_until), (Some(start), Some(until)) if until < start) {
        v.add(
            "repeat_until",
            "The repeat until must be a date after or equal to start date.",
        );
    }
}

#[allow(clippy::too_many_arguments)]
fn build_new_task(
    principal: &Principal,
    input: &CreateTaskInput,
    snapshot: Option<&TemplateSnapshot>,
    title: String,
    (status_id, priority_id, project_id): (Uuid, Uuid, Uuid),
    (start_date, end_date, repeat_until): (
        Option<DateTime<Utc>>,
        Option<DateTime<Utc>>,
        Option<DateTime<Utc>>,
    ),
    repeat_frequency: Option<RepeatFrequency>,
    repeat_interval: i64,
) -> NewTask {
    let mut new_task = NewTask {
        tenant_id: principal.tenant_id,
        title: title.trim().to_string(),
        description: input.description.clone(),
        status_id,
        priority_id,
        task_type_id: input.task_type_id,
        project_id,
        start_date,
        end_date,
        close_deadline: input.close_deadline,
        is_repeating: input.is_repeating,
        repeat_frequency: if input.is_repeating { repeat_frequency } else { None },
        repeat_interval,
        repeat_until,
        deliverable_quantity: input.deliverable_quantity,
        created_by: Some(principal.user_id),
        ..Default::default()
    };

    if let Some(s) = snapshot {
        new_task.description = s.brief();
        new_task.deliverable_quantity = s.deliverable_quantity.or(input.deliverable_quantity);
        new_task.template_id = Some(s.template_id);
        new_task.template_questions = Some(s.questions.clone());
        new_task.template_checklist = Some(s.checklist.clone());
        new_task.template_standard_brief = s.standard_brief.clone();
        new_task.template_description = s.description.clone();
        new_task.template_deliverable_quantity = s.deliverable_quantity;
    }
    new_task
}

pub fn build_checklist_status(checklists: &[ChecklistSnapshot], answers: &[ChecklistAnswer]) -> ChecklistStatus {
    let mut completed_items = 0;
    let mut total_items = 0;

    let checklists = checklists
        .iter()
        .map(|checklist| {
            let items = checklist
                .items
                .iter()
                .enumerate()
                .map(|(index, text)| {
                    let index = index as i64;
                    let latest = answers
                        .iter()
                        .filter(|a| a.checklist_id == checklist.id && a.item_index == index)
                        .max_by_key(|a| a.updated_at);
                    total_items += 1;
                    let completed = latest.is_some_and(|a| a.completed);
                    if completed {
                        completed_items += 1;
                    }
                    ChecklistItemStatus {
                        index,
                        text: text.clone(),
                        completed,
                        notes: latest.and_then(|a| a.notes.clone()),
                        answered_by: latest.map(|a| a.user_id),
                    }
                })
                .collect();
            ChecklistGroupStatus {
                checklist_id: checklist.id,
                title: checklist.title.clone(),
                items,
            }
        })
        .collect();

    ChecklistStatus {
        checklists,
        completed_items,
        total_items,
    }
}

fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let trimmed = cleaned.trim_matches('.');
    if trimmed.is_empty() {
        "upload".to_string()
    } else {
        trimmed.to_string()
    }
}
