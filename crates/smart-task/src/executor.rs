//! Executes a resolved intent against the task API and renders the result
//! as chat-ready markdown.

use std::{collections::HashMap, sync::Arc};

use db::models::{
    priority::Priority, project::Project, status::Status, task::TaskFilter, user::UserSummary,
};
use serde::Serialize;
use serde_json::{Map, Value, json};
use services::services::{
    lifecycle::{CreateTaskInput, DeliverableInput, TaskView, UpdateTaskInput},
    principal::Principal,
};
use uuid::Uuid;

use crate::{
    Result, SmartTaskError,
    actions::Action,
    api::TaskApi,
    disambiguation::disambiguate,
    intent::ParsedIntent,
    resolver::{TitleMatch, best_by_name, match_title},
};

/// A fuzzy title match at or above this reuses the existing task on
/// `create_task` instead of creating a duplicate.
pub const REASSIGN_CONFIDENCE: f64 = 0.9;
const LIST_LIMIT: usize = 20;

#[derive(Debug, Clone, Serialize)]
pub struct ActionOutcome {
    pub success: bool,
    pub content: String,
    pub data: Option<Value>,
}

impl ActionOutcome {
    fn ok(content: String, data: Value) -> Self {
        Self {
            success: true,
            content,
            data: Some(data),
        }
    }
}

/// Typed access to loosely shaped parameters.
struct Params<'a>(&'a Map<String, Value>);

impl Params<'_> {
    /// First non-empty value among `keys`, stringified.
    fn text(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| match self.0.get(*key)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    }

    fn required(&self, keys: &[&str], prompt: &str) -> Result<String> {
        self.text(keys)
            .ok_or_else(|| SmartTaskError::MissingParameter(prompt.to_string()))
    }

    fn uuid(&self, keys: &[&str]) -> Option<Uuid> {
        self.text(keys).and_then(|s| Uuid::parse_str(&s).ok())
    }
}

enum Resolved<T> {
    Found(T),
    Choose(ActionOutcome),
}

macro_rules! found_or_return {
    ($resolved:expr) => {
        match $resolved {
            Resolved::Found(value) => value,
            Resolved::Choose(outcome) => return Ok(outcome),
        }
    };
}

const TASK_KEYS: &[&str] = &["task", "task_title", "task_name", "title"];
const USER_KEYS: &[&str] = &["user", "assignee", "user_name", "assign_to", "name"];

fn status_title(view: &TaskView) -> &str {
    view.status.as_ref().map(|s| s.title.as_str()).unwrap_or("Unknown")
}

fn priority_title(view: &TaskView) -> &str {
    view.priority.as_ref().map(|p| p.title.as_str()).unwrap_or("Unknown")
}

fn assignee_names(view: &TaskView) -> String {
    if view.users.is_empty() {
        "Unassigned".to_string()
    } else {
        view.users.iter().map(|u| u.full_name()).collect::<Vec<_>>().join(", ")
    }
}

fn task_details(view: &TaskView) -> String {
    let mut lines = vec![
        format!("• **Status:** {}", status_title(view)),
        format!("• **Priority:** {}", priority_title(view)),
        format!("• **Assigned to:** {}", assignee_names(view)),
    ];
    if let Some(project) = &view.project {
        lines.push(format!("• **Project:** {}", project.title));
    }
    if let Some(due) = view.task.end_date {
        lines.push(format!("• **Due:** {}", due.format("%b %d, %Y")));
    }
    if view.is_expired {
        lines.push("• **Past its strict deadline**".to_string());
    }
    lines.join("\n")
}

fn task_line(view: &TaskView) -> String {
    let mut line = format!("• **{}**: {} · {}", view.task.title, status_title(view), priority_title(view));
    if let Some(due) = view.task.end_date {
        line.push_str(&format!(" · due {}", due.format("%b %d")));
    }
    line
}

fn task_summary(view: &TaskView) -> Value {
    json!({
        "id": view.task.id,
        "title": view.task.title,
        "status": view.status.as_ref().map(|s| s.title.clone()),
        "priority": view.priority.as_ref().map(|p| p.title.clone()),
        "assignees": view.users.iter().map(|u| u.full_name()).collect::<Vec<_>>(),
        "due_date": view.task.end_date,
        "is_expired": view.is_expired,
    })
}

fn render_task_list(heading: &str, tasks: &[TaskView]) -> String {
    let mut content = format!("**{}** ({})\n", heading, tasks.len());
    for view in tasks.iter().take(LIST_LIMIT) {
        content.push('\n');
        content.push_str(&task_line(view));
    }
    if tasks.len() > LIST_LIMIT {
        content.push_str(&format!("\n\n…and {} more.", tasks.len() - LIST_LIMIT));
    }
    content
}

fn google_link(url: &str) -> bool {
    url.contains("docs.google.com") || url.contains("drive.google.com")
}

pub struct ActionExecutor {
    api: Arc<dyn TaskApi>,
}

impl ActionExecutor {
    pub fn new(api: Arc<dyn TaskApi>) -> Self {
        Self { api }
    }

    pub async fn execute(&self, principal: &Principal, intent: &ParsedIntent) -> Result<ActionOutcome> {
        let p = Params(&intent.params);
        match intent.action {
            Action::CreateTask => self.create_task(principal, &p).await,
            Action::UpdateTask => self.update_task(principal, &p).await,
            Action::DeleteTask => self.delete_task(principal, &p).await,
            Action::GetUserTasks => self.get_user_tasks(principal, &p).await,
            Action::ListTasks => self.list_tasks(principal, &p).await,
            Action::GetTaskStatus => self.get_task_status(principal, &p).await,
            Action::GetTaskUpdates => self.get_task_updates(principal, &p).await,
            Action::AddTaskMessage => self.add_task_message(principal, &p).await,
            Action::AddTaskAttachment => self.add_task_attachment(principal, &p).await,
            Action::GetUsers => self.get_users(principal).await,
            Action::GetProjects => self.get_projects(principal).await,
            Action::GetProjectProgress => self.get_project_progress(principal, &p).await,
            Action::GetDashboard => self.get_dashboard(principal).await,
            Action::SearchContent => self.search_content(principal, &p).await,
            Action::UpdateTaskStatus => self.update_task_status(principal, &p).await,
            Action::UpdateTaskPriority => self.update_task_priority(principal, &p).await,
        }
    }

    // ----- entity resolution -------------------------------------------------

    async fn resolve_task(&self, principal: &Principal, p: &Params<'_>) -> Result<Resolved<TaskView>> {
        if let Some(id) = p.uuid(&["task_id", "id"]) {
            return Ok(Resolved::Found(self.api.get_task(principal, id).await?));
        }
        let query = p.required(TASK_KEYS, "Which task do you mean?")?;
        let tasks = self.api.list_tasks(principal, TaskFilter::default()).await?;

        match match_title(&query, &tasks, |view| view.task.title.as_str()) {
            TitleMatch::Unique(scored) => Ok(Resolved::Found(scored.candidate.clone())),
            TitleMatch::Ambiguous(candidates) => Ok(Resolved::Choose(disambiguate(&query, &candidates))),
            TitleMatch::None => Err(SmartTaskError::NotFound(format!(
                "No task you can see matches \"{}\".",
                query
            ))),
        }
    }

    async fn resolve_user(&self, principal: &Principal, name: &str) -> Result<UserSummary> {
        let users = self.api.users(principal).await?;
        best_by_name(name, &users).cloned().ok_or_else(|| {
            let known: Vec<String> = users.iter().take(10).map(|u| u.full_name()).collect();
            SmartTaskError::NotFound(format!(
                "No team member matches \"{}\". Known members: {}.",
                name,
                known.join(", ")
            ))
        })
    }

    async fn resolve_project(&self, principal: &Principal, name: &str) -> Result<Project> {
        let projects = self.api.projects(principal).await?;
        best_by_name(name, &projects)
            .cloned()
            .ok_or_else(|| SmartTaskError::NotFound(format!("No project matches \"{}\".", name)))
    }

    async fn resolve_status(&self, principal: &Principal, name: &str) -> Result<Status> {
        let statuses = self.api.statuses(principal).await?;
        if let Some(status) = best_by_name(name, &statuses) {
            return Ok(status.clone());
        }
        let done = matches!(
            utils::text::normalize(name).as_str(),
            "done" | "complete" | "finished"
        );
        statuses
            .iter()
            .find(|s| done && s.is_completed())
            .cloned()
            .ok_or_else(|| {
                let known: Vec<&str> = statuses.iter().map(|s| s.title.as_str()).collect();
                SmartTaskError::NotFound(format!(
                    "No status matches \"{}\". Available: {}.",
                    name,
                    known.join(", ")
                ))
            })
    }

    async fn resolve_priority(&self, principal: &Principal, name: &str) -> Result<Priority> {
        let priorities = self.api.priorities(principal).await?;
        best_by_name(name, &priorities).cloned().ok_or_else(|| {
            let known: Vec<&str> = priorities.iter().map(|p| p.title.as_str()).collect();
            SmartTaskError::NotFound(format!(
                "No priority matches \"{}\". Available: {}.",
                name,
                known.join(", ")
            ))
        })
    }

    // ----- mutations ---------------------------------------------------------

    async fn create_task(&self, principal: &Principal, p: &Params<'_>) -> Result<ActionOutcome> {
        let title = p.required(&["title", "task", "task_title", "name"], "What should the task be called?")?;
        let assignee = match p.text(&["assignee", "user", "assign_to", "user_name"]) {
            Some(name) => Some(self.resolve_user(principal, &name).await?),
            None => None,
        };

        let existing = self.api.list_tasks(principal, TaskFilter::default()).await?;
        match match_title(&title, &existing, |view| view.task.title.as_str()) {
            TitleMatch::Unique(scored) if scored.score >= REASSIGN_CONFIDENCE => {
                return self.reassign_existing(principal, scored.candidate, assignee).await;
            }
            TitleMatch::Ambiguous(candidates) => return Ok(disambiguate(&title, &candidates)),
            _ => {}
        }

        let project_id = match p.text(&["project", "project_name"]) {
            Some(name) => Some(self.resolve_project(principal, &name).await?.id),
            None => self.api.projects(principal).await?.first().map(|project| project.id),
        };
        let status_id = match p.text(&["status"]) {
            Some(name) => Some(self.resolve_status(principal, &name).await?.id),
            None => self.api.statuses(principal).await?.first().map(|s| s.id),
        };
        let priority_id = match p.text(&["priority"]) {
            Some(name) => Some(self.resolve_priority(principal, &name).await?.id),
            None => {
                let priorities = self.api.priorities(principal).await?;
                priorities
                    .iter()
                    .find(|priority| priority.slug == "medium")
                    .or_else(|| priorities.first())
                    .map(|priority| priority.id)
            }
        };

        let input = CreateTaskInput {
            title: Some(title),
            description: p.text(&["description", "brief", "details"]),
            status_id,
            priority_id,
            project_id,
            user_ids: assignee.iter().map(|u| u.id).collect(),
            end_date: p.text(&["due_date", "end_date", "deadline"]),
            start_date: p.text(&["start_date"]),
            ..Default::default()
        };
        let view = self.api.create_task(principal, input).await?;

        Ok(ActionOutcome::ok(
            format!("**Task created:** {}\n\n{}", view.task.title, task_details(&view)),
            json!({ "task": task_summary(&view), "created": true }),
        ))
    }

    async fn reassign_existing(
        &self,
        principal: &Principal,
        existing: &TaskView,
        assignee: Option<UserSummary>,
    ) -> Result<ActionOutcome> {
        let Some(assignee) = assignee else {
            return Ok(ActionOutcome::ok(
                format!(
                    "**{}** already exists, so I didn't create a duplicate.\n\n{}",
                    existing.task.title,
                    task_details(existing)
                ),
                json!({ "task": task_summary(existing), "created": false, "reassigned": false }),
            ));
        };

        tracing::info!(
            task_id = %existing.task.id,
            assignee = %assignee.id,
            "[SMART_TASK] Reassigning existing task instead of creating a duplicate"
        );
        let update = UpdateTaskInput {
            user_ids: Some(vec![assignee.id]),
            ..Default::default()
        };
        let view = self.api.update_task(principal, existing.task.id, update).await?;

        Ok(ActionOutcome::ok(
            format!(
                "**{}** already exists, so I reassigned it to **{}** instead of creating a duplicate.\n\n{}",
                view.task.title,
                assignee.full_name(),
                task_details(&view)
            ),
            json!({ "task": task_summary(&view), "created": false, "reassigned": true }),
        ))
    }

    async fn update_task(&self, principal: &Principal, p: &Params<'_>) -> Result<ActionOutcome> {
        let view = found_or_return!(self.resolve_task(principal, p).await?);

        let mut update = UpdateTaskInput {
            title: p.text(&["new_title"]),
            description: p.text(&["description", "brief"]).map(Some),
            end_date: p.text(&["due_date", "end_date", "deadline"]).map(Some),
            ..Default::default()
        };
        if let Some(name) = p.text(&["assignee", "assign_to", "user"]) {
            update.user_ids = Some(vec![self.resolve_user(principal, &name).await?.id]);
        }
        if update.title.is_none()
            && update.description.is_none()
            && update.end_date.is_none()
            && update.user_ids.is_none()
        {
            return Err(SmartTaskError::MissingParameter(
                "Tell me what to change: a new title, description, due date or assignee.".to_string(),
            ));
        }

        let updated = self.api.update_task(principal, view.task.id, update).await?;
        Ok(ActionOutcome::ok(
            format!("**Task updated:** {}\n\n{}", updated.task.title, task_details(&updated)),
            json!({ "task": task_summary(&updated) }),
        ))
    }

    async fn delete_task(&self, principal: &Principal, p: &Params<'_>) -> Result<ActionOutcome> {
        let view = found_or_return!(self.resolve_task(principal, p).await?);
        self.api.delete_task(principal, view.task.id).await?;
        Ok(ActionOutcome::ok(
            format!("**Task deleted:** {}", view.task.title),
            json!({ "deleted": view.task.id }),
        ))
    }

    async fn add_task_message(&self, principal: &Principal, p: &Params<'_>) -> Result<ActionOutcome> {
        let message = p.required(&["message", "comment", "text"], "What should the comment say?")?;
        let view = found_or_return!(self.resolve_task(principal, p).await?);
        let created = self.api.add_task_message(principal, view.task.id, &message).await?;
        Ok(ActionOutcome::ok(
            format!("**Comment added** to {}:\n\n> {}", view.task.title, created.message),
            json!({ "task_id": view.task.id, "message_id": created.id }),
        ))
    }

    async fn add_task_attachment(&self, principal: &Principal, p: &Params<'_>) -> Result<ActionOutcome> {
        let url = p.required(&["url", "link"], "Which link should I attach?")?;
        let view = found_or_return!(self.resolve_task(principal, p).await?);

        let mut input = DeliverableInput {
            title: Some(p.text(&["attachment_title", "label"]).unwrap_or_else(|| url.clone())),
            deliverable_type: Some("link".to_string()),
            ..Default::default()
        };
        if google_link(&url) {
            input.google_link = Some(url.clone());
        } else {
            input.external_link = Some(url.clone());
        }
        let deliverable = self.api.add_task_attachment(principal, view.task.id, input).await?;

        Ok(ActionOutcome::ok(
            format!("**Link attached** to {}:\n\n• {}", view.task.title, url),
            json!({ "task_id": view.task.id, "deliverable_id": deliverable.deliverable.id }),
        ))
    }

    async fn update_task_status(&self, principal: &Principal, p: &Params<'_>) -> Result<ActionOutcome> {
        let name = p.required(&["status", "status_name"], "Which status should the task move to?")?;
        let view = found_or_return!(self.resolve_task(principal, p).await?);
        let status = self.resolve_status(principal, &name).await?;

        let updated = self.api.update_task_status(principal, view.task.id, status.id).await?;
        Ok(ActionOutcome::ok(
            format!(
                "**{}** moved from {} to **{}**.",
                updated.task.title,
                status_title(&view),
                status_title(&updated)
            ),
            json!({ "task": task_summary(&updated) }),
        ))
    }

    async fn update_task_priority(&self, principal: &Principal, p: &Params<'_>) -> Result<ActionOutcome> {
        let name = p.required(&["priority", "priority_name"], "Which priority should the task have?")?;
        let view = found_or_return!(self.resolve_task(principal, p).await?);
        let priority = self.resolve_priority(principal, &name).await?;

        let update = UpdateTaskInput {
            priority_id: Some(priority.id),
            ..Default::default()
        };
        let updated = self.api.update_task(principal, view.task.id, update).await?;
        Ok(ActionOutcome::ok(
            format!("**{}** is now **{}** priority.", updated.task.title, priority_title(&updated)),
            json!({ "task": task_summary(&updated) }),
        ))
    }

    // ----- reads -------------------------------------------------------------

    async fn get_user_tasks(&self, principal: &Principal, p: &Params<'_>) -> Result<ActionOutcome> {
        let name = p.required(USER_KEYS, "Whose tasks should I look up?")?;
        let user = self.resolve_user(principal, &name).await?;
        let filter = TaskFilter {
            user_id: Some(user.id),
            ..Default::default()
        };
        let tasks = self.api.list_tasks(principal, filter).await?;

        let content = if tasks.is_empty() {
            format!("**{}** has no tasks assigned right now.", user.full_name())
        } else {
            render_task_list(&format!("{}'s tasks", user.full_name()), &tasks)
        };
        Ok(ActionOutcome::ok(
            content,
            json!({ "user_id": user.id, "tasks": tasks.iter().map(task_summary).collect::<Vec<_>>() }),
        ))
    }

    async fn list_tasks(&self, principal: &Principal, p: &Params<'_>) -> Result<ActionOutcome> {
        let mut filter = TaskFilter {
            search: p.text(&["search", "query"]),
            ..Default::default()
        };
        if let Some(name) = p.text(&["status"]) {
            filter.status_id = Some(self.resolve_status(principal, &name).await?.id);
        }
        if let Some(name) = p.text(&["priority"]) {
            filter.priority_id = Some(self.resolve_priority(principal, &name).await?.id);
        }
        if let Some(name) = p.text(&["project"]) {
            filter.project_id = Some(self.resolve_project(principal, &name).await?.id);
        }
        let tasks = self.api.list_tasks(principal, filter).await?;

        let content = if tasks.is_empty() {
            "No tasks match that.".to_string()
        } else {
            render_task_list("Tasks", &tasks)
        };
        Ok(ActionOutcome::ok(
            content,
            json!({ "tasks": tasks.iter().map(task_summary).collect::<Vec<_>>() }),
        ))
    }

    async fn get_task_status(&self, principal: &Principal, p: &Params<'_>) -> Result<ActionOutcome> {
        let view = found_or_return!(self.resolve_task(principal, p).await?);
        Ok(ActionOutcome::ok(
            format!(
                "**{}** is currently **{}**.\n\n{}",
                view.task.title,
                status_title(&view),
                task_details(&view)
            ),
            json!({ "task": task_summary(&view) }),
        ))
    }

    async fn get_task_updates(&self, principal: &Principal, p: &Params<'_>) -> Result<ActionOutcome> {
        let view = found_or_return!(self.resolve_task(principal, p).await?);
        let messages = self.api.task_messages(principal, view.task.id).await?;
        if messages.is_empty() {
            return Ok(ActionOutcome::ok(
                format!("No updates on **{}** yet.", view.task.title),
                json!({ "task_id": view.task.id, "messages": [] }),
            ));
        }

        let names: HashMap<Uuid, String> = self
            .api
            .users(principal)
            .await?
            .into_iter()
            .map(|u| (u.id, u.full_name()))
            .collect();
        let mut content = format!("**Latest updates on {}**\n", view.task.title);
        for message in messages.iter().rev().take(5) {
            let sender = message
                .sender_id
                .and_then(|id| names.get(&id).cloned())
                .unwrap_or_else(|| "Someone".to_string());
            content.push_str(&format!(
                "\n• **{}** ({}): {}",
                sender,
                message.created_at.format("%b %d %H:%M"),
                message.message
            ));
        }
        Ok(ActionOutcome::ok(
            content,
            json!({ "task_id": view.task.id, "messages": messages }),
        ))
    }

    async fn get_users(&self, principal: &Principal) -> Result<ActionOutcome> {
        let users = self.api.users(principal).await?;
        let mut content = format!("**Team members** ({})\n", users.len());
        for user in &users {
            let roles: Vec<String> = user.roles.iter().map(|r| r.to_string()).collect();
            content.push_str(&format!("\n• **{}** ({})", user.full_name(), roles.join(", ")));
        }
        Ok(ActionOutcome::ok(content, json!({ "users": users })))
    }

    async fn get_projects(&self, principal: &Principal) -> Result<ActionOutcome> {
        let projects = self.api.projects(principal).await?;
        if projects.is_empty() {
            return Ok(ActionOutcome::ok("You have no projects yet.".to_string(), json!({ "projects": [] })));
        }
        let mut content = format!("**Projects** ({})\n", projects.len());
        for project in &projects {
            content.push_str(&format!("\n• **{}**", project.title));
        }
        Ok(ActionOutcome::ok(content, json!({ "projects": projects })))
    }

    async fn get_project_progress(&self, principal: &Principal, p: &Params<'_>) -> Result<ActionOutcome> {
        let name = p.required(&["project", "project_name", "name"], "Which project?")?;
        let project = self.resolve_project(principal, &name).await?;
        let filter = TaskFilter {
            project_id: Some(project.id),
            ..Default::default()
        };
        let tasks = self.api.list_tasks(principal, filter).await?;

        let total = tasks.len();
        let completed = tasks
            .iter()
            .filter(|v| v.status.as_ref().is_some_and(|s| s.is_completed()))
            .count();
        let expired = tasks.iter().filter(|v| v.is_expired).count();
        let percent = if total == 0 { 0 } else { completed * 100 / total };

        let content = format!(
            "**{}** is **{}%** complete.\n\n• **Completed:** {} of {}\n• **Open:** {}\n• **Past strict deadline:** {}",
            project.title,
            percent,
            completed,
            total,
            total - completed,
            expired
        );
        Ok(ActionOutcome::ok(
            content,
            json!({
                "project_id": project.id,
                "total": total,
                "completed": completed,
                "percent": percent,
            }),
        ))
    }

    async fn get_dashboard(&self, principal: &Principal) -> Result<ActionOutcome> {
        let dashboard = self.api.dashboard(principal).await?;
        let mut content = format!(
            "**Dashboard**\n\n• **Total tasks:** {}\n• **Completed:** {}\n• **Overdue:** {}\n• **Due this week:** {}\n",
            dashboard.total_tasks, dashboard.completed_tasks, dashboard.overdue_tasks, dashboard.due_this_week
        );
        for status in dashboard.by_status.iter().filter(|s| s.count > 0) {
            content.push_str(&format!("\n• {}: {}", status.title, status.count));
        }
        Ok(ActionOutcome::ok(content, json!({ "dashboard": dashboard })))
    }

    async fn search_content(&self, principal: &Principal, p: &Params<'_>) -> Result<ActionOutcome> {
        let query = p.required(&["query", "q", "search", "term"], "What should I search for?")?;
        let results = self.api.search(principal, &query).await?;

        let found = results.tasks.len() + results.projects.len() + results.clients.len();
        if found == 0 {
            return Ok(ActionOutcome::ok(
                format!("Nothing matches \"{}\".", query),
                json!({ "results": results }),
            ));
        }
        let mut content = format!("**Results for \"{}\"**\n", query);
        for (label, hits) in [
            ("Tasks", &results.tasks),
            ("Projects", &results.projects),
            ("Clients", &results.clients),
        ] {
            if hits.is_empty() {
                continue;
            }
            content.push_str(&format!("\n**{}**", label));
            for hit in hits {
                content.push_str(&format!("\n• {}", hit.title));
            }
            content.push('\n');
        }
        Ok(ActionOutcome::ok(content.trim_end().to_string(), json!({ "results": results })))
    }
}
