//! The collaborator surface the executor acts through.
//!
//! `LocalTaskApi` calls the services in-process; every call is logged with
//! its REST-equivalent method, target and outcome.

use async_trait::async_trait;
use db::models::{
    message::TaskMessage,
    priority::Priority,
    project::Project,
    status::Status,
    task::TaskFilter,
    user::UserSummary,
};
use services::services::{
    lifecycle::{
        CreateTaskInput, DeliverableInput, DeliverableView, LifecycleError, TaskLifecycleManager,
        TaskView, UpdateTaskInput,
    },
    lookups::{Dashboard, LookupService, SearchResults},
    principal::Principal,
};
use uuid::Uuid;

pub type ApiResult<T> = Result<T, LifecycleError>;

#[async_trait]
pub trait TaskApi: Send + Sync {
    async fn list_tasks(&self, principal: &Principal, filter: TaskFilter) -> ApiResult<Vec<TaskView>>;
    async fn get_task(&self, principal: &Principal, id: Uuid) -> ApiResult<TaskView>;
    async fn create_task(&self, principal: &Principal, input: CreateTaskInput) -> ApiResult<TaskView>;
    async fn update_task(&self, principal: &Principal, id: Uuid, input: UpdateTaskInput) -> ApiResult<TaskView>;
    async fn update_task_status(&self, principal: &Principal, id: Uuid, status_id: Uuid) -> ApiResult<TaskView>;
    async fn delete_task(&self, principal: &Principal, id: Uuid) -> ApiResult<()>;
    async fn task_messages(&self, principal: &Principal, id: Uuid) -> ApiResult<Vec<TaskMessage>>;
    async fn add_task_message(&self, principal: &Principal, id: Uuid, message: &str) -> ApiResult<TaskMessage>;
    async fn add_task_attachment(
        &self,
        principal: &Principal,
        id: Uuid,
        input: DeliverableInput,
    ) -> ApiResult<DeliverableView>;
    async fn users(&self, principal: &Principal) -> ApiResult<Vec<UserSummary>>;
    async fn projects(&self, principal: &Principal) -> ApiResult<Vec<Project>>;
    async fn statuses(&self, principal: &Principal) -> ApiResult<Vec<Status>>;
    async fn priorities(&self, principal: &Principal) -> ApiResult<Vec<Priority>>;
    async fn dashboard(&self, principal: &Principal) -> ApiResult<Dashboard>;
    async fn search(&self, principal: &Principal, query: &str) -> ApiResult<SearchResults>;
}

fn logged<T>(method: &str, target: String, result: ApiResult<T>) -> ApiResult<T> {
    match &result {
        Ok(_) => tracing::info!(method, target = %target, outcome = "ok", "[SMART_TASK] API call"),
        Err(e) => tracing::warn!(
            method,
            target = %target,
            outcome = "error",
            error = %e,
            "[SMART_TASK] API call failed"
        ),
    }
    result
}

fn filter_query(filter: &TaskFilter) -> String {
    let mut parts = Vec::new();
    if let Some(search) = &filter.search {
        parts.push(format!("search={}", search));
    }
    if let Some(id) = filter.user_id {
        parts.push(format!("user_id={}", id));
    }
    if let Some(id) = filter.status_id {
        parts.push(format!("status_id={}", id));
    }
    if let Some(id) = filter.priority_id {
        parts.push(format!("priority_id={}", id));
    }
    if let Some(id) = filter.project_id {
        parts.push(format!("project_id={}", id));
    }
    if parts.is_empty() {
        "/tasks".to_string()
    } else {
        format!("/tasks?{}", parts.join("&"))
    }
}

#[derive(Clone)]
pub struct LocalTaskApi {
    lifecycle: TaskLifecycleManager,
    lookups: LookupService,
}

impl LocalTaskApi {
    pub fn new(lifecycle: TaskLifecycleManager) -> Self {
        Self {
            lookups: LookupService::new(lifecycle.pool().clone()),
            lifecycle,
        }
    }
}

#[async_trait]
impl TaskApi for LocalTaskApi {
    async fn list_tasks(&self, principal: &Principal, filter: TaskFilter) -> ApiResult<Vec<TaskView>> {
        let target = filter_query(&filter);
        logged("GET", target, self.lifecycle.list_all(principal, &filter).await)
    }

    async fn get_task(&self, principal: &Principal, id: Uuid) -> ApiResult<TaskView> {
        logged("GET", format!("/tasks/{}", id), self.lifecycle.get(principal, id).await)
    }

    async fn create_task(&self, principal: &Principal, input: CreateTaskInput) -> ApiResult<TaskView> {
        logged("POST", "/tasks".to_string(), self.lifecycle.create(principal, input).await)
    }

    async fn update_task(&self, principal: &Principal, id: Uuid, input: UpdateTaskInput) -> ApiResult<TaskView> {
        logged(
            "PUT",
            format!("/tasks/{}", id),
            self.lifecycle.update(principal, id, input).await,
        )
    }

    async fn update_task_status(&self, principal: &Principal, id: Uuid, status_id: Uuid) -> ApiResult<TaskView> {
        logged(
            "PUT",
            format!("/tasks/{}/status", id),
            self.lifecycle.update_status(principal, id, status_id).await,
        )
    }

    async fn delete_task(&self, principal: &Principal, id: Uuid) -> ApiResult<()> {
        logged("DELETE", format!("/tasks/{}", id), self.lifecycle.delete(principal, id).await)
    }

    async fn task_messages(&self, principal: &Principal, id: Uuid) -> ApiResult<Vec<TaskMessage>> {
        logged(
            "GET",
            format!("/tasks/{}/messages", id),
            self.lifecycle.messages(principal, id).await,
        )
    }

    async fn add_task_message(&self, principal: &Principal, id: Uuid, message: &str) -> ApiResult<TaskMessage> {
        logged(
            "POST",
            format!("/tasks/{}/messages", id),
            self.lifecycle.add_message(principal, id, message).await,
        )
    }

    async fn add_task_attachment(
        &self,
        principal: &Principal,
        id: Uuid,
        input: DeliverableInput,
    ) -> ApiResult<DeliverableView> {
        logged(
            "POST",
            format!("/tasks/{}/deliverables", id),
            self.lifecycle.add_deliverable(principal, id, input).await,
        )
    }

    async fn users(&self, principal: &Principal) -> ApiResult<Vec<UserSummary>> {
        logged(
            "GET",
            "/users".to_string(),
            self.lookups.users(principal).await.map_err(LifecycleError::from),
        )
    }

    async fn projects(&self, principal: &Principal) -> ApiResult<Vec<Project>> {
        logged(
            "GET",
            "/projects".to_string(),
            self.lookups.projects(principal).await.map_err(LifecycleError::from),
        )
    }

    async fn statuses(&self, principal: &Principal) -> ApiResult<Vec<Status>> {
        logged(
            "GET",
            "/statuses".to_string(),
            Status::list_by_tenant(self.lifecycle.pool(), principal.tenant_id)
                .await
                .map_err(LifecycleError::from),
        )
    }

    async fn priorities(&self, principal: &Principal) -> ApiResult<Vec<Priority>> {
        logged(
            "GET",
            "/priorities".to_string(),
            Priority::list_by_tenant(self.lifecycle.pool(), principal.tenant_id)
                .await
                .map_err(LifecycleError::from),
        )
    }

    async fn dashboard(&self, principal: &Principal) -> ApiResult<Dashboard> {
        logged(
            "GET",
            "/dashboard".to_string(),
            self.lookups
                .dashboard(principal, chrono::Utc::now())
                .await
                .map_err(LifecycleError::from),
        )
    }

    async fn search(&self, principal: &Principal, query: &str) -> ApiResult<SearchResults> {
        logged(
            "GET",
            format!("/search?q={}", query),
            self.lookups.search(principal, query).await.map_err(LifecycleError::from),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_targets_mirror_rest_queries() {
        assert_eq!(filter_query(&TaskFilter::default()), "/tasks");
        let user = Uuid::nil();
        let filter = TaskFilter {
            search: Some("report".to_string()),
            user_id: Some(user),
            ..Default::default()
        };
        assert_eq!(filter_query(&filter), format!("/tasks?search=report&user_id={}", user));
    }
}
