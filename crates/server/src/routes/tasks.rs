use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{get, post, put},
};
use chrono::Utc;
use db::models::task::TaskFilter;
use deployment::Deployment;
use serde::Deserialize;
use services::services::{
    lifecycle::{CreateTaskInput, LifecycleError, TaskPage, TaskView, UpdateTaskInput},
    principal::Principal,
    reference::BulkDeleteReport,
    repeat::GeneratedOccurrence,
    validation::Validator,
};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError};

/// Query string of `GET /tasks`. Values arrive as strings so that empty
/// parameters (`?user_id=`) mean "no filter" instead of failing to parse.
#[derive(Debug, Default, Deserialize)]
pub struct TaskListQuery {
    pub search: Option<String>,
    pub user_id: Option<String>,
    pub status_id: Option<String>,
    pub priority_id: Option<String>,
    pub client_id: Option<String>,
    pub project_id: Option<String>,
    pub page: Option<String>,
    pub per_page: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn query_uuid(v: &mut Validator, field: &str, value: &Option<String>) -> Option<Uuid> {
    let raw = non_empty(value)?;
    match Uuid::parse_str(raw) {
        Ok(id) => Some(id),
        Err(_) => {
            v.add(field, format!("The {} must be a valid id.", field));
            None
        }
    }
}

fn query_int(v: &mut Validator, field: &str, value: &Option<String>) -> Option<i64> {
    let raw = non_empty(value)?;
    match raw.parse::<i64>() {
        Ok(n) => Some(n),
        Err(_) => {
            v.add(field, format!("The {} must be an integer.", field));
            None
        }
    }
}

impl TaskListQuery {
    pub fn parse(&self) -> Result<(TaskFilter, Option<i64>, Option<i64>), LifecycleError> {
        let mut v = Validator::new();
        let filter = TaskFilter {
            search: non_empty(&self.search).map(str::to_string),
            user_id: query_uuid(&mut v, "user_id", &self.user_id),
            status_id: query_uuid(&mut v, "status_id", &self.status_id),
            priority_id: query_uuid(&mut v, "priority_id", &self.priority_id),
            client_id: query_uuid(&mut v, "client_id", &self.client_id),
            project_id: query_uuid(&mut v, "project_id", &self.project_id),
            ..Default::default()
        };
        let page = query_int(&mut v, "page", &self.page);
        let per_page = query_int(&mut v, "per_page", &self.per_page);
        v.finish().map_err(LifecycleError::Validation)?;
        Ok((filter, page, per_page))
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct IdList {
    #[serde(default)]
    pub ids: Vec<Uuid>,
}

pub async fn get_tasks(
    State(deployment): State<DeploymentImpl>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<TaskListQuery>,
) -> Result<ResponseJson<ApiResponse<TaskPage>>, ApiError> {
    let (filter, page, per_page) = query.parse()?;
    tracing::debug!(?filter, ?page, ?per_page, "Listing tasks");
    let tasks = deployment
        .lifecycle()
        .list(&principal, &filter, page, per_page)
        .await?;
    Ok(ResponseJson(ApiResponse::success(tasks)))
}

pub async fn get_task(
    State(deployment): State<DeploymentImpl>,
    Extension(principal): Extension<Principal>,
    Path(task_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<TaskView>>, ApiError> {
    let task = deployment.lifecycle().get(&principal, task_id).await?;
    Ok(ResponseJson(ApiResponse::success(task)))
}

pub async fn create_task(
    State(deployment): State<DeploymentImpl>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<CreateTaskInput>,
) -> Result<ResponseJson<ApiResponse<TaskView>>, ApiError> {
    let task = deployment.lifecycle().create(&principal, payload).await?;
    Ok(ResponseJson(ApiResponse::success_with_message(
        task,
        "Task created successfully",
    )))
}

pub async fn update_task(
    State(deployment): State<DeploymentImpl>,
    Extension(principal): Extension<Principal>,
    Path(task_id): Path<Uuid>,
    Json(payload): Json<UpdateTaskInput>,
) -> Result<ResponseJson<ApiResponse<TaskView>>, ApiError> {
    let task = deployment.lifecycle().update(&principal, task_id, payload).await?;
    Ok(ResponseJson(ApiResponse::success_with_message(
        task,
        "Task updated successfully",
    )))
}

pub async fn update_task_status(
    State(deployment): State<DeploymentImpl>,
    Extension(principal): Extension<Principal>,
    Path(task_id): Path<Uuid>,
    Json(payload): Json<StatusUpdate>,
) -> Result<ResponseJson<ApiResponse<TaskView>>, ApiError> {
    let mut v = Validator::new();
    if payload.status_id.is_none() {
        v.required("status_id");
    }
    v.finish().map_err(LifecycleError::Validation)?;
    let Some(status_id) = payload.status_id else {
        return Err(ApiError::BadRequest("Missing status".to_string()));
    };
    let task = deployment
        .lifecycle()
        .update_status(&principal, task_id, status_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(task)))
}

pub async fn stop_repetition(
    State(deployment): State<DeploymentImpl>,
    Extension(principal): Extension<Principal>,
    Path(task_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<TaskView>>, ApiError> {
    let task = deployment.lifecycle().stop_repetition(&principal, task_id).await?;
    Ok(ResponseJson(ApiResponse::success_with_message(
        task,
        "Task repetition stopped",
    )))
}

pub async fn resume_repetition(
    State(deployment): State<DeploymentImpl>,
    Extension(principal): Extension<Principal>,
    Path(task_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<TaskView>>, ApiError> {
    let task = deployment.lifecycle().resume_repetition(&principal, task_id).await?;
    Ok(ResponseJson(ApiResponse::success_with_message(
        task,
        "Task repetition resumed",
    )))
}

pub async fn delete_task(
    State(deployment): State<DeploymentImpl>,
    Extension(principal): Extension<Principal>,
    Path(task_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    deployment.lifecycle().delete(&principal, task_id).await?;
    Ok(ResponseJson(ApiResponse::success_with_message(
        (),
        "Task deleted successfully",
    )))
}

pub async fn delete_multiple_tasks(
    State(deployment): State<DeploymentImpl>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<IdList>,
) -> Result<ResponseJson<ApiResponse<BulkDeleteReport>>, ApiError> {
    if payload.ids.is_empty() {
        return Err(ApiError::BadRequest("No task ids were provided".to_string()));
    }
    let report = deployment
        .lifecycle()
        .delete_multiple(&principal, &payload.ids)
        .await;
    Ok(ResponseJson(ApiResponse::success(report)))
}

fn require_tenant_wide(principal: &Principal) -> Result<(), ApiError> {
    if principal.is_tenant_wide() {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Admin access required".to_string()))
    }
}

/// Persist Rejected on every expired strict-deadline task of the tenant.
pub async fn enforce_deadlines(
    State(deployment): State<DeploymentImpl>,
    Extension(principal): Extension<Principal>,
) -> Result<ResponseJson<ApiResponse<Vec<Uuid>>>, ApiError> {
    require_tenant_wide(&principal)?;
    let rejected = deployment
        .lifecycle()
        .deadlines()
        .enforce_deadlines(principal.tenant_id, Utc::now())
        .await?;
    Ok(ResponseJson(ApiResponse::success(rejected)))
}

pub async fn run_repeats(
    State(deployment): State<DeploymentImpl>,
    Extension(principal): Extension<Principal>,
) -> Result<ResponseJson<ApiResponse<Vec<GeneratedOccurrence>>>, ApiError> {
    require_tenant_wide(&principal)?;
    let generated = deployment
        .repeat()
        .generate_due_occurrences(principal.tenant_id, Utc::now())
        .await?;
    Ok(ResponseJson(ApiResponse::success(generated)))
}

pub fn router() -> Router<DeploymentImpl> {
    let task_id_router = Router::new()
        .route("/", get(get_task).put(update_task).delete(delete_task))
        .route("/status", put(update_task_status))
        .route("/stop-repetition", post(stop_repetition))
        .route("/resume-repetition", post(resume_repetition));

    let inner = Router::new()
        .route("/", get(get_tasks).post(create_task))
        .route("/delete-multiple", post(delete_multiple_tasks))
        .route("/enforce-deadlines", post(enforce_deadlines))
        .route("/repeat/run", post(run_repeats))
        .nest("/{task_id}", task_id_router);

    Router::new().nest("/tasks", inner)
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use chrono::Duration;
    use db::models::task::Task;
    use serde_json::json;

    use crate::test_support::TestApp;

    #[tokio::test]
    async fn create_then_fetch_and_list() {
        let app = TestApp::new().await;
        let seed = &app.seed;

        let (status, body) = app
            .post(
                &app.admin_token,
                "/api/tasks",
                json!({
                    "title": "Launch landing page",
                    "status_id": seed.pending.id,
                    "priority_id": seed.priority.id,
                    "project_id": seed.project.id,
                    "user_ids": [seed.tasker.id],
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        let id = body["data"]["id"].as_str().unwrap().to_string();
        assert_eq!(body["data"]["users"][0]["id"], json!(seed.tasker.id));

        let (status, body) = app.get(&app.tasker_token, &format!("/api/tasks/{}", id)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["title"], "Launch landing page");

        let (status, body) = app
            .get(&app.admin_token, "/api/tasks?search=landing&user_id=&per_page=")
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["data"]["total"], 1);
        assert_eq!(body["data"]["per_page"], 15);
    }

    #[tokio::test]
    async fn invalid_input_is_a_validation_error() {
        let app = TestApp::new().await;

        let (status, body) = app.post(&app.admin_token, "/api/tasks", json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["errors"]["title"].is_array());

        let (status, body) = app.get(&app.admin_token, "/api/tasks?user_id=not-a-uuid").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["errors"]["user_id"].is_array());
    }

    #[tokio::test]
    async fn taskers_cannot_create_or_see_unassigned_tasks() {
        let app = TestApp::new().await;
        let hidden = Task::insert(&app.pool, &app.seed.new_task("Hidden")).await.unwrap();

        let (status, _) = app
            .post(&app.tasker_token, "/api/tasks", json!({ "title": "Mine" }))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = app.get(&app.tasker_token, &format!("/api/tasks/{}", hidden.id)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = app.get(&app.tasker_token, "/api/tasks").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["total"], 0);
    }

    #[tokio::test]
    async fn missing_token_is_unauthorized() {
        let app = TestApp::new().await;
        let (status, body) = app.get("", "/api/tasks").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn status_change_and_bulk_delete() {
        let app = TestApp::new().await;
        let seed = &app.seed;
        let first = Task::insert(&app.pool, &seed.new_task("First")).await.unwrap();
        let second = Task::insert(&app.pool, &seed.new_task("Second")).await.unwrap();

        let (status, body) = app
            .put(
                &app.admin_token,
                &format!("/api/tasks/{}/status", first.id),
                json!({ "status_id": seed.in_progress.id }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["data"]["status"]["id"], json!(seed.in_progress.id));

        let missing = uuid::Uuid::new_v4();
        let (status, body) = app
            .post(
                &app.admin_token,
                "/api/tasks/delete-multiple",
                json!({ "ids": [first.id, second.id, missing] }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["deleted"].as_array().unwrap().len(), 2);
        assert_eq!(body["data"]["skipped"][0]["id"], json!(missing));
    }

    #[tokio::test]
    async fn deadline_sweep_is_admin_only_and_persists() {
        let app = TestApp::new().await;
        let mut data = app.seed.new_task("Expired");
        data.close_deadline = true;
        data.end_date = Some(chrono::Utc::now() - Duration::hours(2));
        let task = Task::insert(&app.pool, &data).await.unwrap();

        let (status, body) = app.get(&app.admin_token, &format!("/api/tasks/{}", task.id)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status_id"], json!(app.seed.rejected.id));
        assert_eq!(body["data"]["status"]["title"], "Rejected");

        let (_, body) = app
            .get(&app.admin_token, &format!("/api/tasks?status_id={}", app.seed.rejected.id))
            .await;
        assert_eq!(body["data"]["total"], 1);
        let (_, body) = app
            .get(&app.admin_token, &format!("/api/tasks?status_id={}", app.seed.pending.id))
            .await;
        assert_eq!(body["data"]["total"], 0);

        let (status, _) = app
            .post(&app.tasker_token, "/api/tasks/enforce-deadlines", json!({}))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = app
            .post(&app.admin_token, "/api/tasks/enforce-deadlines", json!({}))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], json!([task.id]));

        let stored = Task::find_by_id(&app.pool, task.id).await.unwrap().unwrap();
        assert_eq!(stored.status_id, app.seed.rejected.id);
    }
}
