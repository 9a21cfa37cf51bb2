use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{delete, get, post},
};
use db::models::{priority::Priority, status::Status, task_type::TaskType};
use deployment::Deployment;
use services::services::{
    principal::Principal,
    reference::{BulkDeleteReport, ReferenceKind},
};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError, routes::tasks::IdList};

pub async fn get_statuses(
    State(deployment): State<DeploymentImpl>,
    Extension(principal): Extension<Principal>,
) -> Result<ResponseJson<ApiResponse<Vec<Status>>>, ApiError> {
    let statuses = Status::list_by_tenant(&deployment.db().pool, principal.tenant_id).await?;
    Ok(ResponseJson(ApiResponse::success(statuses)))
}

pub async fn get_priorities(
    State(deployment): State<DeploymentImpl>,
    Extension(principal): Extension<Principal>,
) -> Result<ResponseJson<ApiResponse<Vec<Priority>>>, ApiError> {
    let priorities = Priority::list_by_tenant(&deployment.db().pool, principal.tenant_id).await?;
    Ok(ResponseJson(ApiResponse::success(priorities)))
}

pub async fn get_task_types(
    State(deployment): State<DeploymentImpl>,
    Extension(principal): Extension<Principal>,
) -> Result<ResponseJson<ApiResponse<Vec<TaskType>>>, ApiError> {
    let task_types = TaskType::list_by_tenant(&deployment.db().pool, principal.tenant_id).await?;
    Ok(ResponseJson(ApiResponse::success(task_types)))
}

async fn delete_one(
    deployment: &DeploymentImpl,
    principal: &Principal,
    kind: ReferenceKind,
    id: Uuid,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    deployment.reference().delete(principal, kind, id).await?;
    Ok(ResponseJson(ApiResponse::success_with_message(
        (),
        format!("The {} was deleted", kind),
    )))
}

async fn delete_many(
    deployment: &DeploymentImpl,
    principal: &Principal,
    kind: ReferenceKind,
    ids: &[Uuid],
) -> Result<ResponseJson<ApiResponse<BulkDeleteReport>>, ApiError> {
    if ids.is_empty() {
        return Err(ApiError::BadRequest(format!("No {} ids were provided", kind)));
    }
    let report = deployment.reference().delete_multiple(principal, kind, ids).await?;
    Ok(ResponseJson(ApiResponse::success(report)))
}

pub async fn delete_priority(
    State(deployment): State<DeploymentImpl>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    delete_one(&deployment, &principal, ReferenceKind::Priority, id).await
}

pub async fn delete_status(
    State(deployment): State<DeploymentImpl>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    delete_one(&deployment, &principal, ReferenceKind::Status, id).await
}

pub async fn delete_task_type(
    State(deployment): State<DeploymentImpl>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    delete_one(&deployment, &principal, ReferenceKind::TaskType, id).await
}

pub async fn delete_multiple_priorities(
    State(deployment): State<DeploymentImpl>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<IdList>,
) -> Result<ResponseJson<ApiResponse<BulkDeleteReport>>, ApiError> {
    delete_many(&deployment, &principal, ReferenceKind::Priority, &payload.ids).await
}

pub async fn delete_multiple_statuses(
    State(deployment): State<DeploymentImpl>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<IdList>,
) -> Result<ResponseJson<ApiResponse<BulkDeleteReport>>, ApiError> {
    delete_many(&deployment, &principal, ReferenceKind::Status, &payload.ids).await
}

pub async fn delete_multiple_task_types(
    State(deployment): State<DeploymentImpl>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<IdList>,
) -> Result<ResponseJson<ApiResponse<BulkDeleteReport>>, ApiError> {
    delete_many(&deployment, &principal, ReferenceKind::TaskType, &payload.ids).await
}

pub fn router() -> Router<DeploymentImpl> {
    Router::new()
        .route("/statuses", get(get_statuses))
        .route("/statuses/{id}", delete(delete_status))
        .route("/statuses/delete-multiple", post(delete_multiple_statuses))
        .route("/priorities", get(get_priorities))
        .route("/priorities/{id}", delete(delete_priority))
        .route("/priorities/delete-multiple", post(delete_multiple_priorities))
        .route("/task-types", get(get_task_types))
        .route("/task-types/{id}", delete(delete_task_type))
        .route("/task-types/delete-multiple", post(delete_multiple_task_types))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use db::models::task::Task;
    use serde_json::json;

    use crate::test_support::TestApp;

    #[tokio::test]
    async fn referenced_status_cannot_be_deleted() {
        let app = TestApp::new().await;
        Task::insert(&app.pool, &app.seed.new_task("Uses pending")).await.unwrap();

        let (status, body) = app
            .delete(&app.admin_token, &format!("/api/statuses/{}", app.seed.pending.id))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap().contains("assigned to 1 task"));

        let (status, _) = app
            .delete(&app.admin_token, &format!("/api/statuses/{}", app.seed.in_progress.id))
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = app
            .delete(&app.admin_token, &format!("/api/statuses/{}", app.seed.in_progress.id))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn bulk_delete_reports_skipped_rows() {
        let app = TestApp::new().await;
        Task::insert(&app.pool, &app.seed.new_task("Uses type")).await.unwrap();

        let (status, _) = app
            .post(
                &app.tasker_token,
                "/api/task-types/delete-multiple",
                json!({ "ids": [app.seed.task_type.id] }),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = app
            .post(
                &app.admin_token,
                "/api/task-types/delete-multiple",
                json!({ "ids": [app.seed.task_type.id] }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["deleted"], json!([]));
        assert_eq!(body["data"]["skipped"][0]["id"], json!(app.seed.task_type.id));
    }
}
