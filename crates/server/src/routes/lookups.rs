use axum::{
    Extension, Router,
    extract::{Query, State},
    response::Json as ResponseJson,
    routing::get,
};
use chrono::Utc;
use db::models::{notification::Notification, project::Project, user::UserSummary};
use deployment::Deployment;
use serde::Deserialize;
use services::services::{
    lookups::{Dashboard, SearchResults},
    principal::Principal,
};
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

pub async fn get_users(
    State(deployment): State<DeploymentImpl>,
    Extension(principal): Extension<Principal>,
) -> Result<ResponseJson<ApiResponse<Vec<UserSummary>>>, ApiError> {
    let users = deployment.lookups().users(&principal).await?;
    Ok(ResponseJson(ApiResponse::success(users)))
}

pub async fn get_projects(
    State(deployment): State<DeploymentImpl>,
    Extension(principal): Extension<Principal>,
) -> Result<ResponseJson<ApiResponse<Vec<Project>>>, ApiError> {
    let projects = deployment.lookups().projects(&principal).await?;
    Ok(ResponseJson(ApiResponse::success(projects)))
}

pub async fn get_dashboard(
    State(deployment): State<DeploymentImpl>,
    Extension(principal): Extension<Principal>,
) -> Result<ResponseJson<ApiResponse<Dashboard>>, ApiError> {
    let dashboard = deployment.lookups().dashboard(&principal, Utc::now()).await?;
    Ok(ResponseJson(ApiResponse::success(dashboard)))
}

pub async fn search(
    State(deployment): State<DeploymentImpl>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<SearchQuery>,
) -> Result<ResponseJson<ApiResponse<SearchResults>>, ApiError> {
    if query.q.trim().is_empty() {
        return Ok(ResponseJson(ApiResponse::success(SearchResults::default())));
    }
    let results = deployment.lookups().search(&principal, &query.q).await?;
    Ok(ResponseJson(ApiResponse::success(results)))
}

pub async fn get_notifications(
    State(deployment): State<DeploymentImpl>,
    Extension(principal): Extension<Principal>,
) -> Result<ResponseJson<ApiResponse<Vec<Notification>>>, ApiError> {
    let notifications = Notification::find_for_user(&deployment.db().pool, principal.user_id).await?;
    Ok(ResponseJson(ApiResponse::success(notifications)))
}

pub fn router() -> Router<DeploymentImpl> {
    Router::new()
        .route("/users", get(get_users))
        .route("/projects", get(get_projects))
        .route("/dashboard", get(get_dashboard))
        .route("/search", get(search))
        .route("/notifications", get(get_notifications))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::http::StatusCode;
    use serde_json::{Value, json};

    use crate::test_support::TestApp;

    #[tokio::test]
    async fn users_are_redacted_for_taskers() {
        let app = TestApp::new().await;

        let (status, body) = app.get(&app.admin_token, "/api/users").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"].as_array().unwrap().iter().all(|u| u["email"].is_string()));

        let (_, body) = app.get(&app.tasker_token, "/api/users").await;
        assert!(body["data"].as_array().unwrap().iter().all(|u| u["email"].is_null()));
    }

    #[tokio::test]
    async fn search_and_dashboard() {
        let app = TestApp::new().await;
        app.post(
            &app.admin_token,
            "/api/tasks",
            json!({
                "title": "Quarterly vendor review",
                "status_id": app.seed.pending.id,
                "priority_id": app.seed.priority.id,
                "project_id": app.seed.project.id,
            }),
        )
        .await;

        let (status, body) = app.get(&app.admin_token, "/api/search?q=vendor").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["tasks"][0]["title"], "Quarterly vendor review");

        let (_, body) = app.get(&app.admin_token, "/api/search?q=").await;
        assert_eq!(body["data"]["tasks"], json!([]));

        let (_, body) = app.get(&app.admin_token, "/api/dashboard").await;
        assert_eq!(body["data"]["total_tasks"], 1);
    }

    #[tokio::test]
    async fn assignment_produces_a_notification() {
        let app = TestApp::new().await;
        let (status, _) = app
            .post(
                &app.admin_token,
                "/api/tasks",
                json!({
                    "title": "Shoot product photos",
                    "status_id": app.seed.pending.id,
                    "priority_id": app.seed.priority.id,
                    "project_id": app.seed.project.id,
                    "user_ids": [app.seed.tasker.id],
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        // The worker persists events asynchronously
        let mut notifications = Value::Null;
        for _ in 0..50 {
            let (_, body) = app.get(&app.tasker_token, "/api/notifications").await;
            if body["data"].as_array().is_some_and(|n| !n.is_empty()) {
                notifications = body["data"].clone();
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(notifications[0]["kind"], "task_assigned");
    }
}
