use axum::{
    Extension, Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use deployment::Deployment;
use services::services::principal::Principal;
use smart_task::{SmartTaskRequest, SmartTaskResponse};

use crate::DeploymentImpl;

/// Natural-language assistant. Business failures are answered with 200 and
/// `success: false`; only a request that exceeds the time budget is a 500.
pub async fn smart_task(
    State(deployment): State<DeploymentImpl>,
    Extension(principal): Extension<Principal>,
    Json(request): Json<SmartTaskRequest>,
) -> Response {
    tracing::info!(
        user_id = %principal.user_id,
        action = request.action.as_deref().unwrap_or("-"),
        "[SMART_TASK] Request received"
    );

    match deployment.smart_task().handle(&principal, request).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(SmartTaskResponse::from_error(&e)),
        )
            .into_response(),
    }
}

pub fn router() -> Router<DeploymentImpl> {
    Router::new().route("/smart-task", post(smart_task))
}
