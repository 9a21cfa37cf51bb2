use axum::{extract::State, response::Json as ResponseJson};
use deployment::Deployment;
use serde_json::{Value, json};
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError};

pub async fn health_check(
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<Value>>, ApiError> {
    sqlx::query("SELECT 1").execute(&deployment.db().pool).await?;
    Ok(ResponseJson(ApiResponse::success(json!({ "status": "ok" }))))
}
