use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use db::models::session::Session;
use deployment::Deployment;
use services::services::principal::Principal;
use sqlx::SqlitePool;

use crate::{DeploymentImpl, error::ApiError};

/// Resolve a raw `Authorization` header value to the caller.
pub async fn principal_for_bearer(pool: &SqlitePool, auth_header: Option<&str>) -> Result<Principal, ApiError> {
    let token = auth_header
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("Missing or invalid authentication".to_string()))?;

    let user_id = Session::user_for_token(pool, token, Utc::now())
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Session is invalid or has expired".to_string()))?;

    Principal::load(pool, user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User no longer exists".to_string()))
}

/// Middleware to require authentication. Inserts the [`Principal`] into the
/// request extensions.
pub async fn require_auth(
    State(deployment): State<DeploymentImpl>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let principal = principal_for_bearer(&deployment.db().pool, auth_header).await?;
    tracing::debug!(user_id = %principal.user_id, tenant_id = %principal.tenant_id, "Authenticated request");
    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use db::test_utils::{seed_tenant, setup_test_pool};

    use super::*;

    #[tokio::test]
    async fn bearer_tokens_resolve_to_principals() {
        let pool = setup_test_pool().await;
        let seed = seed_tenant(&pool).await;
        Session::create(&pool, seed.tasker.id, "tasker-token", Utc::now() + Duration::hours(1))
            .await
            .unwrap();

        let principal = principal_for_bearer(&pool, Some("Bearer tasker-token")).await.unwrap();
        assert_eq!(principal.user_id, seed.tasker.id);
        assert_eq!(principal.tenant_id, seed.tenant_id);
        assert!(!principal.is_tenant_wide());

        assert!(matches!(
            principal_for_bearer(&pool, None).await,
            Err(ApiError::Unauthorized(_))
        ));
        assert!(matches!(
            principal_for_bearer(&pool, Some("Bearer nope")).await,
            Err(ApiError::Unauthorized(_))
        ));
        assert!(matches!(
            principal_for_bearer(&pool, Some("Basic tasker-token")).await,
            Err(ApiError::Unauthorized(_))
        ));
    }
}
