use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use deployment::DeploymentError;
use serde_json::Value;
use services::services::{lifecycle::LifecycleError, reference::ReferenceError};
use thiserror::Error;
use utils::response::ApiResponse;

const GENERIC_ERROR: &str = "Something went wrong. Please try again.";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Reference(#[from] ReferenceError),
    #[error(transparent)]
    Deployment(#[from] DeploymentError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("Multipart error: {0}")]
    Multipart(#[from] MultipartError),
    #[error("Bad Request: {0}")]
    BadRequest(String),
    #[error("Not Found: {0}")]
    NotFound(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Internal Server Error: {0}")]
    InternalError(String),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Lifecycle(err) => match err {
                LifecycleError::Validation(_) | LifecycleError::BadRequest(_) => StatusCode::BAD_REQUEST,
                LifecycleError::Forbidden(_) | LifecycleError::Deadline(_) => StatusCode::FORBIDDEN,
                LifecycleError::TaskNotFound | LifecycleError::NotFound(_) => StatusCode::NOT_FOUND,
                LifecycleError::Database(_) | LifecycleError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Reference(err) => match err {
                ReferenceError::NotFound(_) => StatusCode::NOT_FOUND,
                ReferenceError::InUse { .. } => StatusCode::BAD_REQUEST,
                ReferenceError::Forbidden => StatusCode::FORBIDDEN,
                ReferenceError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Multipart(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Deployment(_) | ApiError::Database(_) | ApiError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message shown to the caller. Server-side failures never leak detail.
    fn public_message(&self) -> String {
        match self {
            ApiError::Lifecycle(LifecycleError::Database(_) | LifecycleError::Storage(_))
            | ApiError::Reference(ReferenceError::Database(_))
            | ApiError::Deployment(_)
            | ApiError::Database(_)
            | ApiError::InternalError(_) => GENERIC_ERROR.to_string(),
            ApiError::Lifecycle(err) => err.to_string(),
            ApiError::Reference(err) => err.to_string(),
            ApiError::Multipart(_) => {
                "Failed to read the upload. Please ensure the files are valid and try again.".to_string()
            }
            ApiError::BadRequest(msg)
            | ApiError::NotFound(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();
        if status_code.is_server_error() {
            tracing::error!("Request failed: {:?}", self);
        } else {
            tracing::debug!(status = %status_code, "Request refused: {}", self);
        }

        let message = self.public_message();
        let response = match &self {
            ApiError::Lifecycle(LifecycleError::Validation(errors)) => {
                let details = serde_json::to_value(errors).unwrap_or(Value::Null);
                ApiResponse::<()>::error_with_details(&message, details)
            }
            _ => ApiResponse::<()>::error(&message),
        };
        (status_code, Json(response)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use services::services::{deadline::DeadlineError, reference::ReferenceKind};

    use super::*;

    async fn body_of(error: ApiError) -> (StatusCode, Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn validation_errors_carry_field_messages() {
        let mut errors = BTreeMap::new();
        errors.insert("title".to_string(), vec!["The title field is required.".to_string()]);
        let (status, body) = body_of(LifecycleError::Validation(errors).into()).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["errors"]["title"][0], "The title field is required.");
    }

    #[tokio::test]
    async fn business_rules_map_to_their_status() {
        let (status, body) = body_of(LifecycleError::Deadline(DeadlineError::Expired).into()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body["message"].as_str().unwrap().contains("strict deadline"));

        let (status, _) = body_of(
            ReferenceError::InUse {
                kind: ReferenceKind::Status,
                count: 2,
            }
            .into(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = body_of(LifecycleError::TaskNotFound.into()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn database_failures_are_opaque() {
        let (status, body) = body_of(ApiError::Database(sqlx::Error::PoolTimedOut)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], GENERIC_ERROR);
        assert!(body.get("errors").is_none());
    }
}
