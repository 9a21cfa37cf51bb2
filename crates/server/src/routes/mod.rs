use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::get,
};
use tower_http::cors::CorsLayer;

use crate::{DeploymentImpl, middleware as app_middleware};

pub mod health;
pub mod lookups;
pub mod reference;
pub mod smart_task;
pub mod task_activity;
pub mod tasks;

pub fn router(deployment: DeploymentImpl) -> Router {
    // Everything except the health check needs a principal
    let protected = Router::new()
        .merge(tasks::router())
        .merge(task_activity::router())
        .merge(reference::router())
        .merge(lookups::router())
        .merge(smart_task::router())
        .layer(from_fn_with_state(deployment.clone(), app_middleware::require_auth));

    let api = Router::new()
        .route("/health", get(health::health_check))
        .merge(protected)
        .with_state(deployment);

    Router::new()
        .nest("/api", api)
        .layer(from_fn(app_middleware::request_id_middleware))
        .layer(CorsLayer::permissive())
}
