use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use chrono::{Duration, Utc};
use db::{
    DBService,
    models::session::Session,
    test_utils::{TestSeed, seed_tenant, setup_test_pool},
};
use serde_json::Value;
use services::services::config::Config;
use sqlx::SqlitePool;
use tower::ServiceExt;

use crate::{DeploymentImpl, routes};

/// The full router over a seeded in-memory database, with one live session
/// per role.
pub struct TestApp {
    pub router: Router,
    pub pool: SqlitePool,
    pub seed: TestSeed,
    pub admin_token: String,
    pub requester_token: String,
    pub tasker_token: String,
}

impl TestApp {
    pub async fn new() -> Self {
        let pool = setup_test_pool().await;
        let seed = seed_tenant(&pool).await;
        let expires = Utc::now() + Duration::hours(1);
        for (user, token) in [
            (&seed.admin, "admin-token"),
            (&seed.requester, "requester-token"),
            (&seed.tasker, "tasker-token"),
        ] {
            Session::create(&pool, user.id, token, expires).await.unwrap();
        }

        let uploads = std::env::temp_dir().join(format!("vc-test-uploads-{}", uuid::Uuid::new_v4()));
        let config = Config {
            uploads_dir: Some(uploads),
            ..Config::default()
        };
        let deployment = DeploymentImpl::from_parts(config, DBService { pool: pool.clone() });

        Self {
            router: routes::router(deployment),
            pool,
            seed,
            admin_token: "admin-token".to_string(),
            requester_token: "requester-token".to_string(),
            tasker_token: "tasker-token".to_string(),
        }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, body)
    }

    fn request(&self, method: Method, token: &str, uri: &str) -> axum::http::request::Builder {
        let builder = Request::builder().method(method).uri(uri);
        if token.is_empty() {
            builder
        } else {
            builder.header(header::AUTHORIZATION, format!("Bearer {}", token))
        }
    }

    pub async fn get(&self, token: &str, uri: &str) -> (StatusCode, Value) {
        self.send(self.request(Method::GET, token, uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn delete(&self, token: &str, uri: &str) -> (StatusCode, Value) {
        self.send(self.request(Method::DELETE, token, uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn post(&self, token: &str, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send_json(Method::POST, token, uri, body).await
    }

    pub async fn put(&self, token: &str, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send_json(Method::PUT, token, uri, body).await
    }

    async fn send_json(&self, method: Method, token: &str, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = self
            .request(method, token, uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    /// Multipart body with text fields and `(name, filename, bytes)` files.
    pub async fn post_multipart(
        &self,
        token: &str,
        uri: &str,
        fields: &[(&str, &str)],
        files: &[(&str, &str, &[u8])],
    ) -> (StatusCode, Value) {
        let boundary = "vc-test-boundary";
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        for (name, filename, bytes) in files {
            body.extend_from_slice(
                format!(
                    "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

        let request = self
            .request(Method::POST, token, uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }
}
