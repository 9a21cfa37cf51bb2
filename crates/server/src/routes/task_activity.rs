//! Collaborative task routes: messages, deliverables, checklist and
//! question answers. Writes are refused with 403 once a strict deadline has
//! passed.

use axum::{
    Extension, Json, Router,
    extract::{Multipart, Path, State},
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::{
    answer::{ChecklistAnswer, QuestionAnswer},
    message::TaskMessage,
};
use deployment::Deployment;
use serde::Deserialize;
use services::services::{
    lifecycle::{
        ChecklistAnswerInput, ChecklistStatus, DeliverableInput, DeliverableUpload, DeliverableView,
        QuestionAnswerInput, QuestionWithAnswers,
    },
    principal::Principal,
};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError};

/// Maximum size accepted for a single uploaded file (25 MiB).
const UPLOAD_FILE_SIZE_LIMIT: usize = 25 * 1024 * 1024;

#[derive(Debug, Deserialize)]
pub struct MessageBody {
    #[serde(default)]
    pub message: String,
}

pub async fn get_messages(
    State(deployment): State<DeploymentImpl>,
    Extension(principal): Extension<Principal>,
    Path(task_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<TaskMessage>>>, ApiError> {
    let messages = deployment.lifecycle().messages(&principal, task_id).await?;
    Ok(ResponseJson(ApiResponse::success(messages)))
}

pub async fn add_message(
    State(deployment): State<DeploymentImpl>,
    Extension(principal): Extension<Principal>,
    Path(task_id): Path<Uuid>,
    Json(payload): Json<MessageBody>,
) -> Result<ResponseJson<ApiResponse<TaskMessage>>, ApiError> {
    let message = deployment
        .lifecycle()
        .add_message(&principal, task_id, &payload.message)
        .await?;
    Ok(ResponseJson(ApiResponse::success_with_message(
        message,
        "Message sent",
    )))
}

/// Collect the multipart form into a [`DeliverableInput`]. Any part carrying
/// a filename is treated as an uploaded file.
async fn read_deliverable_form(mut multipart: Multipart) -> Result<DeliverableInput, ApiError> {
    let mut input = DeliverableInput::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();

        if let Some(file_name) = field.file_name().map(str::to_string) {
            let mime_type = field.content_type().map(str::to_string);
            let bytes = field.bytes().await?;
            if bytes.len() > UPLOAD_FILE_SIZE_LIMIT {
                return Err(ApiError::BadRequest(format!(
                    "File '{}' exceeds the 25 MiB upload limit",
                    file_name
                )));
            }
            input.files.push(DeliverableUpload {
                original_name: file_name,
                mime_type,
                bytes: bytes.to_vec(),
            });
            continue;
        }

        let value = field.text().await?;
        let value = Some(value).filter(|v| !v.trim().is_empty());
        match name.as_str() {
            "title" => input.title = value,
            "description" => input.description = value,
            "type" => input.deliverable_type = value,
            "google_link" => input.google_link = value,
            "external_link" => input.external_link = value,
            other => tracing::debug!(field = other, "Ignoring unknown deliverable form field"),
        }
    }

    Ok(input)
}

pub async fn add_deliverable(
    State(deployment): State<DeploymentImpl>,
    Extension(principal): Extension<Principal>,
    Path(task_id): Path<Uuid>,
    multipart: Multipart,
) -> Result<ResponseJson<ApiResponse<DeliverableView>>, ApiError> {
    let input = read_deliverable_form(multipart).await?;
    let deliverable = deployment
        .lifecycle()
        .add_deliverable(&principal, task_id, input)
        .await?;
    Ok(ResponseJson(ApiResponse::success_with_message(
        deliverable,
        "Deliverable added",
    )))
}

pub async fn get_deliverables(
    State(deployment): State<DeploymentImpl>,
    Extension(principal): Extension<Principal>,
    Path(task_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<DeliverableView>>>, ApiError> {
    let deliverables = deployment.lifecycle().deliverables(&principal, task_id).await?;
    Ok(ResponseJson(ApiResponse::success(deliverables)))
}

pub async fn complete_deliverable(
    State(deployment): State<DeploymentImpl>,
    Extension(principal): Extension<Principal>,
    Path((task_id, deliverable_id)): Path<(Uuid, Uuid)>,
) -> Result<ResponseJson<ApiResponse<DeliverableView>>, ApiError> {
    let deliverable = deployment
        .lifecycle()
        .complete_deliverable(&principal, task_id, deliverable_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(deliverable)))
}

pub async fn submit_checklist_answer(
    State(deployment): State<DeploymentImpl>,
    Extension(principal): Extension<Principal>,
    Path(task_id): Path<Uuid>,
    Json(payload): Json<ChecklistAnswerInput>,
) -> Result<ResponseJson<ApiResponse<ChecklistAnswer>>, ApiError> {
    let answer = deployment
        .lifecycle()
        .submit_checklist_answer(&principal, task_id, payload)
        .await?;
    Ok(ResponseJson(ApiResponse::success(answer)))
}

pub async fn get_checklist_status(
    State(deployment): State<DeploymentImpl>,
    Extension(principal): Extension<Principal>,
    Path(task_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<ChecklistStatus>>, ApiError> {
    let status = deployment.lifecycle().checklist_status(&principal, task_id).await?;
    Ok(ResponseJson(ApiResponse::success(status)))
}

pub async fn submit_question_answer(
    State(deployment): State<DeploymentImpl>,
    Extension(principal): Extension<Principal>,
    Path(task_id): Path<Uuid>,
    Json(payload): Json<QuestionAnswerInput>,
) -> Result<ResponseJson<ApiResponse<QuestionAnswer>>, ApiError> {
    let answer = deployment
        .lifecycle()
        .submit_question_answer(&principal, task_id, payload)
        .await?;
    Ok(ResponseJson(ApiResponse::success(answer)))
}

pub async fn get_question_answers(
    State(deployment): State<DeploymentImpl>,
    Extension(principal): Extension<Principal>,
    Path(task_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<QuestionWithAnswers>>>, ApiError> {
    let answers = deployment.lifecycle().question_answers(&principal, task_id).await?;
    Ok(ResponseJson(ApiResponse::success(answers)))
}

pub fn router() -> Router<DeploymentImpl> {
    let task_id_router = Router::new()
        .route("/messages", get(get_messages).post(add_message))
        .route("/deliverables", get(get_deliverables).post(add_deliverable))
        .route(
            "/deliverables/{deliverable_id}/complete",
            post(complete_deliverable),
        )
        .route("/checklist-answer", post(submit_checklist_answer))
        .route("/checklist-status", get(get_checklist_status))
        .route("/question-answer", post(submit_question_answer))
        .route("/question-answers", get(get_question_answers));

    Router::new().nest("/tasks/{task_id}", task_id_router)
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use chrono::{Duration, Utc};
    use db::models::task::{ChecklistSnapshot, QuestionSnapshot, Task};
    use serde_json::json;
    use uuid::Uuid;

    use crate::test_support::TestApp;

    async fn assigned_task(app: &TestApp, title: &str) -> Task {
        let mut data = app.seed.new_task(title);
        data.project_id = app.seed.client_project.id;
        let task = Task::insert(&app.pool, &data).await.unwrap();
        let mut tx = app.pool.begin().await.unwrap();
        Task::sync_users(&mut *tx, task.id, &[app.seed.tasker.id]).await.unwrap();
        tx.commit().await.unwrap();
        task
    }

    #[tokio::test]
    async fn messages_round_trip_and_require_text() {
        let app = TestApp::new().await;
        let task = assigned_task(&app, "Write copy").await;
        let uri = format!("/api/tasks/{}/messages", task.id);

        let (status, body) = app.post(&app.tasker_token, &uri, json!({ "message": "  " })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["errors"]["message"].is_array());

        let (status, _) = app
            .post(&app.tasker_token, &uri, json!({ "message": "First draft is up" }))
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = app.get(&app.admin_token, &uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["message"], "First draft is up");
        assert_eq!(body["data"][0]["sender_id"], json!(app.seed.tasker.id));
    }

    #[tokio::test]
    async fn writes_after_strict_deadline_are_forbidden() {
        let app = TestApp::new().await;
        let mut data = app.seed.new_task("Too late");
        data.close_deadline = true;
        data.end_date = Some(Utc::now() - Duration::minutes(5));
        let task = Task::insert(&app.pool, &data).await.unwrap();

        let (status, body) = app
            .post(
                &app.admin_token,
                &format!("/api/tasks/{}/messages", task.id),
                json!({ "message": "Any update?" }),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body["message"].as_str().unwrap().contains("strict deadline"));

        let (status, _) = app
            .post_multipart(
                &app.admin_token,
                &format!("/api/tasks/{}/deliverables", task.id),
                &[("title", "Final")],
                &[],
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn deliverable_upload_projects_into_portfolio() {
        let app = TestApp::new().await;
        let task = assigned_task(&app, "Brand refresh").await;
        let uri = format!("/api/tasks/{}/deliverables", task.id);

        let (status, body) = app
            .post_multipart(
                &app.tasker_token,
                &uri,
                &[("title", "Logo pack"), ("type", "design")],
                &[("files[]", "logo.svg", b"<svg/>")],
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["data"]["deliverable_type"], "design");
        assert_eq!(body["data"]["files"][0]["original_name"], "logo.svg");
        assert!(body["data"]["portfolio_id"].is_string());

        let deliverable_id = body["data"]["id"].as_str().unwrap().to_string();
        let (status, body) = app
            .post(
                &app.tasker_token,
                &format!("{}/{}/complete", uri, deliverable_id),
                json!({}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"]["completed_at"].is_string());

        let (status, body) = app
            .post_multipart(&app.tasker_token, &uri, &[("type", "design")], &[])
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["errors"]["title"].is_array());
    }

    #[tokio::test]
    async fn checklist_and_question_answers_upsert() {
        let app = TestApp::new().await;
        let checklist_id = Uuid::new_v4();
        let question_id = Uuid::new_v4();
        let mut data = app.seed.new_task("Onboarding");
        data.template_checklist = Some(vec![ChecklistSnapshot {
            id: checklist_id,
            title: Some("Setup".to_string()),
            items: vec!["Create account".to_string(), "Invite team".to_string()],
        }]);
        data.template_questions = Some(vec![QuestionSnapshot {
            id: question_id,
            question_text: "Preferred channel?".to_string(),
            question_type: "text".to_string(),
            options: Vec::new(),
        }]);
        let task = Task::insert(&app.pool, &data).await.unwrap();
        let base = format!("/api/tasks/{}", task.id);

        for completed in [false, true] {
            let (status, _) = app
                .post(
                    &app.admin_token,
                    &format!("{}/checklist-answer", base),
                    json!({ "checklist_id": checklist_id, "item_index": 1, "completed": completed }),
                )
                .await;
            assert_eq!(status, StatusCode::OK);
        }
        let (status, body) = app
            .post(
                &app.admin_token,
                &format!("{}/checklist-answer", base),
                json!({ "checklist_id": checklist_id, "item_index": 7 }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["errors"]["item_index"].is_array());

        let (_, body) = app.get(&app.admin_token, &format!("{}/checklist-status", base)).await;
        assert_eq!(body["data"]["completed_items"], 1);
        assert_eq!(body["data"]["total_items"], 2);

        for answer in ["Email", "Slack"] {
            let (status, _) = app
                .post(
                    &app.admin_token,
                    &format!("{}/question-answer", base),
                    json!({ "question_id": question_id, "answer": answer }),
                )
                .await;
            assert_eq!(status, StatusCode::OK);
        }
        let (_, body) = app.get(&app.admin_token, &format!("{}/question-answers", base)).await;
        let answers = body["data"][0]["answers"].as_array().unwrap();
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0]["answer"], "Slack");
    }
}
