//! Entry point for `POST /smart-task`.

use std::{sync::Arc, time::Duration};

use serde::Serialize;
use serde_json::{Value, json};
use services::services::{config::Config, principal::Principal};

use crate::{
    SmartTaskError,
    actions::Action,
    api::TaskApi,
    brain::{ChatConfig, OpenAIProvider, OracleClient},
    executor::ActionExecutor,
    intent::{IntentResolver, SmartTaskRequest, Unresolved},
    messages::{FailureKind, friendly_failure, with_available_actions},
};

#[derive(Debug, Clone, Serialize)]
pub struct SmartTaskResponse {
    pub success: bool,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl SmartTaskResponse {
    fn failure(kind: FailureKind, detail: &str) -> Self {
        Self {
            success: false,
            content: friendly_failure(kind, detail),
            data: Some(json!({ "error": kind })),
        }
    }

    /// Friendly body for a request that failed as a whole.
    pub fn from_error(error: &SmartTaskError) -> Self {
        Self::failure(error.failure_kind(), &error.user_detail())
    }
}

pub struct SmartTaskAgent {
    resolver: IntentResolver,
    executor: ActionExecutor,
    timeout: Duration,
}

impl SmartTaskAgent {
    pub fn new(
        api: Arc<dyn TaskApi>,
        oracle: Option<Arc<dyn OracleClient>>,
        chat_config: ChatConfig,
        timeout: Duration,
    ) -> Self {
        Self {
            resolver: IntentResolver::new(oracle, chat_config),
            executor: ActionExecutor::new(api),
            timeout,
        }
    }

    pub fn from_config(api: Arc<dyn TaskApi>, config: &Config) -> Self {
        let oracle: Option<Arc<dyn OracleClient>> = if config.oracle.is_configured() {
            Some(Arc::new(OpenAIProvider::from_config(&config.oracle)))
        } else {
            tracing::info!("No oracle API key configured; assistant uses pattern rules only");
            None
        };
        let chat_config = ChatConfig {
            model: config.oracle.model.clone(),
            temperature: config.oracle.temperature,
            max_tokens: config.oracle.max_tokens,
        };
        Self::new(
            api,
            oracle,
            chat_config,
            Duration::from_secs(config.assistant_timeout_secs),
        )
    }

    /// Always produces a response, except when the whole request exceeds
    /// the configured time budget.
    pub async fn handle(
        &self,
        principal: &Principal,
        request: SmartTaskRequest,
    ) -> Result<SmartTaskResponse, SmartTaskError> {
        match tokio::time::timeout(self.timeout, self.process(principal, &request)).await {
            Ok(response) => Ok(response),
            Err(_) => {
                tracing::error!(
                    user_id = %principal.user_id,
                    timeout_secs = self.timeout.as_secs(),
                    "[SMART_TASK] Request timed out"
                );
                Err(SmartTaskError::Timeout(self.timeout.as_secs()))
            }
        }
    }

    async fn process(&self, principal: &Principal, request: &SmartTaskRequest) -> SmartTaskResponse {
        if request.action.is_none() && request.message.trim().is_empty() {
            return SmartTaskResponse::failure(
                FailureKind::MissingInput,
                "The request had no message or action.",
            );
        }

        let intent = match self.resolver.resolve(request).await {
            Ok(intent) => intent,
            Err(Unresolved::FreeText(text)) => {
                return SmartTaskResponse {
                    success: false,
                    content: with_available_actions(&text),
                    data: Some(json!({
                        "unresolved": true,
                        "available_actions": Action::ALL,
                    })),
                };
            }
            Err(Unresolved::OracleUnavailable(e)) => {
                tracing::error!("[SMART_TASK] Oracle unavailable: {}", e);
                return SmartTaskResponse::failure(
                    FailureKind::Unavailable,
                    "I couldn't work out the request and the language service is unavailable.",
                );
            }
            Err(Unresolved::NoOpinion) => {
                return SmartTaskResponse::failure(
                    FailureKind::Unrecognized,
                    "No action matched your message.",
                );
            }
        };

        tracing::info!(
            action = %intent.action,
            source = ?intent.source,
            user_id = %principal.user_id,
            "[SMART_TASK] Executing action"
        );

        match self.executor.execute(principal, &intent).await {
            Ok(outcome) => {
                let mut data = outcome.data.unwrap_or_else(|| json!({}));
                if let Value::Object(map) = &mut data {
                    map.insert("action".to_string(), json!(intent.action));
                }
                SmartTaskResponse {
                    success: outcome.success,
                    content: outcome.content,
                    data: Some(data),
                }
            }
            Err(e) => {
                match e.failure_kind() {
                    FailureKind::Unavailable => {
                        tracing::error!(action = %intent.action, "[SMART_TASK] Action failed: {:?}", e)
                    }
                    _ => tracing::warn!(action = %intent.action, "[SMART_TASK] Action refused: {}", e),
                }
                SmartTaskResponse::failure(e.failure_kind(), &e.user_detail())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use db::{
        models::task::{Task, TaskFilter},
        test_utils::{TestSeed, seed_tenant, setup_test_pool},
    };
    use serde_json::Map;
    use services::services::{lifecycle::TaskLifecycleManager, notifications::EventBus};
    use sqlx::SqlitePool;

    use super::*;
    use crate::{api::LocalTaskApi, brain::ProviderError, testing::ScriptedOracle};

    fn principal(seed: &TestSeed, user: &db::models::user::UserSummary) -> Principal {
        Principal::new(user.id, seed.tenant_id, user.roles.clone())
    }

    fn agent(pool: &SqlitePool, oracle: Option<Arc<dyn OracleClient>>, timeout: Duration) -> SmartTaskAgent {
        let lifecycle = TaskLifecycleManager::new(pool.clone(), EventBus::default());
        SmartTaskAgent::new(
            Arc::new(LocalTaskApi::new(lifecycle)),
            oracle,
            ChatConfig::default(),
            timeout,
        )
    }

    async fn ask(agent: &SmartTaskAgent, principal: &Principal, message: &str) -> SmartTaskResponse {
        agent
            .handle(principal, SmartTaskRequest::message(message))
            .await
            .expect("request should not time out")
    }

    #[tokio::test]
    async fn create_task_twice_reassigns_instead_of_duplicating() {
        let pool = setup_test_pool().await;
        let seed = seed_tenant(&pool).await;
        let admin = principal(&seed, &seed.admin);
        let agent = agent(&pool, None, Duration::from_secs(60));

        let first = ask(&agent, &admin, "Create a task called Update GHL report for Tom").await;
        assert!(first.success, "{}", first.content);
        assert!(first.content.contains("**Task created:**"));

        let second = ask(&agent, &admin, "create task Update GHL report for Rita").await;
        assert!(second.success, "{}", second.content);
        assert_eq!(second.data.as_ref().unwrap()["reassigned"], true);

        let tasks = Task::find_visible(
            &pool,
            seed.tenant_id,
            db::models::task::TaskVisibility::All,
            &TaskFilter {
                search: Some("Update GHL report".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(
            Task::user_ids(&pool, tasks[0].id).await.unwrap(),
            vec![seed.requester.id]
        );
    }

    #[tokio::test]
    async fn near_equal_titles_return_disambiguation() {
        let pool = setup_test_pool().await;
        let seed = seed_tenant(&pool).await;
        Task::insert(&pool, &seed.new_task("Check cursor install")).await.unwrap();
        Task::insert(&pool, &seed.new_task("Review cursor license")).await.unwrap();
        let agent = agent(&pool, None, Duration::from_secs(60));

        let response = ask(&agent, &principal(&seed, &seed.admin), "status of cursor").await;
        assert!(response.success);
        let data = response.data.unwrap();
        assert_eq!(data["disambiguation"], true);
        assert_eq!(data["action"], "get_task_status");
        let mut titles: Vec<&str> = data["candidates"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["title"].as_str().unwrap())
            .collect();
        titles.sort();
        assert_eq!(titles, vec!["Check cursor install", "Review cursor license"]);
        assert!(response.content.contains("Which one did you mean?"));
    }

    #[tokio::test]
    async fn status_update_and_user_tasks_by_name() {
        let pool = setup_test_pool().await;
        let seed = seed_tenant(&pool).await;
        let admin = principal(&seed, &seed.admin);
        let agent = agent(&pool, None, Duration::from_secs(60));

        ask(&agent, &admin, "create task Draft homepage copy for Tom").await;
        let moved = ask(&agent, &admin, "mark Draft homepage copy as done").await;
        assert!(moved.success, "{}", moved.content);
        assert!(moved.content.contains("**Completed**"));

        let listed = ask(&agent, &admin, "What are Tom's tasks?").await;
        assert!(listed.success);
        assert!(listed.content.contains("Tom Tasker's tasks"));
        assert!(listed.content.contains("Draft homepage copy"));
    }

    #[tokio::test]
    async fn explicit_action_with_params() {
        let pool = setup_test_pool().await;
        let seed = seed_tenant(&pool).await;
        let mut done = seed.new_task("Ship new logo");
        done.project_id = seed.client_project.id;
        done.status_id = seed.completed.id;
        Task::insert(&pool, &done).await.unwrap();
        let mut open = seed.new_task("Refresh brand guide");
        open.project_id = seed.client_project.id;
        Task::insert(&pool, &open).await.unwrap();
        Task::insert(&pool, &seed.new_task("Unrelated ops chore")).await.unwrap();

        let agent = agent(&pool, None, Duration::from_secs(60));
        let mut params = Map::new();
        params.insert("project".to_string(), json!("rebrand"));

        let response = agent
            .handle(
                &principal(&seed, &seed.admin),
                SmartTaskRequest {
                    action: Some("get_project_progress".to_string()),
                    params,
                    message: String::new(),
                },
            )
            .await
            .unwrap();
        assert!(response.success, "{}", response.content);
        assert!(response.content.starts_with("**Client Rebrand** is **50%** complete."));
        let data = response.data.unwrap();
        assert_eq!(data["project_id"], json!(seed.client_project.id));
        assert_eq!(data["total"], 2);
        assert_eq!(data["completed"], 1);
    }

    #[tokio::test]
    async fn close_title_match_reassigns_existing_task() {
        let pool = setup_test_pool().await;
        let seed = seed_tenant(&pool).await;
        let existing = Task::insert(&pool, &seed.new_task("Update GHL report for March"))
            .await
            .unwrap();
        Task::insert(&pool, &seed.new_task("Order office chairs")).await.unwrap();
        let agent = agent(&pool, None, Duration::from_secs(60));

        let mut params = Map::new();
        params.insert("title".to_string(), json!("Update GHL report"));
        params.insert("assignee".to_string(), json!("Rita"));
        let response = agent
            .handle(
                &principal(&seed, &seed.admin),
                SmartTaskRequest {
                    action: Some("create_task".to_string()),
                    params,
                    message: String::new(),
                },
            )
            .await
            .unwrap();

        assert!(response.success, "{}", response.content);
        let data = response.data.unwrap();
        assert_eq!(data["reassigned"], true);
        assert_eq!(data["created"], false);
        assert_eq!(data["task"]["id"], json!(existing.id));

        let all = Task::find_visible(
            &pool,
            seed.tenant_id,
            db::models::task::TaskVisibility::All,
            &TaskFilter::default(),
        )
        .await
        .unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(Task::user_ids(&pool, existing.id).await.unwrap(), vec![seed.requester.id]);
    }

    #[tokio::test]
    async fn failures_are_friendly() {
        let pool = setup_test_pool().await;
        let seed = seed_tenant(&pool).await;
        let agent = agent(&pool, None, Duration::from_secs(60));

        let missing = ask(&agent, &principal(&seed, &seed.admin), "what are Zelda's tasks").await;
        assert!(!missing.success);
        assert!(missing.content.contains("No team member matches \"Zelda\""));
        assert!(missing.content.contains("**You could try:**"));

        let denied = ask(&agent, &principal(&seed, &seed.tasker), "create task Secret plan").await;
        assert!(!denied.success);
        assert!(denied.content.contains("Your role does not allow creating tasks"));

        let unknown = ask(&agent, &principal(&seed, &seed.admin), "tell me a joke").await;
        assert!(!unknown.success);
        assert!(unknown.content.contains("**get_dashboard**"));
    }

    #[tokio::test]
    async fn oracle_free_text_is_passed_through_with_actions() {
        let pool = setup_test_pool().await;
        let seed = seed_tenant(&pool).await;
        let oracle: Arc<dyn OracleClient> = Arc::new(ScriptedOracle::new(vec![
            Ok("I'm not sure, could you rephrase?".to_string()),
            Err(ProviderError::RequestFailed("connection reset".to_string())),
        ]));
        let agent = agent(&pool, Some(oracle), Duration::from_secs(60));
        let admin = principal(&seed, &seed.admin);

        let response = ask(&agent, &admin, "hmm what about the offsite").await;
        assert!(!response.success);
        assert!(response.content.starts_with("I'm not sure, could you rephrase?"));
        assert!(response.content.contains("**create_task**"));
        assert_eq!(response.data.unwrap()["unresolved"], true);

        let response = ask(&agent, &admin, "hmm what about the offsite").await;
        assert!(!response.success);
        assert!(!response.content.contains("connection reset"));
    }

    #[tokio::test]
    async fn slow_oracle_times_out() {
        let pool = setup_test_pool().await;
        let seed = seed_tenant(&pool).await;
        let oracle: Arc<dyn OracleClient> = Arc::new(ScriptedOracle::slow(Duration::from_secs(5)));
        let agent = agent(&pool, Some(oracle), Duration::from_millis(50));

        let err = agent
            .handle(
                &principal(&seed, &seed.admin),
                SmartTaskRequest::message("something only the oracle understands"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SmartTaskError::Timeout(_)));
    }
}
