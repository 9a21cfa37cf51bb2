//! Intent resolution: an ordered chain of matchers, each either confident
//! or without an opinion. The oracle is simply the last link.

use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    actions::Action,
    brain::{self, ChatConfig, ChatMessage, ChatRequest, OracleClient, ProviderError},
};

/// Body of `POST /smart-task`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SmartTaskRequest {
    pub action: Option<String>,
    #[serde(default)]
    pub params: Map<String, Value>,
    #[serde(default)]
    pub message: String,
}

impl SmartTaskRequest {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentSource {
    Explicit,
    Pattern,
    Oracle,
}

#[derive(Debug, Clone)]
pub struct ParsedIntent {
    pub action: Action,
    pub params: Map<String, Value>,
    pub source: IntentSource,
}

#[derive(Debug)]
pub enum Unresolved {
    NoOpinion,
    /// The oracle answered in prose instead of a structured action.
    FreeText(String),
    OracleUnavailable(ProviderError),
}

#[async_trait]
pub trait IntentMatcher: Send + Sync {
    fn name(&self) -> &'static str;
    async fn match_intent(&self, request: &SmartTaskRequest) -> Result<ParsedIntent, Unresolved>;
}

/// Caller-supplied hints override anything extracted from the message.
fn with_hints(mut params: Map<String, Value>, hints: &Map<String, Value>) -> Map<String, Value> {
    for (key, value) in hints {
        params.insert(key.clone(), value.clone());
    }
    params
}

// ----- explicit --------------------------------------------------------------

pub struct ExplicitMatcher;

#[async_trait]
impl IntentMatcher for ExplicitMatcher {
    fn name(&self) -> &'static str {
        "explicit"
    }

    async fn match_intent(&self, request: &SmartTaskRequest) -> Result<ParsedIntent, Unresolved> {
        let Some(raw) = request.action.as_deref() else {
            return Err(Unresolved::NoOpinion);
        };
        match raw.parse::<Action>() {
            Ok(action) => Ok(ParsedIntent {
                action,
                params: request.params.clone(),
                source: IntentSource::Explicit,
            }),
            Err(e) => {
                tracing::debug!("Ignoring explicit action: {}", e);
                Err(Unresolved::NoOpinion)
            }
        }
    }
}

// ----- pattern rules ---------------------------------------------------------

struct PatternRule {
    action: Action,
    pattern: Regex,
}

fn rule(action: Action, pattern: &str) -> PatternRule {
    PatternRule {
        action,
        pattern: Regex::new(&format!("(?i)^{}$", pattern)).expect("invalid intent pattern"),
    }
}

const Q: &str = r#"["']?"#;

static RULES: Lazy<Vec<PatternRule>> = Lazy::new(|| {
    vec![
        rule(
            Action::UpdateTaskPriority,
            &format!(
                r"(?:set|change|update|make)\s+(?:the\s+)?priority\s+(?:of|for|on)\s+(?:task\s+)?{Q}(?P<task>.+?){Q}\s+to\s+(?P<priority>[\w -]+)"
            ),
        ),
        rule(
            Action::UpdateTaskStatus,
            &format!(
                r"(?:mark|set|move|change)\s+(?:the\s+)?(?:task\s+)?{Q}(?P<task>.+?){Q}\s+(?:as|to)\s+(?P<status>[\w -]+)"
            ),
        ),
        rule(
            Action::CreateTask,
            &format!(
                r"(?:please\s+)?(?:create|add|make|open)\s+(?:a\s+)?(?:new\s+)?task\s+(?:called\s+|named\s+|titled\s+|to\s+)?{Q}(?P<title>.+?){Q}(?:\s+(?:and\s+)?(?:assign(?:ed)?\s+(?:it\s+)?to|for)\s+(?P<assignee>[\w.' -]+?))?"
            ),
        ),
        rule(
            Action::DeleteTask,
            &format!(r"(?:delete|remove)\s+(?:the\s+)?task\s+{Q}(?P<task>.+?){Q}"),
        ),
        rule(
            Action::AddTaskMessage,
            &format!(
                r"(?:comment|add\s+(?:a\s+)?(?:comment|note|message))\s+(?:on|to)\s+(?:task\s+)?{Q}(?P<task>.+?){Q}\s*:\s*(?P<message>.+)"
            ),
        ),
        rule(
            Action::AddTaskAttachment,
            &format!(r"(?:attach|add\s+(?:a\s+)?link)\s+(?P<url>https?://\S+)\s+to\s+(?:task\s+)?{Q}(?P<task>.+?){Q}"),
        ),
        rule(
            Action::GetTaskUpdates,
            &format!(r"(?:any\s+)?(?:updates|comments|messages)\s+(?:on|for)\s+(?:task\s+)?{Q}(?P<task>.+?){Q}"),
        ),
        rule(
            Action::GetTaskStatus,
            &format!(
                r"(?:what(?:'s|\s+is)\s+the\s+)?status\s+(?:of|on|for)\s+(?:task\s+)?{Q}(?P<task>.+?){Q}"
            ),
        ),
        rule(
            Action::GetUserTasks,
            r"(?:what\s+are|show(?:\s+me)?|list|get)\s+(?P<user>[\w.' -]+?)'s\s+tasks",
        ),
        rule(
            Action::GetUserTasks,
            r"(?:show|list|get)(?:\s+me)?\s+(?:all\s+)?(?:the\s+)?tasks\s+(?:assigned\s+to|for)\s+(?P<user>[\w.' -]+)",
        ),
        rule(
            Action::GetUserTasks,
            r"what\s+is\s+(?P<user>[\w.' -]+?)\s+working\s+on",
        ),
        rule(
            Action::ListTasks,
            r"(?:show|list|get)(?:\s+me)?\s+(?:all\s+)?(?:the\s+)?tasks",
        ),
        rule(
            Action::GetUsers,
            r"(?:show|list|get|who\s+are)(?:\s+me)?\s+(?:all\s+)?(?:the\s+)?(?:users|team(?:\s+members)?|people)",
        ),
        rule(
            Action::GetProjects,
            r"(?:show|list|get)(?:\s+me)?\s+(?:all\s+)?(?:the\s+)?projects",
        ),
        rule(
            Action::GetProjectProgress,
            &format!(
                r"(?:(?:how\s+is|what(?:'s|\s+is))\s+the\s+)?progress\s+(?:of|on|for)\s+(?:project\s+)?{Q}(?P<project>.+?){Q}"
            ),
        ),
        rule(
            Action::GetProjectProgress,
            &format!(r"how\s+is\s+(?:project\s+)?{Q}(?P<project>.+?){Q}\s+(?:going|progressing)"),
        ),
        rule(
            Action::GetDashboard,
            r"(?:show(?:\s+me)?\s+)?(?:the\s+|my\s+)?(?:dashboard|overview|summary)",
        ),
        rule(
            Action::SearchContent,
            &format!(r"(?:search|find|look)\s+(?:for\s+)?{Q}(?P<query>.+?){Q}"),
        ),
    ]
});

pub struct PatternMatcher;

impl PatternMatcher {
    /// First matching rule wins; named groups become parameters.
    pub fn parse(message: &str) -> Option<(Action, Map<String, Value>)> {
        let message = message.trim().trim_end_matches(['.', '?', '!']).trim();
        if message.is_empty() {
            return None;
        }

        RULES.iter().find_map(|rule| {
            let captures = rule.pattern.captures(message)?;
            let mut params = Map::new();
            for name in rule.pattern.capture_names().flatten() {
                if let Some(m) = captures.name(name) {
                    let value = m.as_str().trim();
                    if !value.is_empty() {
                        params.insert(name.to_string(), Value::String(value.to_string()));
                    }
                }
            }
            Some((rule.action, params))
        })
    }
}

#[async_trait]
impl IntentMatcher for PatternMatcher {
    fn name(&self) -> &'static str {
        "pattern"
    }

    async fn match_intent(&self, request: &SmartTaskRequest) -> Result<ParsedIntent, Unresolved> {
        let (action, params) = Self::parse(&request.message).ok_or(Unresolved::NoOpinion)?;
        Ok(ParsedIntent {
            action,
            params: with_hints(params, &request.params),
            source: IntentSource::Pattern,
        })
    }
}

// ----- oracle ----------------------------------------------------------------

pub struct OracleMatcher {
    client: Arc<dyn OracleClient>,
    config: ChatConfig,
}

impl OracleMatcher {
    pub fn new(client: Arc<dyn OracleClient>, config: ChatConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl IntentMatcher for OracleMatcher {
    fn name(&self) -> &'static str {
        "oracle"
    }

    async fn match_intent(&self, request: &SmartTaskRequest) -> Result<ParsedIntent, Unresolved> {
        if request.message.trim().is_empty() || !self.client.is_configured() {
            return Err(Unresolved::NoOpinion);
        }

        let mut prompt = request.message.trim().to_string();
        if !request.params.is_empty() {
            prompt.push_str(&format!("\n\nKnown parameters: {}", Value::Object(request.params.clone())));
        }
        let chat = ChatRequest {
            messages: vec![ChatMessage::system(brain::system_prompt()), ChatMessage::user(prompt)],
            config: self.config.clone(),
        };

        let reply = self.client.chat(chat).await.map_err(|e| {
            tracing::error!(provider = %self.client.provider_type(), "Oracle call failed: {}", e);
            Unresolved::OracleUnavailable(e)
        })?;

        match brain::parse_reply(&reply) {
            Some(parsed) => Ok(ParsedIntent {
                action: parsed.action,
                params: with_hints(parsed.params, &request.params),
                source: IntentSource::Oracle,
            }),
            None => {
                tracing::warn!("Oracle reply was not a structured action");
                Err(Unresolved::FreeText(reply))
            }
        }
    }
}

// ----- chain -----------------------------------------------------------------

pub struct IntentResolver {
    matchers: Vec<Box<dyn IntentMatcher>>,
}

impl IntentResolver {
    /// Explicit action, then pattern rules, then the oracle when one is given.
    pub fn new(oracle: Option<Arc<dyn OracleClient>>, config: ChatConfig) -> Self {
        let mut matchers: Vec<Box<dyn IntentMatcher>> = vec![Box::new(ExplicitMatcher), Box::new(PatternMatcher)];
        if let Some(client) = oracle {
            matchers.push(Box::new(OracleMatcher::new(client, config)));
        }
        Self { matchers }
    }

    pub fn with_matchers(matchers: Vec<Box<dyn IntentMatcher>>) -> Self {
        Self { matchers }
    }

    /// The first confident matcher wins. Otherwise the most informative
    /// failure from later matchers is returned.
    pub async fn resolve(&self, request: &SmartTaskRequest) -> Result<ParsedIntent, Unresolved> {
        let mut outcome = Unresolved::NoOpinion;
        for matcher in &self.matchers {
            match matcher.match_intent(request).await {
                Ok(intent) => {
                    tracing::debug!(matcher = matcher.name(), action = %intent.action, "Intent resolved");
                    return Ok(intent);
                }
                Err(Unresolved::NoOpinion) => {}
                Err(other) => outcome = other,
            }
        }
        Err(outcome)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::testing::ScriptedOracle;

    fn parse(message: &str) -> (Action, Map<String, Value>) {
        PatternMatcher::parse(message).unwrap_or_else(|| panic!("no rule for {:?}", message))
    }

    #[test]
    fn pattern_rules_extract_parameters() {
        let (action, params) = parse("Create a task to update GHL report for John");
        assert_eq!(action, Action::CreateTask);
        assert_eq!(params["title"], "update GHL report");
        assert_eq!(params["assignee"], "John");

        let (action, params) = parse("create task \"Draft homepage copy\"");
        assert_eq!(action, Action::CreateTask);
        assert_eq!(params["title"], "Draft homepage copy");
        assert!(!params.contains_key("assignee"));

        let (action, params) = parse("What are Tom's tasks?");
        assert_eq!(action, Action::GetUserTasks);
        assert_eq!(params["user"], "Tom");

        let (action, params) = parse("Change the priority of Check cursor install to urgent");
        assert_eq!(action, Action::UpdateTaskPriority);
        assert_eq!(params["task"], "Check cursor install");
        assert_eq!(params["priority"], "urgent");

        let (action, params) = parse("mark 'Update GHL report' as completed");
        assert_eq!(action, Action::UpdateTaskStatus);
        assert_eq!(params["task"], "Update GHL report");
        assert_eq!(params["status"], "completed");

        let (action, params) = parse("comment on Update GHL report: numbers are in");
        assert_eq!(action, Action::AddTaskMessage);
        assert_eq!(params["message"], "numbers are in");

        let (action, params) = parse("attach https://docs.example.com/brief to Update GHL report");
        assert_eq!(action, Action::AddTaskAttachment);
        assert_eq!(params["url"], "https://docs.example.com/brief");

        assert_eq!(parse("what is the status of the GHL report").0, Action::GetTaskStatus);
        assert_eq!(parse("show me all tasks").0, Action::ListTasks);
        assert_eq!(parse("who are the team members").0, Action::GetUsers);
        assert_eq!(parse("list projects").0, Action::GetProjects);
        assert_eq!(parse("how is Client Rebrand going?").1["project"], "Client Rebrand");
        assert_eq!(parse("dashboard").0, Action::GetDashboard);
        assert_eq!(parse("search for invoices").1["query"], "invoices");
        assert!(PatternMatcher::parse("hmm, what should we do about the offsite").is_none());
    }

    #[tokio::test]
    async fn explicit_action_short_circuits_the_chain() {
        let oracle = Arc::new(ScriptedOracle::new(vec![]));
        let resolver = IntentResolver::new(Some(oracle.clone()), ChatConfig::default());
        let mut request = SmartTaskRequest::message("blah");
        request.action = Some("get_dashboard".to_string());

        let intent = resolver.resolve(&request).await.unwrap();
        assert_eq!(intent.action, Action::GetDashboard);
        assert_eq!(intent.source, IntentSource::Explicit);
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn hints_override_extracted_parameters() {
        let resolver = IntentResolver::new(None, ChatConfig::default());
        let mut request = SmartTaskRequest::message("create task Weekly report for John");
        request
            .params
            .insert("assignee".to_string(), Value::String("Tom".to_string()));

        let intent = resolver.resolve(&request).await.unwrap();
        assert_eq!(intent.source, IntentSource::Pattern);
        assert_eq!(intent.params["title"], "Weekly report");
        assert_eq!(intent.params["assignee"], "Tom");
    }

    #[tokio::test]
    async fn oracle_is_the_last_resort() {
        let oracle = Arc::new(ScriptedOracle::new(vec![Ok(
            r#"{"action": "get_user_tasks", "params": {"user": "Rita"}}"#.to_string(),
        )]));
        let resolver = IntentResolver::new(Some(oracle.clone()), ChatConfig::default());

        let intent = resolver
            .resolve(&SmartTaskRequest::message("anything on Rita's plate this week"))
            .await
            .unwrap();
        assert_eq!(intent.action, Action::GetUserTasks);
        assert_eq!(intent.source, IntentSource::Oracle);
        assert_eq!(intent.params["user"], "Rita");
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn free_text_and_failures_surface_as_unresolved() {
        let oracle = Arc::new(ScriptedOracle::new(vec![
            Ok("I can help with tasks and projects.".to_string()),
            Err(ProviderError::RateLimited),
        ]));
        let resolver = IntentResolver::new(Some(oracle), ChatConfig::default());
        let request = SmartTaskRequest::message("tell me a joke");

        match resolver.resolve(&request).await {
            Err(Unresolved::FreeText(text)) => assert!(text.contains("tasks and projects")),
            other => panic!("expected free text, got {:?}", other),
        }
        assert!(matches!(
            resolver.resolve(&request).await,
            Err(Unresolved::OracleUnavailable(ProviderError::RateLimited))
        ));
    }

    #[tokio::test]
    async fn nothing_configured_has_no_opinion() {
        let resolver = IntentResolver::new(None, ChatConfig::default());
        assert!(matches!(
            resolver.resolve(&SmartTaskRequest::message("tell me a joke")).await,
            Err(Unresolved::NoOpinion)
        ));
    }
}
