//! Oracle glue: the system prompt describing the action vocabulary and
//! parsing of the structured reply.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::actions::{Action, available_actions};

pub mod providers;
pub use providers::{
    ChatConfig, ChatMessage, ChatRequest, OpenAIProvider, OracleClient, ProviderError, ProviderType,
};

/// What the oracle is asked to answer with.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OracleReply {
    /// One of the action names listed in the prompt.
    pub action: Action,
    /// Free-form parameters; names mirror the usage hints.
    #[serde(default)]
    pub params: Map<String, Value>,
}

pub fn system_prompt() -> String {
    let schema = serde_json::to_string_pretty(&schemars::schema_for!(OracleReply)).unwrap_or_default();
    format!(
        "You translate requests from a task management workspace into exactly one action.\n\
         Available actions:\n{}\n\n\
         Reply with a single JSON object matching this schema and nothing else:\n{}\n\
         Refer to tasks, people, projects, statuses and priorities by the names the user used; \
         never invent ids. Dates use YYYY-MM-DD.",
        available_actions(),
        schema
    )
}

/// Extract the first JSON object from a reply, tolerating code fences and
/// surrounding prose. `None` means the oracle answered in free text.
pub fn parse_reply(text: &str) -> Option<OracleReply> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_names_every_action() {
        let prompt = system_prompt();
        for action in Action::ALL {
            assert!(prompt.contains(action.as_str()), "missing {}", action);
        }
        assert!(prompt.contains("\"params\""));
    }

    #[test]
    fn parses_fenced_json() {
        let reply = "Sure!\n```json\n{\"action\": \"get_user_tasks\", \"params\": {\"user\": \"John\"}}\n```";
        let parsed = parse_reply(reply).unwrap();
        assert_eq!(parsed.action, Action::GetUserTasks);
        assert_eq!(parsed.params["user"], "John");
    }

    #[test]
    fn free_text_and_unknown_actions_are_unparsed() {
        assert!(parse_reply("I am not sure what you mean.").is_none());
        assert!(parse_reply("{\"action\": \"launch_rocket\"}").is_none());
        assert!(parse_reply("} nope {").is_none());
    }
}
