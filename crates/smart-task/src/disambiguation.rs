//! Structured "which one did you mean?" responses.
//!
//! Stateless: the caller collects the follow-up selection and retries with
//! an explicit `task_id`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use services::services::lifecycle::TaskView;
use uuid::Uuid;

use crate::{executor::ActionOutcome, resolver::Scored};

#[derive(Debug, Clone, Serialize)]
pub struct TaskCandidate {
    pub id: Uuid,
    pub title: String,
    pub match_percent: u32,
    pub assignees: Vec<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
}

impl TaskCandidate {
    pub fn from_scored(scored: &Scored<'_, TaskView, f64>) -> Self {
        let view = scored.candidate;
        Self {
            id: view.task.id,
            title: view.task.title.clone(),
            match_percent: (scored.score * 100.0).round() as u32,
            assignees: view.users.iter().map(|u| u.full_name()).collect(),
            status: view.status.as_ref().map(|s| s.title.clone()),
            priority: view.priority.as_ref().map(|p| p.title.clone()),
            due_date: view.task.end_date,
        }
    }
}

/// Build the disambiguation reply for a free-text task reference.
pub fn disambiguate(query: &str, candidates: &[Scored<'_, TaskView, f64>]) -> ActionOutcome {
    let candidates: Vec<TaskCandidate> = candidates.iter().map(TaskCandidate::from_scored).collect();

    let mut content = format!(
        "I found **{} tasks** matching \"{}\". Which one did you mean?\n",
        candidates.len(),
        query.trim()
    );
    for (i, c) in candidates.iter().enumerate() {
        content.push_str(&format!("\n**{}. {}** ({}% match)\n", i + 1, c.title, c.match_percent));
        let assignees = if c.assignees.is_empty() {
            "Unassigned".to_string()
        } else {
            c.assignees.join(", ")
        };
        content.push_str(&format!("• **Assigned to:** {}\n", assignees));
        content.push_str(&format!(
            "• **Status:** {}\n",
            c.status.as_deref().unwrap_or("Unknown")
        ));
        content.push_str(&format!(
            "• **Priority:** {}\n",
            c.priority.as_deref().unwrap_or("Unknown")
        ));
        if let Some(due) = c.due_date {
            content.push_str(&format!("• **Due:** {}\n", due.format("%b %d, %Y")));
        }
    }
    content.push_str("\nReply with the number or the exact title.");

    ActionOutcome {
        success: true,
        content,
        data: Some(json!({
            "disambiguation": true,
            "query": query.trim(),
            "candidates": candidates,
        })),
    }
}
