//! The fixed action vocabulary the assistant can execute.

use std::{fmt, str::FromStr};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    CreateTask,
    UpdateTask,
    DeleteTask,
    GetUserTasks,
    ListTasks,
    GetTaskStatus,
    GetTaskUpdates,
    AddTaskMessage,
    AddTaskAttachment,
    GetUsers,
    GetProjects,
    GetProjectProgress,
    GetDashboard,
    SearchContent,
    UpdateTaskStatus,
    UpdateTaskPriority,
}

impl Action {
    pub const ALL: [Action; 16] = [
        Action::CreateTask,
        Action::UpdateTask,
        Action::DeleteTask,
        Action::GetUserTasks,
        Action::ListTasks,
        Action::GetTaskStatus,
        Action::GetTaskUpdates,
        Action::AddTaskMessage,
        Action::AddTaskAttachment,
        Action::GetUsers,
        Action::GetProjects,
        Action::GetProjectProgress,
        Action::GetDashboard,
        Action::SearchContent,
        Action::UpdateTaskStatus,
        Action::UpdateTaskPriority,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::CreateTask => "create_task",
            Action::UpdateTask => "update_task",
            Action::DeleteTask => "delete_task",
            Action::GetUserTasks => "get_user_tasks",
            Action::ListTasks => "list_tasks",
            Action::GetTaskStatus => "get_task_status",
            Action::GetTaskUpdates => "get_task_updates",
            Action::AddTaskMessage => "add_task_message",
            Action::AddTaskAttachment => "add_task_attachment",
            Action::GetUsers => "get_users",
            Action::GetProjects => "get_projects",
            Action::GetProjectProgress => "get_project_progress",
            Action::GetDashboard => "get_dashboard",
            Action::SearchContent => "search_content",
            Action::UpdateTaskStatus => "update_task_status",
            Action::UpdateTaskPriority => "update_task_priority",
        }
    }

    /// One-line usage shown in help text and the oracle prompt.
    pub fn usage(&self) -> &'static str {
        match self {
            Action::CreateTask => "create a task (title, assignee, project, priority, status, due_date, description)",
            Action::UpdateTask => "edit a task (task, title, description, assignee, due_date)",
            Action::DeleteTask => "delete a task (task)",
            Action::GetUserTasks => "list tasks assigned to someone (user)",
            Action::ListTasks => "list tasks (status, priority, search)",
            Action::GetTaskStatus => "show a task's status (task)",
            Action::GetTaskUpdates => "show recent messages on a task (task)",
            Action::AddTaskMessage => "comment on a task (task, message)",
            Action::AddTaskAttachment => "attach a link to a task (task, url, title)",
            Action::GetUsers => "list team members",
            Action::GetProjects => "list projects",
            Action::GetProjectProgress => "show completion for a project (project)",
            Action::GetDashboard => "summarise task counts",
            Action::SearchContent => "search tasks, projects and clients (query)",
            Action::UpdateTaskStatus => "move a task to a status (task, status)",
            Action::UpdateTaskPriority => "change a task's priority (task, priority)",
        }
    }

    /// Whether the action changes data.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Action::CreateTask
                | Action::UpdateTask
                | Action::DeleteTask
                | Action::AddTaskMessage
                | Action::AddTaskAttachment
                | Action::UpdateTaskStatus
                | Action::UpdateTaskPriority
        )
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase().replace(['-', ' '], "_");
        Action::ALL
            .iter()
            .find(|a| a.as_str() == key)
            .copied()
            .ok_or_else(|| format!("Unknown action: {}", s))
    }
}

/// Markdown list of every action with its usage.
pub fn available_actions() -> String {
    Action::ALL
        .iter()
        .map(|a| format!("• **{}**: {}", a, a.usage()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_from_str() {
        for action in Action::ALL {
            assert_eq!(action.as_str().parse::<Action>().unwrap(), action);
        }
        assert_eq!("Update Task Status".parse::<Action>().unwrap(), Action::UpdateTaskStatus);
        assert!("launch_rocket".parse::<Action>().is_err());
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&Action::GetProjectProgress).unwrap();
        assert_eq!(json, "\"get_project_progress\"");
    }

    #[test]
    fn help_lists_every_action() {
        let help = available_actions();
        assert_eq!(help.lines().count(), Action::ALL.len());
        assert!(help.contains("**search_content**"));
    }
}
