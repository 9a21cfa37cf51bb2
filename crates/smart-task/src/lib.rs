//! # Smart Task
//!
//! Natural-language front end for the task service: resolves a request to
//! one of a fixed set of actions, matches free-text names to users, tasks
//! and projects, and executes the action through [`api::TaskApi`].

pub mod actions;
pub mod agent;
pub mod api;
pub mod brain;
pub mod disambiguation;
pub mod executor;
pub mod intent;
pub mod messages;
pub mod resolver;

#[cfg(test)]
mod testing;

pub use agent::{SmartTaskAgent, SmartTaskResponse};
pub use intent::SmartTaskRequest;

use messages::FailureKind;
use services::services::lifecycle::LifecycleError;

#[derive(Debug, thiserror::Error)]
pub enum SmartTaskError {
    #[error("The assistant did not finish within {0} seconds")]
    Timeout(u64),

    #[error("{0}")]
    MissingParameter(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Api(#[from] LifecycleError),
}

impl SmartTaskError {
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            SmartTaskError::Timeout(_) => FailureKind::Timeout,
            SmartTaskError::MissingParameter(_) => FailureKind::MissingInput,
            SmartTaskError::NotFound(_) => FailureKind::NotFound,
            SmartTaskError::Api(e) => match e {
                LifecycleError::Validation(_) | LifecycleError::BadRequest(_) => FailureKind::Invalid,
                LifecycleError::Forbidden(_) | LifecycleError::Deadline(_) => FailureKind::Forbidden,
                LifecycleError::TaskNotFound | LifecycleError::NotFound(_) => FailureKind::NotFound,
                LifecycleError::Database(_) | LifecycleError::Storage(_) => FailureKind::Unavailable,
            },
        }
    }

    /// Safe to show to the user: business-rule text is passed through,
    /// infrastructure errors are not.
    pub fn user_detail(&self) -> String {
        match self {
            SmartTaskError::Api(LifecycleError::Validation(errors)) => errors
                .values()
                .flatten()
                .cloned()
                .collect::<Vec<_>>()
                .join(" "),
            SmartTaskError::Api(LifecycleError::Database(_) | LifecycleError::Storage(_)) => {
                "The task service could not complete the request.".to_string()
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SmartTaskError>;
