use thiserror::Error;

use super::types::TaskStatus;

/// Errors surfaced by workflow operations. A failed operation leaves all
/// prior state untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("Permission denied: {actor} may not {action}")]
    PermissionDenied { actor: String, action: String },

    #[error("Invalid state: cannot {action} while task {task_id} is {status}")]
    InvalidState {
        task_id: String,
        status: TaskStatus,
        action: String,
    },

    #[error("Invalid score {score}: must be an integer between 0 and 100")]
    InvalidScore { score: i64 },

    #[error(
        "Conflict: task {task_id} changed concurrently \
         (expected version {expected}, found {found})"
    )]
    Conflict {
        task_id: String,
        expected: u64,
        found: u64,
    },

    #[error("Unknown task: {0}")]
    UnknownTask(String),

    #[error("Unknown user: {0}")]
    UnknownUser(String),

    #[error("Unknown notification: {0}")]
    UnknownNotification(String),

    #[error("Validation failed: {0}")]
    Validation(String),
}

impl WorkflowError {
    pub fn permission(actor: &str, action: impl Into<String>) -> Self {
        WorkflowError::PermissionDenied {
            actor: actor.to_string(),
            action: action.into(),
        }
    }

    pub fn invalid_state(task_id: &str, status: TaskStatus, action: impl Into<String>) -> Self {
        WorkflowError::InvalidState {
            task_id: task_id.to_string(),
            status,
            action: action.into(),
        }
    }

    /// Short machine-readable kind, used for metrics and log fields
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowError::PermissionDenied { .. } => "permission_denied",
            WorkflowError::InvalidState { .. } => "invalid_state",
            WorkflowError::InvalidScore { .. } => "invalid_score",
            WorkflowError::Conflict { .. } => "conflict",
            WorkflowError::UnknownTask(_) => "unknown_task",
            WorkflowError::UnknownUser(_) => "unknown_user",
            WorkflowError::UnknownNotification(_) => "unknown_notification",
            WorkflowError::Validation(_) => "validation",
        }
    }
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;
