//! Task operation errors
//!
//! These are the only failures the lifecycle controller reports. Session
//! capability errors never show up here directly: reads turn them into
//! sentinels and writes turn them into [`TaskError::Delivery`].

use crate::state::TaskState;
use serde::Serialize;
use thiserror::Error;

/// Operation-level failure
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskError {
    /// Unknown task id
    #[error("Task {task_id} not found")]
    NotFound {
        #[serde(rename = "taskId")]
        task_id: String,
    },

    /// Operation needs a running task
    #[error("Task {task_id} is not running: already {status}")]
    InvalidState {
        #[serde(rename = "taskId")]
        task_id: String,
        status: TaskState,
    },

    /// Input could not be handed to the session
    #[error("Failed to deliver input to task {task_id}: {message}")]
    Delivery {
        #[serde(rename = "taskId")]
        task_id: String,
        message: String,
    },
}

impl TaskError {
    pub fn not_found(task_id: impl ToString) -> Self {
        TaskError::NotFound {
            task_id: task_id.to_string(),
        }
    }

    pub fn invalid_state(task_id: impl ToString, status: TaskState) -> Self {
        TaskError::InvalidState {
            task_id: task_id.to_string(),
            status,
        }
    }

    pub fn delivery(task_id: impl ToString, message: impl Into<String>) -> Self {
        TaskError::Delivery {
            task_id: task_id.to_string(),
            message: message.into(),
        }
    }

    /// Stable machine-readable kind
    pub fn kind(&self) -> &'static str {
        match self {
            TaskError::NotFound { .. } => "not_found",
            TaskError::InvalidState { .. } => "invalid_state",
            TaskError::Delivery { .. } => "delivery",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, TaskError::NotFound { .. })
    }

    pub fn is_invalid_state(&self) -> bool {
        matches!(self, TaskError::InvalidState { .. })
    }
}
