//! Task definition and types

use crate::state::TaskState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use uuid::Uuid;

/// Hex characters of the id used in the session name
const SESSION_ID_CHARS: usize = 12;

/// Unique identifier for a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub Uuid);

impl TaskId {
    /// Generate a new random TaskId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Session name derived from this id.
    ///
    /// Deterministic, and limited to characters tmux accepts in a target.
    pub fn session_name(&self, prefix: &str) -> String {
        let simple = self.0.simple().to_string();
        format!("{}{}", prefix, &simple[..SESSION_ID_CHARS])
    }

    /// Short form for log lines
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// What the caller asked for; immutable after creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRequest {
    /// Instruction handed to the launcher
    pub instruction: String,

    /// Directory the session starts in
    pub working_dir: PathBuf,
}

impl TaskRequest {
    pub fn new(instruction: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            instruction: instruction.into(),
            working_dir: working_dir.into(),
        }
    }
}

/// A tracked unit of work backed by a detached session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique task identifier
    pub id: TaskId,

    /// Original request
    pub request: TaskRequest,

    /// Current state
    pub state: TaskState,

    /// When the task was created
    pub started_at: DateTime<Utc>,

    /// When the task left `Running`
    pub ended_at: Option<DateTime<Utc>>,

    /// Backing session name
    pub session: String,

    /// Diagnostic for tasks whose session never started
    pub error: Option<String>,
}

impl Task {
    /// Create a running task
    pub fn new(id: TaskId, request: TaskRequest, session: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            request,
            state: TaskState::Running,
            started_at: now,
            ended_at: None,
            session,
            error: None,
        }
    }

    /// Create a task whose session could not be started
    pub fn failed(
        id: TaskId,
        request: TaskRequest,
        session: String,
        error: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            request,
            state: TaskState::Failed,
            started_at: now,
            ended_at: Some(now),
            session,
            error: Some(error.into()),
        }
    }

    /// Mark task as completed. Returns false if it was not running.
    pub fn complete(&mut self, now: DateTime<Utc>) -> bool {
        self.transition(TaskState::Completed, now)
    }

    /// Mark task as stopped. Returns false if it was not running.
    pub fn stop(&mut self, now: DateTime<Utc>) -> bool {
        self.transition(TaskState::Stopped, now)
    }

    fn transition(&mut self, next: TaskState, now: DateTime<Utc>) -> bool {
        if !self.state.can_transition_to(next) {
            return false;
        }
        self.state = next;
        self.ended_at = Some(now);
        true
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    /// Seconds between start and end (or `now` while running)
    pub fn runtime_seconds(&self, now: DateTime<Utc>) -> f64 {
        let end = self.ended_at.unwrap_or(now);
        let millis = (end - self.started_at).num_milliseconds().max(0);
        millis as f64 / 1000.0
    }

    /// `ended_at` is present exactly when the task is terminal
    pub fn is_consistent(&self) -> bool {
        self.ended_at.is_some() == self.state.is_terminal()
    }
}
