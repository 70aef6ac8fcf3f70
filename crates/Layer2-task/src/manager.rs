//! Task Manager - lifecycle control for session-backed tasks
//!
//! 세션 기반 태스크의 시작/조회/중지를 담당한다.
//!
//! Features:
//! - start (optionally waiting for completion)
//! - status / output queries that reconcile against the live session
//! - input delivery and explicit stop
//! - listing with batch reconciliation
//!
//! Every read goes through [`TaskManager::reconcile`], which is the only
//! place a `Running` task becomes `Completed`. The wait loop in `start` uses
//! the same path, so it observes a concurrent `stop` as `Stopped`.

use crate::clock::{Clock, SystemClock};
use crate::error::TaskError;
use crate::registry::{ResourceStats, TaskEntry, TaskRegistry};
use crate::session::{LaunchCommand, SessionBackend};
use crate::state::TaskState;
use crate::task::{Task, TaskId, TaskRequest};
use futures::future::join_all;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tether_foundation::strings::{truncate_chars, SESSION_ENDED};
use tether_foundation::{LauncherConfig, TetherConfig};
use tracing::{debug, info, warn};

/// Configuration for task manager
#[derive(Debug, Clone)]
pub struct TaskManagerConfig {
    /// Binary launched in each session
    pub launcher: LauncherConfig,

    /// Prefix for session names
    pub session_prefix: String,

    /// Liveness poll interval in wait mode
    pub poll_interval: Duration,

    /// Wait timeout when the caller gives none
    pub default_wait_timeout: Duration,

    /// Output lines returned by `get_status`
    pub status_tail_lines: usize,

    /// Output lines returned by `get_output` by default
    pub output_tail_lines: usize,

    /// Instruction length in listings
    pub prompt_summary_chars: usize,

    /// Registry size that triggers a capacity warning
    pub capacity_warning: usize,
}

impl Default for TaskManagerConfig {
    fn default() -> Self {
        Self::from(&TetherConfig::default())
    }
}

impl From<&TetherConfig> for TaskManagerConfig {
    fn from(config: &TetherConfig) -> Self {
        Self {
            launcher: config.launcher.clone(),
            session_prefix: config.session_prefix.clone(),
            poll_interval: config.poll_interval(),
            default_wait_timeout: Duration::from_secs(config.default_wait_timeout_secs),
            status_tail_lines: config.status_tail_lines,
            output_tail_lines: config.output_tail_lines,
            prompt_summary_chars: config.prompt_summary_chars,
            capacity_warning: config.capacity_warning,
        }
    }
}

// ============================================================================
// Operation results
// ============================================================================

/// How `start` should behave after the session is created
#[derive(Debug, Clone, Copy, Default)]
pub struct StartOptions {
    /// Block until the task leaves `Running` or the timeout expires
    pub wait_for_completion: bool,

    /// Wait bound; `None` uses the configured default
    pub timeout: Option<Duration>,
}

impl StartOptions {
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn wait(timeout: Duration) -> Self {
        Self {
            wait_for_completion: true,
            timeout: Some(timeout),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartResponse {
    pub task_id: TaskId,
    pub status: TaskState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub task_id: TaskId,
    pub status: TaskState,
    pub runtime_seconds: f64,
    pub last_output: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputResponse {
    pub task_id: TaskId,
    pub status: TaskState,
    pub output: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResponse {
    pub sent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskError>,
}

impl SendResponse {
    pub fn ok() -> Self {
        Self {
            sent: true,
            error: None,
        }
    }

    pub fn failed(error: TaskError) -> Self {
        Self {
            sent: false,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopResponse {
    pub stopped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskError>,
}

impl StopResponse {
    pub fn ok() -> Self {
        Self {
            stopped: true,
            error: None,
        }
    }

    pub fn failed(error: TaskError) -> Self {
        Self {
            stopped: false,
            error: Some(error),
        }
    }
}

/// One row of `list`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSummary {
    pub task_id: TaskId,
    pub prompt_summary: String,
    pub status: TaskState,
    pub runtime_seconds: f64,
    pub working_directory: PathBuf,
}

// ============================================================================
// Task Manager
// ============================================================================

/// Task Manager - handles task lifecycle against a session backend
#[derive(Clone)]
pub struct TaskManager {
    /// All tasks by ID
    registry: Arc<TaskRegistry>,

    /// Session substrate
    sessions: Arc<dyn SessionBackend>,

    /// Time source for timestamps and the wait loop
    clock: Arc<dyn Clock>,

    /// Builds the per-task launch script
    launch: LaunchCommand,

    /// Configuration
    config: Arc<TaskManagerConfig>,

    /// Capacity warning already emitted
    capacity_warned: Arc<AtomicBool>,
}

impl TaskManager {
    /// Create a new task manager on the system clock
    pub fn new(config: TaskManagerConfig, sessions: Arc<dyn SessionBackend>) -> Self {
        Self::with_clock(config, sessions, Arc::new(SystemClock))
    }

    /// Create with a custom clock
    pub fn with_clock(
        config: TaskManagerConfig,
        sessions: Arc<dyn SessionBackend>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry: Arc::new(TaskRegistry::new()),
            sessions,
            clock,
            launch: LaunchCommand::new(&config.launcher),
            config: Arc::new(config),
            capacity_warned: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &TaskManagerConfig {
        &self.config
    }

    /// Start a new task
    pub async fn start(&self, request: TaskRequest, options: StartOptions) -> StartResponse {
        let id = TaskId::new();
        let session = id.session_name(&self.config.session_prefix);

        if let Err(reason) = self.create_session(&session, &request).await {
            let message = format!("Failed to create session: {}", reason);
            warn!("Task {} failed to start: {}", id.short(), reason);

            let task = Task::failed(id, request, session, message.clone(), self.clock.now());
            self.register(task).await;

            return StartResponse {
                task_id: id,
                status: TaskState::Failed,
                output: Some(message.clone()),
                message: Some(message),
            };
        }

        info!(
            "Started task {} in session {} ({})",
            id.short(),
            session,
            request.working_dir.display()
        );
        let task = Task::new(id, request, session, self.clock.now());
        let entry = self.register(task).await;

        if !options.wait_for_completion {
            return StartResponse {
                task_id: id,
                status: TaskState::Running,
                output: None,
                message: None,
            };
        }

        let timeout = options.timeout.unwrap_or(self.config.default_wait_timeout);
        self.wait_for(&entry, timeout).await
    }

    async fn create_session(&self, session: &str, request: &TaskRequest) -> Result<(), String> {
        match tokio::fs::metadata(&request.working_dir).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                return Err(format!(
                    "working directory is not a directory: {}",
                    request.working_dir.display()
                ))
            }
            Err(e) => {
                return Err(format!(
                    "working directory {} is not accessible: {}",
                    request.working_dir.display(),
                    e
                ))
            }
        }

        let script = self
            .launch
            .script(&request.instruction)
            .map_err(|e| e.to_string())?;

        self.sessions
            .create_session(session, &request.working_dir, &script)
            .await
            .map_err(|e| e.to_string())
    }

    async fn register(&self, task: Task) -> TaskEntry {
        let entry = self.registry.insert(task).await;

        let total = self.registry.len().await;
        if total >= self.config.capacity_warning && !self.capacity_warned.swap(true, Ordering::Relaxed)
        {
            warn!(
                "Task registry holds {} tasks; finished tasks are never evicted",
                total
            );
        }
        entry
    }

    /// Poll until the task leaves `Running` or `timeout` elapses.
    ///
    /// Only the caller is suspended; no registry lock is held while sleeping.
    async fn wait_for(&self, entry: &TaskEntry, timeout: Duration) -> StartResponse {
        let started = self.clock.now();

        loop {
            let task = self.reconcile(entry).await;

            if !task.is_running() {
                let output = self.capture(&task, self.config.output_tail_lines).await;
                return StartResponse {
                    task_id: task.id,
                    status: task.state,
                    output: Some(output),
                    message: None,
                };
            }

            let elapsed = (self.clock.now() - started).to_std().unwrap_or_default();
            if elapsed >= timeout {
                debug!("Wait for task {} timed out", task.id.short());
                let output = self.capture(&task, self.config.status_tail_lines).await;
                return StartResponse {
                    task_id: task.id,
                    status: TaskState::Running,
                    output: Some(output),
                    message: Some(format!(
                        "Timeout reached after {}s; task is still running in the background",
                        timeout.as_secs()
                    )),
                };
            }

            let remaining = timeout - elapsed;
            self.clock
                .sleep(self.config.poll_interval.min(remaining))
                .await;
        }
    }

    /// Bring a task's status in line with its session and return a snapshot.
    ///
    /// The per-task lock is held across the liveness check so concurrent
    /// readers cannot both transition the task.
    pub async fn reconcile(&self, entry: &TaskEntry) -> Task {
        let mut task = entry.lock().await;

        if task.is_running() && !self.sessions.session_exists(&task.session).await {
            if task.complete(self.clock.now()) {
                debug!(
                    "Task {} completed: session {} is gone",
                    task.id.short(),
                    task.session
                );
            }
        }

        task.clone()
    }

    /// Output for a task, never failing.
    ///
    /// Failed tasks report their diagnostic; capture errors become the
    /// session-ended sentinel.
    async fn capture(&self, task: &Task, lines: usize) -> String {
        if task.state == TaskState::Failed {
            return task
                .error
                .clone()
                .unwrap_or_else(|| SESSION_ENDED.to_string());
        }

        match self.sessions.capture_output(&task.session, lines).await {
            Ok(output) => output,
            Err(e) => {
                debug!("Capture for task {} failed: {}", task.id.short(), e);
                SESSION_ENDED.to_string()
            }
        }
    }

    async fn entry(&self, id: TaskId) -> Result<TaskEntry, TaskError> {
        self.registry
            .get(&id)
            .await
            .ok_or_else(|| TaskError::not_found(id))
    }

    /// Get task status with a short output tail
    pub async fn get_status(&self, id: TaskId) -> Result<StatusResponse, TaskError> {
        let entry = self.entry(id).await?;
        let task = self.reconcile(&entry).await;
        let last_output = self.capture(&task, self.config.status_tail_lines).await;

        Ok(StatusResponse {
            task_id: task.id,
            status: task.state,
            runtime_seconds: task.runtime_seconds(self.clock.now()),
            last_output,
        })
    }

    /// Get a longer output tail
    pub async fn get_output(
        &self,
        id: TaskId,
        lines: Option<usize>,
    ) -> Result<OutputResponse, TaskError> {
        let entry = self.entry(id).await?;
        let task = self.reconcile(&entry).await;
        let lines = lines.unwrap_or(self.config.output_tail_lines);
        let output = self.capture(&task, lines).await;

        Ok(OutputResponse {
            task_id: task.id,
            status: task.state,
            output,
        })
    }

    /// Type a line of input into a running task
    pub async fn send(&self, id: TaskId, message: &str) -> SendResponse {
        let entry = match self.entry(id).await {
            Ok(entry) => entry,
            Err(e) => return SendResponse::failed(e),
        };

        let task = self.reconcile(&entry).await;
        if !task.is_running() {
            return SendResponse::failed(TaskError::invalid_state(id, task.state));
        }

        match self.sessions.send_keys(&task.session, message).await {
            Ok(()) => {
                debug!("Sent {} bytes to task {}", message.len(), id.short());
                SendResponse::ok()
            }
            Err(e) => {
                warn!("Delivery to task {} failed: {}", id.short(), e);
                SendResponse::failed(TaskError::delivery(id, e.to_string()))
            }
        }
    }

    /// List every task, reconciling running ones first
    pub async fn list(&self) -> Vec<TaskSummary> {
        let entries = self.registry.entries().await;
        let tasks = join_all(entries.iter().map(|entry| self.reconcile(entry))).await;

        let now = self.clock.now();
        tasks
            .into_iter()
            .map(|task| TaskSummary {
                task_id: task.id,
                prompt_summary: truncate_chars(
                    &task.request.instruction,
                    self.config.prompt_summary_chars,
                ),
                status: task.state,
                runtime_seconds: task.runtime_seconds(now),
                working_directory: task.request.working_dir.clone(),
            })
            .collect()
    }

    /// Stop a running task
    pub async fn stop(&self, id: TaskId) -> StopResponse {
        let entry = match self.entry(id).await {
            Ok(entry) => entry,
            Err(e) => return StopResponse::failed(e),
        };

        let mut task = entry.lock().await;
        if !task.is_running() {
            return StopResponse::failed(TaskError::invalid_state(id, task.state));
        }

        if let Err(e) = self.sessions.kill_session(&task.session).await {
            warn!(
                "Killing session {} for task {} failed, marking stopped anyway: {}",
                task.session,
                id.short(),
                e
            );
        }

        task.stop(self.clock.now());
        info!("Stopped task {}", id.short());
        StopResponse::ok()
    }

    /// Snapshot without reconciliation
    pub async fn get(&self, id: TaskId) -> Option<Task> {
        let entry = self.registry.get(&id).await?;
        let task = entry.lock().await.clone();
        Some(task)
    }

    /// Counts per state (as last reconciled)
    pub async fn stats(&self) -> ResourceStats {
        self.registry.stats().await
    }
}
