//! Task registry - the single source of truth for task records
//!
//! 태스크 레코드 저장소.
//!
//! Each record sits behind its own async mutex. The map lock is only taken
//! to insert, look up, or enumerate; it is never held across a session call
//! or a sleep, so a slow tmux round trip for one task cannot stall another.

use crate::state::TaskState;
use crate::task::{Task, TaskId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Shared handle to one task record
pub type TaskEntry = Arc<Mutex<Task>>;

/// Per-state task counts
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceStats {
    pub total_tasks: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub stopped: usize,
}

/// Entry plus its immutable sort key, readable without the entry lock
struct Slot {
    started_at: DateTime<Utc>,
    entry: TaskEntry,
}

/// In-memory task registry
#[derive(Default)]
pub struct TaskRegistry {
    tasks: RwLock<HashMap<TaskId, Slot>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new task and return its entry.
    ///
    /// Ids are freshly generated UUIDs; an existing id is never overwritten.
    pub async fn insert(&self, task: Task) -> TaskEntry {
        let id = task.id;
        let started_at = task.started_at;
        let mut tasks = self.tasks.write().await;
        let slot = tasks.entry(id).or_insert_with(|| Slot {
            started_at,
            entry: Arc::new(Mutex::new(task)),
        });
        Arc::clone(&slot.entry)
    }

    /// Look up one task
    pub async fn get(&self, id: &TaskId) -> Option<TaskEntry> {
        self.tasks.read().await.get(id).map(|slot| Arc::clone(&slot.entry))
    }

    /// All entries, oldest first (ties broken by id).
    ///
    /// 엔트리 락을 잡지 않으므로 진행 중인 reconcile/stop과 경합하지 않는다.
    pub async fn entries(&self) -> Vec<TaskEntry> {
        let tasks = self.tasks.read().await;
        let mut keyed: Vec<_> = tasks
            .iter()
            .map(|(id, slot)| ((slot.started_at, *id), Arc::clone(&slot.entry)))
            .collect();
        drop(tasks);

        keyed.sort_by(|a, b| a.0.cmp(&b.0));
        keyed.into_iter().map(|(_, entry)| entry).collect()
    }

    /// Snapshot of every task, oldest first
    pub async fn snapshot(&self) -> Vec<Task> {
        let mut out = Vec::new();
        for entry in self.entries().await {
            out.push(entry.lock().await.clone());
        }
        out
    }

    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    /// Count tasks per state
    pub async fn stats(&self) -> ResourceStats {
        let mut stats = ResourceStats::default();
        for task in self.snapshot().await {
            stats.total_tasks += 1;
            match task.state {
                TaskState::Running => stats.running += 1,
                TaskState::Completed => stats.completed += 1,
                TaskState::Failed => stats.failed += 1,
                TaskState::Stopped => stats.stopped += 1,
            }
        }
        stats
    }
}
