//! # tether-task
//!
//! Task registry and lifecycle control for Tether.
//! Each task runs an agent CLI inside its own detached tmux session; this
//! crate tracks those tasks and keeps their status in line with the
//! sessions that back them.
//!
//! ## Features
//!
//! - Start tasks detached or wait for completion with a bounded timeout
//! - Status and output queries that reconcile against the live session
//! - Input delivery into running sessions
//! - Explicit stop, listing, per-state counts
//! - JSON request dispatch with optional token authorization
//!
//! ## Layout
//!
//! ```text
//! Dispatcher ──► TaskManager ──► TaskRegistry (Arc<Mutex<Task>> per id)
//!                    │
//!                    ├──► SessionBackend (TmuxSessions ──► CommandRunner)
//!                    └──► Clock
//! ```

pub mod clock;
pub mod dispatch;
pub mod error;
pub mod executor;
pub mod manager;
pub mod registry;
pub mod session;
pub mod state;
pub mod task;

pub use clock::{Clock, ManualClock, SystemClock};
pub use dispatch::{
    AllowAll, Authorizer, DispatchError, Dispatcher, ErrorCode, Request, Response, TokenAuthorizer,
};
pub use error::TaskError;
pub use executor::{CommandOutput, CommandRunner, ShellRunner};
pub use manager::{
    OutputResponse, SendResponse, StartOptions, StartResponse, StatusResponse, StopResponse,
    TaskManager, TaskManagerConfig, TaskSummary,
};
pub use registry::{ResourceStats, TaskRegistry};
pub use session::{LaunchCommand, SessionBackend, TmuxConfig, TmuxSessions};
pub use state::TaskState;
pub use task::{Task, TaskId, TaskRequest};
