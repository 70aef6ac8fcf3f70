//! Detached sessions
//!
//! - `SessionBackend` - create/exists/capture/send/kill contract
//! - `TmuxSessions` - tmux implementation driven through a `CommandRunner`
//! - `LaunchCommand` - base64-transported launch script for an instruction

pub mod launch;
pub mod tmux;
pub mod r#trait;

pub use launch::LaunchCommand;
pub use r#trait::SessionBackend;
pub use tmux::{TmuxConfig, TmuxSessions};
