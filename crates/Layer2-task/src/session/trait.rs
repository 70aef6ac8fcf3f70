//! Session backend trait

use async_trait::async_trait;
use std::path::Path;
use tether_foundation::Result;

/// Detached-session capability, keyed by session name.
///
/// Implement to add a new terminal substrate. The controller treats every
/// failure here as recoverable: reads fall back to sentinels, writes report
/// a boolean.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// Start a detached session in `working_dir` running `command`
    async fn create_session(&self, name: &str, working_dir: &Path, command: &str) -> Result<()>;

    /// Whether the session is still alive
    async fn session_exists(&self, name: &str) -> bool;

    /// Last `max_lines` lines of the session's visible output
    async fn capture_output(&self, name: &str, max_lines: usize) -> Result<String>;

    /// Type `text` literally into the session, then press Enter
    async fn send_keys(&self, name: &str, text: &str) -> Result<()>;

    /// Tear the session down
    async fn kill_session(&self, name: &str) -> Result<()>;

    /// Get backend name
    fn name(&self) -> &'static str;
}
