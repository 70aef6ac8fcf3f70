//! tmux session backend
//!
//! tmux 세션 백엔드.
//!
//! Every operation is one shell command issued through a [`CommandRunner`],
//! so it inherits the runner's time and output bounds.

use crate::executor::{CommandRunner, ShellRunner};
use crate::session::launch::quote;
use crate::session::SessionBackend;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tether_foundation::strings::tail_lines;
use tether_foundation::{Error, Result, TetherConfig};
use tracing::debug;

/// Bounds applied to every tmux invocation
#[derive(Debug, Clone)]
pub struct TmuxConfig {
    /// tmux executable
    pub binary: String,

    /// Per-command time bound
    pub command_timeout: Duration,

    /// Per-command stdout/stderr cap
    pub max_output_bytes: usize,
}

impl Default for TmuxConfig {
    fn default() -> Self {
        Self {
            binary: "tmux".to_string(),
            command_timeout: Duration::from_secs(60),
            max_output_bytes: 1024 * 1024,
        }
    }
}

impl From<&TetherConfig> for TmuxConfig {
    fn from(config: &TetherConfig) -> Self {
        Self {
            command_timeout: config.command_timeout(),
            max_output_bytes: config.max_output_bytes,
            ..Default::default()
        }
    }
}

/// Sessions backed by tmux
pub struct TmuxSessions {
    runner: Arc<dyn CommandRunner>,
    config: TmuxConfig,
}

impl TmuxSessions {
    /// Create with the local shell runner
    pub fn new(config: TmuxConfig) -> Self {
        Self::with_runner(Arc::new(ShellRunner::new()), config)
    }

    /// Create with a custom runner
    pub fn with_runner(runner: Arc<dyn CommandRunner>, config: TmuxConfig) -> Self {
        Self { runner, config }
    }

    /// tmux version string, or `None` if tmux cannot be run
    pub async fn detect(&self) -> Option<String> {
        let out = self.exec(&format!("{} -V", self.binary().ok()?), None).await.ok()?;
        Some(out.trim().to_string())
    }

    fn binary(&self) -> Result<String> {
        quote(&self.config.binary)
    }

    /// Exact-match session target
    fn session_target(name: &str) -> Result<String> {
        quote(&format!("={}", name))
    }

    /// Exact-match target for the session's active pane
    fn pane_target(name: &str) -> Result<String> {
        quote(&format!("={}:", name))
    }

    /// Run a tmux command line, mapping a non-zero exit to an error
    async fn exec(&self, command: &str, cwd: Option<&Path>) -> Result<String> {
        let out = self
            .runner
            .run(
                command,
                cwd,
                self.config.command_timeout,
                self.config.max_output_bytes,
            )
            .await;

        if out.timed_out {
            return Err(Error::Timeout(out.diagnostic()));
        }
        if !out.success() {
            return Err(Error::Session(out.diagnostic()));
        }
        Ok(out.stdout)
    }
}

impl Default for TmuxSessions {
    fn default() -> Self {
        Self::new(TmuxConfig::default())
    }
}

#[async_trait]
impl SessionBackend for TmuxSessions {
    async fn create_session(&self, name: &str, working_dir: &Path, command: &str) -> Result<()> {
        // Run through sh explicitly so the user's default-shell does not matter
        let shell_command = format!("sh -c {}", quote(command)?);
        let line = format!(
            "{} new-session -d -s {} -c {} {}",
            self.binary()?,
            quote(name)?,
            quote(&working_dir.to_string_lossy())?,
            quote(&shell_command)?,
        );
        debug!("Creating session {}", name);
        self.exec(&line, None).await.map(|_| ())
    }

    async fn session_exists(&self, name: &str) -> bool {
        let line = match (self.binary(), Self::session_target(name)) {
            (Ok(bin), Ok(target)) => format!("{} has-session -t {}", bin, target),
            _ => return false,
        };
        self.exec(&line, None).await.is_ok()
    }

    async fn capture_output(&self, name: &str, max_lines: usize) -> Result<String> {
        let line = format!(
            "{} capture-pane -p -J -t {} -S -{}",
            self.binary()?,
            Self::pane_target(name)?,
            max_lines
        );
        let captured = self.exec(&line, None).await?;
        Ok(tail_lines(&captured, max_lines))
    }

    async fn send_keys(&self, name: &str, text: &str) -> Result<()> {
        let bin = self.binary()?;
        let target = Self::pane_target(name)?;
        let line = format!(
            "{bin} send-keys -t {target} -l -- {text} && {bin} send-keys -t {target} Enter",
            bin = bin,
            target = target,
            text = quote(text)?,
        );
        self.exec(&line, None).await.map(|_| ())
    }

    async fn kill_session(&self, name: &str) -> Result<()> {
        let line = format!(
            "{} kill-session -t {}",
            self.binary()?,
            Self::session_target(name)?
        );
        self.exec(&line, None).await.map(|_| ())
    }

    fn name(&self) -> &'static str {
        "tmux"
    }
}
