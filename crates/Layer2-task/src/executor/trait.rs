//! Command runner trait

use async_trait::async_trait;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

/// Exit code reported when the process never produced one
pub const NO_EXIT_CODE: i32 = -1;

/// Captured result of one command invocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,

    /// Output exceeded the byte cap and was cut
    pub truncated: bool,

    /// The time bound expired and the process was killed
    pub timed_out: bool,
}

impl CommandOutput {
    /// A result describing a failure that happened before or around the process
    pub fn failure(stderr: impl Into<String>) -> Self {
        Self {
            stderr: stderr.into(),
            exit_code: NO_EXIT_CODE,
            ..Default::default()
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }

    /// Best single-line description of a failure for diagnostics
    pub fn diagnostic(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }
        format!("command exited with code {}", self.exit_code)
    }
}

/// Runner trait - implement to change how session commands reach the host.
///
/// Implementations never return an error: spawn failures, IO errors and
/// timeouts are all folded into a non-zero `exit_code` with `stderr` set.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `command` through a shell, bounded in time and captured size
    async fn run(
        &self,
        command: &str,
        cwd: Option<&Path>,
        timeout: Duration,
        max_output_bytes: usize,
    ) -> CommandOutput;

    /// Get runner name
    fn name(&self) -> &'static str;
}
