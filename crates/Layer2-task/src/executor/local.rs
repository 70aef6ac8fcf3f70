//! Local shell runner - bounded `sh -c` execution on the host
//!
//! Features:
//! - Hard timeout; the child is killed when it expires
//! - stdout/stderr read concurrently, each capped at a byte limit
//! - Output past the cap is drained and discarded so the child never blocks
//!   on a full pipe

use crate::executor::{CommandOutput, CommandRunner, NO_EXIT_CODE};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tether_foundation::strings::truncate_bytes_lossy;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, warn};

const READ_CHUNK: usize = 8192;

/// Runs commands through a POSIX shell
#[derive(Debug, Clone)]
pub struct ShellRunner {
    /// Shell executable invoked as `<shell> -c <command>`
    shell: String,
}

impl ShellRunner {
    pub fn new() -> Self {
        Self {
            shell: "sh".to_string(),
        }
    }

    /// Use a different shell executable
    pub fn with_shell(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new()
    }
}

/// Read a stream to the end, keeping at most `cap + 1` bytes
async fn read_capped<R: AsyncRead + Unpin>(reader: Option<R>, cap: usize) -> Vec<u8> {
    let Some(mut reader) = reader else {
        return Vec::new();
    };

    let mut buf = Vec::new();
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                // One byte past the cap is enough to know we truncated
                let room = (cap + 1).saturating_sub(buf.len());
                buf.extend_from_slice(&chunk[..n.min(room)]);
            }
            Err(e) => {
                debug!("Stream read stopped: {}", e);
                break;
            }
        }
    }
    buf
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(
        &self,
        command: &str,
        cwd: Option<&Path>,
        timeout: Duration,
        max_output_bytes: usize,
    ) -> CommandOutput {
        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        debug!("Running: {}", command);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                return CommandOutput::failure(format!("Failed to spawn process: {}", e));
            }
        };

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let result = tokio::time::timeout(timeout, async {
            let (out, err, status) = tokio::join!(
                read_capped(stdout, max_output_bytes),
                read_capped(stderr, max_output_bytes),
                child.wait()
            );
            (out, err, status)
        })
        .await;

        match result {
            Ok((out, err, status)) => {
                let (stdout, out_cut) = truncate_bytes_lossy(&out, max_output_bytes);
                let (mut stderr, err_cut) = truncate_bytes_lossy(&err, max_output_bytes);

                let exit_code = match status {
                    Ok(status) => status.code().unwrap_or(NO_EXIT_CODE),
                    Err(e) => {
                        if !stderr.is_empty() {
                            stderr.push('\n');
                        }
                        stderr.push_str(&format!("Process error: {}", e));
                        NO_EXIT_CODE
                    }
                };

                CommandOutput {
                    stdout,
                    stderr,
                    exit_code,
                    truncated: out_cut || err_cut,
                    timed_out: false,
                }
            }
            Err(_) => {
                let _ = child.kill().await;
                warn!(
                    "Command timed out after {:.1}s: {}",
                    timeout.as_secs_f64(),
                    command
                );
                CommandOutput {
                    stderr: format!("Command timed out after {} ms", timeout.as_millis()),
                    exit_code: NO_EXIT_CODE,
                    timed_out: true,
                    ..Default::default()
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "shell"
    }
}
