//! Launch script construction
//!
//! The instruction travels base64-encoded and is decoded by the session's own
//! shell, so quotes, newlines, `$`, backticks and the like reach the launcher
//! byte for byte.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tether_foundation::{Error, LauncherConfig, Result};

/// Shell variable holding the decoded instruction inside the session
const PROMPT_VAR: &str = "tether_prompt";

/// Quote one word for a POSIX shell
pub fn quote(word: &str) -> Result<String> {
    shlex::try_quote(word)
        .map(|quoted| quoted.into_owned())
        .map_err(|e| Error::InvalidInput(format!("Cannot quote {:?}: {}", word, e)))
}

/// Builds the command a session runs for one instruction
#[derive(Debug, Clone)]
pub struct LaunchCommand {
    program: String,
    args: Vec<String>,
}

impl LaunchCommand {
    pub fn new(launcher: &LauncherConfig) -> Self {
        Self {
            program: launcher.program.clone(),
            args: launcher.args.clone(),
        }
    }

    /// POSIX script that decodes the instruction and execs the launcher with
    /// it as the final argument.
    ///
    /// Command substitution strips trailing newlines, so a sentinel `x` is
    /// appended during decoding and removed afterwards.
    pub fn script(&self, instruction: &str) -> Result<String> {
        let payload = STANDARD.encode(instruction.as_bytes());

        let mut launcher = quote(&self.program)?;
        for arg in &self.args {
            launcher.push(' ');
            launcher.push_str(&quote(arg)?);
        }

        Ok(format!(
            "{var}=\"$(printf '%s' '{payload}' | base64 -d; printf x)\"; {var}=\"${{{var}%x}}\"; exec {launcher} \"${var}\"",
            var = PROMPT_VAR,
            payload = payload,
            launcher = launcher,
        ))
    }
}
