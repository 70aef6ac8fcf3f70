//! Tether Config - service settings
//!
//! Loaded from the global store, then overlaid with the project store.

use crate::storage::{load_path, JsonStore};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Config file name inside a store
pub const TETHER_CONFIG_FILE: &str = "config.json";

// ============================================================================
// Tether Config
// ============================================================================

/// Service-wide settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TetherConfig {
    /// Binary launched inside each task session
    #[serde(default)]
    pub launcher: LauncherConfig,

    /// Prefix for generated session names
    #[serde(default = "default_session_prefix")]
    pub session_prefix: String,

    /// Liveness poll interval for `start` in wait mode
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Wait timeout used when the caller does not pass one
    #[serde(default = "default_wait_timeout_secs")]
    pub default_wait_timeout_secs: u64,

    /// Lines of output returned by status queries
    #[serde(default = "default_status_tail_lines")]
    pub status_tail_lines: usize,

    /// Lines of output returned by output queries by default
    #[serde(default = "default_output_tail_lines")]
    pub output_tail_lines: usize,

    /// Instruction length shown in listings before truncation
    #[serde(default = "default_prompt_summary_chars")]
    pub prompt_summary_chars: usize,

    /// Upper bound for a single session command
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,

    /// Upper bound for captured stdout/stderr of a session command
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,

    /// Registry size at which a capacity warning is logged
    #[serde(default = "default_capacity_warning")]
    pub capacity_warning: usize,

    /// Shared secret callers must present; `None` disables the check
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

impl Default for TetherConfig {
    fn default() -> Self {
        Self {
            launcher: LauncherConfig::default(),
            session_prefix: default_session_prefix(),
            poll_interval_ms: default_poll_interval_ms(),
            default_wait_timeout_secs: default_wait_timeout_secs(),
            status_tail_lines: default_status_tail_lines(),
            output_tail_lines: default_output_tail_lines(),
            prompt_summary_chars: default_prompt_summary_chars(),
            command_timeout_secs: default_command_timeout_secs(),
            max_output_bytes: default_max_output_bytes(),
            capacity_warning: default_capacity_warning(),
            auth_token: None,
        }
    }
}

impl TetherConfig {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Load
    // ========================================================================

    /// Global + project merged load
    pub fn load() -> Result<Self> {
        let mut stores = Vec::new();
        if let Ok(global) = JsonStore::global() {
            stores.push(global);
        }
        if let Ok(project) = JsonStore::current_project() {
            stores.push(project);
        }
        Self::load_stores(&stores)
    }

    /// Load a single explicit file, ignoring the stores
    pub fn load_file(path: &Path) -> Result<Self> {
        let config: TetherConfig = load_path(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from stores in order; keys in later stores win.
    ///
    /// Layers are merged as JSON before deserializing, so a project file
    /// that sets a field back to its default still overrides the global one.
    pub fn load_stores(stores: &[JsonStore]) -> Result<Self> {
        let mut merged = Value::Object(Map::new());

        for store in stores {
            if let Some(layer) = store.load_optional::<Value>(TETHER_CONFIG_FILE)? {
                debug!("Loaded config layer {}", store.file_path(TETHER_CONFIG_FILE).display());
                merge_json(&mut merged, layer);
            }
        }

        let config: TetherConfig = serde_json::from_value(merged)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the service unusable
    pub fn validate(&self) -> Result<()> {
        if self.launcher.program.trim().is_empty() {
            return Err(Error::Config("launcher.program must not be empty".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(Error::Config("pollIntervalMs must be positive".into()));
        }
        if self.command_timeout_secs == 0 {
            return Err(Error::Config("commandTimeoutSecs must be positive".into()));
        }
        if self.max_output_bytes == 0 {
            return Err(Error::Config("maxOutputBytes must be positive".into()));
        }
        if !self
            .session_prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(Error::Config(format!(
                "sessionPrefix contains unsupported characters: {}",
                self.session_prefix
            )));
        }
        Ok(())
    }

    // ========================================================================
    // Builder
    // ========================================================================

    pub fn launcher(mut self, program: impl Into<String>) -> Self {
        self.launcher.program = program.into();
        self
    }

    pub fn auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    // ========================================================================
    // Durations
    // ========================================================================

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

// ============================================================================
// Launcher Config
// ============================================================================

/// External binary started inside a task session.
///
/// The instruction text is appended as the final argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LauncherConfig {
    #[serde(default = "default_launcher_program")]
    pub program: String,

    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            program: default_launcher_program(),
            args: Vec::new(),
        }
    }
}

/// Overlay `layer` onto `base` key by key; nested objects merge recursively
fn merge_json(base: &mut Value, layer: Value) {
    match (base, layer) {
        (Value::Object(base), Value::Object(layer)) => {
            for (key, value) in layer {
                merge_json(base.entry(key).or_insert(Value::Null), value);
            }
        }
        (base, layer) => *base = layer,
    }
}

// ============================================================================
// Defaults
// ============================================================================

fn default_launcher_program() -> String {
    "claude".to_string()
}

fn default_session_prefix() -> String {
    "tether-".to_string()
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_wait_timeout_secs() -> u64 {
    300
}

fn default_status_tail_lines() -> usize {
    30
}

fn default_output_tail_lines() -> usize {
    500
}

fn default_prompt_summary_chars() -> usize {
    100
}

fn default_command_timeout_secs() -> u64 {
    60
}

fn default_max_output_bytes() -> usize {
    1024 * 1024
}

fn default_capacity_warning() -> usize {
    1000
}
