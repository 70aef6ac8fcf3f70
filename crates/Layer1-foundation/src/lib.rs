//! # tether-foundation
//!
//! Foundation layer for Tether:
//! - Error: crate-wide error type and `Result` alias
//! - Config: `TetherConfig` (global + project JSON stores)
//! - Storage: `JsonStore` for config files
//! - Strings: truncation and line tailing for captured terminal text
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  tether-cli     (serve loop, auth, logging setup)       │
//! │                     │                                   │
//! │                     ▼                                   │
//! │  tether-task    (dispatch → TaskManager → registry)     │
//! │                     │                                   │
//! │          ┌─────────┴─────────┐                         │
//! │          ▼                   ▼                         │
//! │   SessionBackend       CommandRunner                   │
//! │   (tmux)               (sh -c, bounded)                │
//! │                     │                                   │
//! │                     ▼                                   │
//! │  tether-foundation  (config, errors, strings)           │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod storage;
pub mod strings;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Config
// ============================================================================
pub use config::{LauncherConfig, TetherConfig, TETHER_CONFIG_FILE};

// ============================================================================
// Storage
// ============================================================================
pub use storage::JsonStore;
