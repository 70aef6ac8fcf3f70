//! Config - service settings
//!
//! - `tether.rs` - TetherConfig and launcher settings

mod tether;

pub use tether::{LauncherConfig, TetherConfig, TETHER_CONFIG_FILE};
