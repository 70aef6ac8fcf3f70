//! Storage module for Tether
//!
//! - `json`: JSON file store for configuration

mod json;

pub use json::{load_path, JsonStore};
