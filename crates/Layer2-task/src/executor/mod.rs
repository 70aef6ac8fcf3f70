//! Command execution
//!
//! - `CommandRunner` - bounded one-shot command contract
//! - `ShellRunner` - `sh -c` implementation with timeout and output caps

pub mod local;
pub mod r#trait;

pub use local::ShellRunner;
pub use r#trait::{CommandOutput, CommandRunner, NO_EXIT_CODE};
