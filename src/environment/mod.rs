//! Execution environment for the spawned agent CLI.

mod resolver;
mod types;

pub use resolver::*;
pub use types::*;
