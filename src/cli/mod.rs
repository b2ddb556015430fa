//! CLI module for Claude Code argument assembly, spawning, and stream decoding.

mod args;
mod decoder;
mod events;
mod process;

pub use args::*;
pub use decoder::*;
pub use events::*;
pub use process::*;
