//! Claude Bridge - Process supervision and stream decoding for the Claude Code CLI.

pub mod cli;
pub mod config;
pub mod display;
pub mod environment;
pub mod supervisor;
