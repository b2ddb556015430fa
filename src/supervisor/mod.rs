//! Supervisor module for process lifecycle, usage accounting, and termination.

mod callbacks;
mod runner;
mod state;
mod terminate;
mod usage;

pub use callbacks::*;
pub use runner::*;
pub use state::*;
pub use terminate::*;
pub use usage::*;
