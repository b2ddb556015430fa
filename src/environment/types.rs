//! Execution environment types.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// How the host OS organizes spawned processes.
///
/// Selects the termination strategy: process trees are killed as a whole,
/// POSIX processes get a graceful signal first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessModel {
    /// Signals delivered per process (SIGTERM, SIGKILL).
    Posix,
    /// Children nest under a shell and must be killed as a tree.
    ProcessTree,
}

impl ProcessModel {
    /// The model of the host OS.
    #[must_use]
    pub fn host() -> Self {
        if cfg!(windows) {
            Self::ProcessTree
        } else {
            Self::Posix
        }
    }
}

impl Default for ProcessModel {
    fn default() -> Self {
        Self::host()
    }
}

/// Resolved spawn configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionEnvironment {
    /// Variables layered on top of the inherited environment.
    pub environment_variables: HashMap<String, String>,
    /// Run the executable through the platform shell.
    pub use_shell: bool,
    /// Resolved executable. `None` means resolution failed.
    pub executable_path: Option<PathBuf>,
}

impl ExecutionEnvironment {
    /// Create an environment for a known executable.
    #[must_use]
    pub fn new(executable_path: impl Into<PathBuf>) -> Self {
        Self {
            executable_path: Some(executable_path.into()),
            ..Default::default()
        }
    }

    /// Add an environment variable.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment_variables.insert(key.into(), value.into());
        self
    }

    /// Run through the platform shell.
    #[must_use]
    pub fn with_shell(mut self, use_shell: bool) -> Self {
        self.use_shell = use_shell;
        self
    }
}
