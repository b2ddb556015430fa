//! Resolution of the execution environment before each spawn.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::config::BridgeConfig;
use crate::environment::{ExecutionEnvironment, ProcessModel};

/// Default binary name searched for on `PATH`.
pub const DEFAULT_BINARY: &str = "claude";

/// Error type for environment resolution.
#[derive(thiserror::Error, Debug)]
pub enum EnvironmentError {
    /// The resolver itself failed.
    #[error("Failed to resolve execution environment: {0}")]
    Resolution(String),
    /// I/O error while probing the filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Supplies the spawn configuration for the agent CLI.
#[async_trait]
pub trait EnvironmentResolver: Send + Sync {
    /// Resolve the environment for the next spawn.
    ///
    /// A missing executable is reported through
    /// [`ExecutionEnvironment::executable_path`] being `None`, not as an error.
    async fn resolve(&self) -> Result<ExecutionEnvironment, EnvironmentError>;

    /// The host process model, used once to pick a termination strategy.
    fn process_model(&self) -> ProcessModel {
        ProcessModel::host()
    }
}

/// Resolver that always returns the same environment.
#[derive(Debug, Clone)]
pub struct FixedEnvironment {
    environment: ExecutionEnvironment,
    process_model: ProcessModel,
}

impl FixedEnvironment {
    #[must_use]
    pub fn new(environment: ExecutionEnvironment) -> Self {
        Self {
            environment,
            process_model: ProcessModel::host(),
        }
    }

    #[must_use]
    pub fn with_process_model(mut self, process_model: ProcessModel) -> Self {
        self.process_model = process_model;
        self
    }
}

#[async_trait]
impl EnvironmentResolver for FixedEnvironment {
    async fn resolve(&self) -> Result<ExecutionEnvironment, EnvironmentError> {
        Ok(self.environment.clone())
    }

    fn process_model(&self) -> ProcessModel {
        self.process_model
    }
}

/// Resolver backed by the configuration file and `PATH`.
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    config: BridgeConfig,
    search_path: Option<std::ffi::OsString>,
}

impl ConfigResolver {
    #[must_use]
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            search_path: std::env::var_os("PATH"),
        }
    }

    /// Override the `PATH` value searched for the executable.
    #[must_use]
    pub fn with_search_path(mut self, path: impl Into<std::ffi::OsString>) -> Self {
        self.search_path = Some(path.into());
        self
    }

    async fn find_executable(&self) -> Option<PathBuf> {
        if let Some(configured) = &self.config.executable {
            if is_file(configured).await {
                return Some(configured.clone());
            }
            tracing::warn!(path = %configured.display(), "Configured executable does not exist");
            return None;
        }

        let mut candidates: Vec<PathBuf> = Vec::new();
        if let Some(path) = &self.search_path {
            for dir in std::env::split_paths(path) {
                candidates.extend(binary_names().iter().map(|name| dir.join(name)));
            }
        }
        if let Some(home) = dirs::home_dir() {
            candidates.push(home.join(".claude").join("local").join(DEFAULT_BINARY));
            candidates.push(home.join(".local").join("bin").join(DEFAULT_BINARY));
        }

        for candidate in candidates {
            if is_file(&candidate).await {
                tracing::debug!(path = %candidate.display(), "Resolved agent executable");
                return Some(candidate);
            }
        }
        None
    }
}

#[async_trait]
impl EnvironmentResolver for ConfigResolver {
    async fn resolve(&self) -> Result<ExecutionEnvironment, EnvironmentError> {
        Ok(ExecutionEnvironment {
            environment_variables: self.config.env.clone(),
            use_shell: self.config.use_shell,
            executable_path: self.find_executable().await,
        })
    }

    fn process_model(&self) -> ProcessModel {
        self.config.process_model
    }
}

fn binary_names() -> &'static [&'static str] {
    if cfg!(windows) {
        &["claude.exe", "claude.cmd", "claude"]
    } else {
        &[DEFAULT_BINARY]
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|meta| meta.is_file())
}
