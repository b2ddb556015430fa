//! Configuration types.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::cli::{ModelChoice, ProcessRequest, ThinkingIntensity};
use crate::environment::ProcessModel;

/// Configuration for the bridge, loaded from TOML.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Explicit path to the agent executable. Searched on `PATH` when unset.
    pub executable: Option<PathBuf>,
    /// Run the executable through the platform shell.
    pub use_shell: bool,
    /// Process model used to pick the termination strategy.
    pub process_model: ProcessModel,
    /// Extra environment variables for the spawned process.
    pub env: HashMap<String, String>,
    /// Default model.
    pub model: ModelChoice,
    /// Default thinking intensity.
    pub thinking: ThinkingIntensity,
    /// Custom instructions passed on every request.
    pub custom_instructions: Option<String>,
    /// MCP server configuration file.
    pub mcp_config_path: Option<PathBuf>,
    /// System prompt text describing the MCP servers.
    pub mcp_system_prompt: Option<String>,
}

impl BridgeConfig {
    /// Build a request for `message` carrying the configured defaults.
    #[must_use]
    pub fn request(&self, message: impl Into<String>) -> ProcessRequest {
        let mut request = ProcessRequest::new(message)
            .model(self.model.to_string())
            .thinking(self.thinking);
        if let Some(text) = &self.custom_instructions {
            request = request.custom_instructions(text.clone());
        }
        if let Some(path) = &self.mcp_config_path {
            request = request.mcp_config_path(path.clone());
        }
        if let Some(prompt) = &self.mcp_system_prompt {
            request = request.mcp_system_prompt(prompt.clone());
        }
        request
    }
}
