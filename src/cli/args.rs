//! Command-line argument assembly for a single Claude Code request.
//!
//! The message itself is never passed on the command line; it is written to
//! the process's stdin (see [`crate::cli::ClaudeProcess`]).

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Model selection for a request.
///
/// Only aliases the CLI is known to accept are emitted. Anything else is
/// dropped from the argument list rather than rejected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelChoice {
    /// Let the CLI pick its configured default. Emits no flag.
    #[default]
    Default,
    Opus,
    Sonnet,
    Haiku,
    #[serde(rename = "opusplan")]
    OpusPlan,
}

impl ModelChoice {
    /// Parse a model name, returning `None` for unrecognized names.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "" | "default" => Some(Self::Default),
            "opus" => Some(Self::Opus),
            "sonnet" => Some(Self::Sonnet),
            "haiku" => Some(Self::Haiku),
            "opusplan" => Some(Self::OpusPlan),
            _ => None,
        }
    }

    /// The value passed to `--model`, or `None` for the default sentinel.
    #[must_use]
    pub fn cli_value(self) -> Option<&'static str> {
        match self {
            Self::Default => None,
            Self::Opus => Some("opus"),
            Self::Sonnet => Some("sonnet"),
            Self::Haiku => Some("haiku"),
            Self::OpusPlan => Some("opusplan"),
        }
    }
}

impl fmt::Display for ModelChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cli_value().unwrap_or("default"))
    }
}

/// Extended thinking level. Each level maps to a flag of the same name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ThinkingIntensity {
    #[default]
    Off,
    Think,
    ThinkHard,
    ThinkHarder,
    Ultrathink,
}

impl ThinkingIntensity {
    /// The flag for this level, or `None` when thinking is off.
    #[must_use]
    pub fn flag(self) -> Option<&'static str> {
        match self {
            Self::Off => None,
            Self::Think => Some("--think"),
            Self::ThinkHard => Some("--think-hard"),
            Self::ThinkHarder => Some("--think-harder"),
            Self::Ultrathink => Some("--ultrathink"),
        }
    }
}

impl FromStr for ThinkingIntensity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "off" | "none" | "" => Ok(Self::Off),
            "think" => Ok(Self::Think),
            "think-hard" => Ok(Self::ThinkHard),
            "think-harder" => Ok(Self::ThinkHarder),
            "ultrathink" => Ok(Self::Ultrathink),
            other => Err(format!("unknown thinking intensity: {other}")),
        }
    }
}

/// A single request to the agent CLI.
///
/// Built once, consumed by one `start`.
#[derive(Debug, Clone, Default)]
pub struct ProcessRequest {
    message: String,
    working_dir: Option<PathBuf>,
    session_id: Option<String>,
    resume_from: Option<String>,
    model: Option<String>,
    thinking: Option<ThinkingIntensity>,
    custom_instructions: Option<String>,
    mcp_config_path: Option<PathBuf>,
    mcp_system_prompt: Option<String>,
}

impl ProcessRequest {
    /// Create a new request carrying the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    /// Set the working directory for the spawned process.
    #[must_use]
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Continue the given session.
    #[must_use]
    pub fn session_id(mut self, id: impl Into<String>) -> Self {
        self.session_id = Some(id.into());
        self
    }

    /// Resume from a specific session. Takes priority over `session_id`.
    #[must_use]
    pub fn resume_from(mut self, id: impl Into<String>) -> Self {
        self.resume_from = Some(id.into());
        self
    }

    /// Select a model by name.
    #[must_use]
    pub fn model(mut self, name: impl Into<String>) -> Self {
        self.model = Some(name.into());
        self
    }

    #[must_use]
    pub fn thinking(mut self, intensity: ThinkingIntensity) -> Self {
        self.thinking = Some(intensity);
        self
    }

    #[must_use]
    pub fn custom_instructions(mut self, text: impl Into<String>) -> Self {
        self.custom_instructions = Some(text.into());
        self
    }

    /// Path to a generated MCP server configuration file.
    #[must_use]
    pub fn mcp_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.mcp_config_path = Some(path.into());
        self
    }

    /// Extra system prompt text describing the configured MCP servers.
    #[must_use]
    pub fn mcp_system_prompt(mut self, text: impl Into<String>) -> Self {
        self.mcp_system_prompt = Some(text.into());
        self
    }

    /// The message written to stdin.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn get_working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    #[must_use]
    pub fn get_mcp_config_path(&self) -> Option<&Path> {
        self.mcp_config_path.as_deref()
    }

    /// The session to resume, with `resume_from` winning over `session_id`.
    #[must_use]
    pub fn resume_target(&self) -> Option<&str> {
        non_blank(self.resume_from.as_deref()).or_else(|| non_blank(self.session_id.as_deref()))
    }

    /// Build the command-line arguments using the request's own MCP config path.
    #[must_use]
    pub fn build_args(&self) -> Vec<String> {
        build_args(self, None)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Base flags present on every invocation.
pub const BASE_ARGS: [&str; 5] = [
    "-p",
    "--output-format",
    "stream-json",
    "--verbose",
    "--dangerously-skip-permissions",
];

/// Assemble argv for `request`.
///
/// `mcp_config_path` overrides the path carried by the request, if any.
/// Optional values that are empty are treated as absent. This never fails.
#[must_use]
pub fn build_args(request: &ProcessRequest, mcp_config_path: Option<&Path>) -> Vec<String> {
    let mut args: Vec<String> = BASE_ARGS.iter().map(ToString::to_string).collect();

    let mcp_path = mcp_config_path
        .or(request.mcp_config_path.as_deref())
        .filter(|p| !p.as_os_str().is_empty());
    if let Some(path) = mcp_path {
        args.push("--mcp-config".to_string());
        args.push(path.display().to_string());
    }

    if let Some(id) = request.resume_target() {
        args.push("--resume".to_string());
        args.push(id.to_string());
    }

    let model = request
        .model
        .as_deref()
        .and_then(ModelChoice::from_name)
        .and_then(ModelChoice::cli_value);
    if let Some(model) = model {
        args.push("--model".to_string());
        args.push(model.to_string());
    }

    if let Some(flag) = request.thinking.and_then(ThinkingIntensity::flag) {
        args.push(flag.to_string());
    }

    if let Some(text) = non_blank(request.custom_instructions.as_deref()) {
        args.push("--custom-instructions".to_string());
        args.push(text.to_string());
    }

    let mcp_prompt = request
        .mcp_system_prompt
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty());
    if let Some(prompt) = mcp_prompt {
        args.push("--append-system-prompt".to_string());
        args.push(prompt.to_string());
    }

    args
}
