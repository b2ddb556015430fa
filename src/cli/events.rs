//! Semantic events from Claude Code stream-json output.
//!
//! The wire protocol is loosely typed, so classification looks at a few
//! well-known fields instead of deserializing into a closed enum. Shapes that
//! are not recognized pass through as [`SemanticEvent::Unclassified`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cli::DecodedEvent;

/// System initialization event data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemInit {
    /// Event subtype (e.g., "init").
    #[serde(default)]
    pub subtype: Option<String>,
    /// Session identifier.
    #[serde(default)]
    pub session_id: Option<String>,
    /// Model in use.
    #[serde(default)]
    pub model: Option<String>,
    /// Current working directory.
    #[serde(default)]
    pub cwd: Option<String>,
    /// Available tools for this session.
    #[serde(default)]
    pub tools: Vec<String>,
}

/// Tool use request data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolUse {
    /// Unique identifier for this tool use.
    #[serde(default)]
    pub id: Option<String>,
    /// Name of the tool being invoked.
    pub name: String,
    /// Raw tool input parameters.
    #[serde(default)]
    pub input: Value,
}

/// Tool execution result data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Identifier matching the original tool use.
    pub tool_use_id: Option<String>,
    /// Result content, flattened to text.
    pub content: String,
    /// Whether the tool reported an error.
    pub is_error: bool,
    /// Whether the result has nothing worth rendering.
    pub hidden: bool,
}

/// Token counts reported for the in-flight request.
///
/// These are cumulative-so-far values, not deltas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub cache_creation_input_tokens: u64,
    #[serde(default)]
    pub cache_read_input_tokens: u64,
}

/// Final result of a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalResult {
    /// Session identifier to resume from.
    pub session_id: String,
    /// Usage for the whole request, if reported.
    pub usage: Option<TokenUsage>,
    /// Cost of the request in USD. Never negative.
    pub cost_usd: f64,
    /// Whether the request ended in error.
    pub is_error: bool,
    /// Final result text.
    pub result: Option<String>,
    /// Total duration in milliseconds.
    pub duration_ms: Option<u64>,
    /// Number of conversation turns.
    pub num_turns: Option<u32>,
}

/// Classified event.
#[derive(Debug, Clone, PartialEq)]
pub enum SemanticEvent {
    SystemInit(SystemInit),
    AssistantMessage(String),
    Thinking(String),
    ToolUse(ToolUse),
    ToolResult(ToolResult),
    TokenUpdate(TokenUsage),
    FinalResult(FinalResult),
    Error(String),
    /// A line that was not JSON.
    PlainText(String),
    /// JSON with no recognized shape.
    Unclassified(Value),
}

impl SemanticEvent {
    /// Returns true if this is the final event of a request.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::FinalResult(_))
    }

    /// Returns the tool name if this is a `ToolUse` event.
    #[must_use]
    pub fn tool_name(&self) -> Option<&str> {
        match self {
            Self::ToolUse(tool_use) => Some(&tool_use.name),
            _ => None,
        }
    }

    /// Returns the session ID if available.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        match self {
            Self::SystemInit(init) => init.session_id.as_deref(),
            Self::FinalResult(result) => Some(&result.session_id),
            _ => None,
        }
    }
}

/// Stateless classifier for decoded stream-json objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventClassifier;

impl EventClassifier {
    /// Classify a decoded line into every semantic event it carries.
    #[must_use]
    pub fn classify_decoded(event: &DecodedEvent) -> Vec<SemanticEvent> {
        match event {
            DecodedEvent::Json(value) => Self::classify_all(value),
            DecodedEvent::Text(line) => vec![SemanticEvent::PlainText(line.clone())],
        }
    }

    /// Classify an object into its primary semantic event.
    #[must_use]
    pub fn classify(value: &Value) -> SemanticEvent {
        Self::classify_all(value)
            .into_iter()
            .next()
            .unwrap_or_else(|| SemanticEvent::Unclassified(value.clone()))
    }

    /// Classify an object into all semantic events it carries, in document
    /// order. A `message.usage` record yields a trailing `TokenUpdate`.
    #[must_use]
    pub fn classify_all(value: &Value) -> Vec<SemanticEvent> {
        let Some(object) = value.as_object() else {
            return vec![SemanticEvent::Unclassified(value.clone())];
        };
        let kind = object.get("type").and_then(Value::as_str).unwrap_or("");

        if kind == "system" {
            let init = serde_json::from_value(value.clone()).unwrap_or_default();
            return vec![SemanticEvent::SystemInit(init)];
        }

        if let Some(result) = final_result(value) {
            return vec![SemanticEvent::FinalResult(result)];
        }

        if kind == "error" || object.get("error").is_some_and(|e| !e.is_null()) {
            return vec![SemanticEvent::Error(error_message(value))];
        }

        if kind == "tool_use" || is_tool_use(value) {
            if let Some(tool_use) = tool_use(value) {
                return vec![SemanticEvent::ToolUse(tool_use)];
            }
        }

        if kind == "tool_result" || is_tool_result(value) {
            return vec![SemanticEvent::ToolResult(tool_result(value))];
        }

        let mut events = Vec::new();
        if let Some(message) = object.get("message") {
            match message.get("content") {
                Some(Value::String(text)) if !text.is_empty() => {
                    events.push(SemanticEvent::AssistantMessage(text.clone()));
                }
                Some(Value::Array(blocks)) => {
                    events.extend(blocks.iter().filter_map(content_block));
                }
                _ => {}
            }

            if let Some(usage) = message.get("usage") {
                if let Ok(usage) = serde_json::from_value::<TokenUsage>(usage.clone()) {
                    events.push(SemanticEvent::TokenUpdate(usage));
                }
            }
        } else if let Some(text) = top_level_text(value) {
            events.push(SemanticEvent::AssistantMessage(text));
        }

        if events.is_empty() {
            events.push(SemanticEvent::Unclassified(value.clone()));
        }
        events
    }
}

fn final_result(value: &Value) -> Option<FinalResult> {
    if value.get("type").and_then(Value::as_str) != Some("result") {
        return None;
    }
    let session_id = value.get("session_id").and_then(Value::as_str)?;

    let usage = value
        .get("usage")
        .or_else(|| value.pointer("/message/usage"))
        .and_then(|u| serde_json::from_value::<TokenUsage>(u.clone()).ok());
    let cost_usd = value
        .get("total_cost_usd")
        .or_else(|| value.get("cost_usd"))
        .and_then(Value::as_f64)
        .filter(|cost| cost.is_finite())
        .unwrap_or(0.0)
        .max(0.0);

    Some(FinalResult {
        session_id: session_id.to_string(),
        usage,
        cost_usd,
        is_error: value
            .get("is_error")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        result: value
            .get("result")
            .and_then(Value::as_str)
            .map(ToString::to_string),
        duration_ms: value.get("duration_ms").and_then(Value::as_u64),
        num_turns: value
            .get("num_turns")
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok()),
    })
}

fn is_tool_use(value: &Value) -> bool {
    value.get("name").is_some_and(Value::is_string) && value.get("input").is_some()
}

fn tool_use(value: &Value) -> Option<ToolUse> {
    let name = value.get("name").and_then(Value::as_str)?;
    Some(ToolUse {
        id: value
            .get("id")
            .or_else(|| value.get("tool_use_id"))
            .and_then(Value::as_str)
            .map(ToString::to_string),
        name: name.to_string(),
        input: value.get("input").cloned().unwrap_or(Value::Null),
    })
}

fn is_tool_result(value: &Value) -> bool {
    value.get("content").is_some() && value.get("is_error").is_some_and(Value::is_boolean)
}

fn tool_result(value: &Value) -> ToolResult {
    let content = value.get("content").map(flatten_content).unwrap_or_default();
    ToolResult {
        tool_use_id: value
            .get("tool_use_id")
            .and_then(Value::as_str)
            .map(ToString::to_string),
        hidden: content.trim().is_empty(),
        content,
        is_error: value
            .get("is_error")
            .and_then(Value::as_bool)
            .unwrap_or(false),
    }
}

/// Flatten tool result content, which is either a string or a list of blocks.
fn flatten_content(content: &Value) -> String {
    match content {
        Value::String(text) => text.clone(),
        Value::Array(blocks) => blocks
            .iter()
            .filter_map(|block| match block {
                Value::String(text) => Some(text.as_str()),
                other => other.get("text").and_then(Value::as_str),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn content_block(block: &Value) -> Option<SemanticEvent> {
    match block.get("type").and_then(Value::as_str) {
        Some("text") => block
            .get("text")
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty())
            .map(|text| SemanticEvent::AssistantMessage(text.to_string())),
        Some("thinking") => block
            .get("thinking")
            .and_then(Value::as_str)
            .map(|text| SemanticEvent::Thinking(text.to_string())),
        Some("tool_use") => tool_use(block).map(SemanticEvent::ToolUse),
        Some("tool_result") => Some(SemanticEvent::ToolResult(tool_result(block))),
        _ => None,
    }
}

fn top_level_text(value: &Value) -> Option<String> {
    ["text", "content", "result"]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .filter(|text| !text.is_empty())
        .map(ToString::to_string)
}

fn error_message(value: &Value) -> String {
    match value.get("error") {
        Some(Value::String(message)) => message.clone(),
        Some(error) => error
            .get("message")
            .and_then(Value::as_str)
            .map_or_else(|| error.to_string(), ToString::to_string),
        None => value
            .get("message")
            .and_then(Value::as_str)
            .map_or_else(|| value.to_string(), ToString::to_string),
    }
}
