//! Colored CLI display utilities for streamed agent output.

use std::io::{self, Write};

use chrono::Utc;
use owo_colors::OwoColorize;

use crate::cli::{FinalResult, SemanticEvent, SystemInit, ToolResult, ToolUse};
use crate::supervisor::{ErrorEvent, TerminationOutcome, UsageTotals};

/// Get current timestamp in the same format as tracing.
fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Maximum length for truncated display strings.
const DEFAULT_MAX_LEN: usize = 80;

/// Truncate a string to a maximum number of characters, adding ellipsis if
/// truncated.
#[must_use]
pub fn truncate(s: &str, max_len: usize, raw_mode: bool) -> String {
    if raw_mode || s.chars().count() <= max_len {
        return s.to_string();
    }
    if max_len <= 3 {
        return "...".to_string();
    }
    let kept: String = s.chars().take(max_len - 3).collect();
    format!("{kept}...")
}

/// Format tool input for display, truncating long values.
#[must_use]
pub fn format_tool_input(input: &serde_json::Value, raw_mode: bool) -> String {
    match input {
        serde_json::Value::Object(map) => {
            let pairs: Vec<String> = map
                .iter()
                .map(|(k, v)| {
                    let value_str = match v {
                        serde_json::Value::String(s) => truncate(s, 50, raw_mode),
                        other => truncate(&other.to_string(), 50, raw_mode),
                    };
                    format!("{k}={value_str}")
                })
                .collect();
            pairs.join(", ")
        }
        other => truncate(&other.to_string(), DEFAULT_MAX_LEN, raw_mode),
    }
}

/// Render one stdout event.
pub fn print_event(event: &SemanticEvent, raw_mode: bool) {
    match event {
        SemanticEvent::SystemInit(init) => print_session_start(init, raw_mode),
        SemanticEvent::AssistantMessage(text) => println!("{text}"),
        SemanticEvent::Thinking(text) => println!("{}", text.dimmed()),
        SemanticEvent::ToolUse(tool_use) => print_tool_request(tool_use, raw_mode),
        SemanticEvent::ToolResult(result) => print_tool_result(result, raw_mode),
        SemanticEvent::TokenUpdate(usage) => tracing::trace!(?usage, "Token update"),
        SemanticEvent::FinalResult(result) => print_result(result, raw_mode),
        SemanticEvent::Error(message) => print_error(message),
        SemanticEvent::PlainText(line) => println!("{}", line.dimmed()),
        SemanticEvent::Unclassified(value) => {
            if raw_mode {
                print_raw_event("EVENT", &value.to_string());
            }
        }
    }
    let _ = io::stdout().flush();
}

/// Print session start information.
fn print_session_start(init: &SystemInit, raw_mode: bool) {
    println!(
        "{} {} model={}, session={}",
        timestamp().dimmed(),
        "[SESSION]".blue().bold(),
        init.model.as_deref().unwrap_or("unknown").cyan(),
        truncate(init.session_id.as_deref().unwrap_or("-"), 20, raw_mode).dimmed()
    );
}

/// Print a tool request.
fn print_tool_request(tool_use: &ToolUse, raw_mode: bool) {
    println!(
        "{} {} ({})",
        "[TOOL]".cyan().bold(),
        tool_use.name.bold(),
        format_tool_input(&tool_use.input, raw_mode).dimmed()
    );
}

/// Print tool result output. Hidden results print nothing.
fn print_tool_result(result: &ToolResult, raw_mode: bool) {
    if result.hidden {
        return;
    }
    let id_short = truncate(result.tool_use_id.as_deref().unwrap_or("-"), 12, raw_mode);
    let content_short = truncate(&result.content, 150, raw_mode);
    if result.is_error {
        println!(
            "{} {} {}",
            "[RESULT]".red().bold(),
            id_short.dimmed(),
            content_short
        );
    } else {
        println!(
            "{} {} {}",
            "[RESULT]".green().bold(),
            id_short.dimmed(),
            content_short
        );
    }
}

/// Print the final result of a request.
fn print_result(result: &FinalResult, raw_mode: bool) {
    let ts = timestamp();
    let session = format!("session_id={}", truncate(&result.session_id, 20, raw_mode));
    if result.is_error {
        println!(
            "{} {} Request ended with error {}",
            ts.dimmed(),
            "[SESSION]".red().bold(),
            session.dimmed()
        );
        if let Some(msg) = result.result.as_deref().filter(|m| !m.is_empty()) {
            print_error(&truncate(msg, 200, raw_mode));
        }
    } else {
        println!(
            "{} {} Request completed (cost: ${:.4}) {}",
            ts.dimmed(),
            "[SESSION]".blue().bold(),
            result.cost_usd,
            session.dimmed()
        );
    }
}

/// Print a stderr line or runtime error.
pub fn print_error_event(event: &ErrorEvent) {
    match event {
        ErrorEvent::Stderr(_) => eprintln!("{} {}", "[STDERR]".yellow().bold(), event.text()),
        ErrorEvent::Process(message) => print_error(message),
    }
}

/// Print an error message.
pub fn print_error(message: &str) {
    println!("{} {}", "[ERROR]".red().bold(), message);
    let _ = io::stdout().flush();
}

/// Print process exit and running session totals.
pub fn print_close(exit_code: Option<i32>, totals: &UsageTotals) {
    let code = exit_code.map_or_else(|| "signal".to_string(), |c| c.to_string());
    println!(
        "{} {} exit={} requests={} tokens(in/out)={}/{} cost=${:.4}",
        timestamp().dimmed(),
        "[CLOSE]".blue().bold(),
        code,
        totals.request_count,
        totals.total_input_tokens,
        totals.total_output_tokens,
        totals.total_cost
    );
    let _ = io::stdout().flush();
}

/// Print the outcome of a stop request.
pub fn print_stopped(outcome: &TerminationOutcome) {
    println!(
        "{} {} signal={} forced={}",
        timestamp().dimmed(),
        "[STOP]".yellow().bold(),
        outcome
            .signal_sent
            .map_or_else(|| "none".to_string(), |s| s.to_string()),
        outcome.forced
    );
    let _ = io::stdout().flush();
}

/// Print raw event output (for verbose/raw mode).
pub fn print_raw_event(event_type: &str, event_json: &str) {
    println!(
        "{} {} {}",
        timestamp().dimmed(),
        format!("[{event_type}]").yellow().bold(),
        event_json
    );
}
