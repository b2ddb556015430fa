//! Tests for agent process spawning.

#![cfg(unix)]

use std::path::Path;

use claude_bridge::cli::{write_message, ClaudeProcess, ProcessRequest, SpawnError};
use claude_bridge::environment::ExecutionEnvironment;
use tokio::io::AsyncReadExt;

async fn read_stdout(mut process: ClaudeProcess) -> String {
    let mut stdout = process.take_stdout().expect("stdout piped");
    let mut output = String::new();
    stdout.read_to_string(&mut output).await.unwrap();
    let _ = process.into_child().wait().await;
    output
}

#[tokio::test]
async fn message_is_written_to_stdin_with_newline() {
    let env = ExecutionEnvironment::new("cat");
    let mut process =
        ClaudeProcess::spawn(Path::new("cat"), &[], &env, &ProcessRequest::new("hi")).unwrap();

    process.send_message("hello agent").await.unwrap();
    assert_eq!(read_stdout(process).await, "hello agent\n");
}

#[tokio::test]
async fn send_message_twice_fails() {
    let env = ExecutionEnvironment::new("cat");
    let mut process =
        ClaudeProcess::spawn(Path::new("cat"), &[], &env, &ProcessRequest::new("hi")).unwrap();

    process.send_message("once").await.unwrap();
    let second = process.send_message("twice").await;
    assert!(matches!(second, Err(SpawnError::MissingPipe("stdin"))));
    assert_eq!(read_stdout(process).await, "once\n");
}

#[tokio::test]
async fn write_message_closes_stdin() {
    let env = ExecutionEnvironment::new("wc");
    let args = vec!["-l".to_string()];
    let mut process =
        ClaudeProcess::spawn(Path::new("wc"), &args, &env, &ProcessRequest::new("hi")).unwrap();

    let stdin = process.take_stdin().unwrap();
    write_message(stdin, "one line").await.unwrap();
    assert_eq!(read_stdout(process).await.trim(), "1");
}

#[tokio::test]
async fn environment_variables_are_layered() {
    let env = ExecutionEnvironment::new("sh").env("BRIDGE_TEST_VAR", "from-config");
    let args = vec![
        "-c".to_string(),
        "printf '%s:%s' \"$BRIDGE_TEST_VAR\" \"${PATH:+inherited}\"".to_string(),
    ];
    let process =
        ClaudeProcess::spawn(Path::new("sh"), &args, &env, &ProcessRequest::new("hi")).unwrap();

    assert_eq!(read_stdout(process).await, "from-config:inherited");
}

#[tokio::test]
async fn shell_mode_passes_arguments_verbatim() {
    let env = ExecutionEnvironment::new("printf").with_shell(true);
    let args = vec![
        "%s|%s".to_string(),
        "two words".to_string(),
        "$HOME; echo injected".to_string(),
    ];
    let process =
        ClaudeProcess::spawn(Path::new("printf"), &args, &env, &ProcessRequest::new("hi"))
            .unwrap();

    assert_eq!(
        read_stdout(process).await,
        "two words|$HOME; echo injected"
    );
}

#[tokio::test]
async fn working_directory_is_applied() {
    let dir = tempfile::tempdir().unwrap();
    let env = ExecutionEnvironment::new("pwd");
    let request = ProcessRequest::new("hi").working_dir(dir.path());
    let process = ClaudeProcess::spawn(Path::new("pwd"), &[], &env, &request).unwrap();

    let output = read_stdout(process).await;
    let expected = dir.path().canonicalize().unwrap();
    assert_eq!(Path::new(output.trim()).canonicalize().unwrap(), expected);
}

#[tokio::test]
async fn missing_binary_is_not_found() {
    let env = ExecutionEnvironment::default();
    let result = ClaudeProcess::spawn(
        Path::new("/nonexistent/claude-bridge-test-binary"),
        &[],
        &env,
        &ProcessRequest::new("hi"),
    );
    assert!(matches!(result, Err(SpawnError::NotFound)));
}
