//! Claude Code process spawning.
//!
//! Spawns the agent CLI from an [`ExecutionEnvironment`], writes the request
//! message to stdin exactly once and closes it.

use std::borrow::Cow;
use std::path::Path;
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};

use crate::cli::ProcessRequest;
use crate::environment::ExecutionEnvironment;

/// Error type for process spawning operations.
#[derive(thiserror::Error, Debug)]
pub enum SpawnError {
    /// The binary was not found.
    #[error("Claude binary not found")]
    NotFound,
    /// Permission denied when spawning.
    #[error("Permission denied")]
    PermissionDenied,
    /// A stdio pipe was not available after spawn.
    #[error("Process {0} pipe not available")]
    MissingPipe(&'static str),
    /// Other I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SpawnError {
    /// Create a `SpawnError` from an I/O error, classifying common cases.
    fn from_io(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound,
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied,
            _ => Self::Io(err),
        }
    }
}

/// A spawned Claude Code process.
#[derive(Debug)]
pub struct ClaudeProcess {
    child: Child,
}

impl ClaudeProcess {
    /// Spawn `executable` with `args` in the given environment.
    ///
    /// Environment variables from `env` are layered over the inherited
    /// environment; nothing else is removed or replaced.
    ///
    /// # Errors
    ///
    /// Returns `SpawnError` if the process fails to spawn.
    pub fn spawn(
        executable: &Path,
        args: &[String],
        env: &ExecutionEnvironment,
        request: &ProcessRequest,
    ) -> Result<Self, SpawnError> {
        let mut cmd = if env.use_shell {
            shell_command(executable, args)
        } else {
            let mut cmd = Command::new(executable);
            cmd.args(args);
            cmd
        };

        cmd.envs(&env.environment_variables)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(dir) = request.get_working_dir() {
            cmd.current_dir(dir);
        }

        // Own process group (pgid == pid) so the whole tree can be signaled.
        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd.spawn().map_err(SpawnError::from_io)?;
        tracing::info!(
            pid = ?child.id(),
            executable = %executable.display(),
            shell = env.use_shell,
            "Spawned agent process"
        );

        Ok(Self { child })
    }

    /// Take ownership of the stdin handle.
    ///
    /// This can only be called once; subsequent calls return `None`.
    pub fn take_stdin(&mut self) -> Option<ChildStdin> {
        self.child.stdin.take()
    }

    /// Write `message` to stdin and close it. See [`write_message`].
    ///
    /// # Errors
    ///
    /// Returns an error if stdin was already taken or the write fails.
    pub async fn send_message(&mut self, message: &str) -> Result<(), SpawnError> {
        let stdin = self.take_stdin().ok_or(SpawnError::MissingPipe("stdin"))?;
        write_message(stdin, message).await?;
        Ok(())
    }

    /// Take ownership of the stdout handle.
    ///
    /// This can only be called once; subsequent calls return `None`.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    /// Take ownership of the stderr handle.
    ///
    /// This can only be called once; subsequent calls return `None`.
    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    /// Get the process ID, if still running.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Give up the wrapper and return the underlying child.
    #[must_use]
    pub fn into_child(self) -> Child {
        self.child
    }
}

/// Write `message` followed by a newline, then close the stream.
///
/// Consuming `stdin` guarantees the message is written exactly once.
///
/// # Errors
///
/// Returns an error if the write or the close fails.
pub async fn write_message(mut stdin: ChildStdin, message: &str) -> std::io::Result<()> {
    stdin.write_all(message.as_bytes()).await?;
    stdin.write_all(b"\n").await?;
    stdin.shutdown().await
}

#[cfg(not(windows))]
fn shell_command(executable: &Path, args: &[String]) -> Command {
    let mut line = shell_escape::escape(executable.to_string_lossy()).into_owned();
    for arg in args {
        line.push(' ');
        line.push_str(&shell_escape::escape(Cow::Borrowed(arg.as_str())));
    }
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(line);
    cmd
}

#[cfg(windows)]
fn shell_command(executable: &Path, args: &[String]) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(executable);
    cmd.args(
        args.iter()
            .map(|arg| shell_escape::escape(Cow::Borrowed(arg.as_str())).into_owned()),
    );
    cmd
}
