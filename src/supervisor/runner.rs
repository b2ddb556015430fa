//! Process supervisor for a single in-flight Claude Code request.
//!
//! Owns the one process slot, wires stdout and stderr through the decoder
//! and classifier to the caller's [`ProcessCallbacks`], keeps session usage,
//! and hands the process to a [`TerminationStrategy`] on stop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, ChildStderr, ChildStdout};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::cli::{
    build_args, write_message, ClaudeProcess, DecodedEvent, EventClassifier, ProcessRequest,
    SemanticEvent, SpawnError, StreamDecoder, StreamId,
};
use crate::environment::{EnvironmentError, EnvironmentResolver};
use crate::supervisor::{
    strategy_for, ErrorEvent, ProcessCallbacks, ProcessRef, ProcessSlot, SupervisorState,
    TerminationError, TerminationOutcome, TerminationStrategy, UsageAccumulator, UsageTotals,
};

/// Read buffer size for process output.
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Error type for supervisor operations.
#[derive(thiserror::Error, Debug)]
pub enum SupervisorError {
    /// A process is already starting or running.
    #[error("A process is already running")]
    AlreadyRunning,
    /// The execution environment has no executable.
    #[error("Claude executable could not be resolved")]
    ExecutableNotFound,
    /// The OS failed to create the process.
    #[error("Failed to spawn process: {0}")]
    Spawn(#[from] SpawnError),
    /// The environment resolver failed.
    #[error(transparent)]
    Environment(#[from] EnvironmentError),
    /// `stop` was called before the process was running.
    #[error("Start cancelled")]
    Cancelled,
}

/// Handle the termination strategy uses to reach a running child.
///
/// The child itself is owned by the task waiting on it; kill requests are
/// forwarded to that task.
#[derive(Debug)]
struct ChildHandle {
    exited: AtomicBool,
    kill_tx: UnboundedSender<()>,
}

impl ProcessRef for ChildHandle {
    fn has_exited(&self) -> bool {
        self.exited.load(Ordering::Acquire)
    }

    fn kill(&self) -> Result<(), TerminationError> {
        if self.has_exited() {
            return Err(TerminationError::ProcessGone);
        }
        self.kill_tx
            .send(())
            .map_err(|_| TerminationError::ProcessGone)
    }
}

/// What the slot holds while a process runs.
#[derive(Debug)]
struct ActiveProcess {
    pid: Option<u32>,
    handle: Arc<ChildHandle>,
}

type Slot = Arc<Mutex<ProcessSlot<ActiveProcess>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Supervisor enforcing at most one agent process at a time.
pub struct ProcessSupervisor {
    slot: Slot,
    usage: Arc<Mutex<UsageAccumulator>>,
    resolver: Arc<dyn EnvironmentResolver>,
    strategy: Arc<dyn TerminationStrategy>,
}

impl ProcessSupervisor {
    /// Create a supervisor, picking the termination strategy from the
    /// resolver's process model.
    #[must_use]
    pub fn new(resolver: Arc<dyn EnvironmentResolver>) -> Self {
        let strategy = strategy_for(resolver.process_model());
        Self::with_strategy(resolver, strategy)
    }

    /// Create a supervisor with an explicit termination strategy.
    #[must_use]
    pub fn with_strategy(
        resolver: Arc<dyn EnvironmentResolver>,
        strategy: Arc<dyn TerminationStrategy>,
    ) -> Self {
        Self {
            slot: Arc::new(Mutex::new(ProcessSlot::new())),
            usage: Arc::new(Mutex::new(UsageAccumulator::new())),
            resolver,
            strategy,
        }
    }

    /// Start a process for `request`, delivering its output to `callbacks`.
    ///
    /// Returns the process id once the message has been written to stdin.
    ///
    /// # Errors
    ///
    /// - `AlreadyRunning` if a process is starting or running; nothing else
    ///   happens in that case.
    /// - `ExecutableNotFound` if the environment has no executable.
    /// - `Spawn` if the OS refuses to create the process.
    /// - `Cancelled` if `stop` was called while starting.
    pub async fn start(
        &self,
        request: ProcessRequest,
        callbacks: Arc<dyn ProcessCallbacks>,
    ) -> Result<Option<u32>, SupervisorError> {
        let generation = lock(&self.slot)
            .begin_start()
            .ok_or(SupervisorError::AlreadyRunning)?;

        match self.launch(generation, &request, callbacks).await {
            Ok(pid) => Ok(pid),
            Err(e) => {
                lock(&self.slot).release(generation);
                tracing::warn!(error = %e, "Failed to start agent process");
                Err(e)
            }
        }
    }

    async fn launch(
        &self,
        generation: u64,
        request: &ProcessRequest,
        callbacks: Arc<dyn ProcessCallbacks>,
    ) -> Result<Option<u32>, SupervisorError> {
        let env = self.resolver.resolve().await?;

        if !lock(&self.slot).is_starting(generation) {
            return Err(SupervisorError::Cancelled);
        }

        let executable = env
            .executable_path
            .clone()
            .ok_or(SupervisorError::ExecutableNotFound)?;
        let args = build_args(request, None);
        tracing::debug!(args = ?args, "Built agent arguments");

        let mut process = ClaudeProcess::spawn(&executable, &args, &env, request)?;
        let pid = process.id();
        let stdin = process.take_stdin();
        let stdout = process.take_stdout();
        let stderr = process.take_stderr();
        let mut child = process.into_child();

        let (Some(stdin), Some(stdout), Some(stderr)) = (stdin, stdout, stderr) else {
            if let Err(e) = child.start_kill() {
                tracing::debug!(error = %e, "Kill after missing pipe failed");
            }
            discard(child);
            return Err(SpawnError::MissingPipe("stdio").into());
        };

        let (kill_tx, kill_rx) = mpsc::unbounded_channel();
        let handle = Arc::new(ChildHandle {
            exited: AtomicBool::new(false),
            kill_tx,
        });
        let active = ActiveProcess {
            pid,
            handle: Arc::clone(&handle),
        };

        if lock(&self.slot).attach(generation, active).is_err() {
            tracing::info!(pid = ?pid, "Stopped while starting, discarding process");
            if let Err(e) = child.start_kill() {
                tracing::debug!(error = %e, "Kill after cancelled start failed");
            }
            discard(child);
            return Err(SupervisorError::Cancelled);
        }

        let context = Arc::new(ProcessContext {
            generation,
            slot: Arc::clone(&self.slot),
            usage: Arc::clone(&self.usage),
            callbacks: Arc::clone(&callbacks),
            handle,
        });
        tokio::spawn(supervise(child, stdout, stderr, kill_rx, context));

        if let Err(e) = write_message(stdin, request.message()).await {
            tracing::warn!(pid = ?pid, error = %e, "Failed to write message to stdin");
            callbacks.on_error(ErrorEvent::Process(format!(
                "Failed to write message to stdin: {e}"
            )));
        }

        Ok(pid)
    }

    /// Stop the current process, if any.
    ///
    /// The slot is cleared before termination begins, so a new `start` is
    /// accepted immediately and a late close cannot clean up twice. Returns
    /// `None` when there was nothing running. Must be called from within a
    /// tokio runtime.
    pub fn stop(&self) -> Option<TerminationOutcome> {
        let (previous, active) = lock(&self.slot).clear();

        let Some(active) = active else {
            if previous == SupervisorState::Starting {
                tracing::info!("Stop requested while starting, start will be cancelled");
            }
            return None;
        };

        let process: Arc<dyn ProcessRef> = active.handle;
        let outcome = self.strategy.terminate(active.pid, Some(process));
        tracing::info!(
            pid = ?active.pid,
            signal = ?outcome.signal_sent,
            forced = outcome.forced,
            error = ?outcome.error,
            "Stopping agent process"
        );
        Some(outcome)
    }

    /// Get the current state.
    #[must_use]
    pub fn state(&self) -> SupervisorState {
        lock(&self.slot).state()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state() != SupervisorState::Idle
    }

    /// Process id of the running process, if any.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        lock(&self.slot).process().and_then(|active| active.pid)
    }

    /// Usage totals for the current session.
    #[must_use]
    pub fn totals(&self) -> UsageTotals {
        lock(&self.usage).totals()
    }

    /// Session id captured from the last final result.
    #[must_use]
    pub fn session_id(&self) -> Option<String> {
        lock(&self.usage).session_id().map(ToString::to_string)
    }

    /// Start a new session: zero usage and forget the session id.
    pub fn new_session(&self) {
        tracing::debug!("Resetting session usage");
        lock(&self.usage).reset();
    }
}

impl std::fmt::Debug for ProcessSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessSupervisor")
            .field("state", &self.state())
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

/// Reap a child we no longer supervise.
fn discard(mut child: Child) {
    tokio::spawn(async move {
        let _ = child.wait().await;
    });
}

/// Shared state of one supervised process.
struct ProcessContext {
    generation: u64,
    slot: Slot,
    usage: Arc<Mutex<UsageAccumulator>>,
    callbacks: Arc<dyn ProcessCallbacks>,
    handle: Arc<ChildHandle>,
}

impl ProcessContext {
    fn dispatch(&self, stream: StreamId, event: DecodedEvent) {
        match stream {
            StreamId::Stdout => {
                for semantic in EventClassifier::classify_decoded(&event) {
                    self.record_usage(&semantic);
                    self.callbacks.on_data(semantic);
                }
            }
            StreamId::Stderr => self.callbacks.on_error(ErrorEvent::Stderr(event)),
        }
    }

    fn record_usage(&self, event: &SemanticEvent) {
        match event {
            SemanticEvent::TokenUpdate(usage) => lock(&self.usage).apply_token_update(usage),
            SemanticEvent::FinalResult(result) => lock(&self.usage).apply_final_result(result),
            _ => {}
        }
    }
}

/// Wait for the child, then close out once both streams are drained.
async fn supervise(
    mut child: Child,
    stdout: ChildStdout,
    stderr: ChildStderr,
    mut kill_rx: UnboundedReceiver<()>,
    context: Arc<ProcessContext>,
) {
    let out = tokio::spawn(pump(stdout, StreamId::Stdout, Arc::clone(&context)));
    let err = tokio::spawn(pump(stderr, StreamId::Stderr, Arc::clone(&context)));

    let status = loop {
        tokio::select! {
            status = child.wait() => break status,
            Some(()) = kill_rx.recv() => {
                if let Err(e) = child.start_kill() {
                    tracing::debug!(error = %e, "Direct kill failed");
                }
            }
        }
    };
    context.handle.exited.store(true, Ordering::Release);

    // Flushed remainders must be delivered before close.
    for task in [out, err] {
        if let Err(e) = task.await {
            tracing::warn!(error = %e, "Stream reader task failed");
        }
    }

    let exit_code = match status {
        Ok(status) => {
            tracing::info!(code = ?status.code(), "Agent process exited");
            status.code()
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to wait for agent process");
            context
                .callbacks
                .on_error(ErrorEvent::Process(format!("Failed to wait for process: {e}")));
            None
        }
    };

    lock(&context.slot).release(context.generation);
    context.callbacks.on_close(exit_code);
}

/// Read one stream to EOF, decoding as bytes arrive.
async fn pump<R>(mut reader: R, stream: StreamId, context: Arc<ProcessContext>)
where
    R: AsyncRead + Unpin,
{
    let mut decoder = StreamDecoder::new();
    let mut buf = vec![0u8; READ_CHUNK_SIZE];

    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                for event in decoder.feed(stream, &buf[..n]) {
                    context.dispatch(stream, event);
                }
            }
            Err(e) => {
                tracing::warn!(%stream, error = %e, "Failed to read process output");
                context
                    .callbacks
                    .on_error(ErrorEvent::Process(format!("Failed to read {stream}: {e}")));
                break;
            }
        }
    }

    if let Some(event) = decoder.flush(stream) {
        context.dispatch(stream, event);
    }
    tracing::debug!(%stream, "Stream closed");
}
