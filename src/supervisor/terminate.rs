//! Platform-aware process termination.
//!
//! Two strategies: a single forced kill of the whole process tree, or a
//! graceful signal followed by a forceful one after [`GRACE_PERIOD`].
//! Neither blocks the caller; the forceful follow-up runs on a spawned task.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::environment::ProcessModel;

/// Delay between the graceful and the forceful signal.
pub const GRACE_PERIOD: Duration = Duration::from_millis(2000);

/// What was sent to the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationSignal {
    /// Cooperative shutdown request (SIGTERM).
    Graceful,
    /// Unconditional kill (SIGKILL).
    Forceful,
    /// Forced recursive kill of the process tree.
    TreeKill,
    /// Kill through the in-memory process handle.
    DirectKill,
}

impl fmt::Display for TerminationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Graceful => "graceful",
            Self::Forceful => "forceful",
            Self::TreeKill => "tree-kill",
            Self::DirectKill => "direct-kill",
        };
        f.write_str(name)
    }
}

/// Result of a termination attempt. Informational only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminationOutcome {
    /// The first signal that was issued. `None` when nothing was sent.
    pub signal_sent: Option<TerminationSignal>,
    /// Whether the process was killed directly after signaling failed.
    pub forced: bool,
    /// The signaling failure, if any.
    pub error: Option<String>,
}

/// Error type for termination operations.
#[derive(thiserror::Error, Debug)]
pub enum TerminationError {
    /// Sending a signal failed.
    #[error("Failed to send {signal} signal to process {pid}: {reason}")]
    Signal {
        pid: u32,
        signal: TerminationSignal,
        reason: String,
    },
    /// Issuing the tree kill failed.
    #[error("Failed to kill process tree {pid}: {reason}")]
    TreeKill { pid: u32, reason: String },
    /// The in-memory process handle is gone.
    #[error("Process handle no longer available")]
    ProcessGone,
    /// Neither a pid nor a handle was available.
    #[error("Nothing to terminate")]
    NothingToTerminate,
}

/// Live handle to a running child.
pub trait ProcessRef: Send + Sync + fmt::Debug {
    /// Whether the process has exited.
    fn has_exited(&self) -> bool;

    /// Kill the process through its handle.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle can no longer reach the process.
    fn kill(&self) -> Result<(), TerminationError>;
}

/// OS-level signal delivery by pid.
pub trait SignalSender: Send + Sync + fmt::Debug {
    /// Deliver `signal` to `pid`.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS rejects the signal.
    fn signal(&self, pid: u32, signal: TerminationSignal) -> Result<(), TerminationError>;
}

/// Signals delivered through the host OS.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsSignals;

#[cfg(unix)]
impl SignalSender for OsSignals {
    fn signal(&self, pid: u32, signal: TerminationSignal) -> Result<(), TerminationError> {
        use nix::sys::signal::{kill, killpg, Signal};
        use nix::unistd::Pid;

        let raw = i32::try_from(pid).map_err(|e| TerminationError::Signal {
            pid,
            signal,
            reason: e.to_string(),
        })?;
        let nix_pid = Pid::from_raw(raw);

        // Children lead their own process group, so group signals reach
        // grandchildren too. Plain `kill` covers processes spawned elsewhere.
        let group = |sig: Signal| killpg(nix_pid, sig).or_else(|_| kill(nix_pid, sig));
        let result = match signal {
            TerminationSignal::Graceful => group(Signal::SIGTERM),
            TerminationSignal::Forceful | TerminationSignal::TreeKill => group(Signal::SIGKILL),
            TerminationSignal::DirectKill => kill(nix_pid, Signal::SIGKILL),
        };

        result.map_err(|errno| match signal {
            TerminationSignal::TreeKill => TerminationError::TreeKill {
                pid,
                reason: errno.to_string(),
            },
            _ => TerminationError::Signal {
                pid,
                signal,
                reason: errno.to_string(),
            },
        })
    }
}

#[cfg(windows)]
impl SignalSender for OsSignals {
    fn signal(&self, pid: u32, signal: TerminationSignal) -> Result<(), TerminationError> {
        let pid_arg = pid.to_string();
        let mut args = vec!["/pid", pid_arg.as_str(), "/T"];
        if signal != TerminationSignal::Graceful {
            args.push("/F");
        }

        std::process::Command::new("taskkill")
            .args(&args)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
            .map(drop)
            .map_err(|e| TerminationError::TreeKill {
                pid,
                reason: e.to_string(),
            })
    }
}

/// A way of terminating the supervised process.
pub trait TerminationStrategy: Send + Sync + fmt::Debug {
    /// Begin terminating the process. Returns after the first signal.
    fn terminate(
        &self,
        pid: Option<u32>,
        process: Option<Arc<dyn ProcessRef>>,
    ) -> TerminationOutcome;
}

/// Pick the strategy for a process model.
#[must_use]
pub fn strategy_for(model: ProcessModel) -> Arc<dyn TerminationStrategy> {
    let signals: Arc<dyn SignalSender> = Arc::new(OsSignals);
    match model {
        ProcessModel::ProcessTree => Arc::new(TreeKill::new(signals)),
        ProcessModel::Posix => Arc::new(SignalEscalation::new(signals)),
    }
}

/// Kill the entire process tree in one forced step.
#[derive(Debug, Clone)]
pub struct TreeKill {
    signals: Arc<dyn SignalSender>,
}

impl TreeKill {
    #[must_use]
    pub fn new(signals: Arc<dyn SignalSender>) -> Self {
        Self { signals }
    }
}

impl TerminationStrategy for TreeKill {
    fn terminate(
        &self,
        pid: Option<u32>,
        process: Option<Arc<dyn ProcessRef>>,
    ) -> TerminationOutcome {
        if let Some(outcome) = already_exited(process.as_deref()) {
            return outcome;
        }

        let error = match pid {
            Some(pid) => match self.signals.signal(pid, TerminationSignal::TreeKill) {
                Ok(()) => {
                    tracing::debug!(pid, "Issued process tree kill");
                    return TerminationOutcome {
                        signal_sent: Some(TerminationSignal::TreeKill),
                        forced: false,
                        error: None,
                    };
                }
                Err(e) => e,
            },
            None => TerminationError::NothingToTerminate,
        };

        tracing::warn!(pid = ?pid, error = %error, "Tree kill failed, killing handle directly");
        direct_kill(process.as_deref(), TerminationSignal::TreeKill, &error)
    }
}

/// Graceful signal, then a forceful one if the process outlives the grace
/// period.
#[derive(Debug, Clone)]
pub struct SignalEscalation {
    signals: Arc<dyn SignalSender>,
    grace: Duration,
}

impl SignalEscalation {
    #[must_use]
    pub fn new(signals: Arc<dyn SignalSender>) -> Self {
        Self {
            signals,
            grace: GRACE_PERIOD,
        }
    }

    /// The delay before the forceful signal.
    #[must_use]
    pub fn grace(&self) -> Duration {
        self.grace
    }

    fn schedule_forceful(&self, pid: u32, process: Option<Arc<dyn ProcessRef>>) {
        let signals = Arc::clone(&self.signals);
        let grace = self.grace;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;

            if process.as_ref().is_some_and(|p| p.has_exited()) {
                tracing::debug!(pid, "Process exited within grace period");
                return;
            }

            match signals.signal(pid, TerminationSignal::Forceful) {
                Ok(()) => tracing::debug!(pid, "Sent forceful signal after grace period"),
                Err(e) => {
                    // Most likely the process already exited.
                    tracing::debug!(pid, error = %e, "Forceful signal failed");
                    if let Some(Err(e)) = process.map(|p| p.kill()) {
                        tracing::debug!(pid, error = %e, "Direct kill after grace period failed");
                    }
                }
            }
        });
    }
}

impl TerminationStrategy for SignalEscalation {
    /// Must be called from within a tokio runtime.
    fn terminate(
        &self,
        pid: Option<u32>,
        process: Option<Arc<dyn ProcessRef>>,
    ) -> TerminationOutcome {
        if let Some(outcome) = already_exited(process.as_deref()) {
            return outcome;
        }

        let Some(pid) = pid else {
            return direct_kill(
                process.as_deref(),
                TerminationSignal::Graceful,
                &TerminationError::NothingToTerminate,
            );
        };

        match self.signals.signal(pid, TerminationSignal::Graceful) {
            Ok(()) => {
                tracing::debug!(pid, grace_ms = ?self.grace.as_millis(), "Sent graceful signal");
                self.schedule_forceful(pid, process);
                TerminationOutcome {
                    signal_sent: Some(TerminationSignal::Graceful),
                    forced: false,
                    error: None,
                }
            }
            Err(e) => {
                tracing::warn!(pid, error = %e, "Graceful signal failed, killing handle directly");
                direct_kill(process.as_deref(), TerminationSignal::Graceful, &e)
            }
        }
    }
}

/// A reaped child's pid may already belong to another process, so nothing
/// is signaled once the handle reports an exit.
fn already_exited(process: Option<&dyn ProcessRef>) -> Option<TerminationOutcome> {
    if !process.is_some_and(|p| p.has_exited()) {
        return None;
    }
    tracing::debug!("Process already exited, not signaling");
    Some(TerminationOutcome {
        signal_sent: None,
        forced: false,
        error: Some(TerminationError::ProcessGone.to_string()),
    })
}

/// Fallback after signaling failed. Errors here are swallowed.
fn direct_kill(
    process: Option<&dyn ProcessRef>,
    attempted: TerminationSignal,
    cause: &TerminationError,
) -> TerminationOutcome {
    let Some(process) = process else {
        tracing::debug!(signal = %attempted, "No handle to fall back on");
        return TerminationOutcome {
            signal_sent: None,
            forced: false,
            error: Some(cause.to_string()),
        };
    };

    if let Err(e) = process.kill() {
        tracing::debug!(error = %e, "Direct kill failed, process presumed dead");
    }
    TerminationOutcome {
        signal_sent: Some(TerminationSignal::DirectKill),
        forced: true,
        error: Some(cause.to_string()),
    }
}
