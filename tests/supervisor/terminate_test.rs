//! Tests for termination strategies, using a paused clock.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use claude_bridge::supervisor::{
    ProcessRef, SignalEscalation, SignalSender, TerminationError, TerminationSignal,
    TerminationStrategy, TreeKill, GRACE_PERIOD,
};

#[derive(Debug, Default)]
struct RecordingSignals {
    sent: Mutex<Vec<(u32, TerminationSignal)>>,
    failing: Vec<TerminationSignal>,
}

impl RecordingSignals {
    fn failing(signals: &[TerminationSignal]) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failing: signals.to_vec(),
        }
    }

    fn sent(&self) -> Vec<(u32, TerminationSignal)> {
        self.sent.lock().unwrap().clone()
    }

    fn count(&self, signal: TerminationSignal) -> usize {
        self.sent().iter().filter(|(_, s)| *s == signal).count()
    }
}

impl SignalSender for RecordingSignals {
    fn signal(&self, pid: u32, signal: TerminationSignal) -> Result<(), TerminationError> {
        self.sent.lock().unwrap().push((pid, signal));
        if self.failing.contains(&signal) {
            return Err(TerminationError::Signal {
                pid,
                signal,
                reason: "ESRCH".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct FakeProcess {
    exited: AtomicBool,
    kills: AtomicUsize,
}

impl ProcessRef for FakeProcess {
    fn has_exited(&self) -> bool {
        self.exited.load(Ordering::SeqCst)
    }

    fn kill(&self) -> Result<(), TerminationError> {
        self.kills.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn handle(process: &Arc<FakeProcess>) -> Option<Arc<dyn ProcessRef>> {
    let process: Arc<dyn ProcessRef> = process.clone();
    Some(process)
}

async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    tokio::task::yield_now().await;
}

#[tokio::test(start_paused = true)]
async fn escalation_sends_one_forceful_after_grace_period() {
    let signals = Arc::new(RecordingSignals::default());
    let process = Arc::new(FakeProcess::default());
    let strategy = SignalEscalation::new(signals.clone());
    assert_eq!(strategy.grace(), GRACE_PERIOD);

    let outcome = strategy.terminate(Some(42), handle(&process));
    assert_eq!(outcome.signal_sent, Some(TerminationSignal::Graceful));
    assert!(!outcome.forced);
    assert!(outcome.error.is_none());
    assert_eq!(signals.sent(), vec![(42, TerminationSignal::Graceful)]);

    advance(1999).await;
    assert_eq!(signals.count(TerminationSignal::Forceful), 0);

    advance(2).await;
    assert_eq!(signals.count(TerminationSignal::Forceful), 1);

    advance(10_000).await;
    assert_eq!(signals.count(TerminationSignal::Forceful), 1);
    assert_eq!(process.kills.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn escalation_skips_forceful_when_process_exits_in_time() {
    let signals = Arc::new(RecordingSignals::default());
    let process = Arc::new(FakeProcess::default());
    let strategy = SignalEscalation::new(signals.clone());

    strategy.terminate(Some(7), handle(&process));
    advance(500).await;
    process.exited.store(true, Ordering::SeqCst);

    advance(3000).await;
    assert_eq!(signals.sent(), vec![(7, TerminationSignal::Graceful)]);
}

#[tokio::test(start_paused = true)]
async fn escalation_with_bare_pid_swallows_forceful_failure() {
    let signals = Arc::new(RecordingSignals::failing(&[TerminationSignal::Forceful]));
    let strategy = SignalEscalation::new(signals.clone());

    let outcome = strategy.terminate(Some(9), None);
    assert_eq!(outcome.signal_sent, Some(TerminationSignal::Graceful));

    advance(2500).await;
    assert_eq!(
        signals.sent(),
        vec![
            (9, TerminationSignal::Graceful),
            (9, TerminationSignal::Forceful)
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn escalation_kills_handle_when_forceful_fails() {
    let signals = Arc::new(RecordingSignals::failing(&[TerminationSignal::Forceful]));
    let process = Arc::new(FakeProcess::default());
    let strategy = SignalEscalation::new(signals.clone());

    strategy.terminate(Some(9), handle(&process));
    advance(2500).await;
    assert_eq!(process.kills.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn escalation_falls_back_to_direct_kill_when_graceful_fails() {
    let signals = Arc::new(RecordingSignals::failing(&[TerminationSignal::Graceful]));
    let process = Arc::new(FakeProcess::default());
    let strategy = SignalEscalation::new(signals.clone());

    let outcome = strategy.terminate(Some(3), handle(&process));
    assert_eq!(outcome.signal_sent, Some(TerminationSignal::DirectKill));
    assert!(outcome.forced);
    assert!(outcome.error.is_some());
    assert_eq!(process.kills.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn escalation_without_pid_uses_handle() {
    let signals = Arc::new(RecordingSignals::default());
    let process = Arc::new(FakeProcess::default());
    let strategy = SignalEscalation::new(signals.clone());

    let outcome = strategy.terminate(None, handle(&process));
    assert_eq!(outcome.signal_sent, Some(TerminationSignal::DirectKill));
    assert!(signals.sent().is_empty());
    assert_eq!(process.kills.load(Ordering::SeqCst), 1);
}

#[test]
fn tree_kill_issues_single_signal() {
    let signals = Arc::new(RecordingSignals::default());
    let process = Arc::new(FakeProcess::default());
    let strategy = TreeKill::new(signals.clone());

    let outcome = strategy.terminate(Some(11), handle(&process));
    assert_eq!(outcome.signal_sent, Some(TerminationSignal::TreeKill));
    assert!(!outcome.forced);
    assert_eq!(signals.sent(), vec![(11, TerminationSignal::TreeKill)]);
    assert_eq!(process.kills.load(Ordering::SeqCst), 0);
}

#[test]
fn tree_kill_failure_falls_back_to_direct_kill() {
    let signals = Arc::new(RecordingSignals::failing(&[TerminationSignal::TreeKill]));
    let process = Arc::new(FakeProcess::default());
    let strategy = TreeKill::new(signals.clone());

    let outcome = strategy.terminate(Some(11), handle(&process));
    assert_eq!(outcome.signal_sent, Some(TerminationSignal::DirectKill));
    assert!(outcome.forced);
    assert!(outcome.error.unwrap().contains("ESRCH"));
    assert_eq!(process.kills.load(Ordering::SeqCst), 1);
}

#[test]
fn nothing_to_terminate_reports_error() {
    let strategy = TreeKill::new(Arc::new(RecordingSignals::default()));
    let outcome = strategy.terminate(None, None);
    assert_eq!(outcome.signal_sent, None);
    assert!(!outcome.forced);
    assert_eq!(outcome.error.as_deref(), Some("Nothing to terminate"));
}

#[tokio::test]
async fn exited_process_is_never_signaled_by_pid() {
    let signals = Arc::new(RecordingSignals::default());
    let process = Arc::new(FakeProcess::default());
    process.exited.store(true, Ordering::SeqCst);

    let strategies: [Box<dyn TerminationStrategy>; 2] = [
        Box::new(SignalEscalation::new(signals.clone())),
        Box::new(TreeKill::new(signals.clone())),
    ];
    for strategy in strategies {
        let outcome = strategy.terminate(Some(5), handle(&process));
        assert_eq!(outcome.signal_sent, None);
        assert!(!outcome.forced);
        assert_eq!(
            outcome.error.as_deref(),
            Some("Process handle no longer available")
        );
    }

    assert!(signals.sent().is_empty());
    assert_eq!(process.kills.load(Ordering::SeqCst), 0);
}
