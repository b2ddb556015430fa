//! Supervisor module tests.

mod terminate_test;
mod usage_test;

/// Verify the public supervisor types are exported from the library.
#[test]
fn test_all_supervisor_types_exported() {
    use claude_bridge::supervisor::{
        ChannelCallbacks, ErrorEvent, ProcessSlot, SupervisorError, SupervisorEvent,
        SupervisorState, TerminationSignal, UsageAccumulator, GRACE_PERIOD,
    };

    let _ = ChannelCallbacks::new();
    let _: ProcessSlot<u32> = ProcessSlot::new();
    let _ = UsageAccumulator::new();
    let _: fn() -> SupervisorError = || SupervisorError::Cancelled;
    let _ = SupervisorEvent::Closed(None);
    let _ = ErrorEvent::Process(String::new());
    let _ = SupervisorState::Idle;
    let _ = TerminationSignal::Graceful;
    assert_eq!(GRACE_PERIOD.as_millis(), 2000);
}
