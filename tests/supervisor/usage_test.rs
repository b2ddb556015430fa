//! Tests for session usage accounting.

use claude_bridge::cli::{EventClassifier, SemanticEvent};
use claude_bridge::supervisor::{UsageAccumulator, UsageTotals};
use serde_json::json;

fn apply(acc: &mut UsageAccumulator, value: &serde_json::Value) {
    for event in EventClassifier::classify_all(value) {
        match event {
            SemanticEvent::TokenUpdate(usage) => acc.apply_token_update(&usage),
            SemanticEvent::FinalResult(result) => acc.apply_final_result(&result),
            _ => {}
        }
    }
}

fn assistant(input: u64, output: u64) -> serde_json::Value {
    json!({
        "type": "assistant",
        "message": {
            "content": [{"type": "text", "text": "..."}],
            "usage": {"input_tokens": input, "output_tokens": output},
        },
    })
}

#[test]
fn totals_never_decrease_over_a_session() {
    let stream = [
        assistant(100, 10),
        assistant(100, 25),
        json!({"type": "result", "session_id": "s1", "total_cost_usd": 0.02}),
        assistant(40, 5),
        json!({"type": "result", "session_id": "s2", "total_cost_usd": 0.01,
               "usage": {"input_tokens": 30, "output_tokens": 2}}),
        assistant(7, 1),
    ];

    let mut acc = UsageAccumulator::new();
    let mut previous = UsageTotals::default();
    for value in &stream {
        apply(&mut acc, value);
        let totals = acc.totals();
        assert!(totals.total_input_tokens >= previous.total_input_tokens);
        assert!(totals.total_output_tokens >= previous.total_output_tokens);
        assert!(totals.total_cost >= previous.total_cost);
        assert!(totals.request_count >= previous.request_count);
        previous = totals;
    }

    assert_eq!(previous.request_count, 2);
    assert_eq!(previous.total_input_tokens, 100 + 40 + 7);
    assert_eq!(previous.total_output_tokens, 25 + 5 + 1);
    assert!((previous.total_cost - 0.03).abs() < 1e-9);
    assert_eq!(acc.session_id(), Some("s2"));
}

#[test]
fn negative_cost_does_not_reduce_total() {
    let mut acc = UsageAccumulator::new();
    apply(
        &mut acc,
        &json!({"type": "result", "session_id": "s", "total_cost_usd": 0.5}),
    );
    apply(
        &mut acc,
        &json!({"type": "result", "session_id": "s", "total_cost_usd": -3.0}),
    );
    assert!((acc.totals().total_cost - 0.5).abs() < f64::EPSILON);
    assert_eq!(acc.totals().request_count, 2);
}

#[test]
fn reset_starts_a_new_session() {
    let mut acc = UsageAccumulator::new();
    apply(&mut acc, &assistant(5, 5));
    apply(
        &mut acc,
        &json!({"type": "result", "session_id": "s", "total_cost_usd": 0.1}),
    );
    acc.reset();
    assert_eq!(acc.totals(), UsageTotals::default());
    assert_eq!(acc.session_id(), None);
}
