//! Token and cost accounting across a session.

use serde::{Deserialize, Serialize};

use crate::cli::{FinalResult, TokenUsage};

/// Running totals for a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageTotals {
    /// Total cost in USD.
    pub total_cost: f64,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    /// Completed requests.
    pub request_count: u64,
}

/// Accumulates usage for a session.
///
/// Token updates report cumulative counts for the in-flight request, so they
/// replace the in-flight figures instead of adding to them. A final result
/// folds the in-flight figures into the committed totals.
#[derive(Debug, Clone, Default)]
pub struct UsageAccumulator {
    committed_input: u64,
    committed_output: u64,
    current: TokenUsage,
    total_cost: f64,
    request_count: u64,
    session_id: Option<String>,
}

impl UsageAccumulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the latest cumulative counts for the in-flight request.
    pub fn apply_token_update(&mut self, usage: &TokenUsage) {
        self.current = *usage;
        tracing::trace!(
            input = usage.input_tokens,
            output = usage.output_tokens,
            "Token update"
        );
    }

    /// Record a completed request.
    pub fn apply_final_result(&mut self, result: &FinalResult) {
        // The final report never lowers what was already observed.
        if let Some(usage) = &result.usage {
            self.current.input_tokens = self.current.input_tokens.max(usage.input_tokens);
            self.current.output_tokens = self.current.output_tokens.max(usage.output_tokens);
        }
        self.committed_input = self
            .committed_input
            .saturating_add(self.current.input_tokens);
        self.committed_output = self
            .committed_output
            .saturating_add(self.current.output_tokens);
        self.current = TokenUsage::default();

        self.total_cost += result.cost_usd.max(0.0);
        self.request_count = self.request_count.saturating_add(1);
        self.session_id = Some(result.session_id.clone());

        tracing::debug!(
            session_id = %result.session_id,
            cost_usd = result.cost_usd,
            requests = self.request_count,
            "Request completed"
        );
    }

    #[must_use]
    pub fn totals(&self) -> UsageTotals {
        UsageTotals {
            total_cost: self.total_cost,
            total_input_tokens: self
                .committed_input
                .saturating_add(self.current.input_tokens),
            total_output_tokens: self
                .committed_output
                .saturating_add(self.current.output_tokens),
            request_count: self.request_count,
        }
    }

    /// Session to resume from, captured from the last final result.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Zero all counters and forget the session.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
