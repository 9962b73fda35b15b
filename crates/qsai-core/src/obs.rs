//! Structured observability hooks for decision-cycle lifecycle events.
//!
//! This module provides:
//! - Cycle-scoped tracing spans via `CycleSpan` RAII guard
//! - Emission functions for key lifecycle events: start, collection,
//!   rejection, fallback, decision, audit retry, outcome
//!
//! Events are emitted at `info!` level (configurable via `RUST_LOG`).

use tracing::info;

/// RAII guard that enters a cycle-scoped tracing span for the duration
/// of one decision cycle.
///
/// # Example
///
/// ```ignore
/// let _span = CycleSpan::enter("d-12345", "subject-7");
/// // all tracing calls now carry decision_id and subject
/// ```
pub struct CycleSpan {
    _span: tracing::span::EnteredSpan,
}

impl CycleSpan {
    /// Create and enter a span tagged with the decision id and subject.
    pub fn enter(decision_id: &str, subject: &str) -> Self {
        let span = tracing::info_span!("qsai.cycle", decision_id = %decision_id, subject = %subject);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: decision cycle started for a subject.
pub fn emit_cycle_started(decision_id: &str, subject: &str, agent_count: usize) {
    info!(event = "cycle.started", decision_id = %decision_id, subject = %subject, agent_count = agent_count);
}

/// Emit event: proposal collection round finished.
pub fn emit_proposals_collected(
    decision_id: &str,
    proposal_count: usize,
    timeouts: usize,
    failures: usize,
) {
    info!(
        event = "cycle.proposals_collected",
        decision_id = %decision_id,
        proposal_count = proposal_count,
        timeouts = timeouts,
        failures = failures,
    );
}

/// Emit event: the arbiter rejected a proposal.
pub fn emit_proposal_rejected(decision_id: &str, action_id: &str, rule_id: &str) {
    info!(event = "arbiter.proposal_rejected", decision_id = %decision_id, action_id = %action_id, rule_id = %rule_id);
}

/// Emit event: cycle finished with a decision.
pub fn emit_cycle_decided(
    decision_id: &str,
    duration_ms: u64,
    selected: usize,
    solver: &str,
    audit_seq: u64,
) {
    info!(
        event = "cycle.decided",
        decision_id = %decision_id,
        duration_ms = duration_ms,
        selected = selected,
        solver = %solver,
        audit_seq = audit_seq,
    );
}

/// Emit event: an audit append attempt failed and will be retried
/// (warning level).
pub fn emit_audit_append_retry(decision_id: &str, attempt: u32, error: &dyn std::fmt::Display) {
    tracing::warn!(event = "audit.append_retry", decision_id = %decision_id, attempt = attempt, error = %error);
}

/// Emit event: an outcome report was recorded against a decision.
pub fn emit_outcome_recorded(decision_id: &str, realized_value: f64, success: bool) {
    info!(
        event = "feedback.outcome_recorded",
        decision_id = %decision_id,
        realized_value = realized_value,
        success = success,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_span_create() {
        // Just ensure CycleSpan::enter doesn't panic
        let _span = CycleSpan::enter("test-decision-id", "test-subject");
    }
}
