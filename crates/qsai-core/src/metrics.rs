//! Global atomic counters for decision-cycle observability.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. at the end of a batch of cycles).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters — no allocations, no locking.
pub struct Metrics {
    cycles_completed: AtomicU64,
    agent_timeouts: AtomicU64,
    agent_failures: AtomicU64,
    proposals_rejected: AtomicU64,
    solver_fallbacks: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            cycles_completed: AtomicU64::new(0),
            agent_timeouts: AtomicU64::new(0),
            agent_failures: AtomicU64::new(0),
            proposals_rejected: AtomicU64::new(0),
            solver_fallbacks: AtomicU64::new(0),
        }
    }

    /// Increment the cycles-completed counter by one.
    pub fn inc_cycles_completed(&self) {
        self.cycles_completed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "cycles_completed", "counter incremented");
    }

    /// Increment the agent-timeouts counter by one.
    pub fn inc_agent_timeouts(&self) {
        self.agent_timeouts.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "agent_timeouts", "counter incremented");
    }

    /// Increment the agent-failures counter by one.
    pub fn inc_agent_failures(&self) {
        self.agent_failures.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "agent_failures", "counter incremented");
    }

    /// Increment the proposals-rejected counter by `n`.
    pub fn add_proposals_rejected(&self, n: u64) {
        self.proposals_rejected.fetch_add(n, Ordering::Relaxed);
        tracing::trace!(metric = "proposals_rejected", "counter incremented");
    }

    /// Increment the solver-fallbacks counter by one.
    pub fn inc_solver_fallbacks(&self) {
        self.solver_fallbacks.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "solver_fallbacks", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    ///
    /// Call this at natural boundaries (end of a batch, daemon tick,
    /// etc.) rather than on every increment.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            cycles_completed = self.cycles_completed(),
            agent_timeouts = self.agent_timeouts(),
            agent_failures = self.agent_failures(),
            proposals_rejected = self.proposals_rejected(),
            solver_fallbacks = self.solver_fallbacks(),
        );
    }

    /// Read the current cycles-completed count.
    pub fn cycles_completed(&self) -> u64 {
        self.cycles_completed.load(Ordering::Relaxed)
    }

    /// Read the current agent-timeouts count.
    pub fn agent_timeouts(&self) -> u64 {
        self.agent_timeouts.load(Ordering::Relaxed)
    }

    /// Read the current agent-failures count.
    pub fn agent_failures(&self) -> u64 {
        self.agent_failures.load(Ordering::Relaxed)
    }

    /// Read the current proposals-rejected count.
    pub fn proposals_rejected(&self) -> u64 {
        self.proposals_rejected.load(Ordering::Relaxed)
    }

    /// Read the current solver-fallbacks count.
    pub fn solver_fallbacks(&self) -> u64 {
        self.solver_fallbacks.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.cycles_completed.store(0, Ordering::Relaxed);
        self.agent_timeouts.store(0, Ordering::Relaxed);
        self.agent_failures.store(0, Ordering::Relaxed);
        self.proposals_rejected.store(0, Ordering::Relaxed);
        self.solver_fallbacks.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment() {
        let m = Metrics::new();
        assert_eq!(m.cycles_completed(), 0);
        m.inc_cycles_completed();
        m.inc_cycles_completed();
        assert_eq!(m.cycles_completed(), 2);

        m.inc_agent_timeouts();
        assert_eq!(m.agent_timeouts(), 1);

        m.add_proposals_rejected(3);
        assert_eq!(m.proposals_rejected(), 3);

        m.inc_solver_fallbacks();
        assert_eq!(m.solver_fallbacks(), 1);
    }

    #[test]
    fn reset_zeroes_all() {
        let m = Metrics::new();
        m.inc_cycles_completed();
        m.inc_agent_timeouts();
        m.inc_agent_failures();
        m.add_proposals_rejected(2);
        m.inc_solver_fallbacks();
        m.reset();
        assert_eq!(m.cycles_completed(), 0);
        assert_eq!(m.agent_timeouts(), 0);
        assert_eq!(m.agent_failures(), 0);
        assert_eq!(m.proposals_rejected(), 0);
        assert_eq!(m.solver_fallbacks(), 0);
    }
}
