//! Proposal collection: concurrent fan-out to agents, fan-in with a deadline.
//!
//! One collection round dispatches the cycle's context snapshot to every
//! registered agent as an independent Tokio task and joins them under a
//! single bounded deadline. Individual agent failure, panic, or timeout
//! is non-fatal: the agent simply contributes nothing for the cycle.
//! Stragglers are aborted cooperatively so they do not leak tasks.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::agent::AgentRegistry;
use crate::domain::{AgentProposal, ContextVector};
use crate::metrics::METRICS;

/// Outcome of one agent's participation in a collection round.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentOutcome {
    /// Responded in time with zero or more proposals.
    Responded { proposals: usize },
    /// Returned an error; excluded from the cycle.
    Failed { error: String },
    /// Neither responded nor errored by the deadline.
    TimedOut,
}

/// Result of one collection round.
#[derive(Debug, Clone)]
pub struct CollectionRound {
    /// All collected proposals, ordered by agent registration order
    /// (deterministic tie-breaking downstream depends on this).
    pub proposals: Vec<AgentProposal>,
    /// Per-agent outcomes, in registration order.
    pub outcomes: Vec<(String, AgentOutcome)>,
}

/// Dispatch `context` to every registered agent concurrently and join
/// with the given deadline.
///
/// A cycle with zero collected proposals is a valid result.
pub async fn collect(
    registry: &AgentRegistry,
    context: Arc<ContextVector>,
    deadline: Duration,
) -> CollectionRound {
    let mut handles = Vec::with_capacity(registry.len());
    for agent in registry.agents() {
        let agent = Arc::clone(agent);
        let context = Arc::clone(&context);
        let agent_id = agent.id().to_string();
        let handle = tokio::spawn(async move { agent.propose(&context).await });
        handles.push((agent_id, handle));
    }

    let mut proposals = Vec::new();
    let mut outcomes = Vec::with_capacity(handles.len());

    // One shared deadline for the round: each join waits only for the
    // time remaining, so the fan-in never exceeds `deadline` overall.
    let round_start = tokio::time::Instant::now();
    for (agent_id, mut handle) in handles {
        let remaining = deadline.saturating_sub(round_start.elapsed());
        let outcome = match tokio::time::timeout(remaining, &mut handle).await {
            Ok(Ok(Ok(mut agent_proposals))) => {
                let count = agent_proposals.len();
                proposals.append(&mut agent_proposals);
                AgentOutcome::Responded { proposals: count }
            }
            Ok(Ok(Err(err))) => {
                warn!(agent_id = %agent_id, error = %err, "agent failed, excluded from cycle");
                METRICS.inc_agent_failures();
                AgentOutcome::Failed {
                    error: err.to_string(),
                }
            }
            Ok(Err(join_err)) => {
                warn!(agent_id = %agent_id, error = %join_err, "agent task panicked, excluded from cycle");
                METRICS.inc_agent_failures();
                AgentOutcome::Failed {
                    error: join_err.to_string(),
                }
            }
            Err(_elapsed) => {
                // Cooperative cancellation: the straggler's task is aborted
                // rather than left running detached.
                handle.abort();
                warn!(agent_id = %agent_id, deadline_ms = deadline.as_millis() as u64, "agent missed deadline");
                METRICS.inc_agent_timeouts();
                AgentOutcome::TimedOut
            }
        };
        outcomes.push((agent_id, outcome));
    }

    CollectionRound {
        proposals,
        outcomes,
    }
}
