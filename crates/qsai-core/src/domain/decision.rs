//! Composite decisions produced by one cycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use qsai_state::ContentDigest;

/// Sentinel action id for cycles where nothing was selected.
pub const NO_ACTION: &str = "no-action";

/// Which solver path produced the selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "path", rename_all = "snake_case")]
pub enum SolverPath {
    /// Zero or one surviving proposal; no solver was invoked.
    ShortCircuit,
    /// The configured primary solver produced the selection.
    Primary { name: String },
    /// The classical fallback ran after a primary error, timeout, or
    /// low-quality result.
    Fallback,
}

impl SolverPath {
    /// Solver identity string recorded in the audit entry.
    pub fn identity(&self) -> String {
        match self {
            SolverPath::ShortCircuit => "short-circuit".to_string(),
            SolverPath::Primary { name } => name.clone(),
            SolverPath::Fallback => "fallback".to_string(),
        }
    }
}

/// The terminal output of one decision cycle. Immutable once dispatched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Unique decision identifier.
    pub id: String,
    /// Subject the cycle ran for.
    pub subject: String,
    /// Selected action ids; `[NO_ACTION]` when nothing was selected.
    pub action_ids: Vec<String>,
    /// Digests of the contributing proposals, in registration order.
    pub contributing: Vec<ContentDigest>,
    /// Aggregate expected value of the selected set.
    pub expected_value: f64,
    /// Mean confidence of the selected proposals (0 for no-action).
    pub confidence: f64,
    /// Which solver path produced the selection.
    pub solver: SolverPath,
    /// When the decision was made.
    pub decided_at: DateTime<Utc>,
}

impl Decision {
    /// The sentinel decision for a cycle with no surviving proposals.
    pub fn no_action(subject: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            subject: subject.into(),
            action_ids: vec![NO_ACTION.to_string()],
            contributing: Vec::new(),
            expected_value: 0.0,
            confidence: 0.0,
            solver: SolverPath::ShortCircuit,
            decided_at: Utc::now(),
        }
    }

    /// Whether this is the no-action sentinel.
    pub fn is_no_action(&self) -> bool {
        self.contributing.is_empty()
    }
}
