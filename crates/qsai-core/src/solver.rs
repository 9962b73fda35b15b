//! Combinatorial selection: QUBO-style matrix and the solver interface.
//!
//! Proposal selection is framed as minimizing `x' Q x` over binary
//! selection vectors `x`. The diagonal encodes per-proposal reward
//! (negated, so better proposals are more negative); off-diagonal terms
//! carry a large positive penalty for mutually exclusive pairs, forcing
//! at most one selection per slot.
//!
//! Penalty convention: `penalty = 2 * max_single_reward + 1`, where
//! `max_single_reward = max(0, max_i(-Q[i][i]))`. A pair violating
//! exclusivity therefore always scores worse than either member alone,
//! so no solver — exact or heuristic — can profit from a violation.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::AgentProposal;

/// Exhaustive enumeration limit for the classical solver; above this the
/// slot-aware greedy method runs instead.
pub const EXACT_LIMIT: usize = 16;

// ---------------------------------------------------------------------------
// SelectionMatrix
// ---------------------------------------------------------------------------

/// Square QUBO-style matrix over one cycle's filtered proposals.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionMatrix {
    n: usize,
    /// Row-major `n * n` coefficients.
    q: Vec<f64>,
    /// The exclusivity penalty used for off-diagonal terms.
    penalty: f64,
}

impl SelectionMatrix {
    /// Build the matrix for the given proposals.
    ///
    /// `weights[i]` scales proposal `i`'s expected value (the feedback
    /// loop's agent weighting); pass `1.0` for unweighted selection.
    /// `Q[i][i] = -(weights[i] * expected_value) + cost_weight * cost`;
    /// `Q[i][j] = penalty` when `i != j` and the proposals share a slot.
    pub fn build(proposals: &[AgentProposal], weights: &[f64], cost_weight: f64) -> Self {
        debug_assert_eq!(proposals.len(), weights.len());
        let n = proposals.len();
        let mut q = vec![0.0; n * n];

        for (i, proposal) in proposals.iter().enumerate() {
            q[i * n + i] = -(weights[i] * proposal.expected_value) + cost_weight * proposal.cost;
        }

        let max_single_reward = (0..n)
            .map(|i| -q[i * n + i])
            .fold(0.0_f64, f64::max)
            .max(0.0);
        let penalty = 2.0 * max_single_reward + 1.0;

        for i in 0..n {
            for j in (i + 1)..n {
                if proposals[i].slot_key() == proposals[j].slot_key() {
                    q[i * n + j] = penalty;
                    q[j * n + i] = penalty;
                }
            }
        }

        Self { n, q, penalty }
    }

    /// Number of proposals (matrix dimension).
    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Coefficient at `(i, j)`.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.q[i * self.n + j]
    }

    /// The exclusivity penalty this matrix was built with.
    pub fn penalty(&self) -> f64 {
        self.penalty
    }

    /// Objective value of a selection: `Σ x_i Q_ii + Σ_{i<j} x_i x_j (Q_ij + Q_ji)`.
    pub fn objective(&self, selection: &[bool]) -> f64 {
        let mut total = 0.0;
        for i in 0..self.n {
            if !selection[i] {
                continue;
            }
            total += self.get(i, i);
            for j in (i + 1)..self.n {
                if selection[j] {
                    total += self.get(i, j) + self.get(j, i);
                }
            }
        }
        total
    }

    /// Whether a selection violates any exclusivity constraint.
    pub fn violates_exclusivity(&self, selection: &[bool]) -> bool {
        for i in 0..self.n {
            if !selection[i] {
                continue;
            }
            for j in (i + 1)..self.n {
                if selection[j] && self.get(i, j) > 0.0 {
                    return true;
                }
            }
        }
        false
    }
}

// ---------------------------------------------------------------------------
// Solver interface
// ---------------------------------------------------------------------------

/// Errors a solver backend may surface. Either triggers the classical
/// fallback; neither reaches the caller.
#[derive(Debug, thiserror::Error)]
pub enum SolverError {
    #[error("solver timed out")]
    Timeout,

    #[error("solver backend error: {0}")]
    Backend(String),
}

/// A solver's answer: which proposals to select, plus a quality
/// indicator in [0, 1] (1.0 = provably optimal or equivalent).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverOutcome {
    pub selection: Vec<bool>,
    pub quality: f64,
}

/// Pluggable solver interface.
///
/// The classical solver must always be available as the guaranteed
/// fallback; any additional backend (including an external
/// quantum-style optimization service) is optional and interchangeable
/// through this same interface.
#[async_trait]
pub trait Solver: Send + Sync {
    /// Solver identity recorded on decisions and audit entries.
    fn name(&self) -> &str;

    /// Minimize over the matrix within the given budget.
    async fn solve(
        &self,
        matrix: &SelectionMatrix,
        timeout: Duration,
    ) -> Result<SolverOutcome, SolverError>;
}

// ---------------------------------------------------------------------------
// Classical solver (guaranteed fallback)
// ---------------------------------------------------------------------------

/// Deterministic classical solver: exhaustive up to [`EXACT_LIMIT`]
/// variables, slot-aware greedy beyond. Total — it never errors and
/// ignores the timeout budget (its work is bounded and in-process).
#[derive(Debug, Clone, Default)]
pub struct ClassicalSolver;

impl ClassicalSolver {
    pub fn new() -> Self {
        Self
    }

    /// Synchronous solve, also used directly by the controller's
    /// fallback path.
    pub fn solve_sync(&self, matrix: &SelectionMatrix) -> SolverOutcome {
        let selection = if matrix.len() <= EXACT_LIMIT {
            exhaustive(matrix)
        } else {
            greedy(matrix)
        };
        SolverOutcome {
            selection,
            quality: 1.0,
        }
    }
}

#[async_trait]
impl Solver for ClassicalSolver {
    fn name(&self) -> &str {
        "classical"
    }

    async fn solve(
        &self,
        matrix: &SelectionMatrix,
        _timeout: Duration,
    ) -> Result<SolverOutcome, SolverError> {
        Ok(self.solve_sync(matrix))
    }
}

/// Prefer `candidate` over `best` at equal objective when its first
/// differing index is selected — the subset containing the
/// earliest-registered proposal wins ties.
fn tie_break_prefers(candidate: &[bool], best: &[bool]) -> bool {
    for (c, b) in candidate.iter().zip(best.iter()) {
        if c != b {
            return *c;
        }
    }
    false
}

fn exhaustive(matrix: &SelectionMatrix) -> Vec<bool> {
    let n = matrix.len();
    let mut best = vec![false; n];
    let mut best_objective = 0.0; // empty selection

    for mask in 1_u32..(1 << n) {
        let selection: Vec<bool> = (0..n).map(|i| mask & (1 << i) != 0).collect();
        let objective = matrix.objective(&selection);
        if objective < best_objective
            || (objective == best_objective && tie_break_prefers(&selection, &best))
        {
            best_objective = objective;
            best = selection;
        }
    }
    best
}

fn greedy(matrix: &SelectionMatrix) -> Vec<bool> {
    let n = matrix.len();
    // Indices by ascending diagonal (best reward first); index order
    // breaks ties deterministically.
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        matrix
            .get(a, a)
            .partial_cmp(&matrix.get(b, b))
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });

    let mut selection = vec![false; n];
    for i in order {
        if matrix.get(i, i) >= 0.0 {
            break;
        }
        let conflicts = (0..n).any(|j| selection[j] && matrix.get(i, j) > 0.0);
        if !conflicts {
            selection[i] = true;
        }
    }
    selection
}

/// Map a weight-book lookup into the per-proposal weight slice
/// [`SelectionMatrix::build`] expects.
pub fn proposal_weights(
    proposals: &[AgentProposal],
    agent_weights: &HashMap<String, f64>,
) -> Vec<f64> {
    proposals
        .iter()
        .map(|p| agent_weights.get(&p.agent_id).copied().unwrap_or(1.0))
        .collect()
}
