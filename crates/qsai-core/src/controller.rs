//! Meta controller: solver dispatch, fallback policy, and selection
//! aggregation.
//!
//! The controller depends only on the [`Solver`] interface, never on
//! solver identity: the optional primary backend can be absent entirely
//! without changing correctness. The solver call is the one operation in
//! a cycle allowed to suspend on an external system; it carries its own
//! timeout, and on error, timeout, or a low-quality result the
//! deterministic classical fallback runs synchronously in-process.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing::warn;

use crate::domain::{AgentProposal, SolverPath};
use crate::metrics::METRICS;
use crate::solver::{ClassicalSolver, SelectionMatrix, Solver, SolverOutcome};

/// Controller tuning knobs.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Weight applied to proposal cost on the matrix diagonal.
    pub cost_weight: f64,
    /// Budget for one primary solver call.
    pub solver_timeout: Duration,
    /// Primary results with quality below this trigger the fallback.
    pub quality_floor: f64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            cost_weight: 1.0,
            solver_timeout: Duration::from_millis(250),
            quality_floor: 0.5,
        }
    }
}

/// The controller's answer for one cycle.
#[derive(Debug, Clone)]
pub struct Selection {
    /// Indices of selected proposals (into the filtered list),
    /// ascending.
    pub indices: Vec<usize>,
    /// Sum of the selected proposals' expected values (unweighted —
    /// feedback weights steer selection, not reporting).
    pub expected_value: f64,
    /// Mean confidence of the selected proposals; 0 when none.
    pub confidence: f64,
    /// Which solver path produced this selection.
    pub path: SolverPath,
    /// Raw solver output snapshot for the audit entry.
    pub raw_output: serde_json::Value,
}

impl Selection {
    fn empty() -> Self {
        Self {
            indices: Vec::new(),
            expected_value: 0.0,
            confidence: 0.0,
            path: SolverPath::ShortCircuit,
            raw_output: json!({ "selection": [], "quality": 1.0 }),
        }
    }
}

/// Frames proposal selection as a combinatorial problem and resolves it
/// via the configured solver plus the guaranteed classical fallback.
pub struct MetaController {
    primary: Option<Arc<dyn Solver>>,
    fallback: ClassicalSolver,
    config: ControllerConfig,
}

impl MetaController {
    pub fn new(config: ControllerConfig) -> Self {
        Self {
            primary: None,
            fallback: ClassicalSolver::new(),
            config,
        }
    }

    /// Attach an optional primary solver (builder pattern).
    pub fn with_primary(mut self, solver: Arc<dyn Solver>) -> Self {
        self.primary = Some(solver);
        self
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Select the best non-conflicting subset of the filtered proposals.
    ///
    /// `weights[i]` scales proposal `i`'s expected value during
    /// selection. Zero proposals short-circuits to an empty selection;
    /// exactly one short-circuits without invoking any solver.
    pub async fn select(&self, proposals: &[AgentProposal], weights: &[f64]) -> Selection {
        match proposals.len() {
            0 => Selection::empty(),
            1 => Selection {
                indices: vec![0],
                expected_value: proposals[0].expected_value,
                confidence: proposals[0].confidence,
                path: SolverPath::ShortCircuit,
                raw_output: json!({ "selection": [true], "quality": 1.0 }),
            },
            _ => self.solve(proposals, weights).await,
        }
    }

    async fn solve(&self, proposals: &[AgentProposal], weights: &[f64]) -> Selection {
        let matrix = SelectionMatrix::build(proposals, weights, self.config.cost_weight);

        if let Some(primary) = &self.primary {
            match self.try_primary(primary.as_ref(), &matrix).await {
                Some(outcome) => {
                    return aggregate(
                        proposals,
                        &outcome,
                        SolverPath::Primary {
                            name: primary.name().to_string(),
                        },
                    );
                }
                None => METRICS.inc_solver_fallbacks(),
            }
        }

        let outcome = self.fallback.solve_sync(&matrix);
        aggregate(proposals, &outcome, SolverPath::Fallback)
    }

    /// One primary attempt. `None` means the fallback must run; the
    /// reason is logged here, not propagated.
    async fn try_primary(
        &self,
        primary: &dyn Solver,
        matrix: &SelectionMatrix,
    ) -> Option<SolverOutcome> {
        let budget = self.config.solver_timeout;
        // The outer timeout cancels a solver that ignores its budget;
        // dropping the future releases the call rather than abandoning it.
        let result = tokio::time::timeout(budget, primary.solve(matrix, budget)).await;

        let outcome = match result {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => {
                warn!(solver = primary.name(), error = %err, "primary solver failed, using fallback");
                return None;
            }
            Err(_elapsed) => {
                warn!(
                    solver = primary.name(),
                    timeout_ms = budget.as_millis() as u64,
                    "primary solver timed out, using fallback"
                );
                return None;
            }
        };

        if outcome.selection.len() != matrix.len() {
            warn!(
                solver = primary.name(),
                expected = matrix.len(),
                got = outcome.selection.len(),
                "primary solver returned malformed selection, using fallback"
            );
            return None;
        }
        if outcome.quality < self.config.quality_floor {
            warn!(
                solver = primary.name(),
                quality = outcome.quality,
                floor = self.config.quality_floor,
                "primary solver quality below floor, using fallback"
            );
            return None;
        }
        // The arbiter has the final word on safety; exclusivity is the
        // controller's own constraint and is enforced here even against
        // a confident primary.
        if matrix.violates_exclusivity(&outcome.selection) {
            warn!(
                solver = primary.name(),
                "primary solver violated exclusivity constraints, using fallback"
            );
            return None;
        }

        Some(outcome)
    }
}

fn aggregate(proposals: &[AgentProposal], outcome: &SolverOutcome, path: SolverPath) -> Selection {
    let indices: Vec<usize> = outcome
        .selection
        .iter()
        .enumerate()
        .filter_map(|(i, &s)| s.then_some(i))
        .collect();

    let expected_value = indices.iter().map(|&i| proposals[i].expected_value).sum();
    let confidence = if indices.is_empty() {
        0.0
    } else {
        indices.iter().map(|&i| proposals[i].confidence).sum::<f64>() / indices.len() as f64
    };

    Selection {
        indices,
        expected_value,
        confidence,
        path,
        raw_output: json!({
            "selection": outcome.selection,
            "quality": outcome.quality,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::SolverError;
    use async_trait::async_trait;

    /// Test double: answers with a fixed outcome.
    struct FixedSolver {
        outcome: SolverOutcome,
    }

    #[async_trait]
    impl Solver for FixedSolver {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn solve(
            &self,
            _matrix: &SelectionMatrix,
            _timeout: Duration,
        ) -> Result<SolverOutcome, SolverError> {
            Ok(self.outcome.clone())
        }
    }

    /// Test double: sleeps past any reasonable budget.
    struct SlowSolver;

    #[async_trait]
    impl Solver for SlowSolver {
        fn name(&self) -> &str {
            "slow"
        }

        async fn solve(
            &self,
            _matrix: &SelectionMatrix,
            _timeout: Duration,
        ) -> Result<SolverOutcome, SolverError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            unreachable!("cancelled by the controller's timeout")
        }
    }

    /// Test double: always errors.
    struct BrokenSolver;

    #[async_trait]
    impl Solver for BrokenSolver {
        fn name(&self) -> &str {
            "broken"
        }

        async fn solve(
            &self,
            _matrix: &SelectionMatrix,
            _timeout: Duration,
        ) -> Result<SolverOutcome, SolverError> {
            Err(SolverError::Backend("connection refused".to_string()))
        }
    }

    fn two_exclusive() -> Vec<AgentProposal> {
        vec![
            AgentProposal::new("a", "x", 5.0, 0.8, 0.0).with_slot("s"),
            AgentProposal::new("b", "y", 3.0, 0.6, 0.0).with_slot("s"),
        ]
    }

    fn short_timeout_config() -> ControllerConfig {
        ControllerConfig {
            solver_timeout: Duration::from_millis(20),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn zero_proposals_short_circuits() {
        let controller = MetaController::new(ControllerConfig::default());
        let selection = controller.select(&[], &[]).await;
        assert!(selection.indices.is_empty());
        assert_eq!(selection.path, SolverPath::ShortCircuit);
    }

    #[tokio::test]
    async fn single_proposal_short_circuits() {
        let controller = MetaController::new(ControllerConfig::default());
        let proposals = vec![AgentProposal::new("a", "x", 5.0, 0.8, 0.0)];
        let selection = controller.select(&proposals, &[1.0]).await;
        assert_eq!(selection.indices, vec![0]);
        assert_eq!(selection.confidence, 0.8);
        assert_eq!(selection.path, SolverPath::ShortCircuit);
    }

    #[tokio::test]
    async fn no_primary_runs_fallback() {
        let controller = MetaController::new(ControllerConfig::default());
        let selection = controller.select(&two_exclusive(), &[1.0, 1.0]).await;
        assert_eq!(selection.indices, vec![0]);
        assert_eq!(selection.expected_value, 5.0);
        assert_eq!(selection.path, SolverPath::Fallback);
    }

    #[tokio::test]
    async fn healthy_primary_is_used() {
        let controller = MetaController::new(ControllerConfig::default()).with_primary(Arc::new(
            FixedSolver {
                outcome: SolverOutcome {
                    selection: vec![false, true],
                    quality: 0.9,
                },
            },
        ));
        let selection = controller.select(&two_exclusive(), &[1.0, 1.0]).await;
        assert_eq!(selection.indices, vec![1]);
        assert_eq!(
            selection.path,
            SolverPath::Primary {
                name: "fixed".to_string()
            }
        );
    }

    #[tokio::test]
    async fn primary_timeout_falls_back_to_classical_result() {
        let with_primary = MetaController::new(short_timeout_config())
            .with_primary(Arc::new(SlowSolver));
        let fallback_only = MetaController::new(short_timeout_config());

        let proposals = two_exclusive();
        let a = with_primary.select(&proposals, &[1.0, 1.0]).await;
        let b = fallback_only.select(&proposals, &[1.0, 1.0]).await;

        assert_eq!(a.path, SolverPath::Fallback);
        assert_eq!(a.indices, b.indices);
    }

    #[tokio::test]
    async fn primary_error_falls_back() {
        let controller =
            MetaController::new(ControllerConfig::default()).with_primary(Arc::new(BrokenSolver));
        let selection = controller.select(&two_exclusive(), &[1.0, 1.0]).await;
        assert_eq!(selection.path, SolverPath::Fallback);
        assert_eq!(selection.indices, vec![0]);
    }

    #[tokio::test]
    async fn low_quality_primary_falls_back() {
        let controller = MetaController::new(ControllerConfig::default()).with_primary(Arc::new(
            FixedSolver {
                outcome: SolverOutcome {
                    selection: vec![false, true],
                    quality: 0.1,
                },
            },
        ));
        let selection = controller.select(&two_exclusive(), &[1.0, 1.0]).await;
        assert_eq!(selection.path, SolverPath::Fallback);
        assert_eq!(selection.indices, vec![0]);
    }

    #[tokio::test]
    async fn exclusivity_violating_primary_falls_back() {
        let controller = MetaController::new(ControllerConfig::default()).with_primary(Arc::new(
            FixedSolver {
                outcome: SolverOutcome {
                    selection: vec![true, true],
                    quality: 1.0,
                },
            },
        ));
        let selection = controller.select(&two_exclusive(), &[1.0, 1.0]).await;
        assert_eq!(selection.path, SolverPath::Fallback);
        assert_eq!(selection.indices, vec![0]);
    }

    #[tokio::test]
    async fn confidence_is_mean_of_selected() {
        let controller = MetaController::new(ControllerConfig::default());
        let proposals = vec![
            AgentProposal::new("a", "x", 5.0, 0.8, 0.0),
            AgentProposal::new("b", "y", 3.0, 0.4, 0.0),
        ];
        let selection = controller.select(&proposals, &[1.0, 1.0]).await;
        assert_eq!(selection.indices, vec![0, 1]);
        assert!((selection.confidence - 0.6).abs() < 1e-9);
    }
}
