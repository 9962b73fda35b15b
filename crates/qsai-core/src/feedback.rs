//! Outcome feedback sink: realized outcomes flow back into agent
//! weights.
//!
//! Reports are submitted through an unbounded channel and consumed by a
//! spawned task, so `decide` never blocks on feedback. The consumer
//! records each outcome to the [`OutcomeStore`] and nudges the
//! reporting agents' weights in the shared [`WeightBook`]. Everything
//! here is best-effort: a closed channel or a failed store write is
//! logged and dropped.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use qsai_state::OutcomeStore;

use crate::obs;

/// Smoothing factor for the exponential moving average.
const EMA_ALPHA: f64 = 0.2;
/// Weights are clamped to this range so one streak can never silence
/// or dominate an agent.
const WEIGHT_MIN: f64 = 0.1;
const WEIGHT_MAX: f64 = 2.0;

/// Most decisions never get an outcome report, so attribution tracking
/// is bounded: past this many unreported decisions the oldest are
/// evicted first.
const MAX_TRACKED_DECISIONS: usize = 1024;

/// A realized outcome for a previously issued decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeReport {
    pub decision_id: String,
    pub realized_value: f64,
    pub success: bool,
}

// ---------------------------------------------------------------------
// Weight book
// ---------------------------------------------------------------------

/// Per-agent multipliers applied to proposal expected values during
/// selection. Unknown agents read as 1.0.
#[derive(Debug, Default)]
pub struct WeightBook {
    weights: RwLock<HashMap<String, f64>>,
}

impl WeightBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current weight for one agent.
    pub fn weight(&self, agent_id: &str) -> f64 {
        self.weights
            .read()
            .map(|w| w.get(agent_id).copied().unwrap_or(1.0))
            .unwrap_or(1.0)
    }

    /// Snapshot of all adjusted weights, for one selection round.
    pub fn snapshot(&self) -> HashMap<String, f64> {
        self.weights.read().map(|w| w.clone()).unwrap_or_default()
    }

    /// Fold one observed score into an agent's weight.
    ///
    /// `score` is the target the EMA pulls toward: above 1.0 rewards
    /// the agent, below 1.0 penalizes it.
    pub fn observe(&self, agent_id: &str, score: f64) {
        let Ok(mut weights) = self.weights.write() else {
            return;
        };
        let current = weights.get(agent_id).copied().unwrap_or(1.0);
        let updated = (1.0 - EMA_ALPHA) * current + EMA_ALPHA * score;
        weights.insert(
            agent_id.to_string(),
            updated.clamp(WEIGHT_MIN, WEIGHT_MAX),
        );
    }
}

// ---------------------------------------------------------------------
// Sink
// ---------------------------------------------------------------------

/// Decision → contributing-agents map, bounded by FIFO eviction.
#[derive(Debug, Default)]
struct Attributions {
    by_decision: HashMap<String, Vec<String>>,
    order: VecDeque<String>,
}

impl Attributions {
    fn insert(&mut self, decision_id: String, agent_ids: Vec<String>) {
        if self
            .by_decision
            .insert(decision_id.clone(), agent_ids)
            .is_none()
        {
            self.order.push_back(decision_id);
        }
        // Ids already consumed by `take` pop off as no-ops here.
        while self.by_decision.len() > MAX_TRACKED_DECISIONS {
            match self.order.pop_front() {
                Some(old) => {
                    self.by_decision.remove(&old);
                }
                None => break,
            }
        }
    }

    fn take(&mut self, decision_id: &str) -> Option<Vec<String>> {
        self.by_decision.remove(decision_id)
    }
}

/// Cloneable handle for submitting outcome reports and registering
/// decision attributions.
#[derive(Clone)]
pub struct FeedbackHandle {
    tx: mpsc::UnboundedSender<OutcomeReport>,
    attributions: Arc<Mutex<Attributions>>,
    book: Arc<WeightBook>,
}

impl FeedbackHandle {
    /// Submit an outcome report. Best-effort: a closed channel is
    /// logged and the report dropped.
    pub fn report(&self, report: OutcomeReport) {
        if let Err(err) = self.tx.send(report) {
            warn!(decision_id = %err.0.decision_id, "feedback channel closed, outcome dropped");
        }
    }

    /// Remember which agents contributed to a decision so later
    /// outcomes can be attributed to them. Tracking is bounded: once
    /// [`MAX_TRACKED_DECISIONS`] unreported decisions accumulate, the
    /// oldest are evicted first.
    pub fn register_decision(&self, decision_id: &str, agent_ids: Vec<String>) {
        if let Ok(mut attributions) = self.attributions.lock() {
            attributions.insert(decision_id.to_string(), agent_ids);
        }
    }

    /// The shared weight book updated by the consumer task.
    pub fn weights(&self) -> Arc<WeightBook> {
        Arc::clone(&self.book)
    }
}

/// Spawn the consumer task and return a handle plus its join handle.
pub fn spawn_feedback_sink(
    store: Arc<dyn OutcomeStore>,
) -> (FeedbackHandle, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutcomeReport>();
    let attributions: Arc<Mutex<Attributions>> = Arc::default();
    let book = Arc::new(WeightBook::new());

    let handle = FeedbackHandle {
        tx,
        attributions: Arc::clone(&attributions),
        book: Arc::clone(&book),
    };

    let task = tokio::spawn(async move {
        while let Some(report) = rx.recv().await {
            let record = qsai_state::OutcomeRecord::new(
                &report.decision_id,
                report.realized_value,
                report.success,
            );
            if let Err(err) = store.record(record).await {
                warn!(decision_id = %report.decision_id, error = %err, "failed to persist outcome");
            }

            let agents = attributions
                .lock()
                .ok()
                .and_then(|mut a| a.take(&report.decision_id))
                .unwrap_or_default();
            let score = if report.success { 1.2 } else { 0.8 };
            for agent_id in &agents {
                book.observe(agent_id, score);
            }

            obs::emit_outcome_recorded(
                &report.decision_id,
                report.realized_value,
                report.success,
            );
        }
    });

    (handle, task)
}
