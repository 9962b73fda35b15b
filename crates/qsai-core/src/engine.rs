//! The decision engine: one entry point tying the cycle together.
//!
//! `decide` runs the full pipeline for a subject: store the offered
//! context, snapshot it, fan proposals out to the agents, filter them
//! through the safety arbiter, select via the meta controller, and seal
//! the cycle into the audit chain before the decision is returned.
//! Per-agent and per-proposal failures degrade the cycle, never fail
//! it; only store input errors and exhausted audit retries surface.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use uuid::Uuid;

use qsai_state::{AuditEntry, AuditEntryDraft, AuditSink, RejectionRecord};

use crate::agent::AgentRegistry;
use crate::arbiter::{self, SafetyPolicy};
use crate::collector::{self, AgentOutcome};
use crate::controller::MetaController;
use crate::domain::{ContextVector, Decision, EngineError, Result, NO_ACTION};
use crate::feedback::FeedbackHandle;
use crate::metrics::METRICS;
use crate::obs;
use crate::solver::proposal_weights;
use crate::store::ContextStore;

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Shared deadline for one proposal collection round.
    pub collect_deadline: Duration,
    /// Total audit append attempts before the cycle fails.
    pub audit_retry_limit: u32,
    /// Initial backoff between audit append attempts; doubles each
    /// retry.
    pub audit_retry_backoff: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            collect_deadline: Duration::from_millis(150),
            audit_retry_limit: 5,
            audit_retry_backoff: Duration::from_millis(50),
        }
    }
}

/// Orchestrates decision cycles over a fixed set of components.
pub struct DecisionEngine<S: AuditSink> {
    store: ContextStore,
    registry: AgentRegistry,
    policy: SafetyPolicy,
    controller: MetaController,
    sink: Arc<S>,
    feedback: FeedbackHandle,
    config: EngineConfig,
}

impl<S: AuditSink> DecisionEngine<S> {
    pub fn new(
        registry: AgentRegistry,
        policy: SafetyPolicy,
        controller: MetaController,
        sink: Arc<S>,
        feedback: FeedbackHandle,
    ) -> Self {
        Self {
            store: ContextStore::new(),
            registry,
            policy,
            controller,
            sink,
            feedback,
            config: EngineConfig::default(),
        }
    }

    /// Override the default tuning (builder pattern).
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Cloneable handle for submitting outcome reports against
    /// decisions issued by this engine.
    pub fn feedback_handle(&self) -> FeedbackHandle {
        self.feedback.clone()
    }

    pub fn policy(&self) -> &SafetyPolicy {
        &self.policy
    }

    /// Run one full decision cycle for the offered context.
    ///
    /// The returned decision is durable: its audit entry has already
    /// been appended to the chain. A cycle where nothing survives
    /// (no agents, all timeouts, everything rejected) still completes
    /// and audits, yielding the no-action decision.
    pub async fn decide(&self, context: ContextVector) -> Result<Decision> {
        let cycle_start = Instant::now();
        let subject = context.subject.clone();
        let decision_id = Uuid::new_v4().to_string();

        let _span = obs::CycleSpan::enter(&decision_id, &subject);
        obs::emit_cycle_started(&decision_id, &subject, self.registry.len());

        self.store.put(context).await?;
        let snapshot = self.store.snapshot(&subject).await?;
        let context_digest = snapshot.digest()?;

        // Fan out. Collected order is registration order; downstream
        // tie-breaking depends on it.
        let round =
            collector::collect(&self.registry, Arc::clone(&snapshot), self.config.collect_deadline)
                .await;
        let (timeouts, failures) = round.outcomes.iter().fold((0, 0), |(t, f), (_, o)| match o {
            AgentOutcome::TimedOut => (t + 1, f),
            AgentOutcome::Failed { .. } => (t, f + 1),
            AgentOutcome::Responded { .. } => (t, f),
        });
        obs::emit_proposals_collected(&decision_id, round.proposals.len(), timeouts, failures);

        let collected_digests = round
            .proposals
            .iter()
            .map(|p| p.digest())
            .collect::<Result<Vec<_>>>()?;

        // Arbiter has the final word before anything reaches the solver.
        let verdict = arbiter::filter(round.proposals, &snapshot, &self.policy);
        for rejection in &verdict.rejections {
            obs::emit_proposal_rejected(&decision_id, &rejection.action_id, &rejection.rule_id);
        }
        METRICS.add_proposals_rejected(verdict.rejections.len() as u64);
        let rejections: Vec<RejectionRecord> = verdict
            .rejections
            .iter()
            .map(|r| RejectionRecord {
                proposal_digest: collected_digests[r.proposal_index].clone(),
                action_id: r.action_id.clone(),
                rule_id: r.rule_id.clone(),
                reason: r.reason.clone(),
            })
            .collect();

        let weights = proposal_weights(&verdict.passed, &self.feedback.weights().snapshot());
        let selection = self.controller.select(&verdict.passed, &weights).await;

        let mut action_ids = Vec::with_capacity(selection.indices.len());
        let mut contributing = Vec::with_capacity(selection.indices.len());
        let mut contributing_agents = Vec::with_capacity(selection.indices.len());
        for &i in &selection.indices {
            let proposal = &verdict.passed[i];
            action_ids.push(proposal.action_id.clone());
            contributing.push(proposal.digest()?);
            contributing_agents.push(proposal.agent_id.clone());
        }
        if action_ids.is_empty() {
            action_ids.push(NO_ACTION.to_string());
        }

        let decision = Decision {
            id: decision_id.clone(),
            subject: subject.clone(),
            action_ids,
            contributing,
            expected_value: selection.expected_value,
            confidence: selection.confidence,
            solver: selection.path.clone(),
            decided_at: Utc::now(),
        };

        let draft = AuditEntryDraft {
            decision_id: decision_id.clone(),
            subject,
            recorded_at: decision.decided_at,
            context_digest,
            proposal_digests: collected_digests,
            policy_version: self.policy.version.clone(),
            rejections,
            solver: selection.path.identity(),
            solver_output: selection.raw_output,
            decision: serde_json::to_value(&decision)?,
        };

        // The decision is not returned until its entry is durable.
        let entry = self.append_with_retry(draft).await?;

        contributing_agents.dedup();
        self.feedback
            .register_decision(&decision.id, contributing_agents);

        METRICS.inc_cycles_completed();
        obs::emit_cycle_decided(
            &decision_id,
            cycle_start.elapsed().as_millis() as u64,
            selection.indices.len(),
            &selection.path.identity(),
            entry.seq,
        );

        Ok(decision)
    }

    async fn append_with_retry(&self, draft: AuditEntryDraft) -> Result<AuditEntry> {
        let attempts = self.config.audit_retry_limit.max(1);
        let mut backoff = self.config.audit_retry_backoff;
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.sink.append(draft.clone()).await {
                Ok(entry) => return Ok(entry),
                Err(err) => {
                    obs::emit_audit_append_retry(&draft.decision_id, attempt, &err);
                    if attempt >= attempts {
                        return Err(EngineError::AuditAppendFailed {
                            attempts,
                            source: err,
                        });
                    }
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Agent, AgentError, AgentKind};
    use crate::controller::ControllerConfig;
    use crate::domain::{AgentProposal, SolverPath};
    use crate::feedback::spawn_feedback_sink;
    use async_trait::async_trait;
    use qsai_state::{MemoryAuditSink, MemoryOutcomeStore, StorageError, StorageResult};
    use std::sync::atomic::{AtomicU32, Ordering};

    struct OneShotAgent {
        id: String,
        proposal: AgentProposal,
    }

    #[async_trait]
    impl Agent for OneShotAgent {
        fn id(&self) -> &str {
            &self.id
        }

        fn kind(&self) -> AgentKind {
            AgentKind::Offer
        }

        async fn propose(&self, _context: &ContextVector) -> std::result::Result<Vec<AgentProposal>, AgentError> {
            Ok(vec![self.proposal.clone()])
        }
    }

    /// Fails the first `failures` appends with a backend error, then
    /// delegates to the in-memory sink.
    struct FlakySink {
        inner: MemoryAuditSink,
        failures: u32,
        attempts: AtomicU32,
    }

    impl FlakySink {
        fn failing(failures: u32) -> Self {
            Self {
                inner: MemoryAuditSink::new(),
                failures,
                attempts: AtomicU32::new(0),
            }
        }

        fn attempts(&self) -> u32 {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AuditSink for FlakySink {
        async fn append(&self, draft: AuditEntryDraft) -> StorageResult<AuditEntry> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt <= self.failures {
                return Err(StorageError::Backend("connection reset".to_string()));
            }
            self.inner.append(draft).await
        }

        async fn entry(&self, seq: u64) -> StorageResult<AuditEntry> {
            self.inner.entry(seq).await
        }

        async fn entries(&self, from: u64, to: u64) -> StorageResult<Vec<AuditEntry>> {
            self.inner.entries(from, to).await
        }

        async fn latest_seq(&self) -> StorageResult<Option<u64>> {
            self.inner.latest_seq().await
        }
    }

    fn engine_with_sink<S: AuditSink>(sink: Arc<S>) -> DecisionEngine<S> {
        let (feedback, _task) = spawn_feedback_sink(Arc::new(MemoryOutcomeStore::new()));
        DecisionEngine::new(
            AgentRegistry::new(),
            SafetyPolicy::permissive("policy-test"),
            MetaController::new(ControllerConfig::default()),
            sink,
            feedback,
        )
        .with_config(EngineConfig {
            audit_retry_backoff: Duration::from_millis(1),
            ..Default::default()
        })
    }

    fn engine_with_agents(agents: Vec<Arc<dyn Agent>>) -> DecisionEngine<MemoryAuditSink> {
        let mut registry = AgentRegistry::new();
        for agent in agents {
            registry.register(agent).unwrap();
        }
        let (feedback, _task) = spawn_feedback_sink(Arc::new(MemoryOutcomeStore::new()));
        DecisionEngine::new(
            registry,
            SafetyPolicy::permissive("policy-test"),
            MetaController::new(ControllerConfig::default()),
            Arc::new(MemoryAuditSink::new()),
            feedback,
        )
    }

    fn context(subject: &str) -> ContextVector {
        ContextVector::new(subject)
    }

    #[tokio::test]
    async fn single_agent_cycle_decides_and_audits() {
        let engine = engine_with_agents(vec![Arc::new(OneShotAgent {
            id: "a".to_string(),
            proposal: AgentProposal::new("a", "offer-1", 5.0, 0.9, 0.0),
        })]);

        let decision = engine.decide(context("s-1")).await.unwrap();
        assert_eq!(decision.action_ids, vec!["offer-1".to_string()]);
        assert_eq!(decision.solver, SolverPath::ShortCircuit);

        let entry = engine.sink.entry(1).await.unwrap();
        assert_eq!(entry.content.decision_id, decision.id);
        assert_eq!(entry.content.policy_version, "policy-test");
        entry.verify().unwrap();
    }

    #[tokio::test]
    async fn zero_agents_yields_audited_no_action() {
        let engine = engine_with_agents(vec![]);
        let decision = engine.decide(context("s-2")).await.unwrap();
        assert!(decision.is_no_action());
        assert_eq!(decision.action_ids, vec![NO_ACTION.to_string()]);

        let entry = engine.sink.entry(1).await.unwrap();
        assert!(entry.content.proposal_digests.is_empty());
        assert_eq!(entry.content.solver, "short-circuit");
    }

    #[tokio::test]
    async fn stale_context_is_refused() {
        let engine = engine_with_agents(vec![]);
        let ctx = context("s-3");
        engine.decide(ctx.clone()).await.unwrap();

        // Same captured_at: strictly-newer is required.
        let err = engine.decide(ctx).await.unwrap_err();
        assert!(matches!(err, EngineError::StaleContext { .. }));
    }

    #[tokio::test]
    async fn decisions_chain_across_cycles() {
        let engine = engine_with_agents(vec![Arc::new(OneShotAgent {
            id: "a".to_string(),
            proposal: AgentProposal::new("a", "offer-1", 2.0, 0.5, 0.0),
        })]);

        let mut ctx = context("s-4");
        engine.decide(ctx.clone()).await.unwrap();
        ctx.captured_at = ctx.captured_at + chrono::Duration::seconds(1);
        engine.decide(ctx).await.unwrap();

        engine.sink.verify_chain(1, 2).await.unwrap();
    }

    #[tokio::test]
    async fn transient_append_failures_are_retried_until_durable() {
        let sink = Arc::new(FlakySink::failing(2));
        let engine = engine_with_sink(sink.clone());

        let decision = engine.decide(context("s-5")).await.unwrap();
        assert_eq!(sink.attempts(), 3);

        // The entry landed despite the failed attempts.
        let entry = sink.entry(1).await.unwrap();
        assert_eq!(entry.content.decision_id, decision.id);
        entry.verify().unwrap();
    }

    #[tokio::test]
    async fn exhausted_append_retries_fail_the_cycle() {
        let sink = Arc::new(FlakySink::failing(u32::MAX));
        let engine = engine_with_sink(sink.clone());

        let err = engine.decide(context("s-6")).await.unwrap_err();
        match err {
            EngineError::AuditAppendFailed { attempts, .. } => assert_eq!(attempts, 5),
            other => panic!("expected AuditAppendFailed, got {other:?}"),
        }

        // No decision without a durable entry: nothing was persisted.
        assert_eq!(sink.attempts(), 5);
        assert_eq!(sink.latest_seq().await.unwrap(), None);
    }
}
