//! QSAI Core Library
//!
//! Re-exports core components for programmatic access to the decision
//! engine: context store, agent registry and collector, safety arbiter,
//! meta controller with solver dispatch, and the outcome feedback sink.

pub mod agent;
pub mod arbiter;
pub mod collector;
pub mod controller;
pub mod domain;
pub mod engine;
pub mod feedback;
pub mod metrics;
pub mod obs;
pub mod solver;
pub mod store;
pub mod telemetry;

pub use domain::{
    AgentProposal, ConsentLevel, ContextVector, Decision, EngineError, Result, SignalGroup,
    SignalValue, SolverPath, NO_ACTION,
};

pub use agent::{Agent, AgentError, AgentKind, AgentRegistry};
pub use arbiter::{ArbiterVerdict, Rejection, SafetyPolicy, SafetyRule};
pub use collector::{collect, AgentOutcome, CollectionRound};
pub use controller::{ControllerConfig, MetaController, Selection};
pub use engine::{DecisionEngine, EngineConfig};
pub use feedback::{spawn_feedback_sink, FeedbackHandle, OutcomeReport, WeightBook};
pub use solver::{
    proposal_weights, ClassicalSolver, SelectionMatrix, Solver, SolverError, SolverOutcome,
    EXACT_LIMIT,
};
pub use store::ContextStore;
pub use telemetry::init_tracing;

pub use qsai_state::{
    AuditEntry, AuditEntryDraft, AuditSink, ChainHash, ContentDigest, MemoryAuditSink,
    MemoryOutcomeStore, OutcomeRecord, OutcomeStore, RejectionRecord, SurrealAuditSink,
};

/// Crate version, exposed for binaries and diagnostics.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
