//! Domain-level error taxonomy for the decision engine.
//!
//! Only terminal per-cycle failures live here. Per-agent errors are
//! absorbed by the collector, and per-proposal safety violations are
//! recorded as rejections, never surfaced as errors.

use chrono::{DateTime, Utc};

use qsai_state::StorageError;

/// QSAI engine errors.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The offered context is not newer than the stored one for that subject.
    #[error("stale context for subject {subject}: stored {stored}, offered {offered}")]
    StaleContext {
        subject: String,
        stored: DateTime<Utc>,
        offered: DateTime<Utc>,
    },

    /// No context has ever been stored for the subject.
    #[error("no context stored for subject {subject}")]
    NoContext { subject: String },

    /// An agent with this id is already registered.
    #[error("agent already registered: {agent_id}")]
    DuplicateAgent { agent_id: String },

    /// The audit entry could not be appended within the retry budget.
    /// The decision is not dispatched when this happens.
    #[error("audit append failed after {attempts} attempts: {source}")]
    AuditAppendFailed {
        attempts: u32,
        #[source]
        source: StorageError,
    },

    /// Both solver paths failed to produce a selection. Structurally
    /// unreachable while the classical fallback is total; kept so the
    /// controller's contract is explicit.
    #[error("no solver path produced a selection")]
    SolverUnavailable,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
