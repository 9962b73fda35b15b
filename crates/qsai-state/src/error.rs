//! Error types for qsai-state

use thiserror::Error;

/// Errors that can occur in the state persistence layer
#[derive(Error, Debug)]
pub enum StateError {
    /// Database connection error
    #[error("Database connection failed: {0}")]
    Connection(String),

    /// Database query error
    #[error("Database query failed: {0}")]
    Query(String),

    /// Serialization error
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Schema setup error
    #[error("Schema setup failed: {0}")]
    SchemaSetup(String),
}

impl From<surrealdb::Error> for StateError {
    fn from(err: surrealdb::Error) -> Self {
        StateError::Query(err.to_string())
    }
}

impl From<serde_json::Error> for StateError {
    fn from(err: serde_json::Error) -> Self {
        StateError::Serialization(err.to_string())
    }
}

/// Errors surfaced by the audit sink and outcome store traits.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend-specific failure (connection, query, etc.)
    #[error("storage backend error: {0}")]
    Backend(String),

    /// No audit entry exists at the requested sequence number
    #[error("audit entry not found: seq {seq}")]
    EntryNotFound { seq: u64 },

    /// A digest string failed validation (must be 64 lowercase hex chars)
    #[error("invalid digest: {digest}")]
    InvalidDigest { digest: String },

    /// A concurrent append raced the global sequence
    #[error("sequence conflict: expected {expected}, got {got}")]
    SequenceConflict { expected: u64, got: u64 },

    /// Chain verification found a tampered or corrupted entry.
    ///
    /// Fatal for compliance purposes: surfaced to operators and alertable,
    /// but does not block new appends.
    #[error("audit chain integrity violation at seq {seq}: {detail}")]
    ChainIntegrityViolation { seq: u64, detail: String },

    /// Entry content could not be serialized for hashing
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// A number in the entry content cannot be canonicalized (NaN/Infinity)
    #[error("non-canonical number in content: {0}")]
    NonCanonicalNumber(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_violation_message_names_seq() {
        let err = StorageError::ChainIntegrityViolation {
            seq: 7,
            detail: "chain hash mismatch".to_string(),
        };
        assert!(err.to_string().contains("seq 7"));
    }
}
