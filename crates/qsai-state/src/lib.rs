//! Qsai-State: SurrealDB Backend for the QSAI Audit Chain
//!
//! This crate provides the persistence layer for the QSAI decision engine.
//! It handles all I/O with SurrealDB, exposing the audit chain and outcome
//! store behind backend-agnostic async traits.
//!
//! ## Layer 0 - Data/Persistence
//!
//! Focus: append-only integrity and tamper evidence.
//!
//! ## Key Components
//!
//! - `AuditSink`: append-only, hash-chained decision log
//! - `OutcomeStore`: realized-outcome reports for the feedback loop
//! - `SurrealAuditSink`: durable implementation of both traits
//! - `fakes`: in-memory implementations for tests

pub mod audit;
pub mod canonical;
mod error;
pub mod fakes;
mod migrations;
mod schema;
pub mod surreal_audit;

pub use audit::{
    verify_entries, AuditEntry, AuditEntryDraft, AuditSink, ChainHash, ContentDigest,
    OutcomeRecord, OutcomeStore, RejectionRecord, StorageResult,
};
pub use canonical::{canonical_digest, canonical_json_bytes};
pub use error::{StateError, StorageError};
pub use fakes::{MemoryAuditSink, MemoryOutcomeStore};
pub use surreal_audit::SurrealAuditSink;

/// Result type for qsai-state operations
pub type Result<T> = std::result::Result<T, StateError>;
