//! Audit chain and outcome storage trait definitions for QSAI
//!
//! These traits define the persistence abstractions behind the decision
//! engine:
//! - `AuditSink`: append-only, hash-chained decision records
//! - `OutcomeStore`: realized-outcome reports keyed by decision id
//!
//! All traits are async and backend-agnostic. In-memory fakes are provided
//! for testing via the `fakes` module.
//!
//! # Chain construction
//!
//! Each entry's `content_hash` is the SHA-256 of its canonical JSON content
//! (everything except `seq` and the hash fields themselves). Its
//! `chain_hash` is `sha256(content_hash ∥ prev_chain_hash)`, where the
//! first entry links to [`ChainHash::GENESIS`]. Any mutation of a persisted
//! entry breaks every subsequent link, making the log tamper-evident.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::canonical::canonical_digest;
use crate::error::StorageError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

// ---------------------------------------------------------------------------
// ContentDigest / ChainHash
// ---------------------------------------------------------------------------

/// Content digest (SHA-256 hex string).
///
/// The inner field is private to guarantee the string is always valid
/// lowercase hex produced by `from_bytes` or validated via `TryFrom<String>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentDigest(String);

impl ContentDigest {
    /// Compute the SHA-256 digest of the given bytes.
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        ContentDigest(hex::encode(hasher.finalize()))
    }

    /// Return the full hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form (first 12 hex chars).
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl TryFrom<String> for ContentDigest {
    type Error = StorageError;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        if s.len() != 64 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(StorageError::InvalidDigest { digest: s });
        }
        Ok(ContentDigest(s.to_ascii_lowercase()))
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A link in the rolling audit chain (SHA-256 hex string).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainHash(String);

impl ChainHash {
    /// The link value preceding the first entry (64 zero chars).
    pub const GENESIS: &'static str =
        "0000000000000000000000000000000000000000000000000000000000000000";

    /// The genesis link.
    pub fn genesis() -> Self {
        ChainHash(Self::GENESIS.to_string())
    }

    /// Derive the next link: `sha256(content_hash ∥ prev)` over the hex forms.
    pub fn derive(content_hash: &ContentDigest, prev: &ChainHash) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content_hash.as_str().as_bytes());
        hasher.update(prev.as_str().as_bytes());
        ChainHash(hex::encode(hasher.finalize()))
    }

    /// Return the full hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ChainHash {
    type Error = StorageError;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        if s.len() != 64 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(StorageError::InvalidDigest { digest: s });
        }
        Ok(ChainHash(s.to_ascii_lowercase()))
    }
}

impl std::fmt::Display for ChainHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// AuditEntry
// ---------------------------------------------------------------------------

/// A proposal excluded by the safety arbiter, recorded for traceability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectionRecord {
    /// Digest of the rejected proposal's content.
    pub proposal_digest: ContentDigest,
    /// Action id the proposal carried.
    pub action_id: String,
    /// Identifier of the first rule the proposal violated.
    pub rule_id: String,
    /// Human-readable explanation.
    pub reason: String,
}

/// The content of one audit entry, before the sink assigns its sequence
/// number and hashes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntryDraft {
    /// Decision id produced by the cycle.
    pub decision_id: String,
    /// Subject the cycle ran for.
    pub subject: String,
    /// When the cycle completed.
    pub recorded_at: DateTime<Utc>,
    /// Digest of the full ContextVector snapshot.
    pub context_digest: ContentDigest,
    /// Digests of every collected proposal, in registration order.
    pub proposal_digests: Vec<ContentDigest>,
    /// SafetyPolicy version active during the cycle.
    pub policy_version: String,
    /// Proposals excluded by the arbiter, with rule ids.
    pub rejections: Vec<RejectionRecord>,
    /// Solver identity ("classical", a primary solver name, etc.).
    pub solver: String,
    /// Raw solver output snapshot (selection, quality).
    pub solver_output: serde_json::Value,
    /// The resulting Decision as a JSON snapshot.
    pub decision: serde_json::Value,
}

impl AuditEntryDraft {
    /// Canonical content digest of this draft.
    pub fn content_hash(&self) -> StorageResult<ContentDigest> {
        canonical_digest(&serde_json::to_value(self)?)
    }
}

/// A sealed, hash-chained audit entry. Append-only; never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Global monotonic sequence number (1-indexed).
    pub seq: u64,
    /// Entry content.
    #[serde(flatten)]
    pub content: AuditEntryDraft,
    /// SHA-256 of the canonical content.
    pub content_hash: ContentDigest,
    /// Chain hash of the immediately preceding entry (genesis for seq 1).
    pub prev_chain_hash: ChainHash,
    /// `sha256(content_hash ∥ prev_chain_hash)`.
    pub chain_hash: ChainHash,
}

impl AuditEntry {
    /// Seal a draft at the given sequence position.
    pub fn seal(content: AuditEntryDraft, seq: u64, prev: ChainHash) -> StorageResult<AuditEntry> {
        let content_hash = content.content_hash()?;
        let chain_hash = ChainHash::derive(&content_hash, &prev);
        Ok(AuditEntry {
            seq,
            content,
            content_hash,
            prev_chain_hash: prev,
            chain_hash,
        })
    }

    /// Recompute this entry's hashes and compare against the stored values.
    pub fn verify(&self) -> StorageResult<()> {
        let recomputed = self.content.content_hash()?;
        if recomputed != self.content_hash {
            return Err(StorageError::ChainIntegrityViolation {
                seq: self.seq,
                detail: format!(
                    "content hash mismatch: stored {}, recomputed {}",
                    self.content_hash.short(),
                    recomputed.short()
                ),
            });
        }
        let chain = ChainHash::derive(&self.content_hash, &self.prev_chain_hash);
        if chain != self.chain_hash {
            return Err(StorageError::ChainIntegrityViolation {
                seq: self.seq,
                detail: "chain hash mismatch".to_string(),
            });
        }
        Ok(())
    }
}

/// Verify a contiguous run of entries against a known preceding link.
///
/// `prev` is the chain hash of the entry immediately before `entries[0]`
/// (genesis when the run starts at seq 1). Checks per-entry content and
/// chain hashes plus the link between consecutive entries.
pub fn verify_entries(prev: &ChainHash, entries: &[AuditEntry]) -> StorageResult<()> {
    let mut link = prev.clone();
    for entry in entries {
        entry.verify()?;
        if entry.prev_chain_hash != link {
            return Err(StorageError::ChainIntegrityViolation {
                seq: entry.seq,
                detail: format!(
                    "broken link: entry references {}, chain expects {}",
                    &entry.prev_chain_hash.as_str()[..12],
                    &link.as_str()[..12]
                ),
            });
        }
        link = entry.chain_hash.clone();
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// AuditSink trait
// ---------------------------------------------------------------------------

/// Append-only, hash-chained audit log.
///
/// Guarantees:
/// - Appends are globally serialized: sequence numbers are dense and
///   monotonic, and each entry links to the chain hash of its predecessor.
/// - Entries are never updated or deleted through this trait.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Seal and persist a draft entry. Returns the sealed entry with its
    /// assigned sequence number and hashes.
    async fn append(&self, draft: AuditEntryDraft) -> StorageResult<AuditEntry>;

    /// Fetch a single entry by sequence number.
    async fn entry(&self, seq: u64) -> StorageResult<AuditEntry>;

    /// Fetch an inclusive range of entries ordered by sequence number.
    async fn entries(&self, from_seq: u64, to_seq: u64) -> StorageResult<Vec<AuditEntry>>;

    /// Highest assigned sequence number, or `None` when the log is empty.
    async fn latest_seq(&self) -> StorageResult<Option<u64>>;

    /// Recompute hashes across the inclusive range and fail with
    /// `ChainIntegrityViolation` on any mismatch.
    async fn verify_chain(&self, from_seq: u64, to_seq: u64) -> StorageResult<()> {
        let entries = self.entries(from_seq, to_seq).await?;
        let prev = if from_seq <= 1 {
            ChainHash::genesis()
        } else {
            self.entry(from_seq - 1).await?.chain_hash
        };
        verify_entries(&prev, &entries)
    }
}

// ---------------------------------------------------------------------------
// OutcomeStore trait
// ---------------------------------------------------------------------------

/// A realized outcome reported for a past decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    /// The decision this outcome belongs to.
    pub decision_id: String,
    /// Realized value (same scale as proposal expected values).
    pub realized_value: f64,
    /// Whether the dispatched action succeeded.
    pub success: bool,
    /// When the outcome was reported.
    pub reported_at: DateTime<Utc>,
}

impl OutcomeRecord {
    pub fn new(decision_id: &str, realized_value: f64, success: bool) -> Self {
        Self {
            decision_id: decision_id.to_string(),
            realized_value,
            success,
            reported_at: Utc::now(),
        }
    }
}

/// Store for post-hoc outcome reports. Best-effort from the engine's
/// perspective: failures here never fail a live decision cycle.
#[async_trait]
pub trait OutcomeStore: Send + Sync {
    /// Record an outcome report.
    async fn record(&self, outcome: OutcomeRecord) -> StorageResult<()>;

    /// All outcomes reported for a decision, oldest first.
    async fn outcomes_for(&self, decision_id: &str) -> StorageResult<Vec<OutcomeRecord>>;
}
