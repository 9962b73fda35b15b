//! In-memory fakes for storage traits (testing only)
//!
//! Provides `MemoryAuditSink` and `MemoryOutcomeStore` that satisfy the
//! trait contracts without any external dependencies.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::audit::*;
use crate::error::StorageError;

// ---------------------------------------------------------------------------
// MemoryAuditSink
// ---------------------------------------------------------------------------

/// In-memory audit chain backed by a `Mutex<Vec<AuditEntry>>`.
///
/// The vector index is `seq - 1`; the mutex serializes appends, which is
/// what keeps the sequence dense and the chain linked.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Corrupt the stored entry at `seq` (testing only) so that
    /// `verify_chain` has something to catch.
    pub fn tamper(&self, seq: u64, policy_version: &str) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get_mut((seq - 1) as usize) {
            entry.content.policy_version = policy_version.to_string();
        }
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn append(&self, draft: AuditEntryDraft) -> StorageResult<AuditEntry> {
        let mut entries = self.entries.lock().unwrap();
        let seq = entries.len() as u64 + 1;
        let prev = entries
            .last()
            .map(|e| e.chain_hash.clone())
            .unwrap_or_else(ChainHash::genesis);
        let entry = AuditEntry::seal(draft, seq, prev)?;
        entries.push(entry.clone());
        Ok(entry)
    }

    async fn entry(&self, seq: u64) -> StorageResult<AuditEntry> {
        let entries = self.entries.lock().unwrap();
        seq.checked_sub(1)
            .and_then(|i| entries.get(i as usize))
            .cloned()
            .ok_or(StorageError::EntryNotFound { seq })
    }

    async fn entries(&self, from_seq: u64, to_seq: u64) -> StorageResult<Vec<AuditEntry>> {
        let entries = self.entries.lock().unwrap();
        let mut out = Vec::new();
        for seq in from_seq..=to_seq {
            let entry = seq
                .checked_sub(1)
                .and_then(|i| entries.get(i as usize))
                .cloned()
                .ok_or(StorageError::EntryNotFound { seq })?;
            out.push(entry);
        }
        Ok(out)
    }

    async fn latest_seq(&self) -> StorageResult<Option<u64>> {
        let entries = self.entries.lock().unwrap();
        Ok(entries.last().map(|e| e.seq))
    }
}

// ---------------------------------------------------------------------------
// MemoryOutcomeStore
// ---------------------------------------------------------------------------

/// In-memory outcome store backed by a `Mutex<Vec<OutcomeRecord>>`.
#[derive(Debug, Default)]
pub struct MemoryOutcomeStore {
    outcomes: Mutex<Vec<OutcomeRecord>>,
}

impl MemoryOutcomeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OutcomeStore for MemoryOutcomeStore {
    async fn record(&self, outcome: OutcomeRecord) -> StorageResult<()> {
        self.outcomes.lock().unwrap().push(outcome);
        Ok(())
    }

    async fn outcomes_for(&self, decision_id: &str) -> StorageResult<Vec<OutcomeRecord>> {
        let outcomes = self.outcomes.lock().unwrap();
        Ok(outcomes
            .iter()
            .filter(|o| o.decision_id == decision_id)
            .cloned()
            .collect())
    }
}
