//! Trait contract tests for AuditSink and OutcomeStore.
//!
//! These tests verify the behavioral contracts of the storage traits
//! using in-memory fakes. Any conforming implementation must pass these.

use chrono::Utc;
use qsai_state::fakes::{MemoryAuditSink, MemoryOutcomeStore};
use qsai_state::{
    AuditEntryDraft, AuditSink, ChainHash, ContentDigest, OutcomeRecord, OutcomeStore,
    StorageError, SurrealAuditSink,
};
use serde_json::json;

fn draft(decision_id: &str) -> AuditEntryDraft {
    AuditEntryDraft {
        decision_id: decision_id.to_string(),
        subject: "customer-42".to_string(),
        recorded_at: Utc::now(),
        context_digest: ContentDigest::from_bytes(b"context"),
        proposal_digests: vec![
            ContentDigest::from_bytes(b"proposal-a"),
            ContentDigest::from_bytes(b"proposal-b"),
        ],
        policy_version: "policy-v1".to_string(),
        rejections: vec![],
        solver: "classical".to_string(),
        solver_output: json!({"selection": [true, false], "quality": 1.0}),
        decision: json!({"action_ids": ["offer-premium"]}),
    }
}

// ===========================================================================
// AuditSink contract tests (in-memory fake)
// ===========================================================================

#[tokio::test]
async fn append_assigns_dense_sequence() {
    let sink = MemoryAuditSink::new();
    let e1 = sink.append(draft("d-1")).await.unwrap();
    let e2 = sink.append(draft("d-2")).await.unwrap();
    let e3 = sink.append(draft("d-3")).await.unwrap();

    assert_eq!(e1.seq, 1);
    assert_eq!(e2.seq, 2);
    assert_eq!(e3.seq, 3);
    assert_eq!(sink.latest_seq().await.unwrap(), Some(3));
}

#[tokio::test]
async fn first_entry_links_to_genesis() {
    let sink = MemoryAuditSink::new();
    let e1 = sink.append(draft("d-1")).await.unwrap();

    assert_eq!(e1.prev_chain_hash, ChainHash::genesis());
}

#[tokio::test]
async fn entries_link_to_previous_chain_hash() {
    let sink = MemoryAuditSink::new();
    let e1 = sink.append(draft("d-1")).await.unwrap();
    let e2 = sink.append(draft("d-2")).await.unwrap();

    assert_eq!(e2.prev_chain_hash, e1.chain_hash);
}

#[tokio::test]
async fn verify_chain_succeeds_on_untouched_log() {
    let sink = MemoryAuditSink::new();
    for i in 0..10 {
        sink.append(draft(&format!("d-{i}"))).await.unwrap();
    }

    sink.verify_chain(1, 10).await.unwrap();
    // Sub-ranges verify too, anchored on the preceding entry's link.
    sink.verify_chain(4, 7).await.unwrap();
    sink.verify_chain(10, 10).await.unwrap();
}

#[tokio::test]
async fn verify_chain_detects_tampering() {
    let sink = MemoryAuditSink::new();
    for i in 0..5 {
        sink.append(draft(&format!("d-{i}"))).await.unwrap();
    }

    sink.tamper(3, "policy-v99");

    let err = sink.verify_chain(1, 5).await.unwrap_err();
    assert!(matches!(
        err,
        StorageError::ChainIntegrityViolation { seq: 3, .. }
    ));
}

#[tokio::test]
async fn appending_identical_content_twice_keeps_chain_valid() {
    let sink = MemoryAuditSink::new();
    let e1 = sink.append(draft("same")).await.unwrap();
    let e2 = sink.append(draft("same")).await.unwrap();

    // Same content, distinct links: the chain hash folds in the predecessor.
    assert_eq!(e1.content.decision_id, e2.content.decision_id);
    assert_ne!(e1.chain_hash, e2.chain_hash);
    sink.verify_chain(1, 2).await.unwrap();
}

#[tokio::test]
async fn entry_not_found_for_missing_seq() {
    let sink = MemoryAuditSink::new();
    sink.append(draft("d-1")).await.unwrap();

    let err = sink.entry(7).await.unwrap_err();
    assert!(matches!(err, StorageError::EntryNotFound { seq: 7 }));
}

#[tokio::test]
async fn empty_log_has_no_latest_seq() {
    let sink = MemoryAuditSink::new();
    assert_eq!(sink.latest_seq().await.unwrap(), None);
}

// ===========================================================================
// AuditSink contract tests (SurrealDB in-memory)
// ===========================================================================

#[tokio::test]
async fn surreal_append_and_verify_round_trip() {
    let sink = SurrealAuditSink::in_memory().await.unwrap();

    let e1 = sink.append(draft("d-1")).await.unwrap();
    let e2 = sink.append(draft("d-2")).await.unwrap();
    assert_eq!(e1.seq, 1);
    assert_eq!(e2.seq, 2);
    assert_eq!(e2.prev_chain_hash, e1.chain_hash);

    let fetched = sink.entry(2).await.unwrap();
    assert_eq!(fetched, e2);

    sink.verify_chain(1, 2).await.unwrap();
}

#[tokio::test]
async fn surreal_entries_range_is_ordered() {
    let sink = SurrealAuditSink::in_memory().await.unwrap();
    for i in 0..4 {
        sink.append(draft(&format!("d-{i}"))).await.unwrap();
    }

    let entries = sink.entries(2, 4).await.unwrap();
    let seqs: Vec<u64> = entries.iter().map(|e| e.seq).collect();
    assert_eq!(seqs, vec![2, 3, 4]);
}

#[tokio::test]
async fn surreal_concurrent_appends_stay_dense() {
    let sink = std::sync::Arc::new(SurrealAuditSink::in_memory().await.unwrap());

    let mut handles = Vec::new();
    for i in 0..8 {
        let sink = std::sync::Arc::clone(&sink);
        handles.push(tokio::spawn(async move {
            sink.append(draft(&format!("d-{i}"))).await.unwrap()
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(sink.latest_seq().await.unwrap(), Some(8));
    sink.verify_chain(1, 8).await.unwrap();
}

#[tokio::test]
async fn surreal_chain_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("surrealkv://{}/db", dir.path().display());

    {
        let sink = SurrealAuditSink::connect(&url).await.unwrap();
        sink.append(draft("d-1")).await.unwrap();
        sink.append(draft("d-2")).await.unwrap();
    }

    let reopened = SurrealAuditSink::connect(&url).await.unwrap();
    assert_eq!(reopened.latest_seq().await.unwrap(), Some(2));
    reopened.verify_chain(1, 2).await.unwrap();

    // The chain keeps extending from the persisted head.
    let e3 = reopened.append(draft("d-3")).await.unwrap();
    assert_eq!(e3.seq, 3);
    reopened.verify_chain(1, 3).await.unwrap();
}

// ===========================================================================
// OutcomeStore contract tests
// ===========================================================================

#[tokio::test]
async fn outcome_record_and_fetch() {
    let store = MemoryOutcomeStore::new();
    let outcome = OutcomeRecord {
        decision_id: "d-1".to_string(),
        realized_value: 4.2,
        success: true,
        reported_at: Utc::now(),
    };
    store.record(outcome.clone()).await.unwrap();

    let fetched = store.outcomes_for("d-1").await.unwrap();
    assert_eq!(fetched, vec![outcome]);
    assert!(store.outcomes_for("d-2").await.unwrap().is_empty());
}

#[tokio::test]
async fn surreal_outcomes_round_trip() {
    let sink = SurrealAuditSink::in_memory().await.unwrap();
    let outcome = OutcomeRecord {
        decision_id: "d-9".to_string(),
        realized_value: -1.5,
        success: false,
        reported_at: Utc::now(),
    };
    sink.record(outcome.clone()).await.unwrap();

    let fetched = sink.outcomes_for("d-9").await.unwrap();
    assert_eq!(fetched.len(), 1);
    assert_eq!(fetched[0].decision_id, "d-9");
    assert!(!fetched[0].success);
}
