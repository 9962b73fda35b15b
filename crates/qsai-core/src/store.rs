//! Context store: the latest situational snapshot per subject.
//!
//! The store is the only shared mutable state across decision cycles.
//! Writes for a subject are serialized through the map lock, and the
//! staleness check enforces strictly increasing capture timestamps per
//! subject — which is what gives each subject's cycles their ordering
//! guarantee. A cycle reads one `Arc` snapshot and never observes a
//! mid-cycle mutation.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::error::{EngineError, Result};
use crate::domain::ContextVector;

/// Holds the most recent [`ContextVector`] per subject.
#[derive(Debug, Default)]
pub struct ContextStore {
    latest: Mutex<HashMap<String, Arc<ContextVector>>>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new context for its subject.
    ///
    /// Fails with [`EngineError::StaleContext`] when the offered snapshot
    /// is not strictly newer than the stored one. Equal timestamps are
    /// stale too: a decision cycle must never race an identical-time
    /// replacement.
    pub async fn put(&self, context: ContextVector) -> Result<()> {
        let mut latest = self.latest.lock().await;
        if let Some(current) = latest.get(&context.subject) {
            if context.captured_at <= current.captured_at {
                return Err(EngineError::StaleContext {
                    subject: context.subject.clone(),
                    stored: current.captured_at,
                    offered: context.captured_at,
                });
            }
        }
        debug!(subject = %context.subject, captured_at = %context.captured_at, "context stored");
        latest.insert(context.subject.clone(), Arc::new(context));
        Ok(())
    }

    /// The current snapshot for a subject, or [`EngineError::NoContext`].
    pub async fn snapshot(&self, subject: &str) -> Result<Arc<ContextVector>> {
        let latest = self.latest.lock().await;
        latest
            .get(subject)
            .cloned()
            .ok_or_else(|| EngineError::NoContext {
                subject: subject.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn put_and_snapshot_round_trip() {
        let store = ContextStore::new();
        let ctx = ContextVector::new("s-1").with_signal("t", "x", 1.0);
        store.put(ctx.clone()).await.unwrap();

        let snap = store.snapshot("s-1").await.unwrap();
        assert_eq!(*snap, ctx);
    }

    #[tokio::test]
    async fn older_context_is_rejected() {
        let store = ContextStore::new();
        let mut newer = ContextVector::new("s-1");
        newer.captured_at = Utc::now();
        let mut older = newer.clone();
        older.captured_at = newer.captured_at - Duration::seconds(5);

        store.put(newer).await.unwrap();
        let err = store.put(older).await.unwrap_err();
        assert!(matches!(err, EngineError::StaleContext { .. }));
    }

    #[tokio::test]
    async fn equal_timestamp_is_stale() {
        let store = ContextStore::new();
        let ctx = ContextVector::new("s-1");
        store.put(ctx.clone()).await.unwrap();

        let err = store.put(ctx).await.unwrap_err();
        assert!(matches!(err, EngineError::StaleContext { .. }));
    }

    #[tokio::test]
    async fn subjects_are_independent() {
        let store = ContextStore::new();
        store.put(ContextVector::new("s-1")).await.unwrap();

        let err = store.snapshot("s-2").await.unwrap_err();
        assert!(matches!(err, EngineError::NoContext { .. }));
    }

    #[tokio::test]
    async fn snapshot_is_stable_across_replacement() {
        let store = ContextStore::new();
        let mut first = ContextVector::new("s-1").with_signal("t", "x", 1.0);
        first.captured_at = Utc::now();
        store.put(first.clone()).await.unwrap();

        let snap = store.snapshot("s-1").await.unwrap();

        let mut second = ContextVector::new("s-1").with_signal("t", "x", 2.0);
        second.captured_at = first.captured_at + Duration::seconds(1);
        store.put(second).await.unwrap();

        // The cycle holding the Arc still sees the original snapshot.
        assert_eq!(snap.numeric_signal("t.x"), Some(1.0));
    }
}
