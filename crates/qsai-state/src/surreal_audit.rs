//! SurrealDB-backed AuditSink and OutcomeStore implementations
//!
//! Uses `schema::AuditRow` and `schema::OutcomeRow` for persistence,
//! converting to/from `audit` types at the boundary.
//!
//! The append path holds a `tokio::sync::Mutex` for the duration of the
//! read-latest + seal + insert sequence. Chain integrity depends on a
//! total order of entries, so appends are serialized globally.

use async_trait::async_trait;
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

use crate::audit::{
    AuditEntry, AuditEntryDraft, AuditSink, ChainHash, OutcomeRecord, OutcomeStore, StorageResult,
};
use crate::error::{StateError, StorageError};
use crate::migrations;
use crate::schema::{AuditRow, OutcomeRow};

/// SurrealDB-backed implementation of [`AuditSink`] and [`OutcomeStore`].
pub struct SurrealAuditSink {
    db: Surreal<Any>,
    append_lock: tokio::sync::Mutex<()>,
}

impl SurrealAuditSink {
    /// Connect to an explicit SurrealDB endpoint.
    ///
    /// Selects `qsai/main` and runs `init_schema`. Accepts any engine
    /// URL (`mem://`, `surrealkv://<path>`, `ws://...`).
    pub async fn connect(url: &str) -> crate::Result<Self> {
        let db = surrealdb::engine::any::connect(url)
            .await
            .map_err(|e| StateError::Connection(format!("Failed to connect to {}: {}", url, e)))?;

        db.use_ns("qsai")
            .use_db("main")
            .await
            .map_err(|e| StateError::Connection(e.to_string()))?;

        migrations::init_schema(&db).await?;

        info!("SurrealAuditSink connected ({})", url);
        Ok(Self {
            db,
            append_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Create an in-memory instance for testing.
    pub async fn in_memory() -> crate::Result<Self> {
        Self::connect("mem://").await
    }

    /// Create from environment variables.
    ///
    /// Honors `SURREALDB_URL` when set; otherwise falls back to local
    /// persistence under `.qsai/db` via surrealkv.
    pub async fn from_env() -> crate::Result<Self> {
        if let Ok(url) = std::env::var("SURREALDB_URL") {
            return Self::connect(&url).await;
        }

        let path = ".qsai/db";
        std::fs::create_dir_all(path).map_err(|e| {
            StateError::Connection(format!(
                "Failed to create database directory {}: {}",
                path, e
            ))
        })?;
        let url = format!("surrealkv://{}", path);
        info!("No SURREALDB_URL found, using local persistence: {}", url);
        Self::connect(&url).await
    }

    // -- private helpers -----------------------------------------------------

    /// Fetch the newest row, if any.
    async fn fetch_latest(&self) -> StorageResult<Option<AuditRow>> {
        let mut res = self
            .db
            .query("SELECT * FROM audit_entries ORDER BY seq DESC LIMIT 1")
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let rows: Vec<AuditRow> = res
            .take(0)
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        Ok(rows.into_iter().next())
    }

    /// Fetch a row by sequence number, returning EntryNotFound if absent.
    async fn fetch_seq(&self, seq: u64) -> StorageResult<AuditRow> {
        let mut res = self
            .db
            .query("SELECT * FROM audit_entries WHERE seq = $seq")
            .bind(("seq", seq))
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let rows: Vec<AuditRow> = res
            .take(0)
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        rows.into_iter()
            .next()
            .ok_or(StorageError::EntryNotFound { seq })
    }
}

#[async_trait]
impl AuditSink for SurrealAuditSink {
    async fn append(&self, draft: AuditEntryDraft) -> StorageResult<AuditEntry> {
        let _guard = self.append_lock.lock().await;

        let (seq, prev) = match self.fetch_latest().await? {
            Some(row) => {
                let prev = ChainHash::try_from(row.chain_hash.clone())?;
                (row.seq + 1, prev)
            }
            None => (1, ChainHash::genesis()),
        };

        let entry = AuditEntry::seal(draft, seq, prev)?;
        let row = AuditRow::from(&entry);

        debug!(seq = seq, decision_id = %entry.content.decision_id, "appending audit entry");

        let _created: Option<AuditRow> = self
            .db
            .create("audit_entries")
            .content(row)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        Ok(entry)
    }

    async fn entry(&self, seq: u64) -> StorageResult<AuditEntry> {
        let row = self.fetch_seq(seq).await?;
        AuditEntry::try_from(row)
    }

    async fn entries(&self, from_seq: u64, to_seq: u64) -> StorageResult<Vec<AuditEntry>> {
        let mut res = self
            .db
            .query("SELECT * FROM audit_entries WHERE seq >= $from AND seq <= $to ORDER BY seq ASC")
            .bind(("from", from_seq))
            .bind(("to", to_seq))
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let rows: Vec<AuditRow> = res
            .take(0)
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        // A gap inside the requested range means a missing entry, which the
        // caller should see as EntryNotFound rather than a silently short list.
        let mut entries = Vec::with_capacity(rows.len());
        let mut expected = from_seq;
        for row in rows {
            if row.seq != expected {
                return Err(StorageError::EntryNotFound { seq: expected });
            }
            expected += 1;
            entries.push(AuditEntry::try_from(row)?);
        }
        if expected != to_seq + 1 {
            return Err(StorageError::EntryNotFound { seq: expected });
        }
        Ok(entries)
    }

    async fn latest_seq(&self) -> StorageResult<Option<u64>> {
        Ok(self.fetch_latest().await?.map(|row| row.seq))
    }
}

#[async_trait]
impl OutcomeStore for SurrealAuditSink {
    async fn record(&self, outcome: OutcomeRecord) -> StorageResult<()> {
        let row = OutcomeRow::from(&outcome);
        let _created: Option<OutcomeRow> = self
            .db
            .create("outcomes")
            .content(row)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn outcomes_for(&self, decision_id: &str) -> StorageResult<Vec<OutcomeRecord>> {
        let did = decision_id.to_string();
        let mut res = self
            .db
            .query("SELECT * FROM outcomes WHERE decision_id = $did ORDER BY reported_at ASC")
            .bind(("did", did))
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let rows: Vec<OutcomeRow> = res
            .take(0)
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        Ok(rows.into_iter().map(OutcomeRecord::from).collect())
    }
}
