//! Schema definitions for QSAI SurrealDB tables
//!
//! Tables:
//! - audit_entries: the hash-chained decision log (append-only)
//! - outcomes: realized-outcome reports keyed by decision id
//!
//! Rows convert to/from the `audit` module's types at the boundary so the
//! rest of the system never sees backend representations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::{
    AuditEntry, AuditEntryDraft, ChainHash, ContentDigest, OutcomeRecord, RejectionRecord,
};
use crate::error::StorageError;

/// Module for serializing chrono DateTime to SurrealDB datetime format
mod surreal_datetime {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};
    use surrealdb::sql::Datetime as SurrealDatetime;

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let sd = SurrealDatetime::from(*date);
        serde::Serialize::serialize(&sd, serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let sd = SurrealDatetime::deserialize(deserializer)?;
        Ok(DateTime::from(sd))
    }
}

/// Database row for one audit entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRow {
    pub seq: u64,
    pub decision_id: String,
    pub subject: String,
    #[serde(with = "surreal_datetime")]
    pub recorded_at: DateTime<Utc>,
    pub context_digest: String,
    pub proposal_digests: Vec<String>,
    pub policy_version: String,
    pub rejections: Vec<RejectionRow>,
    pub solver: String,
    pub solver_output: serde_json::Value,
    pub decision: serde_json::Value,
    pub content_hash: String,
    pub prev_chain_hash: String,
    pub chain_hash: String,
}

/// Database representation of a rejection record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectionRow {
    pub proposal_digest: String,
    pub action_id: String,
    pub rule_id: String,
    pub reason: String,
}

impl From<&AuditEntry> for AuditRow {
    fn from(entry: &AuditEntry) -> Self {
        AuditRow {
            seq: entry.seq,
            decision_id: entry.content.decision_id.clone(),
            subject: entry.content.subject.clone(),
            recorded_at: entry.content.recorded_at,
            context_digest: entry.content.context_digest.as_str().to_string(),
            proposal_digests: entry
                .content
                .proposal_digests
                .iter()
                .map(|d| d.as_str().to_string())
                .collect(),
            policy_version: entry.content.policy_version.clone(),
            rejections: entry
                .content
                .rejections
                .iter()
                .map(|r| RejectionRow {
                    proposal_digest: r.proposal_digest.as_str().to_string(),
                    action_id: r.action_id.clone(),
                    rule_id: r.rule_id.clone(),
                    reason: r.reason.clone(),
                })
                .collect(),
            solver: entry.content.solver.clone(),
            solver_output: entry.content.solver_output.clone(),
            decision: entry.content.decision.clone(),
            content_hash: entry.content_hash.as_str().to_string(),
            prev_chain_hash: entry.prev_chain_hash.as_str().to_string(),
            chain_hash: entry.chain_hash.as_str().to_string(),
        }
    }
}

impl TryFrom<AuditRow> for AuditEntry {
    type Error = StorageError;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        let content = AuditEntryDraft {
            decision_id: row.decision_id,
            subject: row.subject,
            recorded_at: row.recorded_at,
            context_digest: ContentDigest::try_from(row.context_digest)?,
            proposal_digests: row
                .proposal_digests
                .into_iter()
                .map(ContentDigest::try_from)
                .collect::<Result<Vec<_>, _>>()?,
            policy_version: row.policy_version,
            rejections: row
                .rejections
                .into_iter()
                .map(|r| {
                    Ok(RejectionRecord {
                        proposal_digest: ContentDigest::try_from(r.proposal_digest)?,
                        action_id: r.action_id,
                        rule_id: r.rule_id,
                        reason: r.reason,
                    })
                })
                .collect::<Result<Vec<_>, StorageError>>()?,
            solver: row.solver,
            solver_output: row.solver_output,
            decision: row.decision,
        };
        Ok(AuditEntry {
            seq: row.seq,
            content,
            content_hash: ContentDigest::try_from(row.content_hash)?,
            prev_chain_hash: ChainHash::try_from(row.prev_chain_hash)?,
            chain_hash: ChainHash::try_from(row.chain_hash)?,
        })
    }
}

/// Database row for one outcome report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeRow {
    pub decision_id: String,
    pub realized_value: f64,
    pub success: bool,
    #[serde(with = "surreal_datetime")]
    pub reported_at: DateTime<Utc>,
}

impl From<&OutcomeRecord> for OutcomeRow {
    fn from(outcome: &OutcomeRecord) -> Self {
        OutcomeRow {
            decision_id: outcome.decision_id.clone(),
            realized_value: outcome.realized_value,
            success: outcome.success,
            reported_at: outcome.reported_at,
        }
    }
}

impl From<OutcomeRow> for OutcomeRecord {
    fn from(row: OutcomeRow) -> Self {
        OutcomeRecord {
            decision_id: row.decision_id,
            realized_value: row.realized_value,
            success: row.success,
            reported_at: row.reported_at,
        }
    }
}
