//! SurrealDB schema migrations and initialization
//!
//! This module provides initialization functions to set up all tables
//! with proper constraints and indexes.

use crate::Result;
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

/// Initialize all QSAI tables in SurrealDB
///
/// This should be called once on first connection to set up the schema.
/// Safe to call multiple times (idempotent).
pub async fn init_schema(db: &Surreal<Any>) -> Result<()> {
    info!("Initializing QSAI SurrealDB schema");

    init_audit_entries_table(db).await?;
    init_outcomes_table(db).await?;

    info!("QSAI schema initialization complete");
    Ok(())
}

/// Initialize the `audit_entries` table.
///
/// Schema:
/// ```text
/// TABLE audit_entries {
///   seq:              INT (primary key, unique, dense from 1)
///   decision_id:      STRING (indexed)
///   subject:          STRING (indexed)
///   recorded_at:      DATETIME
///   context_digest:   STRING
///   proposal_digests: ARRAY<STRING>
///   policy_version:   STRING
///   rejections:       ARRAY<OBJECT>
///   solver:           STRING
///   solver_output:    OBJECT
///   decision:         OBJECT
///   content_hash:     STRING
///   prev_chain_hash:  STRING
///   chain_hash:       STRING
/// }
/// ```
///
/// Constraints:
/// - `seq` is unique; appends are serialized by the sink so the sequence
///   stays dense.
/// - Rows are append-only: update and delete are denied at the table level
///   since chain integrity depends on entries never changing.
async fn init_audit_entries_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing audit_entries table");

    let sql = r#"
        DEFINE TABLE audit_entries
            SCHEMALESS
            PERMISSIONS
                FOR create FULL
                FOR select FULL
                FOR update NONE
                FOR delete NONE;

        -- The global sequence is the primary handle on entries
        DEFINE INDEX idx_audit_seq ON TABLE audit_entries COLUMNS seq UNIQUE;

        -- Look up the entry for a given decision
        DEFINE INDEX idx_audit_decision_id ON TABLE audit_entries COLUMNS decision_id;

        -- Per-subject history queries
        DEFINE INDEX idx_audit_subject ON TABLE audit_entries COLUMNS subject;
    "#;

    db.query(sql).await?;
    info!("✓ audit_entries table initialized");
    Ok(())
}

/// Initialize the `outcomes` table.
///
/// Schema:
/// ```text
/// TABLE outcomes {
///   decision_id:    STRING (indexed, foreign key to audit_entries.decision_id)
///   realized_value: FLOAT
///   success:        BOOL
///   reported_at:    DATETIME
/// }
/// ```
async fn init_outcomes_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing outcomes table");

    let sql = r#"
        DEFINE TABLE outcomes
            SCHEMALESS
            PERMISSIONS
                FOR create FULL
                FOR select FULL
                FOR update NONE
                FOR delete NONE;

        DEFINE INDEX idx_outcomes_decision_id ON TABLE outcomes COLUMNS decision_id;
    "#;

    db.query(sql).await?;
    info!("✓ outcomes table initialized");
    Ok(())
}
