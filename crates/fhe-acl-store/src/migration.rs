//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL string
//! that transforms the schema from version N to N+1.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema version {} is newer than supported version {}",
            current, CURRENT_VERSION
        )));
    }

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, crate::sqlite::now_millis()],
            )?;
            tracing::debug!(version, "applied registry migration");
        }

        tx.commit()?;
    }

    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Handles known to each contract instance
        CREATE TABLE handles (
            contract BLOB NOT NULL,           -- 20 bytes
            handle_id BLOB NOT NULL,          -- 32 bytes, content-derived
            fhe_type INTEGER NOT NULL,        -- FheType tag
            public_decrypt INTEGER NOT NULL DEFAULT 0,
            recorded_at INTEGER NOT NULL,     -- local timestamp (Unix ms)
            PRIMARY KEY (contract, handle_id)
        );

        -- Permanent grants. Transient grants are never persisted.
        CREATE TABLE grants (
            contract BLOB NOT NULL,
            handle_id BLOB NOT NULL,
            principal_kind INTEGER NOT NULL,  -- 0=contract, 1=account
            principal BLOB NOT NULL,          -- 20 bytes
            granted_at INTEGER NOT NULL,
            PRIMARY KEY (contract, handle_id, principal_kind, principal),
            FOREIGN KEY (contract, handle_id) REFERENCES handles (contract, handle_id)
        );

        -- Input proofs already consumed by an import
        CREATE TABLE consumed_inputs (
            contract BLOB NOT NULL,
            proof_digest BLOB NOT NULL,       -- 32 bytes
            consumed_at INTEGER NOT NULL,
            PRIMARY KEY (contract, proof_digest)
        );

        CREATE INDEX idx_handles_recorded ON handles(contract, recorded_at);
        CREATE INDEX idx_grants_principal ON grants(contract, principal);
        "#,
    )?;

    Ok(())
}
