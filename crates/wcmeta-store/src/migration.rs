//! Database schema migrations.
//!
//! We use a simple versioned migration system. Each migration is a SQL batch
//! that transforms the schema from version N to N+1. Migrations run through
//! the [`Engine`] trait so any engine can be brought up to date.

use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;

use crate::error::{Result, StoreError};
use crate::traits::{Engine, Value};

/// Current schema version.
pub const CURRENT_VERSION: i64 = 1;

/// Bring the schema up to [`CURRENT_VERSION`].
///
/// Idempotent. The caller provides the surrounding transaction.
pub fn migrate(engine: &dyn Engine) -> Result<()> {
    engine.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
    )?;

    let current = current_version(engine)?;
    for version in (current + 1)..=CURRENT_VERSION {
        apply_migration(engine, version)?;
        engine.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
            &[Value::Integer(version), Value::Integer(now_millis())],
        )?;
        debug!(version, "applied schema migration");
    }

    Ok(())
}

/// Highest applied migration, 0 for a fresh store.
pub fn current_version(engine: &dyn Engine) -> Result<i64> {
    let rows = engine.query("SELECT COALESCE(MAX(version), 0) FROM schema_migrations", &[])?;
    match rows.first().and_then(|row| row.first()) {
        Some(Value::Integer(version)) => Ok(*version),
        None => Ok(0),
        Some(other) => Err(StoreError::Migration(format!(
            "unexpected schema version value: {other:?}"
        ))),
    }
}

fn apply_migration(engine: &dyn Engine, version: i64) -> Result<()> {
    match version {
        1 => apply_v1(engine),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: nodes, pristine and actual_node.
fn apply_v1(engine: &dyn Engine) -> Result<()> {
    engine.execute_batch(
        r#"
        -- Base and working layers of every versioned node
        CREATE TABLE nodes (
            local_relpath TEXT NOT NULL,      -- '' is the working-copy root
            op_depth INTEGER NOT NULL,        -- 0 = base layer
            parent_relpath TEXT,              -- NULL only for the root
            kind TEXT NOT NULL,               -- file | dir | symlink
            checksum TEXT REFERENCES pristine (checksum),  -- NULL for dirs
            PRIMARY KEY (local_relpath, op_depth)
        );

        -- Content-addressed pristine texts
        CREATE TABLE pristine (
            checksum TEXT PRIMARY KEY,
            size INTEGER NOT NULL,
            refcount INTEGER NOT NULL DEFAULT 0   -- maintained by the nodes trigger
        );

        -- Per-node working state, including tree conflicts on a directory's children
        CREATE TABLE actual_node (
            local_relpath TEXT PRIMARY KEY,
            parent_relpath TEXT,
            tree_conflict_data                -- skel bytes: TEXT or BLOB
        );

        CREATE INDEX idx_nodes_parent ON nodes(parent_relpath, op_depth);
        CREATE INDEX idx_actual_parent ON actual_node(parent_relpath);
        "#,
    )
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::sqlite::SqliteEngine;

    #[test]
    fn test_migration_creates_tables() {
        let engine = SqliteEngine::open_memory(&StoreConfig::default()).unwrap();
        migrate(&engine).unwrap();

        let tables = engine.table_names().unwrap();
        for table in ["nodes", "pristine", "actual_node", "schema_migrations"] {
            assert!(tables.contains(&table.to_string()), "missing {table}");
        }
    }

    #[test]
    fn test_migration_idempotent() {
        let engine = SqliteEngine::open_memory(&StoreConfig::default()).unwrap();
        migrate(&engine).unwrap();
        migrate(&engine).unwrap(); // Should not error
        migrate(&engine).unwrap(); // Still should not error

        assert_eq!(current_version(&engine).unwrap(), CURRENT_VERSION);
    }
}
