//! Database schema and migrations
//!
//! Migrations are numbered steps applied in order inside one transaction.
//! Running them against a current database is a no-op.

use rusqlite::{Connection, OptionalExtension, Transaction};
use tracing::info;

use crate::db::Store;
use crate::types::ChainhubError;

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 2;

/// Outcome of a migration run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationReport {
    /// Schema version after the run
    pub version: i32,
    /// Whether any step was applied
    pub applied: bool,
}

/// Apply pending migrations to `store`
pub fn migrate(store: &Store) -> Result<MigrationReport, ChainhubError> {
    store.with_conn_mut(init_schema)
}

/// Bring the schema on `conn` up to [`SCHEMA_VERSION`]
pub fn init_schema(conn: &mut Connection) -> Result<MigrationReport, ChainhubError> {
    let tx = conn.transaction()?;
    let current_version = get_schema_version(&tx)?;

    if current_version >= SCHEMA_VERSION {
        info!(
            "migrations: no new migrations to run (current version: {})",
            current_version
        );
        return Ok(MigrationReport {
            version: current_version,
            applied: false,
        });
    }

    for version in (current_version + 1)..=SCHEMA_VERSION {
        apply_step(&tx, version)?;
        info!("migrations: applied v{}", version);
    }
    set_schema_version(&tx, SCHEMA_VERSION)?;
    tx.commit()?;

    info!(
        "migrations: applied new migrations (current version: {})",
        SCHEMA_VERSION
    );
    Ok(MigrationReport {
        version: SCHEMA_VERSION,
        applied: true,
    })
}

/// Get current schema version (0 if not initialized)
fn get_schema_version(tx: &Transaction) -> Result<i32, ChainhubError> {
    tx.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        [],
    )
    .map_err(|e| ChainhubError::Internal(format!("Failed to create schema_version table: {}", e)))?;

    let version = tx
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
        .optional()?
        .unwrap_or(0);

    Ok(version)
}

fn set_schema_version(tx: &Transaction, version: i32) -> Result<(), ChainhubError> {
    tx.execute("DELETE FROM schema_version", [])?;
    tx.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

fn apply_step(tx: &Transaction, version: i32) -> Result<(), ChainhubError> {
    let sql = match version {
        1 => V1_TABLES,
        2 => V2_ONE_TREE_PER_USER,
        other => {
            return Err(ChainhubError::Internal(format!(
                "No migration defined for schema v{}",
                other
            )))
        }
    };

    tx.execute_batch(sql)
        .map_err(|e| ChainhubError::Internal(format!("Migration v{} failed: {}", version, e)))
}

/// Users, trees and links
const V1_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    email TEXT UNIQUE,
    username TEXT UNIQUE,
    password_hash TEXT,
    wallet_address TEXT UNIQUE,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS trees (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS links (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tree_id INTEGER NOT NULL REFERENCES trees(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    url TEXT NOT NULL,
    position INTEGER NOT NULL DEFAULT 0,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_trees_user ON trees(user_id);
CREATE INDEX IF NOT EXISTS idx_links_tree_order ON links(tree_id, position, id);
"#;

/// One tree per user, enforced by the store
const V2_ONE_TREE_PER_USER: &str = r#"
CREATE UNIQUE INDEX IF NOT EXISTS idx_trees_user_unique ON trees(user_id);
"#;
