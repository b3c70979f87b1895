//! Database migrations for the SQLite store

use rusqlite::Connection;

use super::StoreResult;

/// Current schema version
const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations
pub fn run(conn: &mut Connection) -> StoreResult<()> {
    let version = get_version(conn)?;

    if version < 1 {
        migrate_v1(conn)?;
    }
    if version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

/// Get the current schema version
fn get_version(conn: &Connection) -> StoreResult<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

fn apply(conn: &mut Connection, statements: &[&str]) -> StoreResult<()> {
    let tx = conn.transaction()?;
    for stmt in statements {
        tx.execute(stmt, [])?;
    }
    tx.commit()?;
    Ok(())
}

/// Migration to version 1: documents and the commit log
fn migrate_v1(conn: &mut Connection) -> StoreResult<()> {
    apply(
        conn,
        &[
            // Schema version tracking
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            )",
            // Latest version of every document, tombstones included
            "CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                revision TEXT NOT NULL,
                seq INTEGER NOT NULL,
                deleted INTEGER NOT NULL DEFAULT 0,
                body TEXT NOT NULL
            )",
            // Every commit in order; feeds views and change streams
            "CREATE TABLE IF NOT EXISTS changes (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                doc_id TEXT NOT NULL,
                revision TEXT NOT NULL,
                deleted INTEGER NOT NULL DEFAULT 0,
                body TEXT NOT NULL
            )",
            "INSERT INTO schema_version (version) VALUES (1)",
        ],
    )?;

    tracing::info!("Migrated database to version 1");
    Ok(())
}

/// Migration to version 2: lookup of a document's commits
fn migrate_v2(conn: &mut Connection) -> StoreResult<()> {
    apply(
        conn,
        &[
            "CREATE INDEX IF NOT EXISTS idx_changes_doc_id ON changes(doc_id)",
            "CREATE INDEX IF NOT EXISTS idx_documents_deleted ON documents(deleted)",
            "INSERT INTO schema_version (version) VALUES (2)",
        ],
    )?;

    tracing::info!("Migrated database to version {CURRENT_VERSION}");
    Ok(())
}
