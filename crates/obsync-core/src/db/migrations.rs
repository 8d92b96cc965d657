//! Database migrations

use crate::error::Result;
use rusqlite::{Connection, OptionalExtension};

/// Current schema version
pub const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations
pub fn run(conn: &mut Connection) -> Result<()> {
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
pub fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version: Option<i32> = conn
        .query_row("SELECT MAX(version) FROM schema_version", [], |row| {
            row.get(0)
        })
        .optional()?
        .flatten();

    Ok(version.unwrap_or(0))
}

/// Migration to version 1: Initial schema
fn migrate_v1(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );

        -- One row per tracked document
        CREATE TABLE IF NOT EXISTS sync_state (
            path TEXT PRIMARY KEY,
            notion_page_id TEXT NOT NULL DEFAULT '',
            notion_parent_id TEXT NOT NULL DEFAULT '',
            content_hash TEXT NOT NULL DEFAULT '',
            frontmatter_hash TEXT NOT NULL DEFAULT '',
            obsidian_mtime TEXT,
            notion_mtime TEXT,
            last_sync TEXT,
            sync_direction TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL DEFAULT 'pending'
        );
        CREATE INDEX IF NOT EXISTS idx_sync_state_status ON sync_state(status);
        CREATE INDEX IF NOT EXISTS idx_sync_state_page_id ON sync_state(notion_page_id);
        CREATE INDEX IF NOT EXISTS idx_sync_state_content_hash ON sync_state(content_hash);

        -- Cross-document references
        CREATE TABLE IF NOT EXISTS links (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            source_path TEXT NOT NULL,
            target_name TEXT NOT NULL,
            target_path TEXT,
            notion_page_id TEXT,
            resolved INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_links_source ON links(source_path);
        CREATE INDEX IF NOT EXISTS idx_links_target ON links(target_name);

        -- Append-only audit log
        CREATE TABLE IF NOT EXISTS sync_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            path TEXT NOT NULL,
            action TEXT NOT NULL,
            details TEXT NOT NULL DEFAULT '',
            timestamp TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_sync_history_path ON sync_history(path);

        -- Scalar key/value settings
        CREATE TABLE IF NOT EXISTS config (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        INSERT INTO schema_version (version) VALUES (1);",
    )?;
    tx.commit()?;

    tracing::info!("Migrated state database to version 1");
    Ok(())
}

/// Migration to version 2: Link uniqueness and history ordering
fn migrate_v2(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(
        "DELETE FROM links WHERE id NOT IN (
            SELECT MIN(id) FROM links GROUP BY source_path, target_name
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_links_source_target
            ON links(source_path, target_name);
        CREATE INDEX IF NOT EXISTS idx_links_resolved ON links(resolved);
        CREATE INDEX IF NOT EXISTS idx_sync_history_path_time
            ON sync_history(path, timestamp DESC);
        CREATE INDEX IF NOT EXISTS idx_sync_history_time ON sync_history(timestamp);

        INSERT INTO schema_version (version) VALUES (2);",
    )?;
    tx.commit()?;

    tracing::info!("Migrated state database to version {CURRENT_VERSION}");
    Ok(())
}
