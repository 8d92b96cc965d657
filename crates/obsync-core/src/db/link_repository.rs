//! Link repository implementation

use super::connection::with_transaction;
use crate::error::Result;
use crate::models::{LinkEntry, LinkStats};
use rusqlite::{params, Connection};

const LINK_COLUMNS: &str = "id, source_path, target_name, target_path, notion_page_id, resolved";

/// Trait for cross-reference storage operations
pub trait LinkRepository {
    /// Insert a reference; duplicate (source, target) pairs are ignored.
    /// Returns whether a row was inserted.
    fn insert(&self, source_path: &str, target_name: &str) -> Result<bool>;

    /// Remove every reference from a source, returning the number removed
    fn clear(&self, source_path: &str) -> Result<usize>;

    /// Atomically replace every reference from a source
    fn replace(&self, source_path: &str, target_names: &[String]) -> Result<usize>;

    /// Move all references from `old_source` to `new_source`
    fn rebind_source(&self, old_source: &str, new_source: &str) -> Result<usize>;

    /// References from a source, in insertion order
    fn list_from(&self, source_path: &str) -> Result<Vec<LinkEntry>>;

    /// References resolved to a target path
    fn list_to(&self, target_path: &str) -> Result<Vec<LinkEntry>>;

    /// Every unresolved reference, in insertion order
    fn list_unresolved(&self) -> Result<Vec<LinkEntry>>;

    /// Record a resolution for a single reference row
    fn mark_resolved(&self, id: i64, target_path: Option<&str>, page_id: &str) -> Result<()>;

    /// Counts of resolved and unresolved references
    fn stats(&self) -> Result<LinkStats>;
}

/// `SQLite` implementation of `LinkRepository`
pub struct SqliteLinkRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteLinkRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse a link from a database row
    fn parse_link(row: &rusqlite::Row<'_>) -> rusqlite::Result<LinkEntry> {
        Ok(LinkEntry {
            id: row.get(0)?,
            source_path: row.get(1)?,
            target_name: row.get(2)?,
            target_path: row.get(3)?,
            notion_page_id: row.get(4)?,
            resolved: row.get::<_, i32>(5)? != 0,
        })
    }

    fn query_links(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<LinkEntry>> {
        let mut stmt = self.conn.prepare(sql)?;
        let links = stmt
            .query_map(params, Self::parse_link)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(links)
    }

    fn insert_on(conn: &Connection, source_path: &str, target_name: &str) -> Result<bool> {
        let rows = conn.execute(
            "INSERT OR IGNORE INTO links (source_path, target_name, resolved) VALUES (?, ?, 0)",
            params![source_path, target_name],
        )?;
        Ok(rows > 0)
    }
}

impl LinkRepository for SqliteLinkRepository<'_> {
    fn insert(&self, source_path: &str, target_name: &str) -> Result<bool> {
        Self::insert_on(self.conn, source_path, target_name)
    }

    fn clear(&self, source_path: &str) -> Result<usize> {
        let rows = self
            .conn
            .execute("DELETE FROM links WHERE source_path = ?", params![source_path])?;
        Ok(rows)
    }

    fn replace(&self, source_path: &str, target_names: &[String]) -> Result<usize> {
        with_transaction(self.conn, |conn| {
            conn.execute("DELETE FROM links WHERE source_path = ?", params![source_path])?;
            let mut inserted = 0;
            for target in target_names {
                if Self::insert_on(conn, source_path, target)? {
                    inserted += 1;
                }
            }
            Ok(inserted)
        })
    }

    fn rebind_source(&self, old_source: &str, new_source: &str) -> Result<usize> {
        with_transaction(self.conn, |conn| {
            // Targets already referenced from the new source would violate uniqueness
            conn.execute(
                "DELETE FROM links WHERE source_path = ?1 AND target_name IN (
                    SELECT target_name FROM links WHERE source_path = ?2
                )",
                params![old_source, new_source],
            )?;
            let rows = conn.execute(
                "UPDATE links SET source_path = ? WHERE source_path = ?",
                params![new_source, old_source],
            )?;
            Ok(rows)
        })
    }

    fn list_from(&self, source_path: &str) -> Result<Vec<LinkEntry>> {
        self.query_links(
            &format!("SELECT {LINK_COLUMNS} FROM links WHERE source_path = ? ORDER BY id"),
            params![source_path],
        )
    }

    fn list_to(&self, target_path: &str) -> Result<Vec<LinkEntry>> {
        self.query_links(
            &format!("SELECT {LINK_COLUMNS} FROM links WHERE target_path = ? ORDER BY id"),
            params![target_path],
        )
    }

    fn list_unresolved(&self) -> Result<Vec<LinkEntry>> {
        self.query_links(
            &format!("SELECT {LINK_COLUMNS} FROM links WHERE resolved = 0 ORDER BY id"),
            [],
        )
    }

    fn mark_resolved(&self, id: i64, target_path: Option<&str>, page_id: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE links SET target_path = ?, notion_page_id = ?, resolved = 1 WHERE id = ?",
            params![target_path, page_id, id],
        )?;
        Ok(())
    }

    fn stats(&self) -> Result<LinkStats> {
        let (total, resolved): (i64, i64) = self.conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(resolved), 0) FROM links",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let total = usize::try_from(total).unwrap_or_default();
        let resolved = usize::try_from(resolved).unwrap_or_default();
        Ok(LinkStats {
            total,
            resolved,
            unresolved: total.saturating_sub(resolved),
        })
    }
}
