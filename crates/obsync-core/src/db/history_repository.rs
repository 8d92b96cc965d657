//! Sync history repository implementation

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;
use crate::models::{HistoryEntry, HistoryKind};
use crate::util::{format_timestamp, parse_timestamp};

/// Trait for append-only history operations
pub trait HistoryRepository {
    /// Append a row, returning its id
    fn append(
        &self,
        path: &str,
        kind: HistoryKind,
        details: &str,
        at: DateTime<Utc>,
    ) -> Result<i64>;

    /// Rows for a path, newest first
    fn list(&self, path: &str, limit: usize) -> Result<Vec<HistoryEntry>>;

    /// Newest row of a given kind for a path
    fn latest(&self, path: &str, kind: HistoryKind) -> Result<Option<HistoryEntry>>;

    /// Delete rows older than `cutoff`, returning the number removed
    fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}

/// `SQLite` implementation of `HistoryRepository`
pub struct SqliteHistoryRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteHistoryRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<HistoryEntry> {
        let kind: String = row.get(2)?;
        let timestamp: String = row.get(4)?;
        Ok(HistoryEntry {
            id: row.get(0)?,
            path: row.get(1)?,
            kind: kind.parse().unwrap_or(HistoryKind::Error),
            details: row.get(3)?,
            timestamp: parse_timestamp(&timestamp).unwrap_or_default(),
        })
    }
}

impl HistoryRepository for SqliteHistoryRepository<'_> {
    fn append(
        &self,
        path: &str,
        kind: HistoryKind,
        details: &str,
        at: DateTime<Utc>,
    ) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO sync_history (path, action, details, timestamp) VALUES (?, ?, ?, ?)",
            params![path, kind.as_str(), details, format_timestamp(at)],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn list(&self, path: &str, limit: usize) -> Result<Vec<HistoryEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, path, action, details, timestamp
             FROM sync_history
             WHERE path = ?
             ORDER BY timestamp DESC, id DESC
             LIMIT ?",
        )?;

        let entries = stmt
            .query_map(params![path, limit as i64], Self::parse_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(entries)
    }

    fn latest(&self, path: &str, kind: HistoryKind) -> Result<Option<HistoryEntry>> {
        let entry = self
            .conn
            .query_row(
                "SELECT id, path, action, details, timestamp
                 FROM sync_history
                 WHERE path = ? AND action = ?
                 ORDER BY timestamp DESC, id DESC
                 LIMIT 1",
                params![path, kind.as_str()],
                Self::parse_entry,
            )
            .optional()?;
        Ok(entry)
    }

    fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let rows = self.conn.execute(
            "DELETE FROM sync_history WHERE timestamp < ?",
            params![format_timestamp(cutoff)],
        )?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use chrono::Duration;

    fn setup() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_list_is_newest_first_and_limited() {
        let db = setup();
        let repo = SqliteHistoryRepository::new(db.connection());
        let base = Utc::now();

        for offset in 0..5 {
            repo.append(
                "a.md",
                HistoryKind::Push,
                &format!("push {offset}"),
                base + Duration::seconds(offset),
            )
            .unwrap();
        }
        repo.append("b.md", HistoryKind::Pull, "", base).unwrap();

        let entries = repo.list("a.md", 3).unwrap();
        let details: Vec<_> = entries.iter().map(|e| e.details.as_str()).collect();
        assert_eq!(details, vec!["push 4", "push 3", "push 2"]);
    }

    #[test]
    fn test_latest_by_kind() {
        let db = setup();
        let repo = SqliteHistoryRepository::new(db.connection());
        let base = Utc::now();

        repo.append("a.md", HistoryKind::Conflict, "first", base)
            .unwrap();
        repo.append("a.md", HistoryKind::Conflict, "second", base + Duration::seconds(1))
            .unwrap();
        repo.append(
            "a.md",
            HistoryKind::ConflictResolved,
            "done",
            base + Duration::seconds(2),
        )
        .unwrap();

        let latest = repo.latest("a.md", HistoryKind::Conflict).unwrap().unwrap();
        assert_eq!(latest.details, "second");
        assert!(repo.latest("b.md", HistoryKind::Conflict).unwrap().is_none());
    }

    #[test]
    fn test_delete_before() {
        let db = setup();
        let repo = SqliteHistoryRepository::new(db.connection());
        let now = Utc::now();

        repo.append("a.md", HistoryKind::Push, "old", now - Duration::days(40))
            .unwrap();
        repo.append("a.md", HistoryKind::Push, "new", now).unwrap();

        let removed = repo.delete_before(now - Duration::days(30)).unwrap();
        assert_eq!(removed, 1);
        let remaining = repo.list("a.md", 10).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].details, "new");
    }
}
