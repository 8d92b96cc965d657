//! Sync state repository implementation

use crate::error::{Error, Result};
use crate::models::{SyncState, SyncStatus};
use crate::util::{format_timestamp, parse_timestamp};
use rusqlite::{params, Connection, OptionalExtension};

const STATE_COLUMNS: &str = "path, notion_page_id, notion_parent_id, content_hash, frontmatter_hash,
     obsidian_mtime, notion_mtime, last_sync, sync_direction, status";

/// Trait for sync state storage operations
pub trait StateRepository {
    /// Get the state for a path
    fn get(&self, path: &str) -> Result<Option<SyncState>>;

    /// Insert or replace the state keyed by its path
    fn upsert(&self, state: &SyncState) -> Result<()>;

    /// Delete the state for a path, returning whether a row existed
    fn delete(&self, path: &str) -> Result<bool>;

    /// List states with one of the given statuses (all when empty), ordered by path
    fn list(&self, statuses: &[SyncStatus]) -> Result<Vec<SyncState>>;

    /// States whose stored body hash equals `content_hash`, ordered by path
    fn find_by_content_hash(&self, content_hash: &str) -> Result<Vec<SyncState>>;

    /// States that have a remote page id, ordered by path
    fn list_with_remote(&self) -> Result<Vec<SyncState>>;

    /// Move a state to a new path
    fn rename(&self, old_path: &str, new_path: &str) -> Result<()>;
}

/// `SQLite` implementation of `StateRepository`
pub struct SqliteStateRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteStateRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse a state from a database row
    fn parse_state(row: &rusqlite::Row<'_>) -> rusqlite::Result<SyncState> {
        let obsidian_mtime: Option<String> = row.get(5)?;
        let notion_mtime: Option<String> = row.get(6)?;
        let last_sync: Option<String> = row.get(7)?;
        let status: String = row.get(9)?;
        Ok(SyncState {
            path: row.get(0)?,
            notion_page_id: row.get(1)?,
            notion_parent_id: row.get(2)?,
            content_hash: row.get(3)?,
            frontmatter_hash: row.get(4)?,
            obsidian_mtime: obsidian_mtime.as_deref().and_then(parse_timestamp),
            notion_mtime: notion_mtime.as_deref().and_then(parse_timestamp),
            last_sync: last_sync.as_deref().and_then(parse_timestamp),
            sync_direction: row.get(8)?,
            status: status.parse().unwrap_or_default(),
        })
    }

    fn query_states(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<SyncState>> {
        let mut stmt = self.conn.prepare(sql)?;
        let states = stmt
            .query_map(params, Self::parse_state)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(states)
    }
}

impl StateRepository for SqliteStateRepository<'_> {
    fn get(&self, path: &str) -> Result<Option<SyncState>> {
        let state = self
            .conn
            .query_row(
                &format!("SELECT {STATE_COLUMNS} FROM sync_state WHERE path = ?"),
                params![path],
                Self::parse_state,
            )
            .optional()?;
        Ok(state)
    }

    fn upsert(&self, state: &SyncState) -> Result<()> {
        if state.path.trim().is_empty() {
            return Err(Error::InvalidInput("sync state path is empty".into()));
        }

        self.conn.execute(
            "INSERT INTO sync_state (
                path, notion_page_id, notion_parent_id, content_hash, frontmatter_hash,
                obsidian_mtime, notion_mtime, last_sync, sync_direction, status
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(path) DO UPDATE SET
                notion_page_id = excluded.notion_page_id,
                notion_parent_id = excluded.notion_parent_id,
                content_hash = excluded.content_hash,
                frontmatter_hash = excluded.frontmatter_hash,
                obsidian_mtime = excluded.obsidian_mtime,
                notion_mtime = excluded.notion_mtime,
                last_sync = excluded.last_sync,
                sync_direction = excluded.sync_direction,
                status = excluded.status",
            params![
                state.path,
                state.notion_page_id,
                state.notion_parent_id,
                state.content_hash,
                state.frontmatter_hash,
                state.obsidian_mtime.map(format_timestamp),
                state.notion_mtime.map(format_timestamp),
                state.last_sync.map(format_timestamp),
                state.sync_direction,
                state.status.as_str(),
            ],
        )?;
        Ok(())
    }

    fn delete(&self, path: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM sync_state WHERE path = ?", params![path])?;
        Ok(rows > 0)
    }

    fn list(&self, statuses: &[SyncStatus]) -> Result<Vec<SyncState>> {
        if statuses.is_empty() {
            return self.query_states(
                &format!("SELECT {STATE_COLUMNS} FROM sync_state ORDER BY path"),
                [],
            );
        }

        let placeholders = vec!["?"; statuses.len()].join(", ");
        let names = statuses
            .iter()
            .map(|status| status.as_str())
            .collect::<Vec<_>>();
        self.query_states(
            &format!(
                "SELECT {STATE_COLUMNS} FROM sync_state WHERE status IN ({placeholders}) ORDER BY path"
            ),
            rusqlite::params_from_iter(names),
        )
    }

    fn find_by_content_hash(&self, content_hash: &str) -> Result<Vec<SyncState>> {
        if content_hash.is_empty() {
            return Ok(Vec::new());
        }
        self.query_states(
            &format!(
                "SELECT {STATE_COLUMNS} FROM sync_state WHERE content_hash = ? ORDER BY path"
            ),
            params![content_hash],
        )
    }

    fn list_with_remote(&self) -> Result<Vec<SyncState>> {
        self.query_states(
            &format!(
                "SELECT {STATE_COLUMNS} FROM sync_state WHERE notion_page_id != '' ORDER BY path"
            ),
            [],
        )
    }

    fn rename(&self, old_path: &str, new_path: &str) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE sync_state SET path = ? WHERE path = ?",
            params![new_path, old_path],
        )?;
        if rows == 0 {
            return Err(Error::NotFound(old_path.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn setup() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn synced(path: &str, page_id: &str, hash: &str) -> SyncState {
        SyncState {
            notion_page_id: page_id.to_string(),
            content_hash: hash.to_string(),
            status: SyncStatus::Synced,
            notion_mtime: Some(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()),
            ..SyncState::new(path)
        }
    }

    #[test]
    fn test_upsert_and_get() {
        let db = setup();
        let repo = SqliteStateRepository::new(db.connection());

        let state = synced("notes/a.md", "page-a", "hash-a");
        repo.upsert(&state).unwrap();

        let fetched = repo.get("notes/a.md").unwrap().unwrap();
        assert_eq!(fetched, state);
        assert!(repo.get("missing.md").unwrap().is_none());
    }

    #[test]
    fn test_upsert_replaces_existing_row() {
        let db = setup();
        let repo = SqliteStateRepository::new(db.connection());

        repo.upsert(&SyncState::new("a.md")).unwrap();
        let updated = synced("a.md", "page-a", "hash-2");
        repo.upsert(&updated).unwrap();

        assert_eq!(repo.list(&[]).unwrap(), vec![updated]);
    }

    #[test]
    fn test_upsert_rejects_empty_path() {
        let db = setup();
        let repo = SqliteStateRepository::new(db.connection());
        assert!(repo.upsert(&SyncState::new("  ")).is_err());
    }

    #[test]
    fn test_list_filters_by_status_and_orders_by_path() {
        let db = setup();
        let repo = SqliteStateRepository::new(db.connection());

        repo.upsert(&synced("c.md", "p3", "h3")).unwrap();
        repo.upsert(&SyncState::new("b.md")).unwrap();
        repo.upsert(&synced("a.md", "p1", "h1")).unwrap();

        let all = repo.list(&[]).unwrap();
        let paths: Vec<_> = all.iter().map(|s| s.path.as_str()).collect();
        assert_eq!(paths, vec!["a.md", "b.md", "c.md"]);

        let synced_only = repo.list(&[SyncStatus::Synced]).unwrap();
        assert_eq!(synced_only.len(), 2);

        let mixed = repo
            .list(&[SyncStatus::Pending, SyncStatus::Conflict])
            .unwrap();
        assert_eq!(mixed.len(), 1);
        assert_eq!(mixed[0].path, "b.md");
    }

    #[test]
    fn test_delete() {
        let db = setup();
        let repo = SqliteStateRepository::new(db.connection());

        repo.upsert(&SyncState::new("a.md")).unwrap();
        assert!(repo.delete("a.md").unwrap());
        assert!(!repo.delete("a.md").unwrap());
        assert!(repo.get("a.md").unwrap().is_none());
    }

    #[test]
    fn test_find_by_content_hash_ignores_empty_hash() {
        let db = setup();
        let repo = SqliteStateRepository::new(db.connection());

        repo.upsert(&synced("a.md", "p1", "same")).unwrap();
        repo.upsert(&SyncState::new("empty.md")).unwrap();

        assert_eq!(repo.find_by_content_hash("same").unwrap().len(), 1);
        assert!(repo.find_by_content_hash("").unwrap().is_empty());
    }

    #[test]
    fn test_list_with_remote_and_rename() {
        let db = setup();
        let repo = SqliteStateRepository::new(db.connection());

        repo.upsert(&synced("a.md", "p1", "h1")).unwrap();
        repo.upsert(&SyncState::new("b.md")).unwrap();

        let remote = repo.list_with_remote().unwrap();
        assert_eq!(remote.len(), 1);

        repo.rename("a.md", "moved/a.md").unwrap();
        assert!(repo.get("a.md").unwrap().is_none());
        assert_eq!(
            repo.get("moved/a.md").unwrap().unwrap().notion_page_id,
            "p1"
        );
        assert!(matches!(
            repo.rename("a.md", "x.md"),
            Err(Error::NotFound(_))
        ));
    }
}
