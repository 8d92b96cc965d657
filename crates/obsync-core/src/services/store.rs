//! Thread-safe state store shared by detectors, the link registry and tasks.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;

use crate::db::{
    with_transaction, ConfigRepository, Database, HistoryRepository, LinkRepository,
    SqliteConfigRepository, SqliteHistoryRepository, SqliteLinkRepository, SqliteStateRepository,
    StateRepository,
};
use crate::error::{Error, Result};
use crate::models::{HistoryEntry, HistoryKind, SyncState, SyncStatus};
use crate::util::{format_timestamp, parse_timestamp};

/// Config key holding the instant of the last complete sync pass
const LAST_FULL_SYNC_KEY: &str = "last_full_sync";

/// Persisted state store.
///
/// Cloning is cheap; all clones share one connection guarded by a mutex, so
/// every write is visible to the next read from any clone.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
}

impl StateStore {
    /// Open a store at the given filesystem path.
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        let db = Database::open(&db_path)?;
        tracing::info!("State store opened at {}", db_path.display());
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory store (primarily for tests).
    pub fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
        })
    }

    /// Location of the database file.
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Database>> {
        self.db
            .lock()
            .map_err(|_| Error::Database("state store lock poisoned".to_string()))
    }

    /// Run `f` with exclusive access to the connection.
    ///
    /// Used by components that compose several repository calls.
    pub fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let db = self.lock()?;
        f(db.connection())
    }

    /// Run `f` inside a transaction; nothing is committed if it fails.
    pub fn transaction<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let db = self.lock()?;
        with_transaction(db.connection(), f)
    }

    // -----------------------------------------------------------------------
    // Sync state
    // -----------------------------------------------------------------------

    /// Fetch the state for a path.
    pub fn get_state(&self, path: &str) -> Result<Option<SyncState>> {
        self.with_connection(|conn| SqliteStateRepository::new(conn).get(path))
    }

    /// Insert or replace a state keyed by its path.
    pub fn set_state(&self, state: &SyncState) -> Result<()> {
        self.with_connection(|conn| SqliteStateRepository::new(conn).upsert(state))
    }

    /// Delete a state once its deletion has been processed.
    pub fn delete_state(&self, path: &str) -> Result<bool> {
        self.with_connection(|conn| SqliteStateRepository::new(conn).delete(path))
    }

    /// List states by status; an empty filter lists everything. Ordered by path.
    pub fn list_states(&self, statuses: &[SyncStatus]) -> Result<Vec<SyncState>> {
        self.with_connection(|conn| SqliteStateRepository::new(conn).list(statuses))
    }

    /// States whose stored body hash equals `content_hash`.
    pub fn find_by_content_hash(&self, content_hash: &str) -> Result<Vec<SyncState>> {
        self.with_connection(|conn| {
            SqliteStateRepository::new(conn).find_by_content_hash(content_hash)
        })
    }

    /// States that exist on the remote side.
    pub fn states_with_remote(&self) -> Result<Vec<SyncState>> {
        self.with_connection(|conn| SqliteStateRepository::new(conn).list_with_remote())
    }

    /// Move a state and its outgoing references to a new path.
    pub fn rename_state(&self, old_path: &str, new_path: &str) -> Result<()> {
        self.transaction(|conn| {
            SqliteStateRepository::new(conn).rename(old_path, new_path)?;
            SqliteLinkRepository::new(conn).rebind_source(old_path, new_path)?;
            SqliteHistoryRepository::new(conn).append(
                new_path,
                HistoryKind::Rename,
                old_path,
                Utc::now(),
            )?;
            Ok(())
        })?;
        tracing::debug!("Renamed sync state {old_path} -> {new_path}");
        Ok(())
    }

    /// Mark a path synced in `direction` and log it.
    pub fn mark_synced(&self, path: &str, direction: &str) -> Result<SyncState> {
        self.transaction(|conn| {
            let repo = SqliteStateRepository::new(conn);
            let mut state = repo
                .get(path)?
                .ok_or_else(|| Error::NotFound(path.to_string()))?;
            let now = Utc::now();
            state.mark_synced(direction, now);
            repo.upsert(&state)?;

            let kind = if direction == crate::models::DIRECTION_PULL {
                HistoryKind::Pull
            } else {
                HistoryKind::Push
            };
            SqliteHistoryRepository::new(conn).append(path, kind, direction, now)?;
            Ok(state)
        })
    }

    /// Mark a path failed and log the message.
    pub fn mark_error(&self, path: &str, message: &str) -> Result<()> {
        self.transaction(|conn| {
            let repo = SqliteStateRepository::new(conn);
            let mut state = repo
                .get(path)?
                .ok_or_else(|| Error::NotFound(path.to_string()))?;
            state.status = SyncStatus::Error;
            repo.upsert(&state)?;
            SqliteHistoryRepository::new(conn).append(
                path,
                HistoryKind::Error,
                message,
                Utc::now(),
            )?;
            Ok(())
        })?;
        tracing::warn!("Sync error for {path}: {message}");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Config
    // -----------------------------------------------------------------------

    /// Read a scalar config value.
    pub fn get_config(&self, key: &str) -> Result<Option<String>> {
        self.with_connection(|conn| SqliteConfigRepository::new(conn).get(key))
    }

    /// Write a scalar config value.
    pub fn set_config(&self, key: &str, value: &str) -> Result<()> {
        self.with_connection(|conn| SqliteConfigRepository::new(conn).set(key, value))
    }

    /// Instant of the last complete sync pass.
    pub fn last_full_sync(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .get_config(LAST_FULL_SYNC_KEY)?
            .as_deref()
            .and_then(parse_timestamp))
    }

    /// Record the instant of a complete sync pass.
    pub fn set_last_full_sync(&self, at: DateTime<Utc>) -> Result<()> {
        self.set_config(LAST_FULL_SYNC_KEY, &format_timestamp(at))
    }

    // -----------------------------------------------------------------------
    // History
    // -----------------------------------------------------------------------

    /// Append a history row.
    pub fn append_history(&self, path: &str, kind: HistoryKind, details: &str) -> Result<i64> {
        self.with_connection(|conn| {
            SqliteHistoryRepository::new(conn).append(path, kind, details, Utc::now())
        })
    }

    /// History rows for a path, newest first.
    pub fn history(&self, path: &str, limit: usize) -> Result<Vec<HistoryEntry>> {
        self.with_connection(|conn| SqliteHistoryRepository::new(conn).list(path, limit))
    }

    /// Newest history row of a kind for a path.
    pub fn latest_history(&self, path: &str, kind: HistoryKind) -> Result<Option<HistoryEntry>> {
        self.with_connection(|conn| SqliteHistoryRepository::new(conn).latest(path, kind))
    }

    /// Delete history rows older than `max_age`.
    pub fn prune_history(&self, max_age: Duration) -> Result<usize> {
        let cutoff = Utc::now() - max_age;
        let removed =
            self.with_connection(|conn| SqliteHistoryRepository::new(conn).delete_before(cutoff))?;
        if removed > 0 {
            tracing::info!("Pruned {removed} history rows older than {cutoff}");
        }
        Ok(removed)
    }
}
