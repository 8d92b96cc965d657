//! Conflict tracking with an append-only audit trail.

use chrono::{Duration, Utc};

use crate::db::{HistoryRepository, SqliteHistoryRepository, SqliteStateRepository, StateRepository};
use crate::error::{Error, Result};
use crate::models::{
    Change, ConflictInfo, ConflictResolution, HistoryEntry, HistoryKind, SyncState, SyncStatus,
};
use crate::services::StateStore;

/// Records and resolves conflicts on top of the state store.
#[derive(Clone)]
pub struct ConflictTracker {
    store: StateStore,
}

impl ConflictTracker {
    pub const fn new(store: StateStore) -> Self {
        Self { store }
    }

    /// Mark a tracked path conflicted and log a snapshot of both sides.
    pub fn record_conflict(&self, info: &ConflictInfo) -> Result<i64> {
        let details = serde_json::to_string(info)?;
        let id = self.store.transaction(|conn| {
            let states = SqliteStateRepository::new(conn);
            let mut state = states
                .get(&info.path)?
                .ok_or_else(|| Error::NotFound(format!("no sync state for {}", info.path)))?;
            state.status = SyncStatus::Conflict;
            states.upsert(&state)?;
            SqliteHistoryRepository::new(conn).append(
                &info.path,
                HistoryKind::Conflict,
                &details,
                info.detected_at,
            )
        })?;
        tracing::warn!("Conflict recorded for {}", info.path);
        Ok(id)
    }

    /// Record a detected `Conflict` change, without content snapshots.
    pub fn record_change(&self, change: &Change) -> Result<i64> {
        if !change.is_conflict() {
            return Err(Error::InvalidInput(format!("not a conflict: {change}")));
        }
        self.record_conflict(&ConflictInfo {
            path: change.path.clone(),
            local_hash: change.local_hash.clone(),
            remote_hash: change.remote_hash.clone(),
            local_mtime: change.local_mtime,
            remote_mtime: change.remote_mtime,
            detected_at: Utc::now(),
            local_content: None,
            remote_content: None,
        })
    }

    /// Close a conflict: the path becomes synced with `content_hash` and the
    /// `resolution` label as its direction.
    pub fn resolve_conflict(
        &self,
        path: &str,
        resolution: &str,
        content_hash: &str,
    ) -> Result<SyncState> {
        let resolved_at = Utc::now();
        let details = serde_json::to_string(&ConflictResolution {
            path: path.to_string(),
            resolution: resolution.to_string(),
            content_hash: content_hash.to_string(),
            resolved_at,
        })?;

        let state = self.store.transaction(|conn| {
            let states = SqliteStateRepository::new(conn);
            let mut state = states
                .get(path)?
                .ok_or_else(|| Error::NotFound(format!("no sync state for {path}")))?;
            state.content_hash = content_hash.to_string();
            state.mark_synced(resolution, resolved_at);
            states.upsert(&state)?;
            SqliteHistoryRepository::new(conn).append(
                path,
                HistoryKind::ConflictResolved,
                &details,
                resolved_at,
            )?;
            Ok(state)
        })?;
        tracing::info!("Conflict for {path} resolved with '{resolution}'");
        Ok(state)
    }

    /// Every path currently in conflict, ordered by path.
    pub fn conflicts(&self) -> Result<Vec<SyncState>> {
        self.store.list_states(&[SyncStatus::Conflict])
    }

    /// Snapshot from the most recent conflict record for a path.
    pub fn conflict_info(&self, path: &str) -> Result<ConflictInfo> {
        let entry = self
            .store
            .latest_history(path, HistoryKind::Conflict)?
            .ok_or_else(|| Error::NotFound(format!("no conflict recorded for {path}")))?;
        Ok(serde_json::from_str(&entry.details)?)
    }

    pub fn has_conflict(&self, path: &str) -> Result<bool> {
        Ok(self
            .store
            .get_state(path)?
            .is_some_and(|state| state.status == SyncStatus::Conflict))
    }

    /// History rows for a path, newest first.
    pub fn history(&self, path: &str, limit: usize) -> Result<Vec<HistoryEntry>> {
        self.store.history(path, limit)
    }

    /// Delete history rows older than `older_than`.
    pub fn prune_history(&self, older_than: Duration) -> Result<usize> {
        self.store.prune_history(older_than)
    }
}
