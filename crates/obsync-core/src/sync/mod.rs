//! Change detection and conflict tracking.
//!
//! [`ChangeDetector`] compares the vault with the state store and, when a
//! [`RemoteChecker`] is attached, with remote page metadata. Each path appears
//! at most once in its output. Conflicts are reported as a single
//! `Conflict/Both` change and can be handed to the [`ConflictTracker`].

mod conflict;
mod local;
mod remote;
mod vault;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub use conflict::ConflictTracker;
pub use remote::{RemoteChecker, RemotePageInfo};
pub use vault::{DirectoryVault, VaultFile, VaultSource};

use crate::config::DetectorConfig;
use crate::error::Result;
use crate::models::{Change, ChangeType, SyncState, SyncStatus};
use crate::services::StateStore;

/// Classifies local and remote differences into [`Change`] records.
#[derive(Clone)]
pub struct ChangeDetector {
    store: StateStore,
    vault: Arc<dyn VaultSource>,
    remote: Option<Arc<dyn RemoteChecker>>,
    config: DetectorConfig,
}

impl ChangeDetector {
    pub fn new(store: StateStore, vault: Arc<dyn VaultSource>, config: DetectorConfig) -> Self {
        Self {
            store,
            vault,
            remote: None,
            config,
        }
    }

    /// Attach a remote metadata checker.
    #[must_use]
    pub fn with_remote_checker(mut self, checker: Arc<dyn RemoteChecker>) -> Self {
        self.remote = Some(checker);
        self
    }

    pub const fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Local changes only, ordered by path.
    pub fn detect_local_changes(&self) -> Result<Vec<Change>> {
        Ok(local::scan(&self.store, self.vault.as_ref(), &self.config)?.changes)
    }

    /// Local and remote changes merged, ordered by path.
    ///
    /// Without a remote checker this is the same as
    /// [`detect_local_changes`](Self::detect_local_changes). A failed lookup
    /// for a record falls back to its local classification.
    pub async fn detect_all_changes(&self) -> Result<Vec<Change>> {
        let scan = local::scan(&self.store, self.vault.as_ref(), &self.config)?;
        let Some(checker) = &self.remote else {
            tracing::debug!("No remote checker attached, skipping remote detection");
            return Ok(scan.changes);
        };

        let candidates = self.store.states_with_remote()?;
        let candidates: Vec<&SyncState> = candidates
            .iter()
            .filter(|state| state.status == SyncStatus::Synced)
            .collect();

        // Renames and local deletions keep their local classification
        let mut changes = Vec::with_capacity(scan.changes.len());
        let mut by_path = HashMap::new();
        for change in scan.changes {
            let local_only = matches!(
                change.change_type,
                ChangeType::Created | ChangeType::Renamed | ChangeType::Deleted
            );
            if local_only {
                changes.push(change);
            } else {
                by_path.insert(change.path.clone(), change);
            }
        }
        let moved: HashSet<String> = changes
            .iter()
            .flat_map(|c| std::iter::once(c.path.clone()).chain(c.old_path.clone()))
            .collect();
        let candidates: Vec<&SyncState> = candidates
            .into_iter()
            .filter(|state| !moved.contains(state.path.as_str()))
            .collect();

        let infos = remote::fetch(
            checker.as_ref(),
            &candidates,
            self.config.remote_batch_size,
        )
        .await;

        let mut failures = 0usize;
        for state in candidates {
            let local = by_path.remove(&state.path);
            let classified = match infos.get(&state.notion_page_id) {
                Some(Ok(info)) => {
                    remote::classify(state, info, local, scan.modified.contains(&state.path))
                }
                Some(Err(e)) => {
                    failures += 1;
                    tracing::warn!(
                        "Remote lookup failed for {}, using local state only: {e}",
                        state.path
                    );
                    local
                }
                None => {
                    failures += 1;
                    tracing::warn!("No remote result for {}, using local state only", state.path);
                    local
                }
            };
            changes.extend(classified);
        }
        changes.extend(by_path.into_values());
        changes.sort_by(|a, b| a.path.cmp(&b.path));

        if failures > 0 {
            tracing::warn!("{failures} remote lookups failed; those records were checked locally");
        }
        tracing::info!("Detected {} changes", changes.len());
        Ok(changes)
    }
}
