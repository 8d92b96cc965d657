//! Local change detection: compares the vault against stored sync state.

use std::collections::{BTreeMap, HashSet};

use crate::config::DetectorConfig;
use crate::error::Result;
use crate::hashing::{hash_document, ContentHashes};
use crate::models::{Change, ChangeType, Direction, SyncState, SyncStatus};
use crate::services::StateStore;

use super::vault::{VaultFile, VaultSource};

/// Output of a local scan.
#[derive(Debug, Default)]
pub(crate) struct LocalScan {
    pub changes: Vec<Change>,
    /// Tracked paths whose hashes actually differ from the stored state
    pub modified: HashSet<String>,
}

struct Untracked {
    file: VaultFile,
    hashes: ContentHashes,
}

/// Classify every local document against the store.
pub(crate) fn scan(
    store: &StateStore,
    vault: &dyn VaultSource,
    config: &DetectorConfig,
) -> Result<LocalScan> {
    let files = vault.list_files()?;
    let mut tracked: BTreeMap<String, SyncState> = store
        .list_states(&[])?
        .into_iter()
        .map(|state| (state.path.clone(), state))
        .collect();

    let mut scan = LocalScan::default();
    let mut untracked = Vec::new();

    for file in files {
        let hashes = hash_document(&vault.read(&file)?);
        let Some(state) = tracked.remove(&file.path) else {
            untracked.push(Untracked { file, hashes });
            continue;
        };

        // Stays a conflict until resolved through the tracker
        if state.status == SyncStatus::Conflict {
            tracing::debug!("Unresolved conflict for {}", file.path);
            scan.changes.push(
                Change::new(&file.path, ChangeType::Conflict, Direction::Both)
                    .with_local(hashes.content_hash, file.mtime)
                    .with_state(state),
            );
            continue;
        }

        let body_changed = hashes.content_hash != state.content_hash;
        let frontmatter_changed = hashes.frontmatter_hash != state.frontmatter_hash;
        if body_changed || frontmatter_changed {
            scan.modified.insert(file.path.clone());
        } else if !config.force {
            continue;
        }

        tracing::debug!(
            "Modified {} (body: {body_changed}, front matter: {frontmatter_changed})",
            file.path
        );
        let mut change = Change::new(&file.path, ChangeType::Modified, Direction::Push)
            .with_local(hashes.content_hash, file.mtime)
            .with_state(state);
        change.frontmatter_only = frontmatter_changed && !body_changed;
        scan.changes.push(change);
    }

    // Whatever is left in `tracked` has no file on disk
    for Untracked { file, hashes } in untracked {
        let renamed_from = if hashes.content_hash.is_empty() {
            None
        } else {
            tracked
                .values()
                .find(|state| state.content_hash == hashes.content_hash)
                .map(|state| state.path.clone())
        };

        let change = match renamed_from.and_then(|old| tracked.remove(&old)) {
            Some(old_state) => {
                tracing::debug!("Renamed {} -> {}", old_state.path, file.path);
                let mut change = Change::new(&file.path, ChangeType::Renamed, Direction::Push)
                    .with_local(hashes.content_hash, file.mtime);
                change.old_path = Some(old_state.path.clone());
                change.with_state(old_state)
            }
            None => {
                tracing::debug!("Created {}", file.path);
                Change::new(&file.path, ChangeType::Created, Direction::Push)
                    .with_local(hashes.content_hash, file.mtime)
            }
        };
        scan.changes.push(change);
    }

    for (path, state) in tracked {
        tracing::debug!("Deleted {path}");
        scan.changes
            .push(Change::new(path, ChangeType::Deleted, Direction::Push).with_state(state));
    }

    scan.changes.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(scan)
}
