//! Remote change detection against an injected metadata checker.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{Change, ChangeType, Direction, SyncState};

/// Remote metadata for one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemotePageInfo {
    pub last_edited_time: DateTime<Utc>,
    pub archived: bool,
}

/// Looks up remote page metadata by page id.
#[async_trait]
pub trait RemoteChecker: Send + Sync {
    async fn page_info(&self, page_id: &str) -> Result<RemotePageInfo>;

    /// Batch lookup. One entry per requested id; a failure for one id never
    /// affects the others.
    async fn page_infos(&self, page_ids: &[String]) -> Vec<(String, Result<RemotePageInfo>)> {
        let mut results = Vec::with_capacity(page_ids.len());
        for id in page_ids {
            results.push((id.clone(), self.page_info(id).await));
        }
        results
    }
}

/// Fetch metadata for every record, in batches of `batch_size`.
pub(crate) async fn fetch(
    checker: &dyn RemoteChecker,
    states: &[&SyncState],
    batch_size: usize,
) -> HashMap<String, Result<RemotePageInfo>> {
    let ids: Vec<String> = states.iter().map(|s| s.notion_page_id.clone()).collect();
    let mut infos = HashMap::with_capacity(ids.len());
    for chunk in ids.chunks(batch_size.max(1)) {
        infos.extend(checker.page_infos(chunk).await);
    }
    infos
}

/// Whether the remote side moved past the stored snapshot.
///
/// Compares against the stored remote mtime, or the last sync when no remote
/// mtime was recorded.
pub(crate) fn remote_changed(state: &SyncState, info: &RemotePageInfo) -> bool {
    match state.notion_mtime.or(state.last_sync) {
        Some(seen) => info.last_edited_time > seen,
        None => true,
    }
}

/// Classify one remote-tracked record.
///
/// `local` is the record's local change, if any; `local_modified` says whether
/// its hashes really differ from the stored state.
pub(crate) fn classify(
    state: &SyncState,
    info: &RemotePageInfo,
    local: Option<Change>,
    local_modified: bool,
) -> Option<Change> {
    let remote_mtime = Some(info.last_edited_time);

    if info.archived {
        tracing::debug!("Remote page for {} archived", state.path);
        return Some(
            Change::new(&state.path, ChangeType::Deleted, Direction::Pull)
                .with_remote(String::new(), remote_mtime)
                .with_state(state.clone()),
        );
    }

    if !remote_changed(state, info) {
        return local;
    }

    if local_modified {
        tracing::debug!("Both sides changed for {}", state.path);
        let (local_hash, local_mtime) = local
            .map(|c| (c.local_hash, c.local_mtime))
            .unwrap_or_default();
        return Some(
            Change::new(&state.path, ChangeType::Conflict, Direction::Both)
                .with_local(local_hash, local_mtime)
                .with_remote(String::new(), remote_mtime)
                .with_state(state.clone()),
        );
    }

    tracing::debug!("Remote changed for {}", state.path);
    Some(
        Change::new(&state.path, ChangeType::Modified, Direction::Pull)
            .with_remote(String::new(), remote_mtime)
            .with_state(state.clone()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap()
    }

    fn synced(path: &str) -> SyncState {
        SyncState {
            notion_page_id: format!("page-{path}"),
            notion_mtime: Some(at(10)),
            last_sync: Some(at(10)),
            ..SyncState::new(path)
        }
    }

    fn info(hour: u32) -> RemotePageInfo {
        RemotePageInfo {
            last_edited_time: at(hour),
            archived: false,
        }
    }

    #[test]
    fn unchanged_remote_keeps_local_classification() {
        let state = synced("a.md");
        assert_eq!(classify(&state, &info(10), None, false), None);

        let push = Change::new("a.md", ChangeType::Modified, Direction::Push);
        let kept = classify(&state, &info(9), Some(push.clone()), true);
        assert_eq!(kept, Some(push));
    }

    #[test]
    fn remote_only_change_pulls() {
        let change = classify(&synced("a.md"), &info(11), None, false).unwrap();
        assert_eq!(change.change_type, ChangeType::Modified);
        assert_eq!(change.direction, Direction::Pull);
        assert_eq!(change.remote_mtime, Some(at(11)));
    }

    #[test]
    fn both_changed_is_one_conflict() {
        let push = Change::new("a.md", ChangeType::Modified, Direction::Push)
            .with_local("h1", Some(at(12)));
        let change = classify(&synced("a.md"), &info(11), Some(push), true).unwrap();
        assert!(change.is_conflict());
        assert_eq!(change.direction, Direction::Both);
        assert_eq!(change.local_hash, "h1");
    }

    #[test]
    fn forced_change_without_edits_pulls() {
        let forced = Change::new("a.md", ChangeType::Modified, Direction::Push);
        let change = classify(&synced("a.md"), &info(11), Some(forced), false).unwrap();
        assert_eq!(change.direction, Direction::Pull);
    }

    #[test]
    fn archived_is_remote_delete() {
        let archived = RemotePageInfo {
            archived: true,
            ..info(10)
        };
        let change = classify(&synced("a.md"), &archived, None, true).unwrap();
        assert_eq!(change.change_type, ChangeType::Deleted);
        assert_eq!(change.direction, Direction::Pull);
    }

    #[test]
    fn missing_remote_mtime_falls_back_to_last_sync() {
        let mut state = synced("a.md");
        state.notion_mtime = None;
        assert!(!remote_changed(&state, &info(10)));
        assert!(remote_changed(&state, &info(11)));

        state.last_sync = None;
        assert!(remote_changed(&state, &info(1)));
    }

    struct CountingChecker {
        batches: AtomicUsize,
    }

    #[async_trait]
    impl RemoteChecker for CountingChecker {
        async fn page_info(&self, page_id: &str) -> Result<RemotePageInfo> {
            if page_id.contains("bad") {
                return Err(Error::Remote("lookup failed".to_string()));
            }
            Ok(RemotePageInfo {
                last_edited_time: at(10) + Duration::minutes(1),
                archived: false,
            })
        }

        async fn page_infos(&self, page_ids: &[String]) -> Vec<(String, Result<RemotePageInfo>)> {
            self.batches.fetch_add(1, Ordering::SeqCst);
            let mut results = Vec::new();
            for id in page_ids {
                results.push((id.clone(), self.page_info(id).await));
            }
            results
        }
    }

    #[tokio::test]
    async fn fetch_batches_and_isolates_failures() {
        let checker = CountingChecker {
            batches: AtomicUsize::new(0),
        };
        let states = [synced("a.md"), synced("bad.md"), synced("c.md")];
        let refs: Vec<&SyncState> = states.iter().collect();

        let infos = fetch(&checker, &refs, 2).await;
        assert_eq!(checker.batches.load(Ordering::SeqCst), 2);
        assert_eq!(infos.len(), 3);
        assert!(infos["page-a.md"].is_ok());
        assert!(infos["page-bad.md"].is_err());
        assert!(infos["page-c.md"].is_ok());
    }
}
