//! Sync state model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Lifecycle status of a tracked document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// Never synced
    #[default]
    Pending,
    /// Both sides agree as of `last_sync`
    Synced,
    /// Modified on both sides, waiting for a resolution
    Conflict,
    /// Last reconciliation attempt failed
    Error,
}

impl SyncStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Synced => "synced",
            Self::Conflict => "conflict",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "synced" => Ok(Self::Synced),
            "conflict" => Ok(Self::Conflict),
            "error" => Ok(Self::Error),
            other => Err(Error::InvalidInput(format!("unknown sync status: {other}"))),
        }
    }
}

/// Direction label written after a push
pub const DIRECTION_PUSH: &str = "push";
/// Direction label written after a pull
pub const DIRECTION_PULL: &str = "pull";

/// Reconciliation record for one tracked document, keyed by vault path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    /// Canonical vault-relative path
    pub path: String,
    /// Remote page id (empty until the first push)
    pub notion_page_id: String,
    /// Remote parent id
    pub notion_parent_id: String,
    /// Normalized body hash
    pub content_hash: String,
    /// Normalized front-matter hash
    pub frontmatter_hash: String,
    /// Last observed local modification time
    pub obsidian_mtime: Option<DateTime<Utc>>,
    /// Last observed remote modification time
    pub notion_mtime: Option<DateTime<Utc>>,
    /// Last successful reconciliation
    pub last_sync: Option<DateTime<Utc>>,
    /// `push`, `pull`, or a conflict resolution label
    pub sync_direction: String,
    pub status: SyncStatus,
}

impl SyncState {
    /// Create a pending record for a newly seen path
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            notion_page_id: String::new(),
            notion_parent_id: String::new(),
            content_hash: String::new(),
            frontmatter_hash: String::new(),
            obsidian_mtime: None,
            notion_mtime: None,
            last_sync: None,
            sync_direction: String::new(),
            status: SyncStatus::Pending,
        }
    }

    /// Whether the document exists on the remote side
    pub fn has_remote(&self) -> bool {
        !self.notion_page_id.is_empty()
    }

    /// Record a successful reconciliation in `direction`
    pub fn mark_synced(&mut self, direction: &str, at: DateTime<Utc>) {
        self.status = SyncStatus::Synced;
        self.sync_direction = direction.to_string();
        self.last_sync = Some(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            SyncStatus::Pending,
            SyncStatus::Synced,
            SyncStatus::Conflict,
            SyncStatus::Error,
        ] {
            assert_eq!(status.as_str().parse::<SyncStatus>().unwrap(), status);
        }
        assert!("archived".parse::<SyncStatus>().is_err());
    }

    #[test]
    fn test_new_state_is_pending_without_remote() {
        let state = SyncState::new("notes/a.md");
        assert_eq!(state.status, SyncStatus::Pending);
        assert!(!state.has_remote());
        assert!(state.last_sync.is_none());
    }

    #[test]
    fn test_mark_synced() {
        let mut state = SyncState::new("a.md");
        let now = Utc::now();
        state.mark_synced(DIRECTION_PUSH, now);
        assert_eq!(state.status, SyncStatus::Synced);
        assert_eq!(state.sync_direction, "push");
        assert_eq!(state.last_sync, Some(now));
    }
}
