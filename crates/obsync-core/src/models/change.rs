//! Detected change model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::SyncState;

/// What happened to a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Created,
    Modified,
    Renamed,
    Deleted,
    Conflict,
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Renamed => "renamed",
            Self::Deleted => "deleted",
            Self::Conflict => "conflict",
        })
    }
}

/// Which side has to be updated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Local → remote
    Push,
    /// Remote → local
    Pull,
    /// Both sides changed
    Both,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Push => "push",
            Self::Pull => "pull",
            Self::Both => "both",
        })
    }
}

/// One classified difference between local and remote state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub path: String,
    /// Previous path of a rename
    pub old_path: Option<String>,
    pub change_type: ChangeType,
    pub direction: Direction,
    pub local_hash: String,
    pub remote_hash: String,
    pub local_mtime: Option<DateTime<Utc>>,
    pub remote_mtime: Option<DateTime<Utc>>,
    /// Only the front matter differs from the stored state
    pub frontmatter_only: bool,
    /// Stored state at detection time
    pub state: Option<SyncState>,
}

impl Change {
    #[must_use]
    pub fn new(path: impl Into<String>, change_type: ChangeType, direction: Direction) -> Self {
        Self {
            path: path.into(),
            old_path: None,
            change_type,
            direction,
            local_hash: String::new(),
            remote_hash: String::new(),
            local_mtime: None,
            remote_mtime: None,
            frontmatter_only: false,
            state: None,
        }
    }

    #[must_use]
    pub fn with_state(mut self, state: SyncState) -> Self {
        self.state = Some(state);
        self
    }

    #[must_use]
    pub fn with_local(mut self, hash: impl Into<String>, mtime: Option<DateTime<Utc>>) -> Self {
        self.local_hash = hash.into();
        self.local_mtime = mtime;
        self
    }

    #[must_use]
    pub fn with_remote(mut self, hash: impl Into<String>, mtime: Option<DateTime<Utc>>) -> Self {
        self.remote_hash = hash.into();
        self.remote_mtime = mtime;
        self
    }

    pub const fn is_conflict(&self) -> bool {
        matches!(self.change_type, ChangeType::Conflict)
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.old_path {
            Some(old) => write!(
                f,
                "{} {} -> {} ({})",
                self.change_type, old, self.path, self.direction
            ),
            None => write!(f, "{} {} ({})", self.change_type, self.path, self.direction),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let change = Change::new("b.md", ChangeType::Renamed, Direction::Push);
        let change = Change {
            old_path: Some("a.md".to_string()),
            ..change
        };
        assert_eq!(change.to_string(), "renamed a.md -> b.md (push)");
        assert_eq!(
            Change::new("c.md", ChangeType::Conflict, Direction::Both).to_string(),
            "conflict c.md (both)"
        );
    }
}
