//! Conflict and history models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Snapshot of both sides when a conflict was detected
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictInfo {
    pub path: String,
    pub local_hash: String,
    pub remote_hash: String,
    pub local_mtime: Option<DateTime<Utc>>,
    pub remote_mtime: Option<DateTime<Utc>>,
    pub detected_at: DateTime<Utc>,
    /// Local document text at detection time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_content: Option<String>,
    /// Remote document text at detection time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_content: Option<String>,
}

/// Kind of a history row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryKind {
    Push,
    Pull,
    Delete,
    Rename,
    Conflict,
    ConflictResolved,
    Error,
}

impl HistoryKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Push => "push",
            Self::Pull => "pull",
            Self::Delete => "delete",
            Self::Rename => "rename",
            Self::Conflict => "conflict",
            Self::ConflictResolved => "conflict_resolved",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for HistoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HistoryKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "push" => Ok(Self::Push),
            "pull" => Ok(Self::Pull),
            "delete" => Ok(Self::Delete),
            "rename" => Ok(Self::Rename),
            "conflict" => Ok(Self::Conflict),
            "conflict_resolved" => Ok(Self::ConflictResolved),
            "error" => Ok(Self::Error),
            other => Err(Error::InvalidInput(format!("unknown history kind: {other}"))),
        }
    }
}

/// Append-only audit row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Row identifier
    pub id: i64,
    pub path: String,
    pub kind: HistoryKind,
    /// Free-form details; JSON for conflict rows
    pub details: String,
    pub timestamp: DateTime<Utc>,
}

/// Payload stored with a `conflict_resolved` row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictResolution {
    pub path: String,
    pub resolution: String,
    pub content_hash: String,
    pub resolved_at: DateTime<Utc>,
}
