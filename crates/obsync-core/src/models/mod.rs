//! Data models for obsync

mod change;
mod conflict;
mod link;
mod sync_state;

pub use change::{Change, ChangeType, Direction};
pub use conflict::{ConflictInfo, ConflictResolution, HistoryEntry, HistoryKind};
pub use link::{LinkEntry, LinkStats};
pub use sync_state::{SyncState, SyncStatus, DIRECTION_PULL, DIRECTION_PUSH};
