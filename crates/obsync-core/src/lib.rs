//! obsync-core - Reconciliation engine for a Markdown vault and a remote page service
//!
//! This crate holds the state store, content hashing, change detection,
//! conflict tracking, cross-document link resolution and the concurrent task
//! runner. Transport to the remote service and document conversion live in
//! the caller; the engine talks to them through [`sync::RemoteChecker`],
//! [`sync::VaultSource`] and plain closures handed to the [`runner`].

pub mod config;
pub mod db;
pub mod error;
pub mod frontmatter;
pub mod fuzzy;
pub mod hashing;
pub mod links;
pub mod models;
pub mod runner;
pub mod services;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{Change, ChangeType, Direction, SyncState, SyncStatus};
pub use services::StateStore;
