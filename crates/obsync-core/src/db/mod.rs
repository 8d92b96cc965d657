//! Database layer for obsync

mod config_repository;
mod connection;
mod history_repository;
mod link_repository;
mod migrations;
mod state_repository;

pub use config_repository::{ConfigRepository, SqliteConfigRepository};
pub(crate) use connection::with_transaction;
pub use connection::Database;
pub use history_repository::{HistoryRepository, SqliteHistoryRepository};
pub use link_repository::{LinkRepository, SqliteLinkRepository};
pub use migrations::CURRENT_VERSION as SCHEMA_VERSION;
pub use state_repository::{SqliteStateRepository, StateRepository};
