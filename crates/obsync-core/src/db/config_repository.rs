//! Config repository implementation

use crate::error::Result;
use rusqlite::{params, Connection, OptionalExtension};

/// Trait for scalar key/value storage
pub trait ConfigRepository {
    /// Read a value, `None` when the key was never set
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key, returning whether it existed
    fn remove(&self, key: &str) -> Result<bool>;
}

/// `SQLite` implementation of `ConfigRepository`
pub struct SqliteConfigRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteConfigRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl ConfigRepository for SqliteConfigRepository<'_> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM config WHERE key = ?",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO config (key, value) VALUES (?, ?)",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM config WHERE key = ?", params![key])?;
        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn setup() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_get_missing_key() {
        let db = setup();
        let repo = SqliteConfigRepository::new(db.connection());
        assert_eq!(repo.get("root_page_id").unwrap(), None);
    }

    #[test]
    fn test_set_overwrites() {
        let db = setup();
        let repo = SqliteConfigRepository::new(db.connection());

        repo.set("root_page_id", "abc").unwrap();
        repo.set("root_page_id", "def").unwrap();
        assert_eq!(repo.get("root_page_id").unwrap().as_deref(), Some("def"));

        assert!(repo.remove("root_page_id").unwrap());
        assert!(!repo.remove("root_page_id").unwrap());
    }
}
