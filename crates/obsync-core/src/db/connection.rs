//! Database connection management

use crate::error::Result;
use rusqlite::{Connection, DatabaseName};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::migrations;

/// How long a writer waits on a locked database before failing
const BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Database wrapper for the `SQLite` state file
pub struct Database {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Database {
    /// Open a database at the given path, creating it if it doesn't exist
    ///
    /// Runs migrations automatically.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut database = Self {
            conn: Connection::open(path)?,
            path: Some(path.to_path_buf()),
        };
        database.configure()?;
        database.migrate()?;
        tracing::debug!("Opened state database at {}", path.display());
        Ok(database)
    }

    /// Open an in-memory database (useful for testing)
    pub fn open_in_memory() -> Result<Self> {
        let mut database = Self {
            conn: Connection::open_in_memory()?,
            path: None,
        };
        database.configure()?;
        database.migrate()?;
        Ok(database)
    }

    /// Configure `SQLite` for concurrent readers and a single writer
    fn configure(&self) -> Result<()> {
        // WAL is not available for in-memory databases
        if self.path.is_some() {
            let mode: String = self.conn.pragma_update_and_check(
                None::<DatabaseName>,
                "journal_mode",
                "WAL",
                |row| row.get(0),
            )?;
            tracing::debug!("Journal mode: {mode}");
        }
        self.conn
            .pragma_update(None::<DatabaseName>, "synchronous", "NORMAL")?;
        self.conn
            .pragma_update(None::<DatabaseName>, "foreign_keys", "ON")?;
        self.conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(())
    }

    /// Run database migrations
    fn migrate(&mut self) -> Result<()> {
        migrations::run(&mut self.conn)
    }

    /// Location of the database file, `None` for in-memory databases
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Get a reference to the underlying connection
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }
}

/// Run `f` in a transaction, or directly when one is already open on `conn`.
pub(crate) fn with_transaction<T>(
    conn: &Connection,
    f: impl FnOnce(&Connection) -> Result<T>,
) -> Result<T> {
    if !conn.is_autocommit() {
        return f(conn);
    }
    let tx = conn.unchecked_transaction()?;
    let value = f(&tx)?;
    tx.commit()?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.path().is_none());
    }

    #[test]
    fn test_open_creates_parent_directories() {
        let tmp = tempdir().unwrap();
        let db_path = tmp.path().join("nested").join("state.db");

        let db = Database::open(&db_path).unwrap();
        assert_eq!(db.path(), Some(db_path.as_path()));
        assert!(db_path.exists());

        let value: i32 = db
            .connection()
            .query_row("SELECT 1", [], |row| row.get(0))
            .unwrap();
        assert_eq!(value, 1);
    }

    #[test]
    fn test_reopen_keeps_schema() {
        let tmp = tempdir().unwrap();
        let db_path = tmp.path().join("state.db");

        drop(Database::open(&db_path).unwrap());
        let db = Database::open(&db_path).unwrap();

        let tables: i64 = db
            .connection()
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'sync_state'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 1);
    }

    #[test]
    fn test_with_transaction_nests() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.connection();
        conn.execute_batch("CREATE TABLE t (v INTEGER)").unwrap();

        with_transaction(conn, |outer| {
            outer.execute("INSERT INTO t VALUES (1)", [])?;
            with_transaction(outer, |inner| {
                inner.execute("INSERT INTO t VALUES (2)", [])?;
                Ok(())
            })
        })
        .unwrap();

        let failed: Result<()> = with_transaction(conn, |tx| {
            tx.execute("INSERT INTO t VALUES (3)", [])?;
            Err(crate::Error::InvalidInput("rollback".to_string()))
        });
        assert!(failed.is_err());

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }
}
