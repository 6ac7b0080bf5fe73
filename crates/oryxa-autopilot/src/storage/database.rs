//! SQLite-backed store for the autopilot.
//!
//! Provides persistent storage for:
//! - Events and their optimistic version counters
//! - Per-date prayer times
//! - Conflicts, audit actions, learning records, notifications
//! - The per-day auto-apply counter
//!
//! Table-specific queries live in sibling modules as further `impl AutopilotDb`
//! blocks.

use rusqlite::Connection;
use std::path::{Path, PathBuf};

use super::{data_dir, migrations};
use crate::error::{CoreError, DatabaseError};

/// SQLite database holding all autopilot state for one device.
pub struct AutopilotDb {
    conn: Connection,
}

impl AutopilotDb {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Default database location: `~/.config/oryxa/autopilot.db`.
    ///
    /// # Errors
    /// Returns an error if the data directory cannot be created.
    pub fn default_path() -> Result<PathBuf, CoreError> {
        Ok(data_dir()?.join("autopilot.db"))
    }

    /// Open the database at the default location.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, CoreError> {
        Self::open_at(&Self::default_path()?)
    }

    /// Open (or create) the database at `path`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_at(path: &Path) -> Result<Self, CoreError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database (tests and dry runs).
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub fn open_memory() -> Result<Self, CoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, CoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")?;
        migrations::migrate(&conn)
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self { conn })
    }
}
