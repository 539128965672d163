//! SQLite connection bootstrap for the document store adapter.
//!
//! # Responsibility
//! - Open SQLite connections configured for the adapter.
//! - Run schema migrations before any aggregate is read or written.
//!
//! # Invariants
//! - Schema version lives in `PRAGMA user_version`.
//! - A connection handed to `SqliteSession` is fully migrated.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

/// SQLite bootstrap and transport error.
#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "sqlite error: {err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl DbError {
    /// Returns whether this error is a SQLite UNIQUE constraint violation.
    ///
    /// CHECK and NOT NULL failures are constraint violations too, but they do
    /// not mean the row already exists.
    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            Self::Sqlite(rusqlite::Error::SqliteFailure(err, _))
                if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{open_db_in_memory, DbError};

    fn insert(conn: &rusqlite::Connection, key: &str, body: &str) -> Result<usize, DbError> {
        conn.execute(
            "INSERT INTO aggregates (kind, key, body) VALUES ('customer', ?1, ?2);",
            [key, body],
        )
        .map_err(DbError::from)
    }

    #[test]
    fn unique_violation_is_told_apart_from_other_constraints() {
        let conn = open_db_in_memory().unwrap();
        insert(&conn, "a", "{}").unwrap();

        let duplicate = insert(&conn, "a", "{}").unwrap_err();
        assert!(duplicate.is_unique_violation());

        let invalid_json = insert(&conn, "b", "not json").unwrap_err();
        assert!(!invalid_json.is_unique_violation());
    }
}
