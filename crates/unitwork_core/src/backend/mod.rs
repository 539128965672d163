//! Backend adapter contract and shipped adapters.
//!
//! # Responsibility
//! - Define the primitives a storage engine must supply to the core.
//! - Ship document adapters for SQLite and an in-process store.
//!
//! # Invariants
//! - Adapters never consult a context's pending change set.
//! - `apply_*` calls only happen between `begin_or_reuse` and
//!   `commit`/`rollback`.

use crate::db::DbError;
use crate::model::aggregate::{AggregateRoot, Identity};
use crate::model::record::Record;
use crate::repo::paging::PagingWindow;
use crate::spec::sort::SortBy;
use crate::spec::specification::Specification;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod eval;
pub mod memory;
pub mod registry;
pub mod sqlite;

pub use memory::{MemorySession, MemoryStore};
pub use registry::{AnyBackend, BackendRegistry};
pub use sqlite::SqliteSession;

pub type BackendResult<T> = Result<T, BackendError>;

/// Failure raised by a backend adapter.
#[derive(Debug)]
pub enum BackendError {
    /// SQLite transport, constraint or bootstrap failure.
    Db(DbError),
    /// Aggregate could not be mapped to or from its stored document.
    Codec(serde_json::Error),
    /// Insert of an identity that is already stored.
    DuplicateKey(Identity),
    /// Update or delete of an identity that is not stored.
    MissingRecord(Identity),
    /// `commit`/`rollback` without an open transaction.
    NoActiveTransaction,
    /// Shared store lock was poisoned by a panicking session.
    StorePoisoned,
}

impl Display for BackendError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Codec(err) => write!(f, "aggregate mapping failed: {err}"),
            Self::DuplicateKey(identity) => write!(f, "aggregate already stored: {identity}"),
            Self::MissingRecord(identity) => write!(f, "aggregate not stored: {identity}"),
            Self::NoActiveTransaction => write!(f, "no active backend transaction"),
            Self::StorePoisoned => write!(f, "backend store lock poisoned"),
        }
    }
}

impl Error for BackendError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Codec(err) => Some(err),
            Self::DuplicateKey(_) => None,
            Self::MissingRecord(_) => None,
            Self::NoActiveTransaction => None,
            Self::StorePoisoned => None,
        }
    }
}

impl From<DbError> for BackendError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for BackendError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(value: serde_json::Error) -> Self {
        Self::Codec(value)
    }
}

/// Primitives a storage engine supplies to repositories and contexts.
///
/// One session value corresponds to one backend session; it is used by a
/// single context and is not expected to be shared across threads.
pub trait BackendSession {
    /// Point lookup by key.
    fn point_get<T: AggregateRoot>(&self, key: &T::Key) -> BackendResult<Option<T>>;

    /// First match in default order, or `None`.
    fn scan_first<T: AggregateRoot>(&self, spec: &Specification<T>) -> BackendResult<Option<T>>;

    /// Unpaged scan in default order.
    fn scan<T: AggregateRoot>(&self, spec: Option<&Specification<T>>) -> BackendResult<Vec<T>>;

    /// Scan ordered by `sort` (default order when `None`), then windowed.
    fn scan_paged<T: AggregateRoot>(
        &self,
        spec: Option<&Specification<T>>,
        window: PagingWindow,
        sort: Option<SortBy<'_, T>>,
    ) -> BackendResult<Vec<T>>;

    fn apply_new(&self, record: &Record) -> BackendResult<()>;
    fn apply_modified(&self, record: &Record) -> BackendResult<()>;
    fn apply_deleted(&self, record: &Record) -> BackendResult<()>;

    /// Opens a transaction, or keeps the one already open.
    fn begin_or_reuse(&self) -> BackendResult<()>;
    fn commit(&self) -> BackendResult<()>;
    fn rollback(&self) -> BackendResult<()>;
}
