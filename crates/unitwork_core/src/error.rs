//! Core error taxonomy.
//!
//! # Responsibility
//! - Give callers one error type for every repository and context operation.
//! - Keep backend failures intact behind a single pass-through variant.
//!
//! # Invariants
//! - Paging validation errors are produced before any backend call.
//! - Backend errors are never swallowed or retried in core.

use crate::backend::BackendError;
use crate::db::DbError;
use crate::model::aggregate::Identity;
use crate::uow::pending::PendingKind;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Error returned by repositories, contexts and backend bootstrap.
#[derive(Debug)]
pub enum RepoError {
    /// A required collaborator is missing or unusable at construction time.
    Configuration(String),
    /// Paging argument outside its valid domain.
    ArgumentRange {
        argument: &'static str,
        value: i64,
        reason: &'static str,
    },
    /// Aggregate re-registered under an incompatible pending kind.
    ConflictingRegistration {
        identity: Identity,
        pending: PendingKind,
        requested: PendingKind,
    },
    /// Structured criteria cannot be built from caller input.
    InvalidCriteria(String),
    /// Failure raised by a backend adapter.
    Backend(BackendError),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration(message) => write!(f, "configuration error: {message}"),
            Self::ArgumentRange {
                argument,
                value,
                reason,
            } => write!(f, "argument `{argument}` out of range ({value}): {reason}"),
            Self::ConflictingRegistration {
                identity,
                pending,
                requested,
            } => write!(
                f,
                "cannot register {identity} as {requested}: already pending as {pending}"
            ),
            Self::InvalidCriteria(message) => write!(f, "invalid criteria: {message}"),
            Self::Backend(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Configuration(_) => None,
            Self::ArgumentRange { .. } => None,
            Self::ConflictingRegistration { .. } => None,
            Self::InvalidCriteria(_) => None,
            Self::Backend(err) => Some(err),
        }
    }
}

impl From<BackendError> for RepoError {
    fn from(value: BackendError) -> Self {
        Self::Backend(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Backend(BackendError::Db(value))
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Backend(BackendError::Db(DbError::Sqlite(value)))
    }
}

impl From<serde_json::Error> for RepoError {
    fn from(value: serde_json::Error) -> Self {
        Self::Backend(BackendError::Codec(value))
    }
}

impl RepoError {
    /// Returns whether this error is a paging validation failure.
    pub fn is_argument_range(&self) -> bool {
        matches!(self, Self::ArgumentRange { .. })
    }
}
