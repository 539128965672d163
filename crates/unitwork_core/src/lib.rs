//! Repository and unit-of-work core.
//!
//! Aggregates are registered with a [`RepositoryContext`] through typed
//! repositories and reach the backend only when the context commits.
//! Queries are expressed as [`Specification`]s and read committed state.

pub mod backend;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod repo;
pub mod spec;
pub mod uow;

pub use backend::{
    AnyBackend, BackendError, BackendRegistry, BackendResult, BackendSession, MemorySession,
    MemoryStore, SqliteSession,
};
pub use config::{BackendConfig, CoreConfig};
pub use error::{RepoError, RepoResult};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status};
pub use model::aggregate::{AggregateRoot, Identity};
pub use model::record::Record;
pub use repo::{ContextRepository, LoggingRepository, PageQuery, PagingWindow, Repository};
pub use spec::criteria::{Criteria, CriteriaValue, Field, Operator};
pub use spec::sort::{SortBy, SortKey, SortOrder};
pub use spec::specification::Specification;
pub use uow::{PendingKind, RepositoryContext};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
