//! Unit of work: pending change tracking and atomic commit.

pub mod context;
pub mod pending;

pub use context::RepositoryContext;
pub use pending::{PendingChangeSet, PendingKind};
