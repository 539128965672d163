//! Repository layer: generic contract, context binding and decorators.
//!
//! # Responsibility
//! - Define the public repository operations once, over any aggregate type.
//! - Bind those operations to a unit-of-work context and its session.
//!
//! # Invariants
//! - Repositories never write to a backend outside a context commit.

pub mod context_repo;
pub mod logging_repo;
pub mod paging;
pub mod repository;

pub use context_repo::ContextRepository;
pub use logging_repo::LoggingRepository;
pub use paging::{PageQuery, PagingWindow};
pub use repository::Repository;
