//! Query conditions shared by repositories and backend adapters.
//!
//! # Responsibility
//! - Express filters as reusable, composable specifications.
//! - Express paged ordering as sort keys.
//!
//! # Invariants
//! - Specifications and sort keys carry no backend-specific state.

pub mod criteria;
pub mod sort;
pub mod specification;
