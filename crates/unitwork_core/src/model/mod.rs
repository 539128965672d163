//! Aggregate model contracts.
//!
//! # Responsibility
//! - Define the marker every persisted aggregate implements.
//! - Define the serialized record shape handed to backend adapters.
//!
//! # Invariants
//! - Every persisted object is identified by `(KIND, key)`.

pub mod aggregate;
pub mod record;
