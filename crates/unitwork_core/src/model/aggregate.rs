//! Aggregate root marker and identity.
//!
//! # Responsibility
//! - Mark a type as a unit of persistence with a stable opaque key.
//! - Derive the identity used for pending-set membership.
//!
//! # Invariants
//! - `key()` must return the same value for the lifetime of an aggregate.
//! - `KIND` must be unique per aggregate type within one backend.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::{Debug, Display, Formatter};
use std::hash::Hash;

/// Capability identifying a type as a root of persistence.
///
/// Aggregates cross the backend boundary in serialized form, so the serde
/// bounds are part of the marker rather than of each adapter.
pub trait AggregateRoot: Serialize + DeserializeOwned + Clone + 'static {
    /// Opaque identity key, caller-assigned or generated.
    ///
    /// Identities and storage rows are keyed on the `Display` text, so
    /// `Display` must be injective: two distinct keys must never render to
    /// the same string.
    type Key: Clone + Eq + Hash + Display + Debug;

    /// Stable storage name for this aggregate type.
    const KIND: &'static str;

    /// Returns the aggregate identity key.
    fn key(&self) -> Self::Key;

    /// Returns the kind-qualified identity of this aggregate.
    fn identity(&self) -> Identity {
        Identity::new(Self::KIND, &self.key())
    }
}

/// Kind-qualified aggregate identity.
///
/// Two aggregates are the same pending entry iff their identities are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity {
    pub kind: &'static str,
    pub key: String,
}

impl Identity {
    pub fn new(kind: &'static str, key: &impl Display) -> Self {
        Self {
            kind,
            key: key.to_string(),
        }
    }
}

impl Display for Identity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.kind, self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::Identity;

    #[test]
    fn identity_is_keyed_on_kind_and_display_text() {
        assert_eq!(Identity::new("customer", &7_i64), Identity::new("customer", &"7"));
        assert_ne!(Identity::new("customer", &7_i64), Identity::new("order", &7_i64));
        assert_eq!(Identity::new("order", &"a1").to_string(), "order/a1");
    }
}
