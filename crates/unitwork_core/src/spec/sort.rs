//! Sort key selectors for paged queries.

use crate::spec::criteria::{Field, Scalar};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Direction applied to a sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Self::Ascending => ordering,
            Self::Descending => ordering.reverse(),
        }
    }
}

type CompareFn<T> = dyn Fn(&T, &T) -> Ordering + Send + Sync;

/// Selects the value a page is ordered by.
pub enum SortKey<T> {
    /// Serialized field; translatable to a native `ORDER BY`.
    Field(Field),
    /// Arbitrary key extracted in process.
    By(Arc<CompareFn<T>>),
}

impl<T> SortKey<T> {
    pub fn field(field: Field) -> Self {
        Self::Field(field)
    }

    /// Orders by a key computed from the aggregate.
    pub fn by<K, F>(selector: F) -> Self
    where
        K: Ord,
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        Self::By(Arc::new(move |left: &T, right: &T| {
            selector(left).cmp(&selector(right))
        }))
    }

    /// Returns the field path when the key is translatable.
    pub fn as_field(&self) -> Option<&Field> {
        match self {
            Self::Field(field) => Some(field),
            Self::By(_) => None,
        }
    }

    /// Compares two aggregates along with their serialized documents.
    pub fn compare(&self, left: (&Value, &T), right: (&Value, &T)) -> Ordering {
        match self {
            Self::Field(field) => {
                Scalar::of(field.lookup(left.0)).sort_cmp(&Scalar::of(field.lookup(right.0)))
            }
            Self::By(compare) => compare(left.1, right.1),
        }
    }
}

impl<T> Clone for SortKey<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Field(field) => Self::Field(field.clone()),
            Self::By(compare) => Self::By(Arc::clone(compare)),
        }
    }
}

impl<T> Debug for SortKey<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Field(field) => f.debug_tuple("Field").field(field).finish(),
            Self::By(_) => f.write_str("By(<fn>)"),
        }
    }
}

/// Resolved ordering handed to backend adapters.
pub struct SortBy<'a, T> {
    pub key: &'a SortKey<T>,
    pub order: SortOrder,
}

impl<T> Clone for SortBy<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for SortBy<'_, T> {}

impl<T> Debug for SortBy<'_, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SortBy")
            .field("key", self.key)
            .field("order", &self.order)
            .finish()
    }
}
