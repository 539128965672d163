//! Reusable predicates over aggregates.
//!
//! # Responsibility
//! - Wrap a predicate together with an optional structured description that
//!   adapters can translate into native queries.
//! - Compose specifications without mutating the operands.
//!
//! # Invariants
//! - A specification is immutable after construction.
//! - When `criteria()` is present, it is equivalent to the predicate.

use crate::spec::criteria::Criteria;
use serde::Serialize;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

type PredicateFn<T> = dyn Fn(&T) -> bool + Send + Sync;

/// Backend-agnostic boolean predicate over `T`.
pub struct Specification<T> {
    predicate: Arc<PredicateFn<T>>,
    criteria: Option<Criteria>,
}

impl<T: 'static> Specification<T> {
    /// Builds a specification from an arbitrary predicate.
    ///
    /// Adapters cannot translate such a specification and evaluate it in
    /// process instead.
    pub fn eval<F>(predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(predicate),
            criteria: None,
        }
    }

    /// Specification satisfied by every aggregate.
    pub fn all() -> Self {
        Self {
            predicate: Arc::new(|_: &T| true),
            criteria: Some(Criteria::All),
        }
    }

    pub fn is_satisfied_by(&self, candidate: &T) -> bool {
        (self.predicate)(candidate)
    }

    /// In-process form of this specification.
    pub fn predicate(&self) -> &PredicateFn<T> {
        self.predicate.as_ref()
    }

    /// Translatable form of this specification, if any.
    pub fn criteria(&self) -> Option<&Criteria> {
        self.criteria.as_ref()
    }

    pub fn and(&self, other: &Specification<T>) -> Specification<T> {
        let (left, right) = (Arc::clone(&self.predicate), Arc::clone(&other.predicate));
        Self {
            predicate: Arc::new(move |candidate: &T| left(candidate) && right(candidate)),
            criteria: combine(&self.criteria, &other.criteria, Criteria::and),
        }
    }

    pub fn or(&self, other: &Specification<T>) -> Specification<T> {
        let (left, right) = (Arc::clone(&self.predicate), Arc::clone(&other.predicate));
        Self {
            predicate: Arc::new(move |candidate: &T| left(candidate) || right(candidate)),
            criteria: combine(&self.criteria, &other.criteria, Criteria::or),
        }
    }

    pub fn not(&self) -> Specification<T> {
        let inner = Arc::clone(&self.predicate);
        Self {
            predicate: Arc::new(move |candidate: &T| !inner(candidate)),
            criteria: self.criteria.clone().map(Criteria::negate),
        }
    }
}

impl<T: Serialize + 'static> Specification<T> {
    /// Builds a specification from structured criteria.
    ///
    /// The in-process predicate evaluates the criteria against the serialized
    /// aggregate, so both forms always agree.
    pub fn matching(criteria: Criteria) -> Self {
        let evaluated = criteria.clone();
        Self {
            predicate: Arc::new(move |candidate: &T| {
                serde_json::to_value(candidate)
                    .map(|document| evaluated.evaluate(&document))
                    .unwrap_or(false)
            }),
            criteria: Some(criteria),
        }
    }
}

fn combine(
    left: &Option<Criteria>,
    right: &Option<Criteria>,
    join: fn(Criteria, Criteria) -> Criteria,
) -> Option<Criteria> {
    match (left, right) {
        (Some(left), Some(right)) => Some(join(left.clone(), right.clone())),
        _ => None,
    }
}

impl<T> Clone for Specification<T> {
    fn clone(&self) -> Self {
        Self {
            predicate: Arc::clone(&self.predicate),
            criteria: self.criteria.clone(),
        }
    }
}

impl<T> Debug for Specification<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Specification")
            .field("criteria", &self.criteria)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::Specification;
    use crate::spec::criteria::{Criteria, Field};
    use serde::Serialize;

    #[derive(Serialize)]
    struct Customer {
        name: String,
        age: i64,
    }

    fn customer(name: &str, age: i64) -> Customer {
        Customer {
            name: name.to_string(),
            age,
        }
    }

    #[test]
    fn eval_wraps_predicate_without_criteria() {
        let spec = Specification::eval(|c: &Customer| c.name == "scott1");
        assert!(spec.is_satisfied_by(&customer("scott1", 12)));
        assert!(!spec.is_satisfied_by(&customer("scott2", 12)));
        assert!(spec.criteria().is_none());
    }

    #[test]
    fn matching_predicate_agrees_with_criteria() {
        let age = Field::parse("age").unwrap();
        let spec = Specification::<Customer>::matching(age.greater_than(18));
        assert!(spec.is_satisfied_by(&customer("a", 30)));
        assert!(!spec.is_satisfied_by(&customer("b", 10)));
        assert!(spec.criteria().is_some());
    }

    #[test]
    fn composition_leaves_operands_untouched() {
        let name = Field::parse("name").unwrap();
        let adult = Specification::<Customer>::matching(Field::parse("age").unwrap().at_least(18));
        let scott = Specification::<Customer>::matching(name.equals("scott"));

        let both = adult.and(&scott);
        let either = adult.or(&scott);
        let minor = adult.not();

        assert!(both.is_satisfied_by(&customer("scott", 20)));
        assert!(!both.is_satisfied_by(&customer("scott", 10)));
        assert!(either.is_satisfied_by(&customer("scott", 10)));
        assert!(minor.is_satisfied_by(&customer("amy", 10)));
        assert!(adult.is_satisfied_by(&customer("amy", 20)));
        assert!(matches!(both.criteria(), Some(Criteria::And(_, _))));
        assert!(matches!(minor.criteria(), Some(Criteria::Not(_))));
    }

    #[test]
    fn mixing_opaque_predicate_drops_criteria() {
        let translatable =
            Specification::<Customer>::matching(Field::parse("age").unwrap().at_least(18));
        let opaque = Specification::eval(|c: &Customer| c.name.starts_with('s'));

        let mixed = translatable.and(&opaque);
        assert!(mixed.criteria().is_none());
        assert!(mixed.is_satisfied_by(&customer("sam", 40)));
        assert!(!mixed.is_satisfied_by(&customer("amy", 40)));
    }
}
