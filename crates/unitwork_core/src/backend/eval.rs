//! In-process filter/sort/page pipeline shared by adapters.
//!
//! Used whenever a specification or sort key cannot be translated into a
//! native query. Input documents must already be in the backend's default
//! order; sorting is stable so ties keep that order.

use crate::backend::BackendResult;
use crate::model::aggregate::AggregateRoot;
use crate::repo::paging::PagingWindow;
use crate::spec::sort::SortBy;
use crate::spec::specification::Specification;
use serde_json::Value;

struct Candidate<T> {
    document: Value,
    aggregate: T,
}

fn decode<T: AggregateRoot>(document: Value) -> BackendResult<Candidate<T>> {
    let aggregate = T::deserialize(&document)?;
    Ok(Candidate {
        document,
        aggregate,
    })
}

fn satisfies<T: AggregateRoot>(spec: Option<&Specification<T>>, candidate: &Candidate<T>) -> bool {
    match spec {
        None => true,
        Some(spec) => match spec.criteria() {
            Some(criteria) => criteria.evaluate(&candidate.document),
            None => spec.is_satisfied_by(&candidate.aggregate),
        },
    }
}

/// Returns the first document satisfying `spec`, decoding lazily.
pub(crate) fn first_match<T, I>(documents: I, spec: &Specification<T>) -> BackendResult<Option<T>>
where
    T: AggregateRoot,
    I: IntoIterator<Item = Value>,
{
    for document in documents {
        let candidate = decode::<T>(document)?;
        if satisfies(Some(spec), &candidate) {
            return Ok(Some(candidate.aggregate));
        }
    }
    Ok(None)
}

/// Filters, optionally sorts, and optionally windows `documents`.
pub(crate) fn select<T, I>(
    documents: I,
    spec: Option<&Specification<T>>,
    sort: Option<SortBy<'_, T>>,
    window: Option<PagingWindow>,
) -> BackendResult<Vec<T>>
where
    T: AggregateRoot,
    I: IntoIterator<Item = Value>,
{
    let mut candidates = Vec::new();
    for document in documents {
        let candidate = decode::<T>(document)?;
        if satisfies(spec, &candidate) {
            candidates.push(candidate);
        }
    }

    if let Some(sort) = sort {
        candidates.sort_by(|left, right| {
            sort.order.apply(sort.key.compare(
                (&left.document, &left.aggregate),
                (&right.document, &right.aggregate),
            ))
        });
    }

    let aggregates = candidates
        .into_iter()
        .map(|candidate| candidate.aggregate)
        .collect::<Vec<_>>();

    Ok(match window {
        Some(window) => window.slice(aggregates),
        None => aggregates,
    })
}
