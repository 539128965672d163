//! Repository decorator emitting structured operation events.
//!
//! # Invariants
//! - Every primitive is forwarded exactly once; results pass through
//!   unchanged.
//! - Events carry metadata only, never aggregate content.

use crate::error::RepoResult;
use crate::model::aggregate::AggregateRoot;
use crate::repo::paging::PagingWindow;
use crate::repo::repository::Repository;
use crate::spec::sort::SortBy;
use crate::spec::specification::Specification;
use log::{debug, warn};
use std::time::Instant;

/// Wraps a repository and logs `repo_op` events with durations.
#[derive(Debug, Clone)]
pub struct LoggingRepository<R> {
    inner: R,
}

impl<R> LoggingRepository<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

fn observe<V>(kind: &str, op: &str, call: impl FnOnce() -> RepoResult<V>) -> RepoResult<V> {
    let started_at = Instant::now();
    let result = call();
    let duration_ms = started_at.elapsed().as_millis();
    match &result {
        Ok(_) => debug!(
            "event=repo_op module=repo status=ok kind={kind} op={op} duration_ms={duration_ms}"
        ),
        Err(err) => warn!(
            "event=repo_op module=repo status=error kind={kind} op={op} duration_ms={duration_ms} error={err}"
        ),
    }
    result
}

impl<T: AggregateRoot, R: Repository<T>> Repository<T> for LoggingRepository<R> {
    fn do_add(&self, aggregate: &T) -> RepoResult<()> {
        observe(T::KIND, "add", || self.inner.do_add(aggregate))
    }

    fn do_update(&self, aggregate: &T) -> RepoResult<()> {
        observe(T::KIND, "update", || self.inner.do_update(aggregate))
    }

    fn do_remove(&self, aggregate: &T) -> RepoResult<()> {
        observe(T::KIND, "remove", || self.inner.do_remove(aggregate))
    }

    fn do_get_by_key(&self, key: &T::Key) -> RepoResult<Option<T>> {
        observe(T::KIND, "get_by_key", || self.inner.do_get_by_key(key))
    }

    fn do_get_signal(&self, spec: &Specification<T>) -> RepoResult<Option<T>> {
        observe(T::KIND, "get_signal", || self.inner.do_get_signal(spec))
    }

    fn do_get_all(&self, spec: Option<&Specification<T>>) -> RepoResult<Vec<T>> {
        observe(T::KIND, "get_all", || self.inner.do_get_all(spec))
    }

    fn do_get_page(
        &self,
        spec: Option<&Specification<T>>,
        window: PagingWindow,
        sort: Option<SortBy<'_, T>>,
    ) -> RepoResult<Vec<T>> {
        observe(T::KIND, "get_page", || {
            self.inner.do_get_page(spec, window, sort)
        })
    }
}
