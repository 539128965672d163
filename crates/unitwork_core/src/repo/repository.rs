//! Generic repository contract.
//!
//! # Responsibility
//! - Expose the public repository operations as provided methods.
//! - Leave storage access to a small set of required primitives.
//!
//! # Invariants
//! - Paging arguments are validated before any primitive runs.
//! - Mutations only register intent; they never reach the backend directly.
//! - Reads never consult pending, uncommitted changes.

use crate::error::RepoResult;
use crate::model::aggregate::AggregateRoot;
use crate::repo::paging::{PageQuery, PagingWindow};
use crate::spec::sort::SortBy;
use crate::spec::specification::Specification;

/// Repository over aggregate type `T`.
///
/// Implementors supply the `do_*` primitives. Callers use the provided
/// operations, which validate input and delegate.
pub trait Repository<T: AggregateRoot> {
    fn do_add(&self, aggregate: &T) -> RepoResult<()>;
    fn do_update(&self, aggregate: &T) -> RepoResult<()>;
    fn do_remove(&self, aggregate: &T) -> RepoResult<()>;
    fn do_get_by_key(&self, key: &T::Key) -> RepoResult<Option<T>>;
    fn do_get_signal(&self, spec: &Specification<T>) -> RepoResult<Option<T>>;
    fn do_get_all(&self, spec: Option<&Specification<T>>) -> RepoResult<Vec<T>>;
    fn do_get_page(
        &self,
        spec: Option<&Specification<T>>,
        window: PagingWindow,
        sort: Option<SortBy<'_, T>>,
    ) -> RepoResult<Vec<T>>;

    /// Registers `aggregate` as new with the owning unit of work.
    fn add(&self, aggregate: &T) -> RepoResult<()> {
        self.do_add(aggregate)
    }

    /// Registers `aggregate` as modified with the owning unit of work.
    fn update(&self, aggregate: &T) -> RepoResult<()> {
        self.do_update(aggregate)
    }

    /// Registers `aggregate` as deleted with the owning unit of work.
    fn remove(&self, aggregate: &T) -> RepoResult<()> {
        self.do_remove(aggregate)
    }

    /// Loads the committed aggregate stored under `key`.
    fn get_by_key(&self, key: &T::Key) -> RepoResult<Option<T>> {
        self.do_get_by_key(key)
    }

    /// Returns whether any committed aggregate satisfies `spec`.
    fn exists(&self, spec: &Specification<T>) -> RepoResult<bool> {
        Ok(self.get_signal(spec)?.is_some())
    }

    /// First committed aggregate satisfying `spec`, in backend default order.
    fn get_signal(&self, spec: &Specification<T>) -> RepoResult<Option<T>> {
        self.do_get_signal(spec)
    }

    fn get_all(&self) -> RepoResult<Vec<T>> {
        self.do_get_all(None)
    }

    fn get_all_matching(&self, spec: &Specification<T>) -> RepoResult<Vec<T>> {
        self.do_get_all(Some(spec))
    }

    fn get_all_where<F>(&self, predicate: F) -> RepoResult<Vec<T>>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
        Self: Sized,
    {
        self.get_all_matching(&Specification::eval(predicate))
    }

    /// One page of every committed aggregate.
    ///
    /// # Errors
    /// - `ArgumentRange` when `page_number` or `page_size` is `<= 0`.
    fn get_page(&self, query: &PageQuery<T>) -> RepoResult<Vec<T>> {
        let (window, sort) = query.resolve()?;
        self.do_get_page(None, window, sort)
    }

    /// One page of the committed aggregates satisfying `spec`.
    fn get_page_matching(
        &self,
        spec: &Specification<T>,
        query: &PageQuery<T>,
    ) -> RepoResult<Vec<T>> {
        let (window, sort) = query.resolve()?;
        self.do_get_page(Some(spec), window, sort)
    }

    fn get_page_where<F>(&self, predicate: F, query: &PageQuery<T>) -> RepoResult<Vec<T>>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
        Self: Sized,
    {
        self.get_page_matching(&Specification::eval(predicate), query)
    }
}
