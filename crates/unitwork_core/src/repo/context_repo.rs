//! Repository bound to a unit-of-work context.

use crate::backend::BackendSession;
use crate::error::RepoResult;
use crate::model::aggregate::AggregateRoot;
use crate::repo::paging::PagingWindow;
use crate::repo::repository::Repository;
use crate::spec::sort::SortBy;
use crate::spec::specification::Specification;
use crate::uow::context::RepositoryContext;
use std::marker::PhantomData;

/// Repository whose mutations register with a context and whose reads go
/// straight to the context's session.
pub struct ContextRepository<'ctx, T, S: BackendSession> {
    context: &'ctx RepositoryContext<S>,
    _aggregate: PhantomData<fn() -> T>,
}

impl<'ctx, T: AggregateRoot, S: BackendSession> ContextRepository<'ctx, T, S> {
    pub(crate) fn new(context: &'ctx RepositoryContext<S>) -> Self {
        Self {
            context,
            _aggregate: PhantomData,
        }
    }

    pub fn context(&self) -> &'ctx RepositoryContext<S> {
        self.context
    }
}

impl<T, S: BackendSession> Clone for ContextRepository<'_, T, S> {
    fn clone(&self) -> Self {
        Self {
            context: self.context,
            _aggregate: PhantomData,
        }
    }
}

impl<T: AggregateRoot, S: BackendSession> Repository<T> for ContextRepository<'_, T, S> {
    fn do_add(&self, aggregate: &T) -> RepoResult<()> {
        self.context.register_new(aggregate)
    }

    fn do_update(&self, aggregate: &T) -> RepoResult<()> {
        self.context.register_modified(aggregate)
    }

    fn do_remove(&self, aggregate: &T) -> RepoResult<()> {
        self.context.register_deleted(aggregate)
    }

    fn do_get_by_key(&self, key: &T::Key) -> RepoResult<Option<T>> {
        Ok(self.context.session().point_get::<T>(key)?)
    }

    fn do_get_signal(&self, spec: &Specification<T>) -> RepoResult<Option<T>> {
        Ok(self.context.session().scan_first(spec)?)
    }

    fn do_get_all(&self, spec: Option<&Specification<T>>) -> RepoResult<Vec<T>> {
        Ok(self.context.session().scan(spec)?)
    }

    fn do_get_page(
        &self,
        spec: Option<&Specification<T>>,
        window: PagingWindow,
        sort: Option<SortBy<'_, T>>,
    ) -> RepoResult<Vec<T>> {
        Ok(self.context.session().scan_paged(spec, window, sort)?)
    }
}
