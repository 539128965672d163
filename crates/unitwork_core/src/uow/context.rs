//! Unit-of-work context.
//!
//! # Responsibility
//! - Own one backend session and the pending changes registered against it.
//! - Flush pending changes as one backend transaction on `commit`.
//!
//! # Invariants
//! - Nothing reaches the backend before `commit`.
//! - A failed commit rolls the backend back and keeps pending changes.
//! - Dropping the context discards pending changes without backend writes.

use crate::backend::BackendSession;
use crate::error::RepoResult;
use crate::model::aggregate::AggregateRoot;
use crate::model::record::Record;
use crate::repo::context_repo::ContextRepository;
use crate::uow::pending::{PendingChangeSet, PendingKind};
use log::{debug, error, info, warn};
use std::cell::RefCell;
use std::time::Instant;

/// Scoped unit of work over one backend session.
///
/// Repositories handed out by [`RepositoryContext::repository`] borrow the
/// context, so they cannot outlive it and all share its session.
pub struct RepositoryContext<S: BackendSession> {
    session: S,
    pending: RefCell<PendingChangeSet>,
}

impl<S: BackendSession> RepositoryContext<S> {
    pub fn new(session: S) -> Self {
        Self {
            session,
            pending: RefCell::new(PendingChangeSet::new()),
        }
    }

    /// Returns a repository for `T` bound to this context.
    pub fn repository<T: AggregateRoot>(&self) -> ContextRepository<'_, T, S> {
        ContextRepository::new(self)
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    /// Marks `aggregate` for insertion on commit.
    pub fn register_new<T: AggregateRoot>(&self, aggregate: &T) -> RepoResult<()> {
        self.register(aggregate, PendingKind::New)
    }

    /// Marks `aggregate` for update on commit.
    pub fn register_modified<T: AggregateRoot>(&self, aggregate: &T) -> RepoResult<()> {
        self.register(aggregate, PendingKind::Modified)
    }

    /// Marks `aggregate` for removal on commit.
    pub fn register_deleted<T: AggregateRoot>(&self, aggregate: &T) -> RepoResult<()> {
        self.register(aggregate, PendingKind::Deleted)
    }

    /// Flushes pending changes in one backend transaction.
    ///
    /// # Errors
    /// - Any backend failure. The session is rolled back and pending changes
    ///   are kept, so the caller may fix the cause and retry or discard.
    pub fn commit(&self) -> RepoResult<()> {
        if self.pending.borrow().is_empty() {
            debug!("event=uow_commit module=uow status=skipped pending=0");
            return Ok(());
        }

        let started_at = Instant::now();
        let pending_count = self.pending_count();
        info!("event=uow_commit module=uow status=start pending={pending_count}");

        match self.flush() {
            Ok(()) => {
                self.pending.borrow_mut().clear();
                info!(
                    "event=uow_commit module=uow status=ok pending={pending_count} duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err(err) => {
                if let Err(rollback_err) = self.session.rollback() {
                    warn!(
                        "event=uow_rollback module=uow status=error error={}",
                        rollback_err
                    );
                }
                error!(
                    "event=uow_commit module=uow status=rolled_back pending={pending_count} duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    /// Drops pending changes without touching the backend.
    pub fn discard(&self) {
        let mut pending = self.pending.borrow_mut();
        if !pending.is_empty() {
            info!(
                "event=uow_discard module=uow status=ok pending={}",
                pending.len()
            );
            pending.clear();
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.borrow().len()
    }

    pub fn has_pending_changes(&self) -> bool {
        !self.pending.borrow().is_empty()
    }

    /// Returns the bucket `aggregate` is pending in, if any.
    pub fn pending_kind_of<T: AggregateRoot>(&self, aggregate: &T) -> Option<PendingKind> {
        self.pending.borrow().kind_of(&aggregate.identity())
    }

    fn register<T: AggregateRoot>(&self, aggregate: &T, kind: PendingKind) -> RepoResult<()> {
        let record = Record::from_aggregate(aggregate)?;
        self.pending.borrow_mut().register(record, kind)
    }

    fn flush(&self) -> RepoResult<()> {
        let pending = self.pending.borrow();
        self.session.begin_or_reuse()?;
        for (kind, record) in pending.flush_order() {
            match kind {
                PendingKind::New => self.session.apply_new(record)?,
                PendingKind::Modified => self.session.apply_modified(record)?,
                PendingKind::Deleted => self.session.apply_deleted(record)?,
            }
        }
        self.session.commit()?;
        Ok(())
    }
}

impl<S: BackendSession> Drop for RepositoryContext<S> {
    fn drop(&mut self) {
        self.discard();
    }
}
