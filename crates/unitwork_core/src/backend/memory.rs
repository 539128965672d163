//! In-process document store adapter.
//!
//! # Responsibility
//! - Keep committed aggregates in a store shared by every session opened
//!   from it.
//! - Stage writes per session and publish them atomically on commit.
//!
//! # Invariants
//! - Default order is insertion order.
//! - A failed commit leaves the shared store untouched.

use crate::backend::{eval, BackendError, BackendResult, BackendSession};
use crate::model::aggregate::{AggregateRoot, Identity};
use crate::model::record::Record;
use crate::repo::paging::PagingWindow;
use crate::spec::sort::SortBy;
use crate::spec::specification::Specification;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone)]
struct StoredRow {
    seq: u64,
    body: Value,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    next_seq: u64,
    rows: HashMap<Identity, StoredRow>,
}

impl MemoryState {
    fn documents_of(&self, kind: &str) -> Vec<Value> {
        let mut rows = self
            .rows
            .iter()
            .filter(|(identity, _)| identity.kind == kind)
            .map(|(_, row)| row)
            .collect::<Vec<_>>();
        rows.sort_by_key(|row| row.seq);
        rows.into_iter().map(|row| row.body.clone()).collect()
    }

    fn apply(&mut self, write: &StagedWrite) -> BackendResult<()> {
        match write {
            StagedWrite::New(record) => {
                if self.rows.contains_key(&record.identity) {
                    return Err(BackendError::DuplicateKey(record.identity.clone()));
                }
                self.next_seq += 1;
                self.rows.insert(
                    record.identity.clone(),
                    StoredRow {
                        seq: self.next_seq,
                        body: record.body.clone(),
                    },
                );
            }
            StagedWrite::Modified(record) => match self.rows.get_mut(&record.identity) {
                Some(row) => row.body = record.body.clone(),
                None => return Err(BackendError::MissingRecord(record.identity.clone())),
            },
            StagedWrite::Deleted(identity) => {
                if self.rows.remove(identity).is_none() {
                    return Err(BackendError::MissingRecord(identity.clone()));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
enum StagedWrite {
    New(Record),
    Modified(Record),
    Deleted(Identity),
}

/// Shared in-process store. Cloning yields another handle to the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a new session over this store.
    pub fn open_session(&self) -> MemorySession {
        MemorySession {
            store: self.clone(),
            staged: RefCell::new(None),
        }
    }

    /// Number of committed aggregates across all kinds.
    ///
    /// # Errors
    /// - `BackendError::StorePoisoned` when a writer panicked while holding
    ///   the store lock.
    pub fn len(&self) -> BackendResult<usize> {
        Ok(self.lock()?.rows.len())
    }

    pub fn is_empty(&self) -> BackendResult<bool> {
        Ok(self.len()? == 0)
    }

    fn lock(&self) -> BackendResult<MutexGuard<'_, MemoryState>> {
        self.state.lock().map_err(|_| BackendError::StorePoisoned)
    }

    fn documents_of(&self, kind: &str) -> BackendResult<Vec<Value>> {
        Ok(self.lock()?.documents_of(kind))
    }
}

/// Backend session over a `MemoryStore`.
#[derive(Debug)]
pub struct MemorySession {
    store: MemoryStore,
    staged: RefCell<Option<Vec<StagedWrite>>>,
}

impl MemorySession {
    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    fn stage(&self, write: StagedWrite) -> BackendResult<()> {
        match self.staged.borrow_mut().as_mut() {
            Some(staged) => {
                staged.push(write);
                Ok(())
            }
            None => Err(BackendError::NoActiveTransaction),
        }
    }
}

impl BackendSession for MemorySession {
    fn point_get<T: AggregateRoot>(&self, key: &T::Key) -> BackendResult<Option<T>> {
        let identity = Identity::new(T::KIND, key);
        let state = self.store.lock()?;
        match state.rows.get(&identity) {
            Some(row) => Ok(Some(T::deserialize(&row.body)?)),
            None => Ok(None),
        }
    }

    fn scan_first<T: AggregateRoot>(&self, spec: &Specification<T>) -> BackendResult<Option<T>> {
        eval::first_match(self.store.documents_of(T::KIND)?, spec)
    }

    fn scan<T: AggregateRoot>(&self, spec: Option<&Specification<T>>) -> BackendResult<Vec<T>> {
        eval::select(self.store.documents_of(T::KIND)?, spec, None, None)
    }

    fn scan_paged<T: AggregateRoot>(
        &self,
        spec: Option<&Specification<T>>,
        window: PagingWindow,
        sort: Option<SortBy<'_, T>>,
    ) -> BackendResult<Vec<T>> {
        eval::select(self.store.documents_of(T::KIND)?, spec, sort, Some(window))
    }

    fn apply_new(&self, record: &Record) -> BackendResult<()> {
        self.stage(StagedWrite::New(record.clone()))
    }

    fn apply_modified(&self, record: &Record) -> BackendResult<()> {
        self.stage(StagedWrite::Modified(record.clone()))
    }

    fn apply_deleted(&self, record: &Record) -> BackendResult<()> {
        self.stage(StagedWrite::Deleted(record.identity.clone()))
    }

    fn begin_or_reuse(&self) -> BackendResult<()> {
        self.staged.borrow_mut().get_or_insert_with(Vec::new);
        Ok(())
    }

    fn commit(&self) -> BackendResult<()> {
        let staged = self.staged.borrow();
        let Some(writes) = staged.as_ref() else {
            return Err(BackendError::NoActiveTransaction);
        };

        let mut state = self.store.lock()?;
        let mut next = state.clone();
        for write in writes {
            next.apply(write)?;
        }
        *state = next;
        drop(state);
        drop(staged);

        self.staged.borrow_mut().take();
        Ok(())
    }

    fn rollback(&self) -> BackendResult<()> {
        self.staged.borrow_mut().take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryStore;
    use crate::backend::{BackendError, BackendSession};
    use crate::model::aggregate::Identity;
    use crate::model::record::Record;
    use serde_json::json;

    fn record(key: &str, name: &str) -> Record {
        Record {
            identity: Identity::new("customer", &key),
            body: json!({"id": key, "name": name}),
        }
    }

    #[test]
    fn writes_require_an_open_transaction() {
        let session = MemoryStore::new().open_session();
        let err = session.apply_new(&record("a", "scott")).unwrap_err();
        assert!(matches!(err, BackendError::NoActiveTransaction));
        assert!(matches!(
            session.commit().unwrap_err(),
            BackendError::NoActiveTransaction
        ));
    }

    #[test]
    fn commit_publishes_to_every_session_of_the_store() {
        let store = MemoryStore::new();
        let writer = store.open_session();
        let reader = store.open_session();

        writer.begin_or_reuse().unwrap();
        writer.apply_new(&record("a", "scott")).unwrap();
        assert!(store.is_empty().unwrap());

        writer.commit().unwrap();
        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(reader.store().len().unwrap(), 1);
    }

    #[test]
    fn failed_commit_leaves_store_untouched() {
        let store = MemoryStore::new();
        let session = store.open_session();
        session.begin_or_reuse().unwrap();
        session.apply_new(&record("a", "scott")).unwrap();
        session.commit().unwrap();

        session.begin_or_reuse().unwrap();
        session.apply_new(&record("b", "amy")).unwrap();
        session.apply_new(&record("a", "duplicate")).unwrap();
        let err = session.commit().unwrap_err();
        assert!(matches!(err, BackendError::DuplicateKey(_)));
        session.rollback().unwrap();

        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn poisoned_store_reports_error_instead_of_empty() {
        let store = MemoryStore::new();
        let shared = store.clone();
        let _ = std::thread::spawn(move || {
            let _guard = shared.state.lock().unwrap();
            panic!("writer crashed");
        })
        .join();

        assert!(matches!(store.len(), Err(BackendError::StorePoisoned)));
        assert!(store.is_empty().is_err());
    }
}
