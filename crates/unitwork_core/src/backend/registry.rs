//! Backend selection by identifier.
//!
//! # Responsibility
//! - Map known backend ids to factory functions.
//! - Reject unknown or malformed ids at startup, before any session opens.
//!
//! # Invariants
//! - Ids are lowercase ASCII letters, digits, `_` or `-`.
//! - One id maps to exactly one factory.

use crate::backend::memory::{MemorySession, MemoryStore};
use crate::backend::sqlite::SqliteSession;
use crate::backend::{BackendResult, BackendSession};
use crate::config::BackendConfig;
use crate::error::{RepoError, RepoResult};
use crate::model::aggregate::AggregateRoot;
use crate::model::record::Record;
use crate::repo::paging::PagingWindow;
use crate::spec::sort::SortBy;
use crate::spec::specification::Specification;
use std::collections::BTreeMap;

pub const SQLITE_BACKEND: &str = "sqlite";
pub const SQLITE_MEMORY_BACKEND: &str = "sqlite_memory";
pub const MEMORY_BACKEND: &str = "memory";

/// Session produced by the registry.
pub enum AnyBackend {
    Sqlite(SqliteSession),
    Memory(MemorySession),
}

macro_rules! dispatch {
    ($backend:expr, $session:ident => $call:expr) => {
        match $backend {
            AnyBackend::Sqlite($session) => $call,
            AnyBackend::Memory($session) => $call,
        }
    };
}

impl BackendSession for AnyBackend {
    fn point_get<T: AggregateRoot>(&self, key: &T::Key) -> BackendResult<Option<T>> {
        dispatch!(self, session => session.point_get::<T>(key))
    }

    fn scan_first<T: AggregateRoot>(&self, spec: &Specification<T>) -> BackendResult<Option<T>> {
        dispatch!(self, session => session.scan_first(spec))
    }

    fn scan<T: AggregateRoot>(&self, spec: Option<&Specification<T>>) -> BackendResult<Vec<T>> {
        dispatch!(self, session => session.scan(spec))
    }

    fn scan_paged<T: AggregateRoot>(
        &self,
        spec: Option<&Specification<T>>,
        window: PagingWindow,
        sort: Option<SortBy<'_, T>>,
    ) -> BackendResult<Vec<T>> {
        dispatch!(self, session => session.scan_paged(spec, window, sort))
    }

    fn apply_new(&self, record: &Record) -> BackendResult<()> {
        dispatch!(self, session => session.apply_new(record))
    }

    fn apply_modified(&self, record: &Record) -> BackendResult<()> {
        dispatch!(self, session => session.apply_modified(record))
    }

    fn apply_deleted(&self, record: &Record) -> BackendResult<()> {
        dispatch!(self, session => session.apply_deleted(record))
    }

    fn begin_or_reuse(&self) -> BackendResult<()> {
        dispatch!(self, session => session.begin_or_reuse())
    }

    fn commit(&self) -> BackendResult<()> {
        dispatch!(self, session => session.commit())
    }

    fn rollback(&self) -> BackendResult<()> {
        dispatch!(self, session => session.rollback())
    }
}

/// Factory turning a validated config into a session.
pub type BackendFactory = Box<dyn Fn(&BackendConfig) -> RepoResult<AnyBackend> + Send + Sync>;

/// Registry of backend factories keyed by id.
#[derive(Default)]
pub struct BackendRegistry {
    factories: BTreeMap<String, BackendFactory>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the shipped backends.
    ///
    /// Every `memory` session opened from this registry shares one store.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        let store = MemoryStore::new();
        let builtins: [(&str, BackendFactory); 3] = [
            (SQLITE_BACKEND, Box::new(open_sqlite_file)),
            (SQLITE_MEMORY_BACKEND, Box::new(open_sqlite_memory)),
            (
                MEMORY_BACKEND,
                Box::new(move |_: &BackendConfig| -> RepoResult<AnyBackend> {
                    Ok(AnyBackend::Memory(store.open_session()))
                }),
            ),
        ];
        for (id, factory) in builtins {
            registry.factories.insert(id.to_string(), factory);
        }
        registry
    }

    /// Registers one factory under `id`.
    pub fn register<F>(&mut self, id: &str, factory: F) -> RepoResult<()>
    where
        F: Fn(&BackendConfig) -> RepoResult<AnyBackend> + Send + Sync + 'static,
    {
        let id = id.trim();
        if !is_valid_backend_id(id) {
            return Err(RepoError::Configuration(format!(
                "backend id is invalid: `{id}`"
            )));
        }
        if self.factories.contains_key(id) {
            return Err(RepoError::Configuration(format!(
                "backend id already registered: `{id}`"
            )));
        }
        self.factories.insert(id.to_string(), Box::new(factory));
        Ok(())
    }

    /// Returns sorted backend ids.
    pub fn backend_ids(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id.trim())
    }

    /// Checks that `config` names a registered backend.
    pub fn validate(&self, config: &BackendConfig) -> RepoResult<()> {
        self.factory(config).map(|_| ())
    }

    /// Opens a session for `config`.
    pub fn open(&self, config: &BackendConfig) -> RepoResult<AnyBackend> {
        let factory = self.factory(config)?;
        factory(config)
    }

    fn factory(&self, config: &BackendConfig) -> RepoResult<&BackendFactory> {
        let id = config.backend_id();
        self.factories.get(id).ok_or_else(|| {
            RepoError::Configuration(format!(
                "unknown backend `{id}`; expected one of {}",
                self.backend_ids().join("|")
            ))
        })
    }
}

fn open_sqlite_file(config: &BackendConfig) -> RepoResult<AnyBackend> {
    let path = config.require_path()?;
    Ok(AnyBackend::Sqlite(SqliteSession::open(path)?))
}

fn open_sqlite_memory(_: &BackendConfig) -> RepoResult<AnyBackend> {
    Ok(AnyBackend::Sqlite(SqliteSession::open_in_memory()?))
}

fn is_valid_backend_id(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}
