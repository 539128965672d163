//! Pending change bookkeeping for one unit of work.
//!
//! # Invariants
//! - An identity sits in at most one bucket.
//! - A rejected registration leaves every bucket unchanged.
//! - Flush order is New, Modified, Deleted; registration order within each.

use crate::error::{RepoError, RepoResult};
use crate::model::aggregate::Identity;
use crate::model::record::Record;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};

/// Bucket an aggregate is pending in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PendingKind {
    New,
    Modified,
    Deleted,
}

impl PendingKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Modified => "modified",
            Self::Deleted => "deleted",
        }
    }
}

impl Display for PendingKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
struct PendingEntry {
    kind: PendingKind,
    seq: u64,
    record: Record,
}

/// Identity-keyed pending buckets with registration order.
#[derive(Debug, Default)]
pub struct PendingChangeSet {
    entries: HashMap<Identity, PendingEntry>,
    next_seq: u64,
}

impl PendingChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `record` under `requested`, resolving re-registration.
    ///
    /// | existing \ requested | New | Modified | Deleted |
    /// |---|---|---|---|
    /// | New | New, snapshot replaced | New, snapshot replaced | conflict |
    /// | Modified | conflict | Modified, snapshot replaced | Deleted |
    /// | Deleted | conflict | conflict | no-op |
    pub fn register(&mut self, record: Record, requested: PendingKind) -> RepoResult<()> {
        use PendingKind::{Deleted, Modified, New};

        let Some(existing) = self.entries.get_mut(&record.identity) else {
            self.insert(record, requested);
            return Ok(());
        };

        match (existing.kind, requested) {
            (New, New) | (New, Modified) | (Modified, Modified) => {
                existing.record = record;
                Ok(())
            }
            (Deleted, Deleted) => Ok(()),
            (Modified, Deleted) => {
                self.entries.remove(&record.identity);
                self.insert(record, Deleted);
                Ok(())
            }
            (pending, requested) => Err(RepoError::ConflictingRegistration {
                identity: record.identity,
                pending,
                requested,
            }),
        }
    }

    pub fn kind_of(&self, identity: &Identity) -> Option<PendingKind> {
        self.entries.get(identity).map(|entry| entry.kind)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries in one bucket.
    pub fn count_of(&self, kind: PendingKind) -> usize {
        self.entries
            .values()
            .filter(|entry| entry.kind == kind)
            .count()
    }

    /// Entries in flush order. The set itself is left intact.
    pub fn flush_order(&self) -> Vec<(PendingKind, &Record)> {
        let mut entries = self.entries.values().collect::<Vec<_>>();
        entries.sort_by_key(|entry| (entry.kind, entry.seq));
        entries
            .into_iter()
            .map(|entry| (entry.kind, &entry.record))
            .collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn insert(&mut self, record: Record, kind: PendingKind) {
        self.next_seq += 1;
        self.entries.insert(
            record.identity.clone(),
            PendingEntry {
                kind,
                seq: self.next_seq,
                record,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::{PendingChangeSet, PendingKind};
    use crate::error::RepoError;
    use crate::model::aggregate::Identity;
    use crate::model::record::Record;
    use serde_json::json;

    fn record(key: &str, version: i64) -> Record {
        Record {
            identity: Identity::new("customer", &key),
            body: json!({"id": key, "version": version}),
        }
    }

    fn version_of(set: &PendingChangeSet, key: &str) -> Option<i64> {
        set.flush_order()
            .into_iter()
            .find(|(_, record)| record.identity.key == key)
            .and_then(|(_, record)| record.body["version"].as_i64())
    }

    #[test]
    fn new_stays_new_and_takes_latest_snapshot() {
        let mut set = PendingChangeSet::new();
        set.register(record("a", 1), PendingKind::New).unwrap();
        set.register(record("a", 2), PendingKind::Modified).unwrap();
        set.register(record("a", 3), PendingKind::New).unwrap();

        assert_eq!(set.len(), 1);
        assert_eq!(
            set.kind_of(&Identity::new("customer", &"a")),
            Some(PendingKind::New)
        );
        assert_eq!(version_of(&set, "a"), Some(3));
    }

    #[test]
    fn modified_then_deleted_becomes_deleted() {
        let mut set = PendingChangeSet::new();
        set.register(record("a", 1), PendingKind::Modified).unwrap();
        set.register(record("a", 1), PendingKind::Deleted).unwrap();

        assert_eq!(set.count_of(PendingKind::Modified), 0);
        assert_eq!(set.count_of(PendingKind::Deleted), 1);
    }

    #[test]
    fn conflicts_leave_pending_state_unchanged() {
        let cases = [
            (PendingKind::New, PendingKind::Deleted),
            (PendingKind::Modified, PendingKind::New),
            (PendingKind::Deleted, PendingKind::New),
            (PendingKind::Deleted, PendingKind::Modified),
        ];

        for (existing, requested) in cases {
            let mut set = PendingChangeSet::new();
            set.register(record("a", 1), existing).unwrap();
            let err = set.register(record("a", 2), requested).unwrap_err();

            assert!(matches!(
                err,
                RepoError::ConflictingRegistration { pending, requested: asked, .. }
                    if pending == existing && asked == requested
            ));
            assert_eq!(set.kind_of(&Identity::new("customer", &"a")), Some(existing));
            assert_eq!(version_of(&set, "a"), Some(1));
        }
    }

    #[test]
    fn deleted_twice_is_a_no_op() {
        let mut set = PendingChangeSet::new();
        set.register(record("a", 1), PendingKind::Deleted).unwrap();
        set.register(record("a", 1), PendingKind::Deleted).unwrap();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn flush_order_groups_by_kind_then_registration() {
        let mut set = PendingChangeSet::new();
        set.register(record("d1", 1), PendingKind::Deleted).unwrap();
        set.register(record("m1", 1), PendingKind::Modified).unwrap();
        set.register(record("n1", 1), PendingKind::New).unwrap();
        set.register(record("n2", 1), PendingKind::New).unwrap();
        set.register(record("m2", 1), PendingKind::Modified).unwrap();

        let order = set
            .flush_order()
            .into_iter()
            .map(|(_, record)| record.identity.key.clone())
            .collect::<Vec<_>>();
        assert_eq!(order, vec!["n1", "n2", "m1", "m2", "d1"]);
    }
}
