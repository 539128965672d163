//! Serialized aggregate snapshot.

use crate::model::aggregate::{AggregateRoot, Identity};
use serde_json::Value;

/// Snapshot of one aggregate as handed to backend adapters on commit.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub identity: Identity,
    /// JSON document produced by the aggregate's `Serialize` impl.
    pub body: Value,
}

impl Record {
    /// Serializes `aggregate` into a record.
    pub fn from_aggregate<T: AggregateRoot>(aggregate: &T) -> Result<Self, serde_json::Error> {
        Ok(Self {
            identity: aggregate.identity(),
            body: serde_json::to_value(aggregate)?,
        })
    }

    pub fn kind(&self) -> &'static str {
        self.identity.kind
    }

    pub fn key(&self) -> &str {
        self.identity.key.as_str()
    }

    /// Decodes the record body back into an aggregate.
    pub fn decode<T: AggregateRoot>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.body)
    }
}
