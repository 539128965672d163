#![allow(dead_code)]

use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use unitwork_core::{
    AggregateRoot, AnyBackend, BackendConfig, BackendRegistry, Repository, RepositoryContext,
};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub age: i64,
    pub active: bool,
}

impl Customer {
    pub fn new(name: &str, age: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: None,
            age,
            active: true,
        }
    }

    pub fn with_email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }
}

impl AggregateRoot for Customer {
    type Key = Uuid;
    const KIND: &'static str = "customer";

    fn key(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub total_cents: i64,
}

impl Order {
    pub fn for_customer(customer: &Customer, total_cents: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            customer_id: customer.id,
            total_cents,
        }
    }
}

impl AggregateRoot for Order {
    type Key = Uuid;
    const KIND: &'static str = "order";

    fn key(&self) -> Uuid {
        self.id
    }
}

/// One shipped backend plus whatever keeps its storage alive.
pub struct Harness {
    pub name: &'static str,
    registry: BackendRegistry,
    config: BackendConfig,
    _dir: Option<TempDir>,
}

impl Harness {
    /// Opens a fresh session onto the same underlying storage.
    pub fn open(&self) -> AnyBackend {
        self.registry.open(&self.config).unwrap()
    }

    pub fn context(&self) -> RepositoryContext<AnyBackend> {
        RepositoryContext::new(self.open())
    }
}

/// Harnesses for every backend whose sessions share storage.
pub fn harnesses() -> Vec<Harness> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("unitwork.db");
    vec![
        Harness {
            name: "sqlite",
            registry: BackendRegistry::with_defaults(),
            config: BackendConfig::new("sqlite").with_path(path),
            _dir: Some(dir),
        },
        Harness {
            name: "memory",
            registry: BackendRegistry::with_defaults(),
            config: BackendConfig::new("memory"),
            _dir: None,
        },
    ]
}

/// Commits one customer per name, in order, and returns them.
pub fn seed_customers(harness: &Harness, names: &[&str]) -> Vec<Customer> {
    let context = harness.context();
    let repo = context.repository::<Customer>();
    let customers = names
        .iter()
        .enumerate()
        .map(|(index, name)| Customer::new(name, 20 + index as i64))
        .collect::<Vec<_>>();
    for customer in &customers {
        repo.add(customer).unwrap();
    }
    context.commit().unwrap();
    customers
}

pub fn names(customers: &[Customer]) -> Vec<String> {
    customers
        .iter()
        .map(|customer| customer.name.clone())
        .collect()
}
