//! Infrastructure layer - External systems integration
//!
//! This module handles all external system concerns:
//! - The identity store adapter and its backends
//! - Database connections and migrations

pub mod db;
pub mod store;

pub use db::{Database, Migrator, SchemaChange};
pub use store::{
    Document, DocumentStore, MemoryStore, PostgresStore, Query, StoreError, StoreResult,
};

#[cfg(any(test, feature = "test-utils"))]
pub use store::MockDocumentStore;
