//! Identity store adapter.
//!
//! The service treats persistence as an opaque keyed document store with
//! secondary-index queries. Every document is a JSON object whose `id`
//! attribute is its primary key within a table.

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

mod expression;
mod memory;
mod postgres;

pub use expression::{Condition, KeyCondition};
pub use memory::MemoryStore;
pub use postgres::PostgresStore;

use crate::config::KEY_ATTRIBUTE;

/// A stored item
pub type Document = Map<String, Value>;

/// Store failures
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("item with key {key} already exists in {table}")]
    KeyExists { table: String, key: String },

    #[error("item is missing its `{}` attribute", KEY_ATTRIBUTE)]
    MissingKey,

    #[error("unknown index {index} on {table}")]
    UnknownIndex { table: String, index: String },

    #[error("invalid query expression: {0}")]
    Expression(String),

    #[error("document encoding failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Result type alias
pub type StoreResult<T> = Result<T, StoreError>;

/// Secondary-index query: an equality expression such as
/// `email = :email`, its bound values, and optional index/limit hints.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub expression: String,
    pub values: Document,
    pub index: Option<String>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            ..Self::default()
        }
    }

    /// Bind a `:placeholder` value.
    pub fn bind(mut self, placeholder: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(placeholder.into(), value.into());
        self
    }

    pub fn index(mut self, index: impl Into<String>) -> Self {
        self.index = Some(index.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Document store operations consumed by the identity service.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch an item by primary key
    async fn get(&self, table: &str, key: &str) -> StoreResult<Option<Document>>;

    /// Insert or replace an item
    async fn put(&self, table: &str, item: Document) -> StoreResult<()>;

    /// Insert an item only if its key is free; fails with `KeyExists` otherwise
    async fn put_if_absent(&self, table: &str, item: Document) -> StoreResult<()>;

    /// Remove an item; missing keys are not an error
    async fn delete(&self, table: &str, key: &str) -> StoreResult<()>;

    /// Query items matching an equality expression
    async fn query(&self, table: &str, query: &Query) -> StoreResult<Vec<Document>>;

    /// Connectivity probe
    async fn ping(&self) -> StoreResult<()>;
}

/// Extract the primary key of an item.
pub fn item_key(item: &Document) -> StoreResult<String> {
    match item.get(KEY_ATTRIBUTE) {
        Some(Value::String(key)) if !key.is_empty() => Ok(key.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(StoreError::MissingKey),
    }
}

impl StoreError {
    pub fn unavailable(err: impl std::fmt::Display) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_item_key() {
        let item = json!({"id": "u-1", "email": "a@b.c"});
        assert_eq!(item_key(item.as_object().unwrap()).unwrap(), "u-1");

        let item = json!({"email": "a@b.c"});
        assert!(matches!(
            item_key(item.as_object().unwrap()),
            Err(StoreError::MissingKey)
        ));
    }

    #[test]
    fn test_query_builder() {
        let query = Query::new("email = :email")
            .bind(":email", "a@b.c")
            .index("email-index")
            .limit(1);

        assert_eq!(query.values[":email"], json!("a@b.c"));
        assert_eq!(query.index.as_deref(), Some("email-index"));
        assert_eq!(query.limit, Some(1));
    }
}
