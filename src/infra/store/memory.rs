//! In-process document store.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{item_key, Document, DocumentStore, KeyCondition, Query, StoreError, StoreResult};
use crate::config::{USERS_EMAIL_INDEX, USERS_TABLE};

/// Memory-backed store. Items are kept in key order, so query results are
/// deterministic. Each operation takes the lock for a single map access.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, BTreeMap<String, Document>>>,
    /// table -> index name -> indexed attribute
    indexes: HashMap<String, HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store without secondary indexes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with the indexes the identity service expects.
    pub fn for_identity() -> Self {
        Self::new().with_index(USERS_TABLE, USERS_EMAIL_INDEX, "email")
    }

    /// Declare a secondary index.
    pub fn with_index(
        mut self,
        table: impl Into<String>,
        index: impl Into<String>,
        attribute: impl Into<String>,
    ) -> Self {
        self.indexes
            .entry(table.into())
            .or_default()
            .insert(index.into(), attribute.into());
        self
    }

    /// All items of a table, in key order.
    pub async fn scan(&self, table: &str) -> Vec<Document> {
        let tables = self.tables.read().await;
        tables
            .get(table)
            .map(|items| items.values().cloned().collect())
            .unwrap_or_default()
    }

    fn check_index(&self, table: &str, query: &Query) -> StoreResult<()> {
        let Some(index) = &query.index else {
            return Ok(());
        };

        let declared = self
            .indexes
            .get(table)
            .map(|indexes| indexes.contains_key(index))
            .unwrap_or(false);

        if declared {
            Ok(())
        } else {
            Err(StoreError::UnknownIndex {
                table: table.to_string(),
                index: index.clone(),
            })
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, table: &str, key: &str) -> StoreResult<Option<Document>> {
        let tables = self.tables.read().await;
        Ok(tables.get(table).and_then(|items| items.get(key)).cloned())
    }

    async fn put(&self, table: &str, item: Document) -> StoreResult<()> {
        let key = item_key(&item)?;
        let mut tables = self.tables.write().await;
        tables.entry(table.to_string()).or_default().insert(key, item);
        Ok(())
    }

    async fn put_if_absent(&self, table: &str, item: Document) -> StoreResult<()> {
        let key = item_key(&item)?;
        let mut tables = self.tables.write().await;
        let items = tables.entry(table.to_string()).or_default();
        if items.contains_key(&key) {
            return Err(StoreError::KeyExists {
                table: table.to_string(),
                key,
            });
        }
        items.insert(key, item);
        Ok(())
    }

    async fn delete(&self, table: &str, key: &str) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if let Some(items) = tables.get_mut(table) {
            items.remove(key);
        }
        Ok(())
    }

    async fn query(&self, table: &str, query: &Query) -> StoreResult<Vec<Document>> {
        self.check_index(table, query)?;
        let condition = KeyCondition::parse(query)?;
        let limit = query.limit.unwrap_or(usize::MAX);

        let tables = self.tables.read().await;
        Ok(tables
            .get(table)
            .map(|items| {
                items
                    .values()
                    .filter(|item| condition.matches(item))
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
