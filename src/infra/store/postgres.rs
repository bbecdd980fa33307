//! PostgreSQL document store.
//!
//! Items live in a single `documents` table as `jsonb`, keyed by
//! `(table_name, key)`. Secondary indexes are expression indexes created by
//! the migrations; query hints are therefore advisory here.

use async_trait::async_trait;
use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend, Statement, Value as SqlValue};
use serde_json::Value;

use super::{item_key, Document, DocumentStore, KeyCondition, Query, StoreError, StoreResult};

const UPSERT_SQL: &str = "INSERT INTO documents (table_name, key, body) VALUES ($1, $2, $3) \
     ON CONFLICT (table_name, key) DO UPDATE SET body = EXCLUDED.body, updated_at = now()";

/// Store backed by a SeaORM connection pool.
#[derive(Clone)]
pub struct PostgresStore {
    db: DatabaseConnection,
}

impl PostgresStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn statement(sql: &str, values: Vec<SqlValue>) -> Statement {
        Statement::from_sql_and_values(DbBackend::Postgres, sql, values)
    }

    fn decode(row: &sea_orm::QueryResult) -> StoreResult<Document> {
        let body: Value = row
            .try_get("", "body")
            .map_err(StoreError::unavailable)?;
        match body {
            Value::Object(map) => Ok(map),
            other => Err(StoreError::Unavailable(format!(
                "stored body is not an object: {}",
                other
            ))),
        }
    }
}

/// JSON scalars are compared through `->>`, which yields text.
fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl DocumentStore for PostgresStore {
    async fn get(&self, table: &str, key: &str) -> StoreResult<Option<Document>> {
        let row = self
            .db
            .query_one(Self::statement(
                "SELECT body FROM documents WHERE table_name = $1 AND key = $2",
                vec![table.into(), key.into()],
            ))
            .await
            .map_err(StoreError::unavailable)?;

        row.as_ref().map(Self::decode).transpose()
    }

    async fn put(&self, table: &str, item: Document) -> StoreResult<()> {
        let key = item_key(&item)?;
        let values = vec![table.into(), key.into(), Value::Object(item).into()];
        self.db
            .execute(Self::statement(UPSERT_SQL, values))
            .await
            .map_err(StoreError::unavailable)?;
        Ok(())
    }

    async fn put_if_absent(&self, table: &str, item: Document) -> StoreResult<()> {
        let key = item_key(&item)?;
        let result = self
            .db
            .execute(Self::statement(
                "INSERT INTO documents (table_name, key, body) VALUES ($1, $2, $3) \
                 ON CONFLICT (table_name, key) DO NOTHING",
                vec![table.into(), key.clone().into(), Value::Object(item).into()],
            ))
            .await
            .map_err(StoreError::unavailable)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::KeyExists {
                table: table.to_string(),
                key,
            });
        }
        Ok(())
    }

    async fn delete(&self, table: &str, key: &str) -> StoreResult<()> {
        self.db
            .execute(Self::statement(
                "DELETE FROM documents WHERE table_name = $1 AND key = $2",
                vec![table.into(), key.into()],
            ))
            .await
            .map_err(StoreError::unavailable)?;
        Ok(())
    }

    async fn query(&self, table: &str, query: &Query) -> StoreResult<Vec<Document>> {
        let condition = KeyCondition::parse(query)?;

        let mut sql = String::from("SELECT body FROM documents WHERE table_name = $1");
        let mut values: Vec<SqlValue> = vec![table.into()];
        for c in &condition.conditions {
            // Attribute names are bound too; the parser already restricted them
            // to identifiers.
            sql.push_str(&format!(
                " AND body ->> ${} = ${}",
                values.len() + 1,
                values.len() + 2
            ));
            values.push(c.attribute.clone().into());
            values.push(as_text(&c.value).into());
        }
        sql.push_str(" ORDER BY key");
        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let rows = self
            .db
            .query_all(Self::statement(&sql, values))
            .await
            .map_err(StoreError::unavailable)?;

        rows.iter().map(Self::decode).collect()
    }

    async fn ping(&self) -> StoreResult<()> {
        self.db
            .execute(Self::statement("SELECT 1", vec![]))
            .await
            .map_err(StoreError::unavailable)?;
        Ok(())
    }
}
