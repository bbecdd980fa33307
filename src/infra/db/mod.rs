//! Postgres connection for the identity store and its schema migrations.

use sea_orm::{Database as SeaDatabase, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;

use crate::config::Config;

pub mod migrations;

pub use migrations::Migrator;

/// Schema operations exposed by `migrate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaChange {
    /// Apply every pending migration
    Up,
    /// Revert the most recent migration
    Down,
    /// Drop the documents table and re-apply everything
    Fresh,
}

#[derive(Clone)]
pub struct Database {
    connection: DatabaseConnection,
}

impl Database {
    /// Open the pool at `DATABASE_URL`, applying pending migrations when `migrate` is set.
    pub async fn connect(config: &Config, migrate: bool) -> Result<Self, DbErr> {
        let connection = SeaDatabase::connect(&config.database_url).await?;
        let db = Self { connection };

        if migrate {
            db.change_schema(SchemaChange::Up).await?;
            tracing::info!("Documents schema is up to date");
        }
        Ok(db)
    }

    pub fn get_connection(&self) -> DatabaseConnection {
        self.connection.clone()
    }

    pub async fn change_schema(&self, change: SchemaChange) -> Result<(), DbErr> {
        match change {
            SchemaChange::Up => Migrator::up(&self.connection, None).await,
            SchemaChange::Down => Migrator::down(&self.connection, Some(1)).await,
            SchemaChange::Fresh => Migrator::fresh(&self.connection).await,
        }
    }

    /// Names of migrations not yet applied, oldest first.
    pub async fn pending_migrations(&self) -> Result<Vec<String>, DbErr> {
        let pending = Migrator::get_pending_migrations(&self.connection).await?;
        Ok(pending.iter().map(|m| m.name().to_string()).collect())
    }
}
