//! Migrate command - Schema management for the postgres identity store.

use sea_orm::DbErr;
use sea_orm_migration::{MigrationName, MigratorTrait};

use crate::cli::args::{MigrateAction, MigrateArgs};
use crate::config::{Config, StoreBackend};
use crate::errors::{AppError, AppResult};
use crate::infra::{Database, Migrator, SchemaChange};

fn db_error(action: &'static str) -> impl Fn(DbErr) -> AppError {
    move |e| AppError::internal(format!("{} failed: {}", action, e))
}

/// One `name: applied|pending` line per known migration, oldest first.
fn status_lines(pending: &[String]) -> Vec<String> {
    Migrator::migrations()
        .iter()
        .map(|migration| {
            let name = migration.name();
            let state = if pending.iter().any(|p| p == name) {
                "pending"
            } else {
                "applied"
            };
            format!("{}: {}", name, state)
        })
        .collect()
}

/// Execute the migrate command
pub async fn execute(args: MigrateArgs, config: Config) -> AppResult<()> {
    if config.store_backend == StoreBackend::Memory {
        tracing::warn!("STORE_BACKEND is memory; migrating DATABASE_URL anyway");
    }

    let db = Database::connect(&config, false)
        .await
        .map_err(db_error("Database connection"))?;

    let change = match args.action {
        MigrateAction::Up => SchemaChange::Up,
        MigrateAction::Down => SchemaChange::Down,
        MigrateAction::Fresh => {
            tracing::warn!("Dropping the documents table and re-running all migrations");
            SchemaChange::Fresh
        }
        MigrateAction::Status => {
            let pending = db
                .pending_migrations()
                .await
                .map_err(db_error("Status check"))?;
            for line in status_lines(&pending) {
                println!("{}", line);
            }
            return Ok(());
        }
    };

    db.change_schema(change)
        .await
        .map_err(db_error("Migration"))?;
    tracing::info!(?change, "Migration completed successfully");

    Ok(())
}
