//! Serve command - Starts the HTTP server.

use std::sync::Arc;

use crate::api::{create_router, AppState};
use crate::cli::args::ServeArgs;
use crate::config::{Config, StoreBackend, SYSTEM_ACTOR};
use crate::domain::{NewUser, UserRole};
use crate::errors::{AppError, AppResult};
use crate::infra::{Database, DocumentStore, MemoryStore, PostgresStore};

/// Build the identity store selected by configuration.
async fn build_store(config: &Config) -> AppResult<Arc<dyn DocumentStore>> {
    match config.store_backend {
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory identity store; data is lost on exit");
            Ok(Arc::new(MemoryStore::for_identity()))
        }
        StoreBackend::Postgres => {
            let db = Database::connect(config, true)
                .await
                .map_err(|e| AppError::internal(format!("Database connection failed: {}", e)))?;
            Ok(Arc::new(PostgresStore::new(db.get_connection())))
        }
    }
}

/// Create the configured administrator if it does not exist yet.
async fn seed_admin(state: &AppState) -> AppResult<()> {
    let Some(admin) = state.config.bootstrap_admin.as_ref() else {
        return Ok(());
    };

    let new_user = NewUser::new(admin.email.clone(), admin.password(), admin.name.clone())
        .with_role(UserRole::Admin)
        .created_by(SYSTEM_ACTOR);

    let user = state.identity_service.ensure_user(new_user).await?;
    tracing::info!(user_id = %user.id, "Bootstrap administrator ready");
    Ok(())
}

/// Execute the serve command
pub async fn execute(args: ServeArgs, mut config: Config) -> AppResult<()> {
    tracing::info!("Starting server...");

    if let Some(host) = args.host {
        config.server_host = host;
    }
    if let Some(port) = args.port {
        config.server_port = port;
    }
    let addr = config.server_addr();

    let store = build_store(&config).await?;
    let app_state = AppState::from_config(store, config)?;
    seed_admin(&app_state).await?;

    let app = create_router(app_state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind to {}: {}", addr, e)))?;

    tracing::info!("Server running on http://{}", addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| AppError::internal(format!("Server error: {}", e)))?;

    Ok(())
}
