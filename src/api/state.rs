//! Application state - Dependency injection container.
//!
//! Provides centralized access to all application services and infrastructure.

use std::sync::Arc;

use crate::config::Config;
use crate::errors::AppResult;
use crate::infra::DocumentStore;
use crate::services::{AuthService, IdentityService, ServiceContainer, Services};

/// Application state containing all services (DI container).
#[derive(Clone)]
pub struct AppState {
    /// Authentication service
    pub auth_service: Arc<dyn AuthService>,
    /// Identity service
    pub identity_service: Arc<dyn IdentityService>,
    /// Identity store, probed by the health check
    pub store: Arc<dyn DocumentStore>,
    /// Immutable configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Create application state over a store, wiring every service from config.
    pub fn from_config(store: Arc<dyn DocumentStore>, config: Config) -> AppResult<Self> {
        let services = Services::from_store(store.clone(), &config)?;
        Ok(Self::new(&services, store, Arc::new(config)))
    }

    /// Create application state from an already built container.
    pub fn new(
        services: &dyn ServiceContainer,
        store: Arc<dyn DocumentStore>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            auth_service: services.auth(),
            identity_service: services.identity(),
            store,
            config,
        }
    }
}
