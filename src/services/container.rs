//! Service Container - Centralized service access.
//!
//! Every service is built once at startup and shared behind `Arc`.

use std::sync::Arc;

use uuid::Uuid;

use super::{AuthService, Authenticator, IdentityManager, IdentityService, SessionIssuer};
use crate::config::Config;
use crate::domain::{Argon2Codec, CredentialCodec};
use crate::errors::AppResult;
use crate::infra::DocumentStore;

/// Hands the request state its services.
pub trait ServiceContainer: Send + Sync {
    /// Get authentication service
    fn auth(&self) -> Arc<dyn AuthService>;

    /// Get identity service
    fn identity(&self) -> Arc<dyn IdentityService>;
}

/// Concrete implementation of ServiceContainer
pub struct Services {
    auth_service: Arc<dyn AuthService>,
    identity_service: Arc<dyn IdentityService>,
}

impl Services {
    /// Create a new service container from prebuilt services
    pub fn new(
        auth_service: Arc<dyn AuthService>,
        identity_service: Arc<dyn IdentityService>,
    ) -> Self {
        Self {
            auth_service,
            identity_service,
        }
    }

    /// Wire all services over a store, with the Argon2id work factor from config.
    pub fn from_store(store: Arc<dyn DocumentStore>, config: &Config) -> AppResult<Self> {
        let codec = Arc::new(Argon2Codec::from_config(config)?);
        Self::with_codec(store, codec, config)
    }

    /// Wire all services over a store with an explicit codec.
    pub fn with_codec(
        store: Arc<dyn DocumentStore>,
        codec: Arc<dyn CredentialCodec>,
        config: &Config,
    ) -> AppResult<Self> {
        // Hash of a throwaway secret: same parameters as real hashes, never matches.
        let decoy = codec.hash(&Uuid::new_v4().to_string())?;

        let identity_service = Arc::new(IdentityManager::new(store, codec, config));
        let sessions = Arc::new(SessionIssuer::new(config)?);
        let auth_service = Arc::new(Authenticator::new(
            identity_service.clone(),
            sessions,
            decoy,
        ));

        Ok(Self {
            auth_service,
            identity_service,
        })
    }
}

impl ServiceContainer for Services {
    fn auth(&self) -> Arc<dyn AuthService> {
        self.auth_service.clone()
    }

    fn identity(&self) -> Arc<dyn IdentityService> {
        self.identity_service.clone()
    }
}
