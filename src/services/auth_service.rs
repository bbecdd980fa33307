//! Authentication service - Login and self-service registration.
//!
//! Combines the identity service and the session issuer. Failures that are
//! not part of the auth vocabulary are logged here and replaced with an
//! opaque internal error.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use super::identity_service::IdentityService;
use super::session::{SessionClaims, SessionIssuer};
use crate::domain::{NewUser, Password, User, UserRole};
use crate::errors::{AppError, AppResult};

/// Token response returned after successful authentication
#[derive(Debug, Clone, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub user: SessionClaims,
}

/// Authentication service trait for dependency injection.
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Login and return a signed session
    async fn login(&self, email: String, password: String) -> AppResult<AuthResponse>;

    /// Register a customer account and sign it in. A requested role is ignored.
    async fn register(
        &self,
        email: String,
        password: String,
        name: String,
        requested_role: Option<String>,
    ) -> AppResult<AuthResponse>;

    /// Verify a bearer token and extract its claims
    fn verify_token(&self, token: &str) -> AppResult<SessionClaims>;
}

/// Keep domain failures, hide everything else behind `Internal`.
fn opaque(operation: &'static str) -> impl Fn(AppError) -> AppError {
    move |err| {
        if err.is_domain() {
            err
        } else {
            tracing::error!(operation, error = ?err, "Authentication step failed");
            AppError::internal(format!("{} failed", operation))
        }
    }
}

/// Concrete implementation of AuthService.
pub struct Authenticator {
    identity: Arc<dyn IdentityService>,
    sessions: Arc<SessionIssuer>,
    /// Verified against when the email is unknown, so both paths cost one hash check
    decoy: Password,
}

impl Authenticator {
    pub fn new(
        identity: Arc<dyn IdentityService>,
        sessions: Arc<SessionIssuer>,
        decoy: Password,
    ) -> Self {
        Self {
            identity,
            sessions,
            decoy,
        }
    }

    fn sign_in(&self, user: &User) -> AppResult<AuthResponse> {
        let issued = self.sessions.issue(SessionClaims::from(user))?;
        Ok(AuthResponse {
            access_token: issued.access_token,
            user: issued.claims,
        })
    }
}

#[async_trait]
impl AuthService for Authenticator {
    async fn login(&self, email: String, password: String) -> AppResult<AuthResponse> {
        let record = self
            .identity
            .find_by_email(&email)
            .await
            .map_err(opaque("login"))?;

        let stored = record.as_ref().map(|r| &r.password).unwrap_or(&self.decoy);
        let password_valid = self.identity.validate_password(&password, stored).await;

        match record {
            Some(record) if record.user.is_active && password_valid => {
                let response = self.sign_in(&record.user).map_err(opaque("login"))?;
                tracing::info!(user_id = %record.user.id, "User logged in");
                Ok(response)
            }
            Some(record) if !record.user.is_active => {
                tracing::debug!(user_id = %record.user.id, "Login refused for inactive user");
                Err(AppError::InvalidCredentials)
            }
            _ => Err(AppError::InvalidCredentials),
        }
    }

    async fn register(
        &self,
        email: String,
        password: String,
        name: String,
        requested_role: Option<String>,
    ) -> AppResult<AuthResponse> {
        if let Some(role) = requested_role.as_deref() {
            tracing::debug!(requested_role = role, "Ignoring role on self-service registration");
        }

        let new_user = NewUser::new(email, password, name).with_role(UserRole::Customer);
        let user = self
            .identity
            .create(new_user)
            .await
            .map_err(opaque("register"))?;

        self.sign_in(&user).map_err(opaque("register"))
    }

    fn verify_token(&self, token: &str) -> AppResult<SessionClaims> {
        self.sessions.verify(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::domain::password::tests::test_codec;
    use crate::domain::CredentialCodec;
    use crate::infra::{DocumentStore, MemoryStore, MockDocumentStore, StoreError};
    use crate::services::identity_service::IdentityManager;

    fn config() -> Config {
        Config::with_secret("auth-service-test-secret-32-chars!!").unwrap()
    }

    fn authenticator(store: Arc<dyn DocumentStore>) -> (Authenticator, Arc<IdentityManager>) {
        let config = config();
        let codec = Arc::new(test_codec());
        let decoy = codec.hash("decoy-password").unwrap();
        let identity = Arc::new(IdentityManager::new(store, codec, &config));
        let auth = Authenticator::new(
            identity.clone(),
            Arc::new(SessionIssuer::new(&config).unwrap()),
            decoy,
        );
        (auth, identity)
    }

    async fn seeded() -> (Authenticator, User) {
        let (auth, identity) = authenticator(Arc::new(MemoryStore::for_identity()));
        let admin = identity
            .create(
                NewUser::new("admin@test.com", "123456", "System Administrator")
                    .with_role(UserRole::Admin),
            )
            .await
            .unwrap();
        (auth, admin)
    }

    #[tokio::test]
    async fn test_login_returns_claims_for_stored_user() {
        let (auth, admin) = seeded().await;
        let response = auth
            .login("admin@test.com".into(), "123456".into())
            .await
            .unwrap();

        assert!(response.access_token.len() > 10);
        assert_eq!(response.user.user_id, admin.id);
        assert_eq!(response.user.email, "admin@test.com");
        assert_eq!(response.user.role, UserRole::Admin);

        let verified = auth.verify_token(&response.access_token).unwrap();
        assert_eq!(verified, response.user);
    }

    #[tokio::test]
    async fn test_wrong_password_matches_unknown_email() {
        let (auth, _) = seeded().await;

        let wrong = auth
            .login("admin@test.com".into(), "654321".into())
            .await
            .unwrap_err();
        let unknown = auth
            .login("nobody@test.com".into(), "123456".into())
            .await
            .unwrap_err();

        assert!(matches!(wrong, AppError::InvalidCredentials));
        assert!(matches!(unknown, AppError::InvalidCredentials));
        assert_eq!(wrong.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn test_inactive_user_cannot_login() {
        let store = Arc::new(MemoryStore::for_identity());
        let (auth, identity) = authenticator(store.clone());
        let user = identity
            .create(NewUser::new("gone@bistro.io", "password1", "Gone"))
            .await
            .unwrap();

        let mut item = store.get("users", &user.id.to_string()).await.unwrap().unwrap();
        item.insert("isActive".into(), serde_json::json!(false));
        store.put("users", item).await.unwrap();

        let result = auth.login("gone@bistro.io".into(), "password1".into()).await;
        assert!(matches!(result, Err(AppError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_register_forces_customer_role() {
        let (auth, _) = authenticator(Arc::new(MemoryStore::for_identity()));
        let response = auth
            .register(
                "new@bistro.io".into(),
                "password1".into(),
                "New Guest".into(),
                Some("admin".into()),
            )
            .await
            .unwrap();

        assert_eq!(response.user.role, UserRole::Customer);
        assert_eq!(response.user.email, "new@bistro.io");
    }

    #[tokio::test]
    async fn test_register_duplicate_propagates_conflict() {
        let (auth, _) = seeded().await;
        let result = auth
            .register(
                "admin@test.com".into(),
                "password1".into(),
                "Impostor".into(),
                None,
            )
            .await;

        assert!(matches!(result, Err(AppError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_store_failure_becomes_opaque_internal() {
        let mut store = MockDocumentStore::new();
        store
            .expect_query()
            .returning(|_, _| Err(StoreError::Unavailable("10.0.0.7:5432 refused".into())));
        let (auth, _) = authenticator(Arc::new(store));

        let err = auth
            .login("admin@test.com".into(), "123456".into())
            .await
            .unwrap_err();

        let AppError::Internal(detail) = &err else {
            panic!("expected internal error, got {:?}", err);
        };
        assert!(!detail.contains("10.0.0.7"));
        assert_eq!(err.user_message(), "Internal error");
    }
}
