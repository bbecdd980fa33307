//! Identity service - Owns the user lifecycle in the identity store.
//!
//! Email uniqueness is a business rule enforced here, not by the store:
//! every insert is preceded by an index lookup. With email reservation
//! enabled, the insert additionally claims a `user_emails/<email>` item
//! through a conditional put, which closes the window in which two
//! concurrent registrations could both pass the lookup. A reservation whose
//! user was never written (crash between the two puts) is reclaimed once it
//! is older than `EMAIL_RESERVATION_GRACE_SECONDS`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::config::{
    Config, EMAIL_RESERVATION_GRACE_SECONDS, MIN_NAME_LENGTH, MIN_PASSWORD_LENGTH,
    USERS_EMAIL_INDEX, USERS_TABLE, USER_EMAILS_TABLE,
};
use crate::domain::{normalize_email, CredentialCodec, NewUser, Password, User, UserRecord};
use crate::errors::{AppError, AppResult};
use crate::infra::{Document, DocumentStore, Query, StoreError};

/// Entity name used in `AlreadyExists` messages
const EMAIL_TAKEN: &str = "A user with this email";

/// Identity service trait for dependency injection.
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Look up a user and its stored hash through the email index
    async fn find_by_email(&self, email: &str) -> AppResult<Option<UserRecord>>;

    /// Look up a user by primary key
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>>;

    /// Create a user; fails with `AlreadyExists` if the email is taken
    async fn create(&self, new_user: NewUser) -> AppResult<User>;

    /// Check a password against a stored hash; never fails
    async fn validate_password(&self, plain_text: &str, password: &Password) -> bool;

    /// Return the user with this email, creating it if absent
    async fn ensure_user(&self, new_user: NewUser) -> AppResult<User>;
}

/// Stored shape of a user: the entity plus its hash.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserDocument {
    #[serde(flatten)]
    user: User,
    #[serde(default)]
    password_hash: String,
}

impl UserDocument {
    fn encode(user: &User, password: &Password) -> AppResult<Document> {
        let doc = UserDocument {
            user: user.clone(),
            password_hash: password.as_str().to_string(),
        };
        match serde_json::to_value(doc).map_err(StoreError::from)? {
            Value::Object(map) => Ok(map),
            _ => Err(AppError::internal("User document did not encode to an object")),
        }
    }

    fn decode(item: Document) -> AppResult<UserRecord> {
        let doc: UserDocument =
            serde_json::from_value(Value::Object(item)).map_err(StoreError::from)?;
        Ok(UserRecord {
            user: doc.user,
            password: Password::from_hash(doc.password_hash),
        })
    }
}

/// Concrete implementation of IdentityService over a document store.
pub struct IdentityManager {
    store: Arc<dyn DocumentStore>,
    codec: Arc<dyn CredentialCodec>,
    email_reservation: bool,
}

impl IdentityManager {
    /// Create new identity service instance
    pub fn new(
        store: Arc<dyn DocumentStore>,
        codec: Arc<dyn CredentialCodec>,
        config: &Config,
    ) -> Self {
        Self {
            store,
            codec,
            email_reservation: config.email_reservation,
        }
    }

    /// Hash on the blocking pool so request workers stay free.
    async fn hash_password(&self, plain_text: String) -> AppResult<Password> {
        let codec = Arc::clone(&self.codec);
        tokio::task::spawn_blocking(move || codec.hash(&plain_text))
            .await
            .map_err(|e| AppError::internal(format!("Password hashing task failed: {}", e)))?
    }

    async fn reserve_email(&self, user: &User) -> AppResult<()> {
        let reservation = json!({
            "id": user.email,
            "userId": user.id,
            "createdAt": user.created_at,
        });
        let Value::Object(item) = reservation else {
            return Err(AppError::internal("Email reservation did not encode to an object"));
        };

        match self.store.put_if_absent(USER_EMAILS_TABLE, item.clone()).await {
            Ok(()) => Ok(()),
            Err(StoreError::KeyExists { .. }) => {
                if !self.reservation_is_stale(&user.email).await? {
                    tracing::info!("Concurrent registration lost the email reservation");
                    return Err(AppError::already_exists(EMAIL_TAKEN));
                }
                tracing::warn!(user_id = %user.id, "Reclaiming orphaned email reservation");
                Ok(self.store.put(USER_EMAILS_TABLE, item).await?)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Orphaned: its owner does not exist and it is past the grace period.
    async fn reservation_is_stale(&self, email: &str) -> AppResult<bool> {
        let Some(reservation) = self.store.get(USER_EMAILS_TABLE, email).await? else {
            return Ok(true);
        };

        let owner = reservation
            .get("userId")
            .and_then(Value::as_str)
            .and_then(|id| Uuid::parse_str(id).ok());
        if let Some(owner) = owner {
            if self.find_by_id(owner).await?.is_some() {
                return Ok(false);
            }
        }

        let reserved_at = reservation
            .get("createdAt")
            .and_then(Value::as_str)
            .and_then(|at| DateTime::parse_from_rfc3339(at).ok())
            .map(|at| at.with_timezone(&Utc));

        Ok(match reserved_at {
            Some(at) => Utc::now() - at > Duration::seconds(EMAIL_RESERVATION_GRACE_SECONDS),
            None => true,
        })
    }

    async fn release_email(&self, email: &str) {
        if let Err(e) = self.store.delete(USER_EMAILS_TABLE, email).await {
            tracing::error!("Failed to release email reservation: {:?}", e);
        }
    }

    fn validate_new_user(new_user: &NewUser, email: &str) -> AppResult<()> {
        let mut messages = Vec::new();
        if email.is_empty() {
            messages.push("property email should not be empty".to_string());
        }
        if (new_user.password.chars().count() as u64) < MIN_PASSWORD_LENGTH {
            messages.push(format!(
                "property password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            ));
        }
        if (new_user.display_name.trim().chars().count() as u64) < MIN_NAME_LENGTH {
            messages.push("property name should not be empty".to_string());
        }

        if messages.is_empty() {
            Ok(())
        } else {
            Err(AppError::validation_messages(messages))
        }
    }
}

#[async_trait]
impl IdentityService for IdentityManager {
    async fn find_by_email(&self, email: &str) -> AppResult<Option<UserRecord>> {
        let query = Query::new("email = :email")
            .bind(":email", normalize_email(email))
            .index(USERS_EMAIL_INDEX)
            .limit(2);

        let items = self.store.query(USERS_TABLE, &query).await?;
        if items.len() > 1 {
            tracing::warn!("Email index returned more than one user; using the first");
        }

        match items.into_iter().next() {
            Some(item) => UserDocument::decode(item).map(Some),
            None => Ok(None),
        }
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        match self.store.get(USERS_TABLE, &id.to_string()).await? {
            Some(item) => UserDocument::decode(item).map(|record| Some(record.user)),
            None => Ok(None),
        }
    }

    async fn create(&self, new_user: NewUser) -> AppResult<User> {
        let email = normalize_email(&new_user.email);
        Self::validate_new_user(&new_user, &email)?;

        if self.find_by_email(&email).await?.is_some() {
            return Err(AppError::already_exists(EMAIL_TAKEN));
        }

        let NewUser {
            password,
            display_name,
            role,
            created_by,
            ..
        } = new_user;

        let password = self.hash_password(password).await?;
        let user = User::new(email, &display_name, role.unwrap_or_default(), created_by);
        let item = UserDocument::encode(&user, &password)?;

        if self.email_reservation {
            self.reserve_email(&user).await?;
        }

        if let Err(e) = self.store.put(USERS_TABLE, item).await {
            if self.email_reservation {
                self.release_email(&user.email).await;
            }
            return Err(e.into());
        }

        tracing::info!(user_id = %user.id, role = %user.role, "User created");
        Ok(user)
    }

    async fn validate_password(&self, plain_text: &str, password: &Password) -> bool {
        let codec = Arc::clone(&self.codec);
        let plain_text = plain_text.to_owned();
        let password = password.clone();

        match tokio::task::spawn_blocking(move || codec.verify(&plain_text, &password)).await {
            Ok(valid) => valid,
            Err(e) => {
                tracing::warn!("Password verification task failed: {}", e);
                false
            }
        }
    }

    async fn ensure_user(&self, new_user: NewUser) -> AppResult<User> {
        if let Some(record) = self.find_by_email(&new_user.email).await? {
            return Ok(record.user);
        }

        let email = new_user.email.clone();
        match self.create(new_user).await {
            Err(AppError::AlreadyExists(_)) => self
                .find_by_email(&email)
                .await?
                .map(User::from)
                .ok_or_else(|| AppError::internal("User vanished after conflicting create")),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::password::tests::test_codec;
    use crate::domain::UserRole;
    use crate::infra::{MemoryStore, MockDocumentStore};

    fn test_config() -> Config {
        Config::with_secret("identity-test-secret-with-32-chars!").unwrap()
    }

    fn service_with(store: Arc<dyn DocumentStore>) -> IdentityManager {
        IdentityManager::new(store, Arc::new(test_codec()), &test_config())
    }

    fn memory_service() -> (Arc<MemoryStore>, IdentityManager) {
        let store = Arc::new(MemoryStore::for_identity());
        let service = service_with(store.clone());
        (store, service)
    }

    #[tokio::test]
    async fn test_create_and_lookup() {
        let (_, service) = memory_service();
        let user = service
            .create(NewUser::new("Chef@Bistro.io", "souschef1", "Remy Ratatouille"))
            .await
            .unwrap();

        assert_eq!(user.email, "chef@bistro.io");
        assert_eq!(user.first_name, "Remy");
        assert_eq!(user.last_name, "Ratatouille");
        assert_eq!(user.role, UserRole::Customer);
        assert!(user.is_active);

        let by_email = service.find_by_email("chef@bistro.io").await.unwrap().unwrap();
        assert_eq!(by_email.user, user);

        let by_id = service.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(by_id, user);

        assert!(service.find_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let (_, service) = memory_service();
        service
            .create(NewUser::new("dup@bistro.io", "password1", "First"))
            .await
            .unwrap();

        let second = service
            .create(NewUser::new("DUP@bistro.io", "password2", "Second"))
            .await;
        assert!(matches!(second, Err(AppError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_registration() {
        let (store, service) = memory_service();
        let service = Arc::new(service);

        let a = tokio::spawn({
            let service = service.clone();
            async move { service.create(NewUser::new("race@bistro.io", "password1", "A")).await }
        });
        let b = tokio::spawn({
            let service = service.clone();
            async move { service.create(NewUser::new("race@bistro.io", "password2", "B")).await }
        });

        let results = [a.await.unwrap(), b.await.unwrap()];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(AppError::AlreadyExists(_)))));
        assert_eq!(store.scan(USERS_TABLE).await.len(), 1);
    }

    #[tokio::test]
    async fn test_stored_document_holds_hash_not_plaintext() {
        let (store, service) = memory_service();
        service
            .create(NewUser::new("hash@bistro.io", "plain-secret", "Hash Check"))
            .await
            .unwrap();

        let items = store.scan(USERS_TABLE).await;
        let stored = serde_json::to_string(&items).unwrap();
        assert!(!stored.contains("plain-secret"));
        assert!(items[0]["passwordHash"]
            .as_str()
            .unwrap()
            .starts_with("$argon2id$"));
    }

    #[tokio::test]
    async fn test_validation_messages() {
        let (_, service) = memory_service();
        let result = service.create(NewUser::new("  ", "123", " ")).await;

        let Err(AppError::Validation(messages)) = result else {
            panic!("expected validation error");
        };
        assert_eq!(messages.len(), 3);
        assert!(messages.iter().all(|m| m.starts_with("property ")));
    }

    #[tokio::test]
    async fn test_validate_password_fails_closed() {
        let (_, service) = memory_service();
        let user = service
            .create(NewUser::new("pw@bistro.io", "correct-horse", "Pw"))
            .await
            .unwrap();
        let record = service.find_by_email(&user.email).await.unwrap().unwrap();

        assert!(service.validate_password("correct-horse", &record.password).await);
        assert!(!service.validate_password("wrong-horse", &record.password).await);
        assert!(
            !service
                .validate_password("correct-horse", &Password::from_hash("garbage".into()))
                .await
        );
    }

    #[tokio::test]
    async fn test_ensure_user_is_idempotent() {
        let (store, service) = memory_service();
        let admin = NewUser::new("admin@test.com", "123456", "System Administrator")
            .with_role(UserRole::Admin)
            .created_by("system");

        let first = service.ensure_user(admin.clone()).await.unwrap();
        let second = service.ensure_user(admin).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.role, UserRole::Admin);
        assert_eq!(first.created_by.as_deref(), Some("system"));
        assert_eq!(store.scan(USERS_TABLE).await.len(), 1);
    }

    fn orphaned_reservation(email: &str, reserved_at: Option<DateTime<Utc>>) -> Document {
        let mut item = json!({"id": email, "userId": Uuid::new_v4()});
        if let Some(at) = reserved_at {
            item["createdAt"] = json!(at);
        }
        match item {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_orphaned_reservation_does_not_block_email() {
        let (store, service) = memory_service();
        store
            .put(USER_EMAILS_TABLE, orphaned_reservation("ghost@bistro.io", None))
            .await
            .unwrap();

        let user = service
            .create(NewUser::new("ghost@bistro.io", "password1", "Ghost"))
            .await
            .unwrap();

        let found = service.find_by_email("ghost@bistro.io").await.unwrap().unwrap();
        assert_eq!(found.user.id, user.id);
        let reservation = store
            .get(USER_EMAILS_TABLE, "ghost@bistro.io")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reservation["userId"], json!(user.id));
    }

    #[tokio::test]
    async fn test_expired_orphaned_reservation_is_reclaimed_by_ensure_user() {
        let (store, service) = memory_service();
        let reserved_at = Utc::now() - Duration::seconds(EMAIL_RESERVATION_GRACE_SECONDS + 5);
        store
            .put(
                USER_EMAILS_TABLE,
                orphaned_reservation("admin@test.com", Some(reserved_at)),
            )
            .await
            .unwrap();

        let admin = service
            .ensure_user(
                NewUser::new("admin@test.com", "123456", "System Administrator")
                    .with_role(UserRole::Admin),
            )
            .await
            .unwrap();

        assert_eq!(admin.role, UserRole::Admin);
        assert_eq!(store.scan(USERS_TABLE).await.len(), 1);
    }

    #[tokio::test]
    async fn test_recent_reservation_still_blocks_email() {
        let (store, service) = memory_service();
        store
            .put(
                USER_EMAILS_TABLE,
                orphaned_reservation("pending@bistro.io", Some(Utc::now())),
            )
            .await
            .unwrap();

        let result = service
            .create(NewUser::new("pending@bistro.io", "password1", "Pending"))
            .await;

        assert!(matches!(result, Err(AppError::AlreadyExists(_))));
        assert!(store.scan(USERS_TABLE).await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_user_write_releases_reservation() {
        let mut store = MockDocumentStore::new();
        store.expect_query().returning(|_, _| Ok(vec![]));
        store.expect_put_if_absent().times(1).returning(|_, _| Ok(()));
        store
            .expect_put()
            .returning(|_, _| Err(StoreError::Unavailable("connection reset".into())));
        store
            .expect_delete()
            .withf(|table, key| table == USER_EMAILS_TABLE && key == "down@bistro.io")
            .times(1)
            .returning(|_, _| Ok(()));

        let service = service_with(Arc::new(store));
        let result = service
            .create(NewUser::new("down@bistro.io", "password1", "Down"))
            .await;

        assert!(matches!(result, Err(AppError::Store(_))));
    }

    #[tokio::test]
    async fn test_reservation_can_be_disabled() {
        let mut store = MockDocumentStore::new();
        store.expect_query().returning(|_, _| Ok(vec![]));
        store.expect_put_if_absent().never();
        store.expect_put().times(1).returning(|_, _| Ok(()));

        let mut config = test_config();
        config.email_reservation = false;
        let service = IdentityManager::new(Arc::new(store), Arc::new(test_codec()), &config);

        service
            .create(NewUser::new("plain@bistro.io", "password1", "Plain"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let mut store = MockDocumentStore::new();
        store
            .expect_query()
            .returning(|_, _| Err(StoreError::Unavailable("timeout".into())));

        let service = service_with(Arc::new(store));
        let result = service.find_by_email("any@bistro.io").await;
        assert!(matches!(result, Err(AppError::Store(_))));
    }
}
