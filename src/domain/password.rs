//! Password value object and the credential codec.
//!
//! The codec is the only place that knows the hashing algorithm and its work
//! factor; callers hold a [`Password`] (an opaque PHC hash string) and ask the
//! codec to verify plain text against it.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

use crate::config::Config;
use crate::errors::{AppError, AppResult};

/// Stored password hash.
#[derive(Clone, PartialEq, Eq)]
pub struct Password {
    hash: String,
}

// Don't expose hash in debug output (security)
impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Password")
            .field("hash", &"[REDACTED]")
            .finish()
    }
}

impl Password {
    /// Create a Password from an existing hash (from the store).
    pub fn from_hash(hash: String) -> Self {
        Self { hash }
    }

    /// Get the hash string for storage.
    pub fn as_str(&self) -> &str {
        &self.hash
    }
}

/// One-way password hashing.
pub trait CredentialCodec: Send + Sync + 'static {
    /// Hash plain text with a fresh salt.
    fn hash(&self, plain_text: &str) -> AppResult<Password>;

    /// Check plain text against a stored hash. Malformed hashes verify as `false`.
    fn verify(&self, plain_text: &str, password: &Password) -> bool;
}

/// Argon2id codec with a configurable work factor.
#[derive(Debug, Clone)]
pub struct Argon2Codec {
    params: Params,
}

impl Argon2Codec {
    /// Build a codec with explicit memory (KiB) and time costs.
    ///
    /// # Errors
    /// Returns an internal error if Argon2 rejects the parameters.
    pub fn new(memory_kib: u32, time_cost: u32) -> AppResult<Self> {
        let params = Params::new(memory_kib, time_cost, Params::DEFAULT_P_COST, None)
            .map_err(|e| AppError::internal(format!("Invalid Argon2 parameters: {}", e)))?;
        Ok(Self { params })
    }

    /// Build a codec from the configured work factor.
    pub fn from_config(config: &Config) -> AppResult<Self> {
        Self::new(config.password_hash_memory_kib, config.password_hash_time_cost)
    }

    #[inline]
    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl CredentialCodec for Argon2Codec {
    fn hash(&self, plain_text: &str) -> AppResult<Password> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(plain_text.as_bytes(), &salt)
            .map_err(|e| AppError::internal(format!("Password hash failed: {}", e)))?;
        Ok(Password::from_hash(hash.to_string()))
    }

    fn verify(&self, plain_text: &str, password: &Password) -> bool {
        // Parameters come from the PHC string, so hashes made under an older
        // work factor still verify.
        match PasswordHash::new(password.as_str()) {
            Ok(parsed) => self
                .argon2()
                .verify_password(plain_text.as_bytes(), &parsed)
                .is_ok(),
            Err(e) => {
                tracing::debug!("Stored password hash is malformed: {}", e);
                false
            }
        }
    }
}
