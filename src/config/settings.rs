//! Application settings loaded from environment variables.

use std::env;
use std::str::FromStr;

use super::constants::{
    DEFAULT_ADMIN_EMAIL, DEFAULT_ADMIN_NAME, DEFAULT_ADMIN_PASSWORD, DEFAULT_DATABASE_URL,
    DEFAULT_HASH_MEMORY_KIB, DEFAULT_HASH_TIME_COST, DEFAULT_JWT_EXPIRATION_HOURS,
    DEFAULT_SERVER_HOST, DEFAULT_SERVER_PORT, MAX_JWT_EXPIRATION_HOURS, MIN_JWT_SECRET_LENGTH,
};
use crate::errors::{AppError, AppResult};

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl FromStr for Environment {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "test" => Ok(Environment::Test),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(AppError::internal(format!("Unknown APP_ENV value: {}", other))),
        }
    }
}

/// Identity store backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Postgres,
}

impl FromStr for StoreBackend {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            other => Err(AppError::internal(format!(
                "Unknown STORE_BACKEND value: {}",
                other
            ))),
        }
    }
}

/// Administrator account created at startup when absent
#[derive(Clone)]
pub struct BootstrapAdmin {
    pub email: String,
    password: String,
    pub name: String,
}

impl BootstrapAdmin {
    pub fn new(
        email: impl Into<String>,
        password: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            name: name.into(),
        }
    }

    /// Plain-text bootstrap password, only ever handed to the credential codec.
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl std::fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapAdmin")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("name", &self.name)
            .finish()
    }
}

/// Application configuration
#[derive(Clone)]
pub struct Config {
    pub environment: Environment,
    pub store_backend: StoreBackend,
    pub database_url: String,
    jwt_secret: String,
    pub jwt_expiration_hours: i64,
    pub password_hash_time_cost: u32,
    pub password_hash_memory_kib: u32,
    pub email_reservation: bool,
    pub bootstrap_admin: Option<BootstrapAdmin>,
    pub server_host: String,
    pub server_port: u16,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("environment", &self.environment)
            .field("store_backend", &self.store_backend)
            .field("database_url", &"[REDACTED]")
            .field("jwt_secret", &"[REDACTED]")
            .field("jwt_expiration_hours", &self.jwt_expiration_hours)
            .field("password_hash_time_cost", &self.password_hash_time_cost)
            .field("password_hash_memory_kib", &self.password_hash_memory_kib)
            .field("email_reservation", &self.email_reservation)
            .field("bootstrap_admin", &self.bootstrap_admin)
            .field("server_host", &self.server_host)
            .field("server_port", &self.server_port)
            .finish()
    }
}

impl Config {
    /// Build a configuration with defaults around the given signing secret.
    ///
    /// # Errors
    /// Returns an error if the secret is shorter than `MIN_JWT_SECRET_LENGTH`.
    pub fn with_secret(jwt_secret: impl Into<String>) -> AppResult<Self> {
        let jwt_secret = jwt_secret.into();
        if jwt_secret.len() < MIN_JWT_SECRET_LENGTH {
            return Err(AppError::internal(format!(
                "JWT_SECRET must be at least {} characters long",
                MIN_JWT_SECRET_LENGTH
            )));
        }

        Ok(Self {
            environment: Environment::Development,
            store_backend: StoreBackend::Memory,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            jwt_secret,
            jwt_expiration_hours: DEFAULT_JWT_EXPIRATION_HOURS,
            password_hash_time_cost: DEFAULT_HASH_TIME_COST,
            password_hash_memory_kib: DEFAULT_HASH_MEMORY_KIB,
            email_reservation: true,
            bootstrap_admin: None,
            server_host: DEFAULT_SERVER_HOST.to_string(),
            server_port: DEFAULT_SERVER_PORT,
        })
    }

    /// Load configuration from environment variables.
    ///
    /// # Errors
    /// Returns an error if JWT_SECRET is missing in production or too short,
    /// if JWT_EXPIRATION_HOURS is outside `1..=MAX_JWT_EXPIRATION_HOURS`,
    /// or if an enumerated variable holds an unknown value.
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();

        let environment = match env::var("APP_ENV") {
            Ok(value) => value.parse()?,
            Err(_) => Environment::Development,
        };

        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) => secret,
            Err(_) if environment != Environment::Production => {
                tracing::warn!("JWT_SECRET not set, using insecure default for development");
                "dev-secret-key-minimum-32-chars!!".to_string()
            }
            Err(_) => {
                return Err(AppError::internal(
                    "JWT_SECRET environment variable must be set in production",
                ))
            }
        };

        let mut config = Self::with_secret(jwt_secret)?;
        config.environment = environment;

        if let Ok(value) = env::var("STORE_BACKEND") {
            config.store_backend = value.parse()?;
        }
        if let Ok(url) = env::var("DATABASE_URL") {
            config.database_url = url;
        }
        config.jwt_expiration_hours = check_jwt_expiration_hours(
            parse_var("JWT_EXPIRATION_HOURS").unwrap_or(DEFAULT_JWT_EXPIRATION_HOURS),
        )?;
        config.password_hash_time_cost =
            parse_var("PASSWORD_HASH_TIME_COST").unwrap_or(DEFAULT_HASH_TIME_COST);
        config.password_hash_memory_kib =
            parse_var("PASSWORD_HASH_MEMORY_KIB").unwrap_or(DEFAULT_HASH_MEMORY_KIB);
        config.email_reservation = parse_var("EMAIL_RESERVATION").unwrap_or(true);
        config.bootstrap_admin = bootstrap_admin_from_env(environment);
        if let Ok(host) = env::var("SERVER_HOST") {
            config.server_host = host;
        }
        config.server_port = parse_var("SERVER_PORT").unwrap_or(DEFAULT_SERVER_PORT);

        Ok(config)
    }

    /// Get JWT secret bytes for token signing/verification.
    pub fn jwt_secret_bytes(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }

    /// Whether diagnostics such as `executionTime` must be withheld.
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Get the full server address.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

/// Token lifetime must be positive and at most `MAX_JWT_EXPIRATION_HOURS`.
pub(crate) fn check_jwt_expiration_hours(hours: i64) -> AppResult<i64> {
    if (1..=MAX_JWT_EXPIRATION_HOURS).contains(&hours) {
        Ok(hours)
    } else {
        Err(AppError::internal(format!(
            "JWT_EXPIRATION_HOURS must be between 1 and {}, got {}",
            MAX_JWT_EXPIRATION_HOURS, hours
        )))
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

/// Explicit variables win; development falls back to the well-known seed account.
fn bootstrap_admin_from_env(environment: Environment) -> Option<BootstrapAdmin> {
    let name = env::var("BOOTSTRAP_ADMIN_NAME").unwrap_or_else(|_| DEFAULT_ADMIN_NAME.to_string());

    match (
        env::var("BOOTSTRAP_ADMIN_EMAIL"),
        env::var("BOOTSTRAP_ADMIN_PASSWORD"),
    ) {
        (Ok(email), Ok(password)) => Some(BootstrapAdmin::new(email, password, name)),
        _ if environment == Environment::Development => Some(BootstrapAdmin::new(
            DEFAULT_ADMIN_EMAIL,
            DEFAULT_ADMIN_PASSWORD,
            name,
        )),
        _ => None,
    }
}
