//! Session issuer - Mints and verifies signed access tokens.
//!
//! Tokens are HS256 JWTs carrying `{sub, email, role, iat, exp}`. Expiry is
//! checked with zero leeway.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Config;
use crate::domain::{User, UserRole};
use crate::errors::{AppError, AppResult};

/// JWT claims payload
#[derive(Debug, Serialize, Deserialize)]
struct TokenClaims {
    sub: Uuid,
    email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    iat: i64,
    exp: i64,
}

/// Identity attached to an authenticated request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionClaims {
    pub user_id: Uuid,
    pub email: String,
    pub role: UserRole,
}

impl From<&User> for SessionClaims {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            email: user.email.clone(),
            role: user.role,
        }
    }
}

/// A freshly minted token
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub access_token: String,
    pub claims: SessionClaims,
    pub expires_at: DateTime<Utc>,
}

pub struct SessionIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl SessionIssuer {
    /// Fails when the configured lifetime is not a positive, representable number of hours.
    pub fn new(config: &Config) -> AppResult<Self> {
        let hours = config.jwt_expiration_hours;
        let ttl = Duration::try_hours(hours)
            .filter(|ttl| *ttl > Duration::zero())
            .ok_or_else(|| AppError::internal(format!("Invalid token lifetime: {} hours", hours)))?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret_bytes()),
            validation,
            ttl,
        })
    }

    /// Sign a token for the given session, valid from now.
    pub fn issue(&self, claims: SessionClaims) -> AppResult<IssuedToken> {
        self.issue_at(claims, Utc::now())
    }

    pub(crate) fn issue_at(
        &self,
        claims: SessionClaims,
        issued_at: DateTime<Utc>,
    ) -> AppResult<IssuedToken> {
        let expires_at = issued_at
            .checked_add_signed(self.ttl)
            .ok_or_else(|| AppError::internal("Token expiry is out of range"))?;
        let payload = TokenClaims {
            sub: claims.user_id,
            email: claims.email.clone(),
            role: Some(claims.role.to_string()),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };

        let access_token = encode(&Header::new(Algorithm::HS256), &payload, &self.encoding_key)
            .map_err(|e| AppError::internal(format!("Failed to sign token: {}", e)))?;

        Ok(IssuedToken {
            access_token,
            claims,
            expires_at,
        })
    }

    /// Verify signature and expiry. Any failure is `Unauthorized`.
    pub fn verify(&self, token: &str) -> AppResult<SessionClaims> {
        let data = decode::<TokenClaims>(token, &self.decoding_key, &self.validation).map_err(
            |e| {
                tracing::debug!("Token rejected: {}", e);
                AppError::Unauthorized
            },
        )?;

        let claims = data.claims;
        let role = claims
            .role
            .as_deref()
            .and_then(|role| role.parse().ok())
            .unwrap_or_default();

        Ok(SessionClaims {
            user_id: claims.sub,
            email: claims.email,
            role,
        })
    }
}
