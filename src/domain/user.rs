//! User domain entity and related types.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::password::Password;

/// Staff and customer roles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Manager,
    Waiter,
    Chef,
    Cashier,
    #[default]
    Customer,
}

impl UserRole {
    /// Every role, in privilege order.
    pub const ALL: [UserRole; 6] = [
        UserRole::Admin,
        UserRole::Manager,
        UserRole::Waiter,
        UserRole::Chef,
        UserRole::Cashier,
        UserRole::Customer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Manager => "manager",
            UserRole::Waiter => "waiter",
            UserRole::Chef => "chef",
            UserRole::Cashier => "cashier",
            UserRole::Customer => "customer",
        }
    }

    /// Check if this role belongs to restaurant staff
    pub fn is_staff(&self) -> bool {
        !matches!(self, UserRole::Customer)
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UserRole::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown role: {}", s))
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User domain entity.
///
/// Carries no credential material; the stored hash travels separately in
/// [`UserRecord`] and never leaves the crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
}

impl User {
    /// Create a new active user; `created_by` defaults to the user itself.
    pub fn new(
        email: String,
        display_name: &str,
        role: UserRole,
        created_by: Option<String>,
    ) -> Self {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let (first_name, last_name) = split_display_name(display_name);
        let actor = created_by.unwrap_or_else(|| id.to_string());

        Self {
            id,
            email,
            first_name,
            last_name,
            role,
            is_active: true,
            created_at: now,
            updated_at: now,
            created_by: Some(actor.clone()),
            updated_by: Some(actor),
        }
    }

    /// Display name reassembled from its parts
    pub fn full_name(&self) -> String {
        if self.last_name.is_empty() {
            self.first_name.clone()
        } else {
            format!("{} {}", self.first_name, self.last_name)
        }
    }
}

/// A user paired with its stored password hash.
///
/// Only the identity service and the login flow ever see this type.
#[derive(Clone)]
pub struct UserRecord {
    pub user: User,
    pub password: Password,
}

impl std::fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserRecord")
            .field("user", &self.user)
            .field("password", &self.password)
            .finish()
    }
}

impl From<UserRecord> for User {
    fn from(record: UserRecord) -> Self {
        record.user
    }
}

/// Input for user creation.
#[derive(Clone)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub display_name: String,
    pub role: Option<UserRole>,
    pub created_by: Option<String>,
}

impl NewUser {
    pub fn new(
        email: impl Into<String>,
        password: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            display_name: display_name.into(),
            role: None,
            created_by: None,
        }
    }

    pub fn with_role(mut self, role: UserRole) -> Self {
        self.role = Some(role);
        self
    }

    pub fn created_by(mut self, actor: impl Into<String>) -> Self {
        self.created_by = Some(actor.into());
        self
    }
}

impl std::fmt::Debug for NewUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewUser")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("display_name", &self.display_name)
            .field("role", &self.role)
            .finish()
    }
}

/// Split a display name on its first whitespace run.
pub fn split_display_name(display_name: &str) -> (String, String) {
    let trimmed = display_name.trim();
    match trimmed.split_once(char::is_whitespace) {
        Some((first, rest)) => (first.to_string(), rest.trim_start().to_string()),
        None => (trimmed.to_string(), String::new()),
    }
}

/// Canonical form used for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
