//! Domain layer - Core business entities and logic
//!
//! This module contains the core domain models that represent
//! business concepts independent of infrastructure concerns.

pub mod password;
pub mod user;

pub use password::{Argon2Codec, CredentialCodec, Password};
pub use user::{normalize_email, split_display_name, NewUser, User, UserRecord, UserRole};
