//! Application services layer - Use cases and business logic.
//!
//! Services orchestrate domain logic and the identity store to fulfill
//! application use cases. They depend on abstractions (traits) for
//! dependency inversion.

mod auth_service;
pub mod container;
mod identity_service;
mod session;

// Service Container
pub use container::{ServiceContainer, Services};

// Service traits and implementations
pub use auth_service::{AuthResponse, AuthService, Authenticator};
pub use identity_service::{IdentityManager, IdentityService};
pub use session::{IssuedToken, SessionClaims, SessionIssuer};
