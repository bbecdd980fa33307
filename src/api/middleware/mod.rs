//! API middleware.

mod auth;
mod boundary;

pub use auth::{access_gate, CurrentUser};
pub use boundary::{boundary, panic_response};
