//! Shared types for DRY compliance.

mod response;

pub use response::{
    default_message, ApiResponse, Created, ErrorEnvelope, SuccessEnvelope, SuccessPayload,
};
