// Common module - shared types and utilities

pub mod error;
pub mod helpers;
pub mod id_generator;
pub mod migrations;
pub mod state;
pub mod validation;

#[cfg(test)]
pub mod test_support;

pub use error::{AuthError, ErrorResponse};
pub use helpers::{safe_email_log, safe_token_log};
pub use id_generator::*;
pub use state::AppState;
pub use validation::{ValidationError, ValidationResult, Validator};
