// src/services/mod.rs
//
// Credential, token, session and identity services used by the auth
// orchestrator

pub mod email;
pub mod jwt;
pub mod oauth;
pub mod password;
pub mod providers;
pub mod rate_limit;
pub mod sessions;

// Re-export commonly used types for convenience
pub use email::{DeliveryService, LogDelivery, ResendDelivery};
pub use jwt::{JwtService, TokenPair};
pub use oauth::{ExternalProfile, OAuthService, ProviderTokens};
pub use password::{PasswordRequirements, PasswordService};
pub use providers::{OAuthProvider, ProviderRegistry};
pub use rate_limit::RateLimitService;
pub use sessions::SessionStore;
