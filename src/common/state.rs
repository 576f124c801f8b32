// Application state shared across handlers

use std::sync::Arc;

use crate::auth::service::AuthService;
use crate::services::RateLimitService;

/// Application state holding the auth orchestrator and the login limiter
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub rate_limit_service: Arc<RateLimitService>,
}

impl AppState {
    pub fn new(auth: Arc<AuthService>, rate_limit_service: Arc<RateLimitService>) -> Self {
        Self {
            auth,
            rate_limit_service,
        }
    }
}
