//! Route guards
//!
//! `require_auth` and `optional_auth` are plain `from_fn_with_state`
//! middleware. On success the resolved user is stored in the request
//! extensions as [`CurrentUser`].

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;

use super::cookies::{read_cookie, ACCESS_TOKEN_COOKIE};
use super::extractors::CurrentUser;
use super::models::Role;
use super::service::AuthService;
use crate::common::error::AuthError;

/// Requirements checked after the token resolves to a user.
///
/// `role` and `roles` are independent checks and a user must pass both.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthMiddlewareOptions {
    /// Exact role required, if any.
    pub role: Option<Role>,
    /// Accepted roles; empty accepts any role.
    pub roles: Vec<Role>,
    pub email_verified: bool,
    /// Let unauthenticated requests through without a user.
    pub optional: bool,
}

impl AuthMiddlewareOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    pub fn roles(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.roles.extend(roles);
        self
    }

    pub fn require_email_verified(mut self) -> Self {
        self.email_verified = true;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn permits_role(&self, role: Role) -> bool {
        let exact = self.role.map_or(true, |required| required == role);
        exact && (self.roles.is_empty() || self.roles.contains(&role))
    }
}

/// Middleware state: the orchestrator plus this route's requirements.
#[derive(Clone)]
pub struct AuthGuard {
    pub auth: Arc<AuthService>,
    pub options: Arc<AuthMiddlewareOptions>,
}

impl AuthGuard {
    pub fn new(auth: Arc<AuthService>, options: AuthMiddlewareOptions) -> Self {
        Self {
            auth,
            options: Arc::new(options),
        }
    }
}

/// Bearer header first, then the `accessToken` cookie.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string);

    bearer.or_else(|| read_cookie(headers, ACCESS_TOKEN_COOKIE))
}

pub async fn require_auth(
    State(guard): State<AuthGuard>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = extract_token(request.headers());
    let user = guard.auth.authorize(token.as_deref(), &guard.options).await?;

    if let Some(user) = user {
        debug!(user_id = %user.id, path = %request.uri().path(), "Request authenticated");
        request.extensions_mut().insert(CurrentUser(user));
    }
    Ok(next.run(request).await)
}

/// Attaches the user when a valid token is present. Never rejects.
pub async fn optional_auth(
    State(auth): State<Arc<AuthService>>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = extract_token(request.headers());
    if let Some(user) = auth.authorize_optional(token.as_deref()).await {
        request.extensions_mut().insert(CurrentUser(user));
    }
    next.run(request).await
}
