//! Authentication extractors for Axum

use async_trait::async_trait;
use axum::{
    extract::{ConnectInfo, Extension, FromRequestParts},
    http::{header::USER_AGENT, request::Parts},
};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, error};

use super::middleware::{extract_token, AuthMiddlewareOptions};
use super::models::{ClientInfo, User};
use crate::common::{AppState, AuthError};
use crate::rate_limit_middleware::extract_ip_address;

/// Authenticated user
///
/// Taken from the request extensions when `require_auth` already ran;
/// otherwise the token is verified here against the shared `AppState`.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<CurrentUser>() {
            return Ok(user.clone());
        }

        let Extension(app_state): Extension<Arc<AppState>> =
            Extension::from_request_parts(parts, state)
                .await
                .map_err(|_| {
                    error!("AppState extension missing; CurrentUser cannot authenticate");
                    AuthError::transient("missing app state")
                })?;

        let token = extract_token(&parts.headers);
        match app_state
            .auth
            .authorize(token.as_deref(), &AuthMiddlewareOptions::default())
            .await?
        {
            Some(user) => {
                debug!(user_id = %user.id, "User authenticated via extractor");
                Ok(CurrentUser(user))
            }
            None => Err(AuthError::unauthenticated("Invalid token")),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ClientInfo
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_agent = parts
            .headers
            .get(USER_AGENT)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string);
        let connect_info = parts.extensions.get::<ConnectInfo<SocketAddr>>();
        let ip_address = extract_ip_address(&parts.headers, connect_info);

        Ok(ClientInfo {
            user_agent,
            ip_address,
        })
    }
}
