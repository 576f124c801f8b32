//! # authkit
//!
//! Authentication for axum services: password and OAuth sign-in, a JWT
//! access/refresh pair backed by server-side sessions, single-use email
//! tokens, and route guards.
//!
//! ```no_run
//! use std::sync::Arc;
//! use authkit::{auth::{auth_routes, AuthService}, common::AppState, config::AuthConfig};
//! use authkit::repository::SqliteRepository;
//! use authkit::services::RateLimitService;
//!
//! # async fn build(pool: sqlx::SqlitePool) -> anyhow::Result<axum::Router> {
//! let config = AuthConfig::from_env()?;
//! let limiter = RateLimitService::new(config.security.rate_limiting.clone());
//! let auth = AuthService::new(config, Arc::new(SqliteRepository::new(pool)))?;
//! let state = Arc::new(AppState::new(Arc::new(auth), Arc::new(limiter)));
//! Ok(auth_routes(state))
//! # }
//! ```

pub mod auth;
pub mod common;
pub mod config;
pub mod rate_limit_middleware;
pub mod repository;
pub mod services;
