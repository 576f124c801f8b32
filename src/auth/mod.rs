//! # Auth Module
//!
//! This module handles all authentication-related functionality including:
//! - Email and password registration and login
//! - JWT access/refresh pairs with server-side session rotation
//! - Email verification, password reset and magic-link tokens
//! - OAuth sign-in with account linking
//! - Route guards and the `CurrentUser` extractor

pub mod cookies;
pub mod extractors;
pub mod handlers;
pub mod hooks;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod service;


pub use extractors::CurrentUser;
pub use hooks::{AuthHooks, NoopHooks};
pub use middleware::{optional_auth, require_auth, AuthGuard, AuthMiddlewareOptions};
pub use models::{AuthResult, AuthSession, ClientInfo, Role, User};
pub use routes::auth_routes;
pub use service::AuthService;
