//! Authentication data models

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

use crate::services::jwt::TokenPair;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    #[default]
    User,
    Admin,
    Moderator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
            Role::Moderator => "MODERATOR",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Purpose of a single-use verification token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenType {
    EmailVerification,
    PasswordReset,
    PhoneVerification,
    TwoFactor,
    MagicLink,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::EmailVerification => "EMAIL_VERIFICATION",
            TokenType::PasswordReset => "PASSWORD_RESET",
            TokenType::PhoneVerification => "PHONE_VERIFICATION",
            TokenType::TwoFactor => "TWO_FACTOR",
            TokenType::MagicLink => "MAGIC_LINK",
        }
    }

    /// Lifetime used when no configuration overrides it.
    pub fn default_ttl(&self) -> Duration {
        match self {
            TokenType::EmailVerification => Duration::hours(24),
            TokenType::PasswordReset => Duration::hours(1),
            TokenType::PhoneVerification => Duration::minutes(10),
            TokenType::TwoFactor => Duration::minutes(5),
            TokenType::MagicLink => Duration::minutes(15),
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User database model. The password digest and two-factor secret never
/// leave the server.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub email_verified: bool,
    pub phone: Option<String>,
    pub phone_verified: bool,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub role: Role,
    pub two_factor_enabled: bool,
    #[serde(skip_serializing)]
    pub two_factor_secret: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Linked OAuth account
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Account {
    pub id: String,
    pub user_id: String,
    #[sqlx(rename = "type")]
    pub account_type: String,
    pub provider: String,
    pub provider_account_id: String,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    /// Unix seconds
    pub expires_at: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Server-side record backing a refresh token
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub user_id: String,
    #[serde(skip_serializing)]
    pub refresh_token: String,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct VerificationToken {
    pub id: String,
    pub user_id: String,
    pub token: String,
    #[sqlx(rename = "type")]
    pub token_type: TokenType,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl VerificationToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

// ============================================================================
// Inputs
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterData {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoginData {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OAuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Request metadata recorded on sessions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

// ============================================================================
// Outputs
// ============================================================================

/// Successful login, registration, refresh or OAuth sign-in.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: User,
    pub tokens: TokenPair,
    pub session: Session,
}

/// Wire shape of an auth outcome
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuthResult {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            user: None,
            access_token: None,
            refresh_token: None,
            error: Some(error.into()),
        }
    }
}

impl From<AuthSession> for AuthResult {
    fn from(session: AuthSession) -> Self {
        Self {
            success: true,
            user: Some(session.user),
            access_token: Some(session.tokens.access_token),
            refresh_token: Some(session.tokens.refresh_token),
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        let now = Utc::now();
        User {
            id: "U_TEST".to_string(),
            email: Some("a@x.com".to_string()),
            email_verified: false,
            phone: None,
            phone_verified: false,
            password: Some("$argon2id$digest".to_string()),
            name: Some("A".to_string()),
            avatar: None,
            role: Role::Admin,
            two_factor_enabled: false,
            two_factor_secret: Some("totp-secret".to_string()),
            created_at: now,
            updated_at: now,
            last_login_at: None,
        }
    }

    #[test]
    fn test_user_serialization_hides_secrets() {
        let json = serde_json::to_value(sample_user()).unwrap();

        assert!(json.get("password").is_none());
        assert!(json.get("twoFactorSecret").is_none());
        assert_eq!(json["email"], "a@x.com");
        assert_eq!(json["emailVerified"], false);
        assert_eq!(json["role"], "ADMIN");
    }

    #[test]
    fn test_token_type_wire_names() {
        assert_eq!(
            serde_json::to_value(TokenType::EmailVerification).unwrap(),
            "EMAIL_VERIFICATION"
        );
        assert_eq!(TokenType::MagicLink.as_str(), "MAGIC_LINK");
        assert_eq!(TokenType::PasswordReset.default_ttl(), Duration::hours(1));
    }

    #[test]
    fn test_failure_result_shape() {
        let json = serde_json::to_value(AuthResult::failure("Invalid credentials")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "success": false, "error": "Invalid credentials" })
        );
    }
}
