//! # Persistence seam
//!
//! [`AuthRepository`] is the only way the auth core touches storage. Each call
//! commits on its own except [`AuthRepository::create_user_with_account`],
//! which creates a User and its first Account atomically.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::auth::models::{Account, Session, TokenType, User, VerificationToken};

pub mod sqlite;

pub use sqlite::SqliteRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),
    #[error("record not found")]
    NotFound,
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                RepositoryError::UniqueViolation(db_err.message().to_string())
            }
            sqlx::Error::RowNotFound => RepositoryError::NotFound,
            _ => RepositoryError::Database(err),
        }
    }
}

impl RepositoryError {
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, RepositoryError::UniqueViolation(_))
    }
}

pub type RepoResult<T> = Result<T, RepositoryError>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewUser {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub phone: Option<String>,
    pub email_verified: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub provider: String,
    pub provider_account_id: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Unix seconds
    pub expires_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSession {
    pub user_id: String,
    pub refresh_token: String,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVerificationToken {
    pub user_id: String,
    pub token: String,
    pub token_type: TokenType,
    pub expires_at: DateTime<Utc>,
}

/// Values written to the profile columns; `None` clears a column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub avatar: Option<String>,
}

#[async_trait]
pub trait AuthRepository: Send + Sync {
    // Users
    async fn create_user(&self, user: NewUser) -> RepoResult<User>;
    async fn find_user_by_id(&self, id: &str) -> RepoResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    async fn update_user_profile(&self, id: &str, update: &ProfileUpdate) -> RepoResult<User>;
    async fn update_user_password(&self, id: &str, digest: &str) -> RepoResult<()>;
    async fn mark_email_verified(&self, id: &str) -> RepoResult<()>;
    async fn touch_last_login(&self, id: &str, at: DateTime<Utc>) -> RepoResult<()>;
    async fn delete_user(&self, id: &str) -> RepoResult<()>;

    // Accounts
    async fn find_account(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> RepoResult<Option<Account>>;
    async fn find_accounts_for_user(&self, user_id: &str) -> RepoResult<Vec<Account>>;
    async fn create_account(&self, user_id: &str, account: &NewAccount) -> RepoResult<Account>;
    async fn update_account_tokens(
        &self,
        account_id: &str,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: i64,
    ) -> RepoResult<()>;
    async fn delete_account(&self, account_id: &str) -> RepoResult<()>;
    /// User plus first Account in a single transaction.
    async fn create_user_with_account(
        &self,
        user: NewUser,
        account: &NewAccount,
    ) -> RepoResult<User>;

    // Sessions
    async fn create_session(&self, session: NewSession) -> RepoResult<Session>;
    async fn find_session_by_refresh_token(&self, refresh_token: &str)
        -> RepoResult<Option<Session>>;
    /// Swaps the refresh token only while the row still holds
    /// `current_refresh_token`. `None` means another caller rotated first.
    async fn rotate_session(
        &self,
        session_id: &str,
        current_refresh_token: &str,
        new_refresh_token: &str,
        expires_at: DateTime<Utc>,
    ) -> RepoResult<Option<Session>>;
    async fn delete_session(&self, session_id: &str) -> RepoResult<()>;
    async fn delete_sessions_for_user(&self, user_id: &str) -> RepoResult<u64>;

    // Verification tokens
    async fn create_verification_token(
        &self,
        token: NewVerificationToken,
    ) -> RepoResult<VerificationToken>;
    async fn find_verification_token(&self, token: &str) -> RepoResult<Option<VerificationToken>>;
    /// `true` if this call removed the row.
    async fn delete_verification_token(&self, id: &str) -> RepoResult<bool>;
}
