// src/services/oauth.rs
//! Identity reconciliation for OAuth sign-ins
//!
//! Resolves an external profile to exactly one local User, in this order:
//!
//! 1. an Account already linked for `(provider, profile.id)`;
//! 2. an existing User with the same (lowercased) email, which gets the
//!    Account linked to it;
//! 3. otherwise a new User created together with its first Account.
//!
//! Merging on email means the provider's email claim is trusted.

use chrono::{Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::auth::models::User;
use crate::common::error::AuthError;
use crate::common::helpers::safe_email_log;
use crate::common::validation::normalize_email;
use crate::repository::{AuthRepository, NewAccount, NewUser, ProfileUpdate, RepoResult, RepositoryError};

/// Lifetime recorded for provider access tokens
pub const PROVIDER_TOKEN_TTL_SECS: i64 = 3600;

/// Profile returned by an identity provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ExternalProfile {
    pub id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

/// Which branch resolved the identity
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciliation {
    ExistingAccount(User),
    LinkedByEmail(User),
    Created(User),
}

impl Reconciliation {
    pub fn user(&self) -> &User {
        match self {
            Reconciliation::ExistingAccount(user)
            | Reconciliation::LinkedByEmail(user)
            | Reconciliation::Created(user) => user,
        }
    }

    pub fn into_user(self) -> User {
        match self {
            Reconciliation::ExistingAccount(user)
            | Reconciliation::LinkedByEmail(user)
            | Reconciliation::Created(user) => user,
        }
    }

    pub fn is_new_user(&self) -> bool {
        matches!(self, Reconciliation::Created(_))
    }
}

#[derive(Clone)]
pub struct OAuthService {
    repo: Arc<dyn AuthRepository>,
}

impl OAuthService {
    pub fn new(repo: Arc<dyn AuthRepository>) -> Self {
        Self { repo }
    }

    pub async fn reconcile(
        &self,
        provider: &str,
        profile: &ExternalProfile,
        tokens: &ProviderTokens,
    ) -> RepoResult<Reconciliation> {
        let expires_at = (Utc::now() + Duration::seconds(PROVIDER_TOKEN_TTL_SECS)).timestamp();
        let email = profile.email.as_deref().map(normalize_email);

        if let Some(account) = self.repo.find_account(provider, &profile.id).await? {
            self.repo
                .update_account_tokens(
                    &account.id,
                    &tokens.access_token,
                    tokens.refresh_token.as_deref(),
                    expires_at,
                )
                .await?;
            let user = self
                .repo
                .find_user_by_id(&account.user_id)
                .await?
                .ok_or(RepositoryError::NotFound)?;
            debug!(provider = %provider, user_id = %user.id, "OAuth sign-in matched linked account");
            let user = self.sync_profile(user, profile).await?;
            return Ok(Reconciliation::ExistingAccount(user));
        }

        let new_account = NewAccount {
            provider: provider.to_string(),
            provider_account_id: profile.id.clone(),
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.clone(),
            expires_at,
        };

        if let Some(email) = email.as_deref() {
            if let Some(user) = self.repo.find_user_by_email(email).await? {
                self.repo.create_account(&user.id, &new_account).await?;
                info!(
                    provider = %provider,
                    user_id = %user.id,
                    email = %safe_email_log(email),
                    "Linked OAuth account to existing user by email"
                );
                let user = self.sync_profile(user, profile).await?;
                return Ok(Reconciliation::LinkedByEmail(user));
            }
        }

        let user = self
            .repo
            .create_user_with_account(
                NewUser {
                    email,
                    password: None,
                    name: profile.name.clone(),
                    avatar: profile.avatar.clone(),
                    phone: None,
                    email_verified: false,
                },
                &new_account,
            )
            .await?;
        info!(provider = %provider, user_id = %user.id, "Created user from OAuth profile");
        Ok(Reconciliation::Created(user))
    }

    /// Copies supplied name/avatar onto the user when they differ.
    async fn sync_profile(&self, user: User, profile: &ExternalProfile) -> RepoResult<User> {
        let update = ProfileUpdate {
            name: profile.name.clone().or_else(|| user.name.clone()),
            avatar: profile.avatar.clone().or_else(|| user.avatar.clone()),
        };
        if update.name == user.name && update.avatar == user.avatar {
            return Ok(user);
        }
        self.repo.update_user_profile(&user.id, &update).await
    }

    /// Removes a linked provider unless it is the user's last credential.
    pub async fn unlink_provider(&self, user: &User, provider: &str) -> Result<(), AuthError> {
        let accounts = self
            .repo
            .find_accounts_for_user(&user.id)
            .await
            .map_err(|_| AuthError::transient("Failed to unlink account"))?;

        let Some(account) = accounts.iter().find(|a| a.provider == provider) else {
            return Err(AuthError::validation("Account not linked"));
        };
        if user.password.is_none() && accounts.len() == 1 {
            return Err(AuthError::validation(
                "Cannot unlink the only sign-in method",
            ));
        }

        self.repo
            .delete_account(&account.id)
            .await
            .map_err(|_| AuthError::transient("Failed to unlink account"))?;
        info!(provider = %provider, user_id = %user.id, "OAuth account unlinked");
        Ok(())
    }
}
