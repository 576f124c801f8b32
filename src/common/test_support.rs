// Shared fixtures for unit tests

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use super::migrations::run_migrations;
use crate::auth::hooks::AuthHooks;
use crate::auth::models::{Session, TokenType, User};
use crate::config::AuthConfig;
use crate::repository::{AuthRepository, SqliteRepository};
use crate::services::email::DeliveryService;
use crate::services::oauth::{ExternalProfile, ProviderTokens};
use crate::services::providers::{OAuthProvider, ProviderError};

pub const TEST_SECRET: &str = "test-secret-with-enough-entropy-for-hmac";

/// Single-connection in-memory database; every pooled connection to
/// `sqlite::memory:` would otherwise see its own empty schema.
pub async fn memory_pool() -> SqlitePool {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .foreign_keys(true);
    SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .unwrap()
}

pub async fn migrated_pool() -> SqlitePool {
    let pool = memory_pool().await;
    run_migrations(&pool).await.unwrap();
    pool
}

pub async fn test_repository() -> Arc<dyn AuthRepository> {
    Arc::new(SqliteRepository::new(migrated_pool().await))
}

/// Defaults with cheap hashing parameters.
pub fn test_config() -> AuthConfig {
    let mut config = AuthConfig::with_secret(TEST_SECRET);
    config.security.hash_cost = 1;
    config.security.hash_memory_kib = 1024;
    config
}

/// Delivery collaborator that records every send.
#[derive(Default)]
pub struct RecordingDelivery {
    pub sent: Mutex<Vec<(TokenType, String, String)>>,
    pub fail: bool,
}

impl RecordingDelivery {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    /// Token of the most recent send of `kind`.
    pub fn last_token(&self, kind: TokenType) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(k, _, _)| *k == kind)
            .map(|(_, _, token)| token.clone())
    }
}

#[async_trait]
impl DeliveryService for RecordingDelivery {
    async fn send(&self, kind: TokenType, recipient: &str, token: &str, _base_url: &str) -> bool {
        if self.fail {
            return false;
        }
        self.sent
            .lock()
            .unwrap()
            .push((kind, recipient.to_string(), token.to_string()));
        true
    }
}

/// Hooks that record event names; `fail` makes every hook return an error.
#[derive(Default)]
pub struct RecordingHooks {
    pub events: Mutex<Vec<String>>,
    pub fail: bool,
}

impl RecordingHooks {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: String) -> anyhow::Result<()> {
        self.events.lock().unwrap().push(event);
        if self.fail {
            anyhow::bail!("hook failure");
        }
        Ok(())
    }
}

#[async_trait]
impl AuthHooks for RecordingHooks {
    async fn on_user_created(&self, user: &User) -> anyhow::Result<()> {
        self.record(format!("user_created:{}", user.id))
    }

    async fn on_login(&self, user: &User, _session: &Session) -> anyhow::Result<()> {
        self.record(format!("login:{}", user.id))
    }

    async fn on_logout(&self, user_id: &str) -> anyhow::Result<()> {
        self.record(format!("logout:{}", user_id))
    }

    async fn on_email_verified(&self, user: &User) -> anyhow::Result<()> {
        self.record(format!("email_verified:{}", user.id))
    }
}

/// Provider that accepts any code except `"bad"` and returns a fixed profile.
pub struct FakeProvider {
    pub name: String,
    pub profile: ExternalProfile,
}

impl FakeProvider {
    pub fn new(name: &str, profile: ExternalProfile) -> Self {
        Self {
            name: name.to_string(),
            profile,
        }
    }
}

#[async_trait]
impl OAuthProvider for FakeProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn authorization_url(&self, state: &str) -> String {
        format!("https://provider.test/authorize?state={}", state)
    }

    async fn exchange_code(&self, code: &str) -> Result<ProviderTokens, ProviderError> {
        if code == "bad" {
            return Err(ProviderError::OAuthFailed("invalid_grant".to_string()));
        }
        Ok(ProviderTokens {
            access_token: format!("provider-access-{}", code),
            refresh_token: None,
        })
    }

    async fn fetch_profile(&self, _access_token: &str) -> Result<ExternalProfile, ProviderError> {
        Ok(self.profile.clone())
    }
}
