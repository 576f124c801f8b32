// src/services/providers/mod.rs
//! OAuth provider clients
//!
//! Each provider turns an authorization code into provider tokens and a
//! normalized [`ExternalProfile`]. The [`ProviderRegistry`] is a plain map
//! built once at startup and handed to the orchestrator.

use async_trait::async_trait;
use reqwest::Client;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::{OAuthStrategyConfig, StrategiesConfig, StrategySetting};
use crate::services::oauth::{ExternalProfile, ProviderTokens};

pub mod github;
pub mod google;

pub use github::GitHubProvider;
pub use google::GoogleProvider;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("OAuth provider not configured: {0}")]
    NotConfigured(String),

    #[error("OAuth flow failed: {0}")]
    OAuthFailed(String),

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

#[async_trait]
pub trait OAuthProvider: Send + Sync {
    fn name(&self) -> &str;

    /// URL the browser is sent to, carrying the anti-forgery `state`.
    fn authorization_url(&self, state: &str) -> String;

    async fn exchange_code(&self, code: &str) -> Result<ProviderTokens, ProviderError>;

    async fn fetch_profile(&self, access_token: &str) -> Result<ExternalProfile, ProviderError>;
}

/// Shared client for provider calls
pub fn http_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .unwrap_or_else(|_| Client::new())
}

fn callback_url(config: &OAuthStrategyConfig, base_url: &str, provider: &str) -> String {
    config
        .callback_url
        .clone()
        .unwrap_or_else(|| format!("{}/api/auth/{}/callback", base_url.trim_end_matches('/'), provider))
}

#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Arc<dyn OAuthProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers enabled providers that carry client credentials.
    pub fn from_config(strategies: &StrategiesConfig, base_url: &str, client: Client) -> Self {
        let mut registry = Self::new();
        if let StrategySetting::Configured(config) = &strategies.google {
            registry.register(Arc::new(GoogleProvider::new(
                client.clone(),
                config.clone(),
                callback_url(config, base_url, "google"),
            )));
        }
        if let StrategySetting::Configured(config) = &strategies.github {
            registry.register(Arc::new(GitHubProvider::new(
                client,
                config.clone(),
                callback_url(config, base_url, "github"),
            )));
        }
        registry
    }

    pub fn register(&mut self, provider: Arc<dyn OAuthProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn with(mut self, provider: Arc<dyn OAuthProvider>) -> Self {
        self.register(provider);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn OAuthProvider>> {
        self.providers.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.providers.keys().map(String::as_str).collect()
    }
}
