// src/services/providers/github.rs
use async_trait::async_trait;
use reqwest::{header, Client};
use serde::Deserialize;
use tracing::{debug, error};

use super::{OAuthProvider, ProviderError};
use crate::config::OAuthStrategyConfig;
use crate::services::oauth::{ExternalProfile, ProviderTokens};

const AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
const TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const USER_URL: &str = "https://api.github.com/user";
const EMAILS_URL: &str = "https://api.github.com/user/emails";
const USER_AGENT: &str = "authkit";

const DEFAULT_SCOPES: [&str; 2] = ["read:user", "user:email"];

/// GitHub answers token errors with 200 and an `error` field.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubUser {
    id: i64,
    login: String,
    name: Option<String>,
    email: Option<String>,
    avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubEmail {
    email: String,
    primary: bool,
    verified: bool,
}

fn primary_verified_email(emails: Vec<GitHubEmail>) -> Option<String> {
    emails
        .into_iter()
        .find(|e| e.primary && e.verified)
        .map(|e| e.email)
}

#[derive(Debug, Clone)]
pub struct GitHubProvider {
    client: Client,
    config: OAuthStrategyConfig,
    redirect_uri: String,
}

impl GitHubProvider {
    pub fn new(client: Client, config: OAuthStrategyConfig, redirect_uri: String) -> Self {
        Self {
            client,
            config,
            redirect_uri,
        }
    }

    fn scope(&self) -> String {
        match &self.config.scope {
            Some(scopes) if !scopes.is_empty() => scopes.join(" "),
            _ => DEFAULT_SCOPES.join(" "),
        }
    }

    async fn fetch_primary_email(&self, access_token: &str) -> Result<Option<String>, ProviderError> {
        let response = self
            .client
            .get(EMAILS_URL)
            .bearer_auth(access_token)
            .header(header::USER_AGENT, USER_AGENT)
            .header(header::ACCEPT, "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            debug!(status = %response.status(), "GitHub email lookup unavailable");
            return Ok(None);
        }

        let emails = response
            .json::<Vec<GitHubEmail>>()
            .await
            .map_err(|e| ProviderError::SerializationError(e.to_string()))?;
        Ok(primary_verified_email(emails))
    }
}

#[async_trait]
impl OAuthProvider for GitHubProvider {
    fn name(&self) -> &str {
        "github"
    }

    fn authorization_url(&self, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&scope={}&state={}",
            AUTHORIZE_URL,
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(&self.scope()),
            urlencoding::encode(state)
        )
    }

    async fn exchange_code(&self, code: &str) -> Result<ProviderTokens, ProviderError> {
        let params = [
            ("code", code),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
        ];

        debug!("Exchanging GitHub authorization code for tokens");

        let response = self
            .client
            .post(TOKEN_URL)
            .header(header::ACCEPT, "application/json")
            .form(&params)
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!(status = %status, error = %error_text, "GitHub token exchange failed");
            return Err(ProviderError::OAuthFailed(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        let tokens = response
            .json::<TokenResponse>()
            .await
            .map_err(|e| ProviderError::SerializationError(e.to_string()))?;

        match (tokens.access_token, tokens.error) {
            (Some(access_token), None) => Ok(ProviderTokens {
                access_token,
                refresh_token: tokens.refresh_token,
            }),
            (_, error) => {
                let reason = tokens
                    .error_description
                    .or(error)
                    .unwrap_or_else(|| "missing access token".to_string());
                error!(error = %reason, "GitHub token exchange rejected");
                Err(ProviderError::OAuthFailed(reason))
            }
        }
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<ExternalProfile, ProviderError> {
        let response = self
            .client
            .get(USER_URL)
            .bearer_auth(access_token)
            .header(header::USER_AGENT, USER_AGENT)
            .header(header::ACCEPT, "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ProviderError::RequestFailed(
                "Failed to get user info".to_string(),
            ));
        }

        let user = response
            .json::<GitHubUser>()
            .await
            .map_err(|e| ProviderError::SerializationError(e.to_string()))?;

        // Private emails are omitted from /user
        let email = match user.email {
            Some(email) => Some(email),
            None => self.fetch_primary_email(access_token).await?,
        };

        Ok(ExternalProfile {
            id: user.id.to_string(),
            email,
            name: user.name.or(Some(user.login)),
            avatar: user.avatar_url,
        })
    }
}
