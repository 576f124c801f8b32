// src/services/providers/google.rs
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error};

use super::{OAuthProvider, ProviderError};
use crate::config::OAuthStrategyConfig;
use crate::services::oauth::{ExternalProfile, ProviderTokens};

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

const DEFAULT_SCOPES: [&str; 3] = ["openid", "email", "profile"];

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub token_type: Option<String>,
    pub scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    id: String,
    email: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

impl From<UserInfo> for ExternalProfile {
    fn from(info: UserInfo) -> Self {
        ExternalProfile {
            id: info.id,
            email: info.email,
            name: info.name,
            avatar: info.picture,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GoogleProvider {
    client: Client,
    config: OAuthStrategyConfig,
    redirect_uri: String,
}

impl GoogleProvider {
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
}

#[async_trait]
impl OAuthProvider for GoogleProvider {
    fn name(&self) -> &str {
        "google"
    }

    fn authorization_url(&self, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}&access_type=offline&prompt=consent",
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
            ("grant_type", "authorization_code"),
        ];

        debug!("Exchanging Google authorization code for tokens");

        let response = self
            .client
            .post(TOKEN_URL)
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
            error!(status = %status, error = %error_text, "Google token exchange failed");
            return Err(ProviderError::OAuthFailed(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        let tokens = response
            .json::<TokenResponse>()
            .await
            .map_err(|e| ProviderError::SerializationError(e.to_string()))?;

        Ok(ProviderTokens {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        })
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<ExternalProfile, ProviderError> {
        let response = self
            .client
            .get(USERINFO_URL)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ProviderError::RequestFailed(
                "Failed to get user info".to_string(),
            ));
        }

        let info = response
            .json::<UserInfo>()
            .await
            .map_err(|e| ProviderError::SerializationError(e.to_string()))?;

        Ok(info.into())
    }
}
