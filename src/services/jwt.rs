//! Access/refresh token minting and verification
//!
//! Both tokens are HMAC-signed JWTs. Access tokens are verified statelessly;
//! refresh tokens are only honoured while a Session row holds their exact
//! value, which is the orchestrator's concern, not this module's.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::auth::models::{Role, User};
use crate::common::id_generator::generate_jwt_id;
use crate::config::{ConfigError, JwtConfig};

pub type JwtResult<T> = Result<T, jsonwebtoken::errors::Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessClaims {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub role: Role,
    pub kind: TokenKind,
    pub jti: String,
    pub iat: usize,
    pub exp: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshClaims {
    pub user_id: String,
    pub token_id: String,
    pub kind: TokenKind,
    pub iat: usize,
    pub exp: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix milliseconds
    pub access_token_expiry: i64,
    /// Unix milliseconds
    pub refresh_token_expiry: i64,
}

/// Parses `<integer><unit>` with unit one of s, m, h, d. Anything else
/// falls back to 15 minutes.
pub fn parse_expiry(expiry: &str) -> Duration {
    let fallback = Duration::minutes(15);
    let expiry = expiry.trim();
    let Some(unit) = expiry.chars().last() else {
        return fallback;
    };
    let Ok(value) = expiry[..expiry.len() - unit.len_utf8()].parse::<i64>() else {
        return fallback;
    };
    if value < 0 {
        return fallback;
    }
    match unit {
        's' => Duration::try_seconds(value),
        'm' => Duration::try_minutes(value),
        'h' => Duration::try_hours(value),
        'd' => Duration::try_days(value),
        _ => None,
    }
    .unwrap_or(fallback)
}

#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl JwtService {
    pub fn new(secret: &str, config: &JwtConfig) -> Result<Self, ConfigError> {
        if secret.trim().is_empty() {
            return Err(ConfigError::MissingSecret);
        }
        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            algorithm: config.algorithm()?,
            access_ttl: parse_expiry(&config.access_token_expiry),
            refresh_ttl: parse_expiry(&config.refresh_token_expiry),
        })
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);
        validation
    }

    fn unverified_validation(&self) -> Validation {
        let mut validation = Validation::new(self.algorithm);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.required_spec_claims.clear();
        validation
    }

    pub fn generate_token_pair(&self, user: &User) -> JwtResult<TokenPair> {
        let now = Utc::now();
        let access_exp = now + self.access_ttl;
        let refresh_exp = now + self.refresh_ttl;

        let access = AccessClaims {
            user_id: user.id.clone(),
            email: user.email.clone(),
            role: user.role,
            kind: TokenKind::Access,
            jti: generate_jwt_id(),
            iat: now.timestamp() as usize,
            exp: access_exp.timestamp() as usize,
        };
        let refresh = RefreshClaims {
            user_id: user.id.clone(),
            token_id: generate_jwt_id(),
            kind: TokenKind::Refresh,
            iat: now.timestamp() as usize,
            exp: refresh_exp.timestamp() as usize,
        };

        let header = Header::new(self.algorithm);
        Ok(TokenPair {
            access_token: encode(&header, &access, &self.encoding_key)?,
            refresh_token: encode(&header, &refresh, &self.encoding_key)?,
            access_token_expiry: access_exp.timestamp_millis(),
            refresh_token_expiry: refresh_exp.timestamp_millis(),
        })
    }

    pub fn generate_access_token(&self, user: &User) -> JwtResult<String> {
        let now = Utc::now();
        let claims = AccessClaims {
            user_id: user.id.clone(),
            email: user.email.clone(),
            role: user.role,
            kind: TokenKind::Access,
            jti: generate_jwt_id(),
            iat: now.timestamp() as usize,
            exp: (now + self.access_ttl).timestamp() as usize,
        };
        encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
    }

    /// Claims of a valid, unexpired access token; `None` on any failure.
    pub fn verify_access_token(&self, token: &str) -> Option<AccessClaims> {
        match decode::<AccessClaims>(token, &self.decoding_key, &self.validation()) {
            Ok(data) if data.claims.kind == TokenKind::Access => Some(data.claims),
            Ok(_) => {
                debug!("Rejected token: not an access token");
                None
            }
            Err(e) => {
                debug!(error = %e, "Access token verification failed");
                None
            }
        }
    }

    pub fn verify_refresh_token(&self, token: &str) -> Option<RefreshClaims> {
        match decode::<RefreshClaims>(token, &self.decoding_key, &self.validation()) {
            Ok(data) if data.claims.kind == TokenKind::Refresh => Some(data.claims),
            Ok(_) => None,
            Err(e) => {
                debug!(error = %e, "Refresh token verification failed");
                None
            }
        }
    }

    /// Decodes without checking the signature. Diagnostics only.
    pub fn decode_unverified(&self, token: &str) -> Option<serde_json::Value> {
        decode::<serde_json::Value>(token, &self.decoding_key, &self.unverified_validation())
            .ok()
            .map(|data| data.claims)
    }

    /// Malformed tokens and tokens without `exp` count as expired.
    pub fn is_token_expired(&self, token: &str) -> bool {
        let Some(exp) = self
            .decode_unverified(token)
            .and_then(|claims| claims.get("exp").and_then(|exp| exp.as_i64()))
        else {
            return true;
        };
        exp < Utc::now().timestamp()
    }

    /// New access token for `user`, provided `refresh_token` verifies and
    /// belongs to them.
    pub fn refresh_access_token(&self, refresh_token: &str, user: &User) -> Option<String> {
        let claims = self.verify_refresh_token(refresh_token)?;
        if claims.user_id != user.id {
            return None;
        }
        self.generate_access_token(user).ok()
    }
}
