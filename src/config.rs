//! # Auth configuration
//!
//! [`AuthConfig`] is a fully-defaulted struct (only the signing secret has no
//! default). Partial settings arrive as [`AuthConfigOverrides`], either from
//! serde or from the environment, and are folded in field by field by
//! [`AuthConfig::merge`]. Supplying one field of a section never resets its
//! siblings.

use jsonwebtoken::Algorithm;
use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::services::password::PasswordRequirements;
use crate::services::rate_limit::RateLimitConfig;

pub const DEFAULT_ACCESS_TOKEN_EXPIRY: &str = "15m";
pub const DEFAULT_REFRESH_TOKEN_EXPIRY: &str = "7d";
pub const DEFAULT_MAGIC_LINK_EXPIRY: &str = "15m";
pub const DEFAULT_SESSION_MAX_AGE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("a non-empty signing secret is required (set JWT_SECRET)")]
    MissingSecret,
    #[error("unsupported JWT algorithm '{0}': only HS256, HS384 and HS512 are allowed")]
    UnsupportedAlgorithm(String),
    #[error("invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },
}

// ============================================================================
// Resolved configuration
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct AuthConfig {
    pub secret: String,
    /// Public origin used to build links in delivered messages.
    pub base_url: String,
    pub jwt: JwtConfig,
    pub strategies: StrategiesConfig,
    pub security: SecurityConfig,
    pub email: Option<EmailConfig>,
    pub redirects: RedirectConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JwtConfig {
    pub access_token_expiry: String,
    pub refresh_token_expiry: String,
    pub algorithm: String,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            access_token_expiry: DEFAULT_ACCESS_TOKEN_EXPIRY.to_string(),
            refresh_token_expiry: DEFAULT_REFRESH_TOKEN_EXPIRY.to_string(),
            algorithm: "HS256".to_string(),
        }
    }
}

impl JwtConfig {
    /// Parses the configured algorithm, rejecting anything but HMAC.
    pub fn algorithm(&self) -> Result<Algorithm, ConfigError> {
        match Algorithm::from_str(&self.algorithm) {
            Ok(alg @ (Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)) => Ok(alg),
            _ => Err(ConfigError::UnsupportedAlgorithm(self.algorithm.clone())),
        }
    }
}

/// A strategy is either switched on/off, or switched on with options.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum StrategySetting<T> {
    Enabled(bool),
    Configured(T),
}

impl<T> StrategySetting<T> {
    pub fn is_enabled(&self) -> bool {
        match self {
            StrategySetting::Enabled(enabled) => *enabled,
            StrategySetting::Configured(_) => true,
        }
    }

    pub fn settings(&self) -> Option<&T> {
        match self {
            StrategySetting::Configured(settings) => Some(settings),
            StrategySetting::Enabled(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LocalStrategyConfig {
    pub require_email_verification: bool,
    pub password_requirements: PasswordRequirements,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OAuthStrategyConfig {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub callback_url: Option<String>,
    #[serde(default)]
    pub scope: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PhoneStrategyConfig {
    pub provider: Option<String>,
    pub otp_length: usize,
    pub otp_expiry: String,
}

impl Default for PhoneStrategyConfig {
    fn default() -> Self {
        Self {
            provider: None,
            otp_length: 6,
            otp_expiry: "10m".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MagicLinkConfig {
    pub token_expiry: String,
}

impl Default for MagicLinkConfig {
    fn default() -> Self {
        Self {
            token_expiry: DEFAULT_MAGIC_LINK_EXPIRY.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategiesConfig {
    pub local: StrategySetting<LocalStrategyConfig>,
    pub google: StrategySetting<OAuthStrategyConfig>,
    pub github: StrategySetting<OAuthStrategyConfig>,
    pub phone: StrategySetting<PhoneStrategyConfig>,
    pub magic_link: StrategySetting<MagicLinkConfig>,
}

impl Default for StrategiesConfig {
    fn default() -> Self {
        Self {
            local: StrategySetting::Enabled(true),
            google: StrategySetting::Enabled(false),
            github: StrategySetting::Enabled(false),
            phone: StrategySetting::Enabled(false),
            magic_link: StrategySetting::Enabled(false),
        }
    }
}

impl StrategiesConfig {
    pub fn local_settings(&self) -> LocalStrategyConfig {
        self.local.settings().cloned().unwrap_or_default()
    }

    pub fn magic_link_settings(&self) -> MagicLinkConfig {
        self.magic_link.settings().cloned().unwrap_or_default()
    }

    /// Names of enabled strategies, for startup logging.
    pub fn enabled_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.local.is_enabled() {
            names.push("local");
        }
        if self.google.is_enabled() {
            names.push("google");
        }
        if self.github.is_enabled() {
            names.push("github");
        }
        if self.phone.is_enabled() {
            names.push("phone");
        }
        if self.magic_link.is_enabled() {
            names.push("magic_link");
        }
        names
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

impl FromStr for SameSite {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(SameSite::Strict),
            "lax" => Ok(SameSite::Lax),
            "none" => Ok(SameSite::None),
            _ => Err(ConfigError::InvalidValue {
                key: "COOKIE_SAME_SITE".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookieSettings {
    pub http_only: bool,
    pub secure: bool,
    pub same_site: SameSite,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            http_only: true,
            secure: false,
            same_site: SameSite::Lax,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityConfig {
    /// Argon2 time cost (iterations).
    pub hash_cost: u32,
    /// Argon2 memory cost in KiB.
    pub hash_memory_kib: u32,
    pub rate_limiting: RateLimitConfig,
    pub session_max_age: Duration,
    pub cookie: CookieSettings,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            hash_cost: 3,
            hash_memory_kib: 19_456,
            rate_limiting: RateLimitConfig::default(),
            session_max_age: DEFAULT_SESSION_MAX_AGE,
            cookie: CookieSettings::default(),
        }
    }
}

impl SecurityConfig {
    /// Session lifetime, clamped to ten years.
    pub fn session_ttl(&self) -> chrono::Duration {
        let cap = chrono::Duration::days(3650);
        chrono::Duration::from_std(self.session_max_age)
            .map(|ttl| ttl.min(cap))
            .unwrap_or(cap)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailProvider {
    Resend,
    /// Writes links to the log instead of sending mail.
    Log,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EmailConfig {
    pub provider: EmailProvider,
    #[serde(default)]
    pub api_key: Option<String>,
    pub from: String,
    #[serde(default = "default_app_name")]
    pub app_name: String,
}

fn default_app_name() -> String {
    "AuthKit".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RedirectConfig {
    pub after_login: Option<String>,
    pub after_logout: Option<String>,
    pub after_register: Option<String>,
}

// ============================================================================
// Overrides
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthConfigOverrides {
    pub secret: Option<String>,
    pub base_url: Option<String>,
    pub jwt: JwtOverrides,
    pub strategies: StrategiesOverrides,
    pub security: SecurityOverrides,
    pub email: Option<EmailConfig>,
    pub redirects: Option<RedirectConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JwtOverrides {
    /// Takes precedence over the top-level secret.
    pub secret: Option<String>,
    pub access_token_expiry: Option<String>,
    pub refresh_token_expiry: Option<String>,
    pub algorithm: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StrategiesOverrides {
    pub local: Option<StrategySetting<LocalStrategyConfig>>,
    pub google: Option<StrategySetting<OAuthStrategyConfig>>,
    pub github: Option<StrategySetting<OAuthStrategyConfig>>,
    pub phone: Option<StrategySetting<PhoneStrategyConfig>>,
    pub magic_link: Option<StrategySetting<MagicLinkConfig>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SecurityOverrides {
    pub hash_cost: Option<u32>,
    pub hash_memory_kib: Option<u32>,
    pub rate_limit_enabled: Option<bool>,
    pub rate_limit_max_attempts: Option<u32>,
    pub rate_limit_window_seconds: Option<u64>,
    pub session_max_age_seconds: Option<u64>,
    pub cookie_http_only: Option<bool>,
    pub cookie_secure: Option<bool>,
    pub cookie_same_site: Option<SameSite>,
}

fn apply<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

impl AuthConfig {
    /// Defaults around the given signing secret.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            base_url: String::new(),
            jwt: JwtConfig::default(),
            strategies: StrategiesConfig::default(),
            security: SecurityConfig::default(),
            email: None,
            redirects: RedirectConfig::default(),
        }
    }

    /// Builds a configuration from overrides on top of defaults.
    pub fn from_overrides(overrides: AuthConfigOverrides) -> Result<Self, ConfigError> {
        Self::with_secret(String::new()).merge(overrides)
    }

    /// Folds overrides into `self` one field at a time and validates the
    /// result.
    pub fn merge(mut self, overrides: AuthConfigOverrides) -> Result<Self, ConfigError> {
        apply(&mut self.secret, overrides.secret);
        apply(&mut self.secret, overrides.jwt.secret);
        apply(&mut self.base_url, overrides.base_url);

        apply(&mut self.jwt.access_token_expiry, overrides.jwt.access_token_expiry);
        apply(&mut self.jwt.refresh_token_expiry, overrides.jwt.refresh_token_expiry);
        apply(&mut self.jwt.algorithm, overrides.jwt.algorithm);

        let strategies = overrides.strategies;
        apply(&mut self.strategies.local, strategies.local);
        apply(&mut self.strategies.google, strategies.google);
        apply(&mut self.strategies.github, strategies.github);
        apply(&mut self.strategies.phone, strategies.phone);
        apply(&mut self.strategies.magic_link, strategies.magic_link);

        let security = overrides.security;
        apply(&mut self.security.hash_cost, security.hash_cost);
        apply(&mut self.security.hash_memory_kib, security.hash_memory_kib);
        apply(&mut self.security.rate_limiting.enabled, security.rate_limit_enabled);
        apply(
            &mut self.security.rate_limiting.max_attempts,
            security.rate_limit_max_attempts,
        );
        apply(
            &mut self.security.rate_limiting.window,
            security.rate_limit_window_seconds.map(Duration::from_secs),
        );
        apply(
            &mut self.security.session_max_age,
            security.session_max_age_seconds.map(Duration::from_secs),
        );
        apply(&mut self.security.cookie.http_only, security.cookie_http_only);
        apply(&mut self.security.cookie.secure, security.cookie_secure);
        apply(&mut self.security.cookie.same_site, security.cookie_same_site);

        if overrides.email.is_some() {
            self.email = overrides.email;
        }
        apply(&mut self.redirects, overrides.redirects);

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.secret.trim().is_empty() {
            return Err(ConfigError::MissingSecret);
        }
        self.jwt.algorithm()?;
        Ok(())
    }

    /// Reads overrides from the environment and merges them onto defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_overrides(AuthConfigOverrides::from_env()?)
    }
}

fn env_string(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match env_string(key) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value,
            }),
        None => Ok(None),
    }
}

fn env_oauth(prefix: &str) -> Option<StrategySetting<OAuthStrategyConfig>> {
    let client_id = env_string(&format!("{}_CLIENT_ID", prefix))?;
    let client_secret = env_string(&format!("{}_CLIENT_SECRET", prefix))?;
    Some(StrategySetting::Configured(OAuthStrategyConfig {
        client_id,
        client_secret,
        callback_url: env_string(&format!("{}_CALLBACK_URL", prefix)),
        scope: None,
    }))
}

impl AuthConfigOverrides {
    pub fn from_env() -> Result<Self, ConfigError> {
        let require_email_verification: Option<bool> = env_parse("REQUIRE_EMAIL_VERIFICATION")?;
        let local = require_email_verification.map(|required| {
            StrategySetting::Configured(LocalStrategyConfig {
                require_email_verification: required,
                ..LocalStrategyConfig::default()
            })
        });

        let magic_link = env_parse::<bool>("MAGIC_LINK_ENABLED")?.map(|enabled| {
            match (enabled, env_string("MAGIC_LINK_EXPIRY")) {
                (true, Some(token_expiry)) => {
                    StrategySetting::Configured(MagicLinkConfig { token_expiry })
                }
                _ => StrategySetting::Enabled(enabled),
            }
        });

        let email = match env_string("EMAIL_PROVIDER").as_deref() {
            Some("resend") => Some(EmailConfig {
                provider: EmailProvider::Resend,
                api_key: env_string("EMAIL_API_KEY"),
                from: env_string("EMAIL_FROM").unwrap_or_else(|| "noreply@example.com".to_string()),
                app_name: env_string("APP_NAME").unwrap_or_else(default_app_name),
            }),
            Some("log") => Some(EmailConfig {
                provider: EmailProvider::Log,
                api_key: None,
                from: env_string("EMAIL_FROM").unwrap_or_else(|| "noreply@example.com".to_string()),
                app_name: env_string("APP_NAME").unwrap_or_else(default_app_name),
            }),
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    key: "EMAIL_PROVIDER".to_string(),
                    value: other.to_string(),
                })
            }
            None => None,
        };

        Ok(Self {
            secret: None,
            base_url: env_string("APP_BASE_URL"),
            jwt: JwtOverrides {
                secret: env_string("JWT_SECRET"),
                access_token_expiry: env_string("JWT_ACCESS_EXPIRY"),
                refresh_token_expiry: env_string("JWT_REFRESH_EXPIRY"),
                algorithm: env_string("JWT_ALGORITHM"),
            },
            strategies: StrategiesOverrides {
                local,
                google: env_oauth("GOOGLE"),
                github: env_oauth("GITHUB"),
                phone: None,
                magic_link,
            },
            security: SecurityOverrides {
                hash_cost: env_parse("HASH_COST")?,
                hash_memory_kib: env_parse("HASH_MEMORY_KIB")?,
                rate_limit_enabled: env_parse("RATE_LIMIT_ENABLED")?,
                rate_limit_max_attempts: env_parse("RATE_LIMIT_MAX_ATTEMPTS")?,
                rate_limit_window_seconds: env_parse("RATE_LIMIT_WINDOW_SECONDS")?,
                session_max_age_seconds: env_parse("SESSION_MAX_AGE_SECONDS")?,
                cookie_http_only: None,
                cookie_secure: env_parse("COOKIE_SECURE")?,
                cookie_same_site: env_parse("COOKIE_SAME_SITE")?,
            },
            email,
            redirects: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_secret() -> AuthConfigOverrides {
        AuthConfigOverrides {
            secret: Some("s3cret".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = AuthConfig::from_overrides(with_secret()).unwrap();

        assert_eq!(config.jwt.access_token_expiry, "15m");
        assert_eq!(config.jwt.refresh_token_expiry, "7d");
        assert_eq!(config.jwt.algorithm().unwrap(), Algorithm::HS256);
        assert!(config.security.rate_limiting.enabled);
        assert_eq!(config.security.rate_limiting.max_attempts, 5);
        assert_eq!(
            config.security.rate_limiting.window,
            Duration::from_secs(15 * 60)
        );
        assert_eq!(config.security.session_max_age, DEFAULT_SESSION_MAX_AGE);
        assert!(config.security.cookie.http_only);
        assert!(!config.security.cookie.secure);
        assert_eq!(config.security.cookie.same_site, SameSite::Lax);
        assert!(config.strategies.local.is_enabled());
        assert!(!config.strategies.google.is_enabled());
        assert!(config.email.is_none());
    }

    #[test]
    fn test_missing_secret_rejected() {
        let result = AuthConfig::from_overrides(AuthConfigOverrides::default());
        assert_eq!(result.unwrap_err(), ConfigError::MissingSecret);
    }

    #[test]
    fn test_jwt_secret_takes_precedence() {
        let overrides = AuthConfigOverrides {
            secret: Some("outer".to_string()),
            jwt: JwtOverrides {
                secret: Some("inner".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let config = AuthConfig::from_overrides(overrides).unwrap();
        assert_eq!(config.secret, "inner");
    }

    #[test]
    fn test_non_hmac_algorithm_rejected() {
        let mut overrides = with_secret();
        overrides.jwt.algorithm = Some("RS256".to_string());
        assert_eq!(
            AuthConfig::from_overrides(overrides).unwrap_err(),
            ConfigError::UnsupportedAlgorithm("RS256".to_string())
        );

        let mut overrides = with_secret();
        overrides.jwt.algorithm = Some("HS512".to_string());
        let config = AuthConfig::from_overrides(overrides).unwrap();
        assert_eq!(config.jwt.algorithm().unwrap(), Algorithm::HS512);
    }

    #[test]
    fn test_partial_security_override_keeps_siblings() {
        let mut overrides = with_secret();
        overrides.security.hash_cost = Some(4);
        overrides.security.rate_limit_max_attempts = Some(10);

        let config = AuthConfig::from_overrides(overrides).unwrap();

        assert_eq!(config.security.hash_cost, 4);
        assert_eq!(config.security.hash_memory_kib, 19_456);
        assert_eq!(config.security.rate_limiting.max_attempts, 10);
        assert!(config.security.rate_limiting.enabled);
        assert_eq!(
            config.security.rate_limiting.window,
            Duration::from_secs(15 * 60)
        );
        assert!(config.security.cookie.http_only);
    }

    #[test]
    fn test_overrides_deserialize_from_json() {
        let overrides: AuthConfigOverrides = serde_json::from_value(serde_json::json!({
            "secret": "abc",
            "strategies": {
                "google": { "client_id": "id", "client_secret": "shh" },
                "magic_link": true,
                "local": { "require_email_verification": true }
            },
            "security": { "cookie_same_site": "strict" }
        }))
        .unwrap();

        let config = AuthConfig::from_overrides(overrides).unwrap();

        assert!(config.strategies.google.is_enabled());
        assert_eq!(
            config.strategies.google.settings().map(|g| g.client_id.as_str()),
            Some("id")
        );
        assert!(config.strategies.magic_link.is_enabled());
        assert!(config.strategies.local_settings().require_email_verification);
        assert_eq!(config.security.cookie.same_site, SameSite::Strict);
        assert_eq!(
            config.strategies.enabled_names(),
            vec!["local", "google", "magic_link"]
        );
    }

    #[test]
    fn test_same_site_parse() {
        assert_eq!("LAX".parse::<SameSite>().unwrap(), SameSite::Lax);
        assert!("sideways".parse::<SameSite>().is_err());
    }
}
