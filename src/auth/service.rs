//! Auth orchestrator
//!
//! [`AuthService`] composes the password, token, session and OAuth services
//! with the repository, delivery and hook collaborators. Every public
//! operation returns [`AuthError`]; store and provider failures are logged here
//! and surfaced as generic messages.

use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::hooks::{AuthHooks, NoopHooks};
use super::middleware::AuthMiddlewareOptions;
use super::models::{
    AuthSession, ClientInfo, LoginData, RegisterData, Session, TokenType, User,
    VerificationToken,
};
use crate::common::error::AuthError;
use crate::common::helpers::{safe_email_log, safe_token_log};
use crate::common::id_generator::generate_secure_token;
use crate::common::validation::{is_valid_email, normalize_email, ValidationResult, Validator};
use crate::config::{AuthConfig, ConfigError};
use crate::repository::{AuthRepository, NewUser, NewVerificationToken, RepositoryError};
use crate::services::email::DeliveryService;
use crate::services::jwt::{parse_expiry, JwtService, TokenPair};
use crate::services::oauth::{ExternalProfile, OAuthService, ProviderTokens};
use crate::services::password::{PasswordRequirements, PasswordService};
use crate::services::providers::ProviderRegistry;
use crate::services::sessions::SessionStore;

/// Checks registration input before anything is written.
struct RegistrationValidator<'a> {
    passwords: &'a PasswordService,
    requirements: &'a PasswordRequirements,
}

impl Validator<RegisterData> for RegistrationValidator<'_> {
    fn validate(&self, data: &RegisterData) -> ValidationResult {
        let mut result = ValidationResult::new();
        if !is_valid_email(&normalize_email(&data.email)) {
            result.add_error("email", "Invalid email format");
        }
        result.merge(self.passwords.validate(&data.password, self.requirements).into());
        result
    }
}

/// Conflict message naming the field whose uniqueness was violated.
fn registration_conflict(detail: &str) -> AuthError {
    let message = if detail.contains("users.phone") {
        "User with this phone number already exists"
    } else {
        "User with this email already exists"
    };
    AuthError::Conflict(message.to_string())
}

fn report_hook(hook: &'static str, outcome: anyhow::Result<()>) {
    if let Err(e) = outcome {
        warn!(hook = hook, error = %e, "Auth hook failed");
    }
}

pub struct AuthService {
    config: Arc<AuthConfig>,
    repo: Arc<dyn AuthRepository>,
    jwt: JwtService,
    passwords: PasswordService,
    sessions: SessionStore,
    oauth: OAuthService,
    providers: ProviderRegistry,
    delivery: Option<Arc<dyn DeliveryService>>,
    hooks: Arc<dyn AuthHooks>,
}

impl AuthService {
    pub fn new(config: AuthConfig, repo: Arc<dyn AuthRepository>) -> Result<Self, ConfigError> {
        config.validate()?;
        let jwt = JwtService::new(&config.secret, &config.jwt)?;
        let passwords = PasswordService::new(config.security.hash_cost, config.security.hash_memory_kib);
        let sessions = SessionStore::new(repo.clone(), config.security.session_ttl());
        let oauth = OAuthService::new(repo.clone());

        info!(
            strategies = ?config.strategies.enabled_names(),
            algorithm = %config.jwt.algorithm,
            "AuthService initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            repo,
            jwt,
            passwords,
            sessions,
            oauth,
            providers: ProviderRegistry::new(),
            delivery: None,
            hooks: Arc::new(NoopHooks),
        })
    }

    pub fn with_delivery(mut self, delivery: Arc<dyn DeliveryService>) -> Self {
        self.delivery = Some(delivery);
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn AuthHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_providers(mut self, providers: ProviderRegistry) -> Self {
        self.providers = providers;
        self
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn jwt(&self) -> &JwtService {
        &self.jwt
    }

    pub fn passwords(&self) -> &PasswordService {
        &self.passwords
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    // ---- Credential flows ----

    pub async fn register(
        &self,
        data: RegisterData,
        client: &ClientInfo,
    ) -> Result<AuthSession, AuthError> {
        self.ensure_local_enabled()?;
        let local = self.config.strategies.local_settings();

        let validation = RegistrationValidator {
            passwords: &self.passwords,
            requirements: &local.password_requirements,
        }
        .validate(&data);
        if !validation.is_valid {
            debug!(errors = ?validation.messages(), "Registration rejected by validation");
            return Err(validation.into());
        }

        let email = normalize_email(&data.email);
        let digest = self.passwords.hash(&data.password).map_err(|e| {
            error!(error = %e, "Password hashing failed during registration");
            AuthError::transient("Registration failed")
        })?;

        let user = self
            .repo
            .create_user(NewUser {
                email: Some(email.clone()),
                password: Some(digest),
                name: data.name,
                phone: data.phone,
                ..Default::default()
            })
            .await
            .map_err(|e| match e {
                RepositoryError::UniqueViolation(detail) => {
                    info!(email = %safe_email_log(&email), detail = %detail, "Registration for existing user");
                    registration_conflict(&detail)
                }
                other => {
                    error!(error = %other, email = %safe_email_log(&email), "Failed to create user");
                    AuthError::transient("Registration failed")
                }
            })?;

        let (tokens, session) = self.issue_session(&user, client, "Registration failed").await?;
        info!(user_id = %user.id, email = %safe_email_log(&email), "User registered");

        report_hook("on_user_created", self.hooks.on_user_created(&user).await);
        Ok(AuthSession { user, tokens, session })
    }

    pub async fn login(&self, data: LoginData, client: &ClientInfo) -> Result<AuthSession, AuthError> {
        self.ensure_local_enabled()?;
        let email = normalize_email(&data.email);

        let user = self
            .repo
            .find_user_by_email(&email)
            .await
            .map_err(|e| {
                error!(error = %e, "User lookup failed during login");
                AuthError::transient("Login failed")
            })?
            .ok_or_else(|| {
                debug!(email = %safe_email_log(&email), "Login for unknown email");
                AuthError::InvalidCredentials
            })?;

        let Some(digest) = user.password.as_deref() else {
            debug!(user_id = %user.id, "Login attempted on account without password");
            return Err(AuthError::InvalidCredentials);
        };
        if !self.passwords.verify(&data.password, digest) {
            warn!(user_id = %user.id, "Login failed: wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        if self.config.strategies.local_settings().require_email_verification && !user.email_verified {
            return Err(AuthError::forbidden("Email not verified"));
        }

        match self.passwords.rehash_if_needed(&data.password, digest) {
            Ok(Some(fresh)) => {
                if let Err(e) = self.repo.update_user_password(&user.id, &fresh).await {
                    warn!(error = %e, user_id = %user.id, "Failed to store rehashed password");
                } else {
                    debug!(user_id = %user.id, "Password rehashed with current parameters");
                }
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, user_id = %user.id, "Password rehash failed"),
        }

        let user = self.record_login(user, "Login failed").await?;
        let (tokens, session) = self.issue_session(&user, client, "Login failed").await?;
        info!(user_id = %user.id, session_id = %session.id, "User logged in");

        report_hook("on_login", self.hooks.on_login(&user, &session).await);
        Ok(AuthSession { user, tokens, session })
    }

    /// User behind a valid access token. Lookup failures count as invalid.
    pub async fn verify_token(&self, access_token: &str) -> Option<User> {
        let claims = self.jwt.verify_access_token(access_token)?;
        match self.repo.find_user_by_id(&claims.user_id).await {
            Ok(user) => user,
            Err(e) => {
                error!(error = %e, user_id = %claims.user_id, "User lookup failed during token verification");
                None
            }
        }
    }

    /// Exchanges a refresh token for a new pair. The session row keeps its id
    /// and receives the new refresh token, so the old value stops working.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<AuthSession, AuthError> {
        let invalid = || AuthError::unauthenticated("Invalid or expired refresh token");

        let session = self
            .sessions
            .find_active(refresh_token)
            .await
            .map_err(|e| {
                error!(error = %e, "Session lookup failed during refresh");
                AuthError::transient("Token refresh failed")
            })?
            .ok_or_else(|| {
                debug!(token = %safe_token_log(refresh_token), "Refresh with unknown or expired session");
                invalid()
            })?;

        match self.jwt.verify_refresh_token(refresh_token) {
            Some(claims) if claims.user_id == session.user_id => {}
            _ => {
                debug!(session_id = %session.id, "Refresh token failed verification");
                return Err(invalid());
            }
        }

        let user = self
            .repo
            .find_user_by_id(&session.user_id)
            .await
            .map_err(|e| {
                error!(error = %e, "User lookup failed during refresh");
                AuthError::transient("Token refresh failed")
            })?
            .ok_or_else(|| AuthError::NotFound("User not found".to_string()))?;

        let tokens = self.jwt.generate_token_pair(&user).map_err(|e| {
            error!(error = %e, user_id = %user.id, "Token signing failed during refresh");
            AuthError::transient("Token refresh failed")
        })?;
        let session = self
            .sessions
            .rotate(&session, &tokens.refresh_token)
            .await
            .map_err(|e| {
                error!(error = %e, session_id = %session.id, "Session rotation failed");
                AuthError::transient("Token refresh failed")
            })?
            .ok_or_else(|| {
                warn!(session_id = %session.id, "Refresh token already rotated by a concurrent request");
                invalid()
            })?;

        debug!(user_id = %user.id, session_id = %session.id, "Tokens refreshed");
        Ok(AuthSession { user, tokens, session })
    }

    /// Ends the session holding `refresh_token`. Unknown tokens still succeed;
    /// only a store failure returns `false`.
    pub async fn logout(&self, refresh_token: &str) -> bool {
        match self.sessions.revoke(refresh_token).await {
            Ok(Some(session)) => {
                info!(user_id = %session.user_id, session_id = %session.id, "User logged out");
                report_hook("on_logout", self.hooks.on_logout(&session.user_id).await);
                true
            }
            Ok(None) => true,
            Err(e) => {
                error!(error = %e, "Failed to delete session during logout");
                false
            }
        }
    }

    /// Access decision for a request. `Ok(None)` is only returned for
    /// optional authentication.
    pub async fn authorize(
        &self,
        token: Option<&str>,
        options: &AuthMiddlewareOptions,
    ) -> Result<Option<User>, AuthError> {
        let Some(token) = token else {
            if options.optional {
                return Ok(None);
            }
            return Err(AuthError::unauthenticated("No token provided"));
        };

        let Some(user) = self.verify_token(token).await else {
            if options.optional {
                return Ok(None);
            }
            return Err(AuthError::unauthenticated("Invalid token"));
        };

        if !options.permits_role(user.role) {
            warn!(user_id = %user.id, role = %user.role, "Insufficient permissions");
            return Err(AuthError::forbidden("Insufficient permissions"));
        }
        if options.email_verified && !user.email_verified {
            return Err(AuthError::forbidden("Email not verified"));
        }

        Ok(Some(user))
    }

    pub async fn authorize_optional(&self, token: Option<&str>) -> Option<User> {
        match token {
            Some(token) => self.verify_token(token).await,
            None => None,
        }
    }

    // ---- Single-use token flows ----

    pub async fn send_email_verification(&self, user: &User, base_url: &str) -> Result<(), AuthError> {
        if user.email_verified {
            return Err(AuthError::validation("Email already verified"));
        }
        let Some(email) = user.email.as_deref() else {
            return Err(AuthError::validation("User has no email address"));
        };
        let delivery = self.delivery()?;

        let token = self
            .issue_verification_token(&user.id, TokenType::EmailVerification, TokenType::EmailVerification.default_ttl())
            .await
            .map_err(|_| AuthError::transient("Failed to send verification email"))?;

        if !delivery.send(TokenType::EmailVerification, email, &token, base_url).await {
            return Err(AuthError::transient("Failed to send verification email"));
        }
        info!(user_id = %user.id, "Verification email sent");
        Ok(())
    }

    pub async fn verify_email(&self, token: &str) -> Result<User, AuthError> {
        let record = self
            .redeem_token(token, TokenType::EmailVerification, "Email verification failed")
            .await?;

        self.consume_token(&record, "Email verification failed").await?;

        let failed = |e: RepositoryError| {
            error!(error = %e, user_id = %record.user_id, "Failed to apply email verification");
            AuthError::transient("Email verification failed")
        };
        self.repo.mark_email_verified(&record.user_id).await.map_err(failed)?;
        let user = self
            .repo
            .find_user_by_id(&record.user_id)
            .await
            .map_err(failed)?
            .ok_or_else(|| AuthError::NotFound("User not found".to_string()))?;

        info!(user_id = %user.id, "Email verified");
        report_hook("on_email_verified", self.hooks.on_email_verified(&user).await);
        Ok(user)
    }

    /// Succeeds identically whether or not the email belongs to a user.
    pub async fn forgot_password(&self, email: &str, base_url: &str) -> Result<(), AuthError> {
        let email = normalize_email(email);
        if !is_valid_email(&email) {
            return Err(AuthError::validation("Invalid email format"));
        }
        let delivery = self.delivery()?;

        let user = self.repo.find_user_by_email(&email).await.map_err(|e| {
            error!(error = %e, "User lookup failed during password reset request");
            AuthError::transient("Failed to process request")
        })?;
        let Some(user) = user else {
            debug!(email = %safe_email_log(&email), "Password reset requested for unknown email");
            return Ok(());
        };

        let token = self
            .issue_verification_token(&user.id, TokenType::PasswordReset, TokenType::PasswordReset.default_ttl())
            .await
            .map_err(|_| AuthError::transient("Failed to process request"))?;

        if !delivery.send(TokenType::PasswordReset, &email, &token, base_url).await {
            return Err(AuthError::transient("Failed to send reset email"));
        }
        info!(user_id = %user.id, "Password reset email sent");
        Ok(())
    }

    /// Checks a reset link before the user picks a new password.
    pub async fn check_password_reset_token(&self, token: &str) -> Result<(), AuthError> {
        self.redeem_token(token, TokenType::PasswordReset, "Password reset failed")
            .await
            .map(|_| ())
    }

    /// Sets a new password from a reset token and signs the user out everywhere.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), AuthError> {
        let record = self
            .redeem_token(token, TokenType::PasswordReset, "Password reset failed")
            .await?;

        let requirements = self.config.strategies.local_settings().password_requirements;
        let validation = self.passwords.validate(new_password, &requirements);
        if !validation.valid {
            return Err(ValidationResult::from(validation).into());
        }

        let digest = self.passwords.hash(new_password).map_err(|e| {
            error!(error = %e, "Password hashing failed during reset");
            AuthError::transient("Password reset failed")
        })?;
        self.consume_token(&record, "Password reset failed").await?;

        self.repo
            .update_user_password(&record.user_id, &digest)
            .await
            .map_err(|e| {
                error!(error = %e, user_id = %record.user_id, "Failed to apply password reset");
                AuthError::transient("Password reset failed")
            })?;

        if let Err(e) = self.sessions.revoke_all(&record.user_id).await {
            warn!(error = %e, user_id = %record.user_id, "Failed to revoke sessions after password reset");
        }
        info!(user_id = %record.user_id, "Password reset");
        Ok(())
    }

    /// Mails a single-use sign-in link. Unknown emails succeed silently.
    pub async fn request_magic_link(&self, email: &str, base_url: &str) -> Result<(), AuthError> {
        self.ensure_magic_link_enabled()?;
        let email = normalize_email(email);
        if !is_valid_email(&email) {
            return Err(AuthError::validation("Invalid email format"));
        }
        let delivery = self.delivery()?;

        let user = self.repo.find_user_by_email(&email).await.map_err(|e| {
            error!(error = %e, "User lookup failed during magic link request");
            AuthError::transient("Failed to process request")
        })?;
        let Some(user) = user else {
            debug!(email = %safe_email_log(&email), "Magic link requested for unknown email");
            return Ok(());
        };

        let ttl = parse_expiry(&self.config.strategies.magic_link_settings().token_expiry);
        let token = self
            .issue_verification_token(&user.id, TokenType::MagicLink, ttl)
            .await
            .map_err(|_| AuthError::transient("Failed to process request"))?;

        if !delivery.send(TokenType::MagicLink, &email, &token, base_url).await {
            return Err(AuthError::transient("Failed to send magic link"));
        }
        info!(user_id = %user.id, "Magic link sent");
        Ok(())
    }

    /// Redeems a magic link and signs the user in. Proves control of the
    /// address, so the email is marked verified.
    pub async fn verify_magic_link(
        &self,
        token: &str,
        client: &ClientInfo,
    ) -> Result<AuthSession, AuthError> {
        self.ensure_magic_link_enabled()?;
        let record = self
            .redeem_token(token, TokenType::MagicLink, "Magic link sign-in failed")
            .await?;
        self.consume_token(&record, "Magic link sign-in failed").await?;

        let failed = |e: RepositoryError| {
            error!(error = %e, user_id = %record.user_id, "Failed to redeem magic link");
            AuthError::transient("Magic link sign-in failed")
        };
        let mut user = self
            .repo
            .find_user_by_id(&record.user_id)
            .await
            .map_err(failed)?
            .ok_or_else(|| AuthError::NotFound("User not found".to_string()))?;

        if !user.email_verified {
            self.repo.mark_email_verified(&user.id).await.map_err(failed)?;
            user.email_verified = true;
        }

        let user = self.record_login(user, "Magic link sign-in failed").await?;
        let (tokens, session) = self
            .issue_session(&user, client, "Magic link sign-in failed")
            .await?;
        info!(user_id = %user.id, session_id = %session.id, "User logged in via magic link");

        report_hook("on_login", self.hooks.on_login(&user, &session).await);
        Ok(AuthSession { user, tokens, session })
    }

    // ---- OAuth ----

    pub fn oauth_authorization_url(&self, provider: &str, state: &str) -> Result<String, AuthError> {
        let provider = self
            .providers
            .get(provider)
            .ok_or_else(|| AuthError::validation("Unsupported OAuth provider"))?;
        Ok(provider.authorization_url(state))
    }

    /// Finishes an authorization-code flow: exchanges `code`, fetches the
    /// profile, then signs the resolved user in.
    pub async fn complete_oauth(
        &self,
        provider: &str,
        code: &str,
        client: &ClientInfo,
    ) -> Result<AuthSession, AuthError> {
        let handler = self
            .providers
            .get(provider)
            .ok_or_else(|| AuthError::validation("Unsupported OAuth provider"))?;

        let tokens = handler.exchange_code(code).await.map_err(|e| {
            warn!(provider = %provider, error = %e, "OAuth code exchange failed");
            AuthError::unauthenticated("Authentication failed")
        })?;
        let profile = handler.fetch_profile(&tokens.access_token).await.map_err(|e| {
            warn!(provider = %provider, error = %e, "OAuth profile fetch failed");
            AuthError::unauthenticated("Authentication failed")
        })?;

        self.oauth_login(provider, &profile, &tokens, client).await
    }

    pub async fn oauth_login(
        &self,
        provider: &str,
        profile: &ExternalProfile,
        tokens: &ProviderTokens,
        client: &ClientInfo,
    ) -> Result<AuthSession, AuthError> {
        let reconciliation = self
            .oauth
            .reconcile(provider, profile, tokens)
            .await
            .map_err(|e| match e {
                RepositoryError::UniqueViolation(_) => {
                    warn!(provider = %provider, "OAuth sign-in raced with another registration");
                    AuthError::Conflict("User with this email already exists".to_string())
                }
                other => {
                    error!(provider = %provider, error = %other, "OAuth reconciliation failed");
                    AuthError::transient("Authentication failed")
                }
            })?;

        let created = reconciliation.is_new_user();
        let user = self
            .record_login(reconciliation.into_user(), "Authentication failed")
            .await?;
        let (tokens, session) = self
            .issue_session(&user, client, "Authentication failed")
            .await?;
        info!(
            provider = %provider,
            user_id = %user.id,
            new_user = created,
            "User logged in via OAuth"
        );

        if created {
            report_hook("on_user_created", self.hooks.on_user_created(&user).await);
        }
        report_hook("on_login", self.hooks.on_login(&user, &session).await);
        Ok(AuthSession { user, tokens, session })
    }

    pub async fn unlink_provider(&self, user: &User, provider: &str) -> Result<(), AuthError> {
        self.oauth.unlink_provider(user, provider).await
    }

    pub async fn revoke_all_sessions(&self, user_id: &str) -> Result<u64, AuthError> {
        self.sessions.revoke_all(user_id).await.map_err(|e| {
            error!(error = %e, user_id = %user_id, "Failed to revoke sessions");
            AuthError::transient("Failed to revoke sessions")
        })
    }

    // ---- Helpers ----

    fn ensure_local_enabled(&self) -> Result<(), AuthError> {
        if self.config.strategies.local.is_enabled() {
            Ok(())
        } else {
            Err(AuthError::forbidden("Email and password sign-in is disabled"))
        }
    }

    fn ensure_magic_link_enabled(&self) -> Result<(), AuthError> {
        if self.config.strategies.magic_link.is_enabled() {
            Ok(())
        } else {
            Err(AuthError::forbidden("Magic link sign-in is disabled"))
        }
    }

    fn delivery(&self) -> Result<&Arc<dyn DeliveryService>, AuthError> {
        self.delivery.as_ref().ok_or_else(|| {
            error!("No delivery service configured");
            AuthError::transient("Email delivery is not configured")
        })
    }

    /// Stamps `last_login_at` and returns the user with it applied.
    async fn record_login(&self, mut user: User, failure: &str) -> Result<User, AuthError> {
        let now = Utc::now();
        self.repo.touch_last_login(&user.id, now).await.map_err(|e| {
            error!(error = %e, user_id = %user.id, "Failed to record login time");
            AuthError::transient(failure)
        })?;
        user.last_login_at = Some(now);
        Ok(user)
    }

    /// Mints a token pair and persists its refresh token as a new session.
    async fn issue_session(
        &self,
        user: &User,
        client: &ClientInfo,
        failure: &str,
    ) -> Result<(TokenPair, Session), AuthError> {
        let tokens = self.jwt.generate_token_pair(user).map_err(|e| {
            error!(error = %e, user_id = %user.id, "Token signing failed");
            AuthError::transient(failure)
        })?;
        let session = self
            .sessions
            .create(&user.id, &tokens.refresh_token, client)
            .await
            .map_err(|e| {
                error!(error = %e, user_id = %user.id, "Failed to persist session");
                AuthError::transient(failure)
            })?;
        Ok((tokens, session))
    }

    async fn issue_verification_token(
        &self,
        user_id: &str,
        kind: TokenType,
        ttl: Duration,
    ) -> Result<String, RepositoryError> {
        let token = generate_secure_token();
        self.repo
            .create_verification_token(NewVerificationToken {
                user_id: user_id.to_string(),
                token: token.clone(),
                token_type: kind,
                expires_at: Utc::now() + ttl,
            })
            .await
            .map_err(|e| {
                error!(error = %e, user_id = %user_id, kind = %kind, "Failed to store verification token");
                e
            })?;
        Ok(token)
    }

    /// Deletes a redeemed token before its side effects run. Only the caller
    /// whose delete removed the row may proceed.
    async fn consume_token(&self, record: &VerificationToken, failure: &str) -> Result<(), AuthError> {
        let consumed = self
            .repo
            .delete_verification_token(&record.id)
            .await
            .map_err(|e| {
                error!(error = %e, kind = %record.token_type, "Failed to consume verification token");
                AuthError::transient(failure)
            })?;
        if !consumed {
            debug!(kind = %record.token_type, "Verification token already consumed");
            return Err(AuthError::validation("Invalid token"));
        }
        Ok(())
    }

    /// Looks up a single-use token of the expected kind. Does not consume it.
    async fn redeem_token(
        &self,
        token: &str,
        expected: TokenType,
        failure: &str,
    ) -> Result<VerificationToken, AuthError> {
        let record = self.repo.find_verification_token(token).await.map_err(|e| {
            error!(error = %e, kind = %expected, "Verification token lookup failed");
            AuthError::transient(failure)
        })?;

        let record = match record {
            Some(record) if record.token_type == expected => record,
            _ => {
                debug!(kind = %expected, token = %safe_token_log(token), "Unknown verification token");
                return Err(AuthError::validation("Invalid token"));
            }
        };
        if record.is_expired(Utc::now()) {
            return Err(AuthError::validation("Token expired"));
        }
        Ok(record)
    }
}
