//! Authentication handlers

use axum::{
    extract::{rejection::JsonRejection, Extension, Json, Path, Query},
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::cookies::{
    auth_cookies, build_cookie, clear_cookie, cleared_auth_cookies, read_cookie,
    OAUTH_STATE_COOKIE, REFRESH_TOKEN_COOKIE,
};
use super::extractors::CurrentUser;
use super::models::{
    AuthResult, AuthSession, ClientInfo, EmailRequest, LoginData, OAuthCallbackQuery,
    RefreshRequest, RegisterData, ResetPasswordRequest,
};
use crate::common::{generate_secure_token, AppState, AuthError};

/// Lifetime of the OAuth `state` cookie
const OAUTH_STATE_MAX_AGE_SECS: i64 = 600;

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AuthError> {
    payload.map(|Json(value)| value).map_err(|rejection| {
        debug!(error = %rejection.body_text(), "Rejected request body");
        AuthError::validation("Invalid request body")
    })
}

/// JSON auth result plus the token cookies.
fn session_response(state: &AppState, status: StatusCode, session: AuthSession) -> Response {
    let cookies = auth_cookies(&state.auth, &session.tokens);
    (status, AppendHeaders(cookies), Json(AuthResult::from(session))).into_response()
}

/// Browser flows land on the configured page when there is one.
fn browser_session_response(state: &AppState, session: AuthSession) -> Response {
    match state.auth.config().redirects.after_login.as_deref() {
        Some(target) => {
            let cookies = auth_cookies(&state.auth, &session.tokens);
            (AppendHeaders(cookies), Redirect::to(target)).into_response()
        }
        None => session_response(state, StatusCode::OK, session),
    }
}

/// Refresh token from the JSON body, falling back to the `refreshToken` cookie.
fn refresh_token_from(
    headers: &HeaderMap,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Option<String> {
    payload
        .ok()
        .and_then(|Json(body)| body.refresh_token)
        .filter(|token| !token.is_empty())
        .or_else(|| read_cookie(headers, REFRESH_TOKEN_COOKIE))
}

/// POST /api/auth/register
///
/// # Request Body
/// ```json
/// { "email": "a@example.com", "password": "Password1", "name": "Ada" }
/// ```
///
/// # Response (201)
/// ```json
/// { "success": true, "user": { ... }, "accessToken": "...", "refreshToken": "..." }
/// ```
pub async fn register_handler(
    Extension(state): Extension<Arc<AppState>>,
    client: ClientInfo,
    payload: Result<Json<RegisterData>, JsonRejection>,
) -> Result<Response, AuthError> {
    let data = json_body(payload)?;
    let session = state.auth.register(data, &client).await?;
    Ok(session_response(&state, StatusCode::CREATED, session))
}

/// POST /api/auth/login
pub async fn login_handler(
    Extension(state): Extension<Arc<AppState>>,
    client: ClientInfo,
    payload: Result<Json<LoginData>, JsonRejection>,
) -> Result<Response, AuthError> {
    let data = json_body(payload)?;
    let session = state.auth.login(data, &client).await?;
    Ok(session_response(&state, StatusCode::OK, session))
}

/// POST /api/auth/refresh
/// Accepts `{ "refreshToken": "..." }` or the `refreshToken` cookie.
pub async fn refresh_handler(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Response, AuthError> {
    let Some(token) = refresh_token_from(&headers, payload) else {
        return Err(AuthError::unauthenticated("Refresh token required"));
    };
    let session = state.auth.refresh_token(&token).await?;
    Ok(session_response(&state, StatusCode::OK, session))
}

/// POST /api/auth/logout
///
/// # Response
/// ```json
/// { "success": true, "message": "Logged out successfully" }
/// ```
pub async fn logout_handler(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Response, AuthError> {
    let Some(token) = refresh_token_from(&headers, payload) else {
        return Err(AuthError::validation("Refresh token required"));
    };
    if !state.auth.logout(&token).await {
        return Err(AuthError::transient("Logout failed"));
    }

    let cookies = cleared_auth_cookies(&state.auth.config().security.cookie);
    let body = json!({ "success": true, "message": "Logged out successfully" });
    Ok((AppendHeaders(cookies), Json(body)).into_response())
}

/// GET /api/auth/me
pub async fn me_handler(CurrentUser(user): CurrentUser) -> Json<serde_json::Value> {
    Json(json!({ "success": true, "user": user }))
}

/// POST /api/auth/verify-email/send
pub async fn send_verification_handler(
    Extension(state): Extension<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<serde_json::Value>, AuthError> {
    state
        .auth
        .send_email_verification(&user, &state.auth.config().base_url)
        .await?;
    Ok(Json(json!({ "success": true, "message": "Verification email sent" })))
}

/// GET /api/auth/verify-email/:token
pub async fn verify_email_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<Json<serde_json::Value>, AuthError> {
    let user = state.auth.verify_email(&token).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Email verified successfully",
        "user": user,
    })))
}

/// POST /api/auth/forgot-password
/// Responds identically whether or not the account exists.
pub async fn forgot_password_handler(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<EmailRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, AuthError> {
    let request = json_body(payload)?;
    state
        .auth
        .forgot_password(&request.email, &state.auth.config().base_url)
        .await?;
    Ok(Json(json!({
        "success": true,
        "message": "If an account exists with this email, a password reset link has been sent",
    })))
}

/// GET /api/auth/reset-password/:token
/// Lets a client check a reset link before asking for the new password.
pub async fn check_reset_token_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<Json<serde_json::Value>, AuthError> {
    state.auth.check_password_reset_token(&token).await?;
    Ok(Json(json!({ "success": true, "token": token })))
}

/// POST /api/auth/reset-password
pub async fn reset_password_handler(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, AuthError> {
    let request = json_body(payload)?;
    state
        .auth
        .reset_password(&request.token, &request.password)
        .await?;
    Ok(Json(json!({ "success": true, "message": "Password reset successfully" })))
}

/// POST /api/auth/magic-link
pub async fn magic_link_handler(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<EmailRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, AuthError> {
    let request = json_body(payload)?;
    state
        .auth
        .request_magic_link(&request.email, &state.auth.config().base_url)
        .await?;
    Ok(Json(json!({
        "success": true,
        "message": "If an account exists with this email, a sign-in link has been sent",
    })))
}

/// GET /api/auth/magic-link/verify/:token
pub async fn verify_magic_link_handler(
    Extension(state): Extension<Arc<AppState>>,
    client: ClientInfo,
    Path(token): Path<String>,
) -> Result<Response, AuthError> {
    let session = state.auth.verify_magic_link(&token, &client).await?;
    Ok(browser_session_response(&state, session))
}

/// GET /api/auth/:provider
/// Redirects to the provider's consent page and pins `state` in a cookie.
pub async fn oauth_start_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(provider): Path<String>,
) -> Result<Response, AuthError> {
    let oauth_state = generate_secure_token();
    let url = state.auth.oauth_authorization_url(&provider, &oauth_state)?;
    info!(provider = %provider, "Starting OAuth flow");

    let cookie = build_cookie(
        OAUTH_STATE_COOKIE,
        &oauth_state,
        OAUTH_STATE_MAX_AGE_SECS,
        &state.auth.config().security.cookie,
    );
    Ok((AppendHeaders([(SET_COOKIE, cookie)]), Redirect::to(&url)).into_response())
}

/// GET /api/auth/:provider/callback
pub async fn oauth_callback_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(provider): Path<String>,
    Query(params): Query<OAuthCallbackQuery>,
    headers: HeaderMap,
    client: ClientInfo,
) -> Result<Response, AuthError> {
    if let Some(error) = params.error.as_deref() {
        warn!(provider = %provider, oauth_error = %error, "Provider returned OAuth error");
        return Ok((
            StatusCode::UNAUTHORIZED,
            Json(AuthResult::failure("Authentication failed")),
        )
            .into_response());
    }

    let expected_state = read_cookie(&headers, OAUTH_STATE_COOKIE);
    if expected_state.is_none() || expected_state != params.state {
        warn!(provider = %provider, "OAuth state mismatch");
        return Err(AuthError::validation("Invalid OAuth state"));
    }
    let Some(code) = params.code.as_deref().filter(|code| !code.is_empty()) else {
        return Err(AuthError::validation("Missing authorization code"));
    };

    let session = state.auth.complete_oauth(&provider, code, &client).await?;
    let clear_state = clear_cookie(OAUTH_STATE_COOKIE, &state.auth.config().security.cookie);
    Ok((
        AppendHeaders([(SET_COOKIE, clear_state)]),
        browser_session_response(&state, session),
    )
        .into_response())
}

/// DELETE /api/auth/accounts/:provider
pub async fn unlink_account_handler(
    Extension(state): Extension<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(provider): Path<String>,
) -> Result<Json<serde_json::Value>, AuthError> {
    state.auth.unlink_provider(&user, &provider).await?;
    Ok(Json(json!({ "success": true, "message": "Account unlinked" })))
}

/// DELETE /api/auth/sessions
/// Signs the current user out on every device.
pub async fn revoke_sessions_handler(
    Extension(state): Extension<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<Response, AuthError> {
    let revoked = state.auth.revoke_all_sessions(&user.id).await?;
    let cookies = cleared_auth_cookies(&state.auth.config().security.cookie);
    let body = json!({ "success": true, "revoked": revoked });
    Ok((AppendHeaders(cookies), Json(body)).into_response())
}
