//! Authentication routes

use axum::{
    middleware,
    routing::{delete, get, post},
    Extension, Router,
};
use std::sync::Arc;

use super::handlers;
use crate::common::AppState;
use crate::rate_limit_middleware::rate_limit_middleware;

/// Creates and returns the authentication router
///
/// # Routes
/// - `POST /api/auth/register` - Email and password sign-up (rate limited)
/// - `POST /api/auth/login` - Email and password sign-in (rate limited)
/// - `POST /api/auth/refresh` - Rotate the refresh token
/// - `POST /api/auth/logout` - End the session and clear cookies
/// - `GET /api/auth/me` - Current user
/// - `POST /api/auth/verify-email/send`, `GET /api/auth/verify-email/:token`
/// - `POST /api/auth/forgot-password`, `GET|POST /api/auth/reset-password`
/// - `POST /api/auth/magic-link`, `GET /api/auth/magic-link/verify/:token`
/// - `DELETE /api/auth/accounts/:provider` - Unlink an OAuth provider
/// - `DELETE /api/auth/sessions` - Sign out everywhere
/// - `GET /api/auth/:provider`, `GET /api/auth/:provider/callback` - OAuth
pub fn auth_routes(state: Arc<AppState>) -> Router {
    let limited = Router::new()
        .route("/api/auth/register", post(handlers::register_handler))
        .route("/api/auth/login", post(handlers::login_handler))
        .route_layer(middleware::from_fn(rate_limit_middleware));

    Router::new()
        .merge(limited)
        .route("/api/auth/refresh", post(handlers::refresh_handler))
        .route("/api/auth/logout", post(handlers::logout_handler))
        .route("/api/auth/me", get(handlers::me_handler))
        .route(
            "/api/auth/verify-email/send",
            post(handlers::send_verification_handler),
        )
        .route(
            "/api/auth/verify-email/:token",
            get(handlers::verify_email_handler),
        )
        .route(
            "/api/auth/forgot-password",
            post(handlers::forgot_password_handler),
        )
        .route(
            "/api/auth/reset-password",
            post(handlers::reset_password_handler),
        )
        .route(
            "/api/auth/reset-password/:token",
            get(handlers::check_reset_token_handler),
        )
        .route("/api/auth/magic-link", post(handlers::magic_link_handler))
        .route(
            "/api/auth/magic-link/verify/:token",
            get(handlers::verify_magic_link_handler),
        )
        .route(
            "/api/auth/accounts/:provider",
            delete(handlers::unlink_account_handler),
        )
        .route("/api/auth/sessions", delete(handlers::revoke_sessions_handler))
        .route("/api/auth/:provider", get(handlers::oauth_start_handler))
        .route(
            "/api/auth/:provider/callback",
            get(handlers::oauth_callback_handler),
        )
        .layer(Extension(state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::service::AuthService;
    use crate::common::test_support::{test_config, test_repository, FakeProvider, RecordingDelivery};
    use crate::config::AuthConfig;
    use crate::services::oauth::ExternalProfile;
    use crate::services::providers::ProviderRegistry;
    use crate::services::rate_limit::{RateLimitConfig, RateLimitService};
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::ServiceExt;

    async fn app_with(config: AuthConfig, max_attempts: u32) -> Router {
        let provider = FakeProvider::new(
            "google",
            ExternalProfile {
                id: "g-1".to_string(),
                email: Some("oauth@x.com".to_string()),
                name: Some("OAuth User".to_string()),
                avatar: None,
            },
        );
        let auth = AuthService::new(config, test_repository().await)
            .unwrap()
            .with_delivery(Arc::new(RecordingDelivery::default()))
            .with_providers(ProviderRegistry::new().with(Arc::new(provider)));
        let limiter = RateLimitService::new(RateLimitConfig {
            enabled: true,
            max_attempts,
            window: Duration::from_secs(60),
        });
        auth_routes(Arc::new(AppState::new(Arc::new(auth), Arc::new(limiter))))
    }

    async fn app() -> Router {
        app_with(test_config(), 100).await
    }

    fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn set_cookies(response: &Response) -> Vec<String> {
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }

    fn register_body() -> Value {
        json!({ "email": "a@x.com", "password": "Password1", "name": "Ada" })
    }

    #[tokio::test]
    async fn test_register_sets_cookies_and_returns_201() {
        let app = app().await;

        let response = app
            .oneshot(json_request(Method::POST, "/api/auth/register", register_body()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let cookies = set_cookies(&response);
        assert!(cookies.iter().any(|c| c.starts_with("accessToken=")));
        assert!(cookies.iter().any(|c| c.starts_with("refreshToken=")));

        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["user"]["email"], "a@x.com");
        assert!(body["user"].get("password").is_none());
        assert!(body["accessToken"].is_string());
    }

    #[tokio::test]
    async fn test_register_validation_and_conflict_are_400() {
        let app = app().await;

        let response = app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/auth/register",
                json!({ "email": "nope", "password": "abc" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");

        app.clone()
            .oneshot(json_request(Method::POST, "/api/auth/register", register_body()))
            .await
            .unwrap();
        let response = app
            .oneshot(json_request(Method::POST, "/api/auth/register", register_body()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await["error"],
            "User with this email already exists"
        );
    }

    #[tokio::test]
    async fn test_malformed_body_is_400() {
        let app = app().await;
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "Invalid request body");
    }

    #[tokio::test]
    async fn test_login_refresh_me_logout() {
        let app = app().await;
        app.clone()
            .oneshot(json_request(Method::POST, "/api/auth/register", register_body()))
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/auth/login",
                json!({ "email": "A@X.com", "password": "wrong" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"], "Invalid credentials");

        let response = app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/auth/login",
                json!({ "email": "A@X.com", "password": "Password1" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let login = body_json(response).await;
        let access = login["accessToken"].as_str().unwrap().to_string();
        let refresh = login["refreshToken"].as_str().unwrap().to_string();

        let me = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/auth/me")
                    .header(header::AUTHORIZATION, format!("Bearer {}", access))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(me.status(), StatusCode::OK);
        assert_eq!(body_json(me).await["user"]["email"], "a@x.com");

        // Refresh from the cookie alone
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/api/auth/refresh")
                    .header(header::COOKIE, format!("refreshToken={}", refresh))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let rotated = body_json(response).await["refreshToken"]
            .as_str()
            .unwrap()
            .to_string();
        assert_ne!(rotated, refresh);

        let response = app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/auth/refresh",
                json!({ "refreshToken": refresh }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/auth/logout",
                json!({ "refreshToken": rotated }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(set_cookies(&response)
            .iter()
            .all(|c| c.contains("Max-Age=0")));

        let response = app
            .oneshot(json_request(
                Method::POST,
                "/api/auth/refresh",
                json!({ "refreshToken": rotated }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_me_requires_token() {
        let app = app().await;
        let response = app
            .oneshot(Request::builder().uri("/api/auth/me").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "No token provided");
    }

    #[tokio::test]
    async fn test_logout_without_token_is_400() {
        let app = app().await;
        let response = app
            .oneshot(json_request(Method::POST, "/api/auth/logout", json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_login_is_rate_limited() {
        let app = app_with(test_config(), 2).await;
        let attempt = || json_request(
            Method::POST,
            "/api/auth/login",
            json!({ "email": "a@x.com", "password": "wrong" }),
        );

        for _ in 0..2 {
            let response = app.clone().oneshot(attempt()).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }
        let response = app.clone().oneshot(attempt()).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key("retry-after"));
        assert_eq!(
            body_json(response).await["error"],
            "Too many requests, please try again later"
        );

        // Other endpoints keep their own window
        let response = app
            .oneshot(json_request(
                Method::POST,
                "/api/auth/forgot-password",
                json!({ "email": "a@x.com" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_forgot_password_is_uniform() {
        let app = app().await;
        let response = app
            .oneshot(json_request(
                Method::POST,
                "/api/auth/forgot-password",
                json!({ "email": "nobody@x.com" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["success"], true);
    }

    #[tokio::test]
    async fn test_oauth_start_redirects_with_state_cookie() {
        let app = app().await;
        let response = app
            .clone()
            .oneshot(Request::builder().uri("/api/auth/google").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = response.headers()[header::LOCATION].to_str().unwrap().to_string();
        let state = location.split("state=").nth(1).unwrap();
        assert!(set_cookies(&response)
            .iter()
            .any(|c| c.starts_with(&format!("oauth_state={}", state))));

        let response = app
            .oneshot(Request::builder().uri("/api/auth/twitter").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_oauth_callback() {
        let app = app().await;
        let callback = |query: &str, cookie: Option<&str>| {
            let mut request = Request::builder().uri(format!("/api/auth/google/callback?{}", query));
            if let Some(cookie) = cookie {
                request = request.header(header::COOKIE, cookie);
            }
            request.body(Body::empty()).unwrap()
        };

        let response = app
            .clone()
            .oneshot(callback("error=access_denied", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"], "Authentication failed");

        let response = app
            .clone()
            .oneshot(callback("code=abc&state=forged", Some("oauth_state=expected")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .clone()
            .oneshot(callback("code=bad&state=s1", Some("oauth_state=s1")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(callback("code=abc&state=s1", Some("oauth_state=s1")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let cookies = set_cookies(&response);
        assert!(cookies.iter().any(|c| c.starts_with("oauth_state=; ")));
        assert!(cookies.iter().any(|c| c.starts_with("accessToken=")));
        let body = body_json(response).await;
        assert_eq!(body["user"]["email"], "oauth@x.com");
    }

    #[tokio::test]
    async fn test_oauth_callback_redirects_after_login() {
        let mut config = test_config();
        config.redirects.after_login = Some("https://app.test/home".to_string());
        let app = app_with(config, 100).await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/auth/google/callback?code=abc&state=s1")
                    .header(header::COOKIE, "oauth_state=s1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "https://app.test/home");
        assert!(set_cookies(&response)
            .iter()
            .any(|c| c.starts_with("refreshToken=")));
    }
}
