// rate_limit_middleware.rs
use crate::common::AppState;
use crate::services::rate_limit::RateLimitResult;
use axum::{
    extract::{ConnectInfo, Extension, Request},
    http::{HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RateLimitErrorResponse {
    success: bool,
    error: String,
    code: String,
    retry_after: u32,
}

/// Client IP from proxy headers, falling back to the peer address.
pub fn extract_ip_address(
    headers: &HeaderMap,
    connect_info: Option<&ConnectInfo<SocketAddr>>,
) -> Option<String> {
    // Try X-Forwarded-For header first (for proxied requests)
    if let Some(forwarded) = headers.get("x-forwarded-for") {
        if let Ok(forwarded_str) = forwarded.to_str() {
            // Take the first IP in the chain
            if let Some(first_ip) = forwarded_str.split(',').next() {
                let first_ip = first_ip.trim();
                if !first_ip.is_empty() {
                    return Some(first_ip.to_string());
                }
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(ip_str) = real_ip.to_str() {
            return Some(ip_str.trim().to_string());
        }
    }

    connect_info.map(|info| info.0.ip().to_string())
}

/// Limiter key: one sliding window per endpoint and client IP.
fn rate_limit_key(path: &str, ip_address: Option<&str>) -> String {
    format!("{}:{}", path, ip_address.unwrap_or("unknown"))
}

/// Rate limiting middleware for the credential endpoints
pub async fn rate_limit_middleware(
    Extension(state): Extension<Arc<AppState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Result<Response, Response> {
    let ip_address = extract_ip_address(request.headers(), connect_info.as_ref());
    let path = request.uri().path().to_string();
    let identifier = rate_limit_key(&path, ip_address.as_deref());

    match state.rate_limit_service.check_rate_limit(&identifier).await {
        RateLimitResult::Allowed => {
            debug!(
                identifier = %identifier,
                path = %path,
                "Request allowed by rate limiter"
            );
            Ok(next.run(request).await)
        }
        RateLimitResult::Limited { retry_after } => {
            warn!(
                identifier = %identifier,
                ip = ?ip_address,
                path = %path,
                retry_after = retry_after,
                "Request blocked by rate limiter"
            );

            state
                .rate_limit_service
                .log_violation(&identifier, ip_address.as_deref(), &path);

            let error_response = RateLimitErrorResponse {
                success: false,
                error: "Too many requests, please try again later".to_string(),
                code: "RATE_LIMITED".to_string(),
                retry_after,
            };

            let mut response =
                (StatusCode::TOO_MANY_REQUESTS, Json(error_response)).into_response();

            if let Ok(retry_header) = HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert("retry-after", retry_header);
            }
            if let Ok(limit_header) =
                HeaderValue::from_str(&state.rate_limit_service.config().max_attempts.to_string())
            {
                response
                    .headers_mut()
                    .insert("x-ratelimit-limit", limit_header);
            }

            Err(response)
        }
    }
}
