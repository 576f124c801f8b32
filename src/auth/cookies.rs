//! Auth cookies
//!
//! Access and refresh tokens travel in `accessToken` / `refreshToken` cookies
//! alongside the JSON body. Attributes come from
//! [`CookieSettings`](crate::config::CookieSettings).

use axum::http::{header::COOKIE, header::SET_COOKIE, HeaderMap, HeaderName};

use super::service::AuthService;
use crate::config::{CookieSettings, SameSite};
use crate::services::jwt::TokenPair;

pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";
pub const OAUTH_STATE_COOKIE: &str = "oauth_state";

/// Value of cookie `name` across all `Cookie` headers. Empty values count as
/// absent.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

pub fn build_cookie(name: &str, value: &str, max_age_secs: i64, settings: &CookieSettings) -> String {
    let mut cookie = format!("{}={}; Path=/; Max-Age={}", name, value, max_age_secs.max(0));
    if settings.http_only {
        cookie.push_str("; HttpOnly");
    }
    // Browsers drop SameSite=None cookies without Secure
    if settings.secure || settings.same_site == SameSite::None {
        cookie.push_str("; Secure");
    }
    cookie.push_str("; SameSite=");
    cookie.push_str(settings.same_site.as_str());
    cookie
}

pub fn clear_cookie(name: &str, settings: &CookieSettings) -> String {
    build_cookie(name, "", 0, settings)
}

/// `Set-Cookie` headers for a freshly issued pair.
pub fn auth_cookies(auth: &AuthService, tokens: &TokenPair) -> [(HeaderName, String); 2] {
    let settings = &auth.config().security.cookie;
    [
        (
            SET_COOKIE,
            build_cookie(
                ACCESS_TOKEN_COOKIE,
                &tokens.access_token,
                auth.jwt().access_ttl().num_seconds(),
                settings,
            ),
        ),
        (
            SET_COOKIE,
            build_cookie(
                REFRESH_TOKEN_COOKIE,
                &tokens.refresh_token,
                auth.config().security.session_ttl().num_seconds(),
                settings,
            ),
        ),
    ]
}

pub fn cleared_auth_cookies(settings: &CookieSettings) -> [(HeaderName, String); 2] {
    [
        (SET_COOKIE, clear_cookie(ACCESS_TOKEN_COOKIE, settings)),
        (SET_COOKIE, clear_cookie(REFRESH_TOKEN_COOKIE, settings)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_cookie() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, "theme=dark; accessToken=abc.def".parse().unwrap());
        headers.append(COOKIE, "refreshToken=xyz; empty=".parse().unwrap());

        assert_eq!(read_cookie(&headers, "accessToken").as_deref(), Some("abc.def"));
        assert_eq!(read_cookie(&headers, "refreshToken").as_deref(), Some("xyz"));
        assert_eq!(read_cookie(&headers, "empty"), None);
        assert_eq!(read_cookie(&headers, "missing"), None);
    }

    #[test]
    fn test_cookie_attributes() {
        let settings = CookieSettings::default();
        assert_eq!(
            build_cookie("accessToken", "t", 900, &settings),
            "accessToken=t; Path=/; Max-Age=900; HttpOnly; SameSite=Lax"
        );

        let cross_site = CookieSettings {
            http_only: false,
            secure: false,
            same_site: SameSite::None,
        };
        assert_eq!(
            build_cookie("accessToken", "t", 900, &cross_site),
            "accessToken=t; Path=/; Max-Age=900; Secure; SameSite=None"
        );
    }

    #[test]
    fn test_clear_cookie_expires_immediately() {
        let cookie = clear_cookie("refreshToken", &CookieSettings::default());
        assert!(cookie.starts_with("refreshToken=; Path=/; Max-Age=0"));
    }
}
