use axum::http::{header::SET_COOKIE, HeaderMap, HeaderValue};

use crate::auth::TokenPair;
use crate::config::AuthConfig;

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";

/// Read a named cookie from a request's Cookie header
pub fn get_cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie_header = headers.get("cookie")?.to_str().ok()?;
    for pair in cookie_header.split(';') {
        let mut parts = pair.trim().splitn(2, '=');
        let key = parts.next()?.trim();
        let value = parts.next()?.trim();
        if key == name {
            return Some(value.to_string());
        }
    }
    None
}

/// Build a Set-Cookie value. Both session cookies are SameSite=Strict; the
/// access token stays script-readable while the refresh token is HttpOnly.
pub fn build_cookie(
    name: &str,
    value: &str,
    max_age_secs: i64,
    secure: bool,
    http_only: bool,
) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; Max-Age={}; SameSite=Strict",
        name, value, max_age_secs
    );
    if secure {
        cookie.push_str("; Secure");
    }
    if http_only {
        cookie.push_str("; HttpOnly");
    }
    cookie
}

pub fn clear_cookie(name: &str, secure: bool, http_only: bool) -> String {
    let mut cookie = format!("{}=; Path=/; Max-Age=0; SameSite=Strict", name);
    if secure {
        cookie.push_str("; Secure");
    }
    if http_only {
        cookie.push_str("; HttpOnly");
    }
    cookie
}

/// Set-Cookie headers installing a freshly issued token pair
pub fn token_pair_headers(pair: &TokenPair, auth: &AuthConfig) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let access = build_cookie(
        ACCESS_TOKEN_COOKIE,
        &pair.access_token,
        auth.access_ttl_secs,
        auth.cookie_secure,
        false,
    );
    let refresh = build_cookie(
        REFRESH_TOKEN_COOKIE,
        &pair.refresh_token,
        auth.refresh_ttl_secs,
        auth.cookie_secure,
        true,
    );
    if let Ok(v) = HeaderValue::from_str(&access) {
        headers.append(SET_COOKIE, v);
    }
    if let Ok(v) = HeaderValue::from_str(&refresh) {
        headers.append(SET_COOKIE, v);
    }
    headers
}

/// Set-Cookie headers expiring both session cookies
pub fn clear_token_headers(auth: &AuthConfig) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let access = clear_cookie(ACCESS_TOKEN_COOKIE, auth.cookie_secure, false);
    let refresh = clear_cookie(REFRESH_TOKEN_COOKIE, auth.cookie_secure, true);
    if let Ok(v) = HeaderValue::from_str(&access) {
        headers.append(SET_COOKIE, v);
    }
    if let Ok(v) = HeaderValue::from_str(&refresh) {
        headers.append(SET_COOKIE, v);
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_auth_config(secure: bool) -> AuthConfig {
        AuthConfig {
            access_secret: "a".to_string(),
            refresh_secret: "r".to_string(),
            access_ttl_secs: 900,
            refresh_ttl_secs: 604_800,
            cookie_secure: secure,
        }
    }

    #[test]
    fn test_build_cookie_attributes() {
        let cookie = build_cookie("access_token", "tok", 900, false, false);
        assert_eq!(cookie, "access_token=tok; Path=/; Max-Age=900; SameSite=Strict");

        let cookie = build_cookie("refresh_token", "tok", 60, true, true);
        assert!(cookie.ends_with("; Secure; HttpOnly"));
    }

    #[test]
    fn test_clear_cookie_expires_immediately() {
        let cookie = clear_cookie("access_token", false, false);
        assert!(cookie.contains("Max-Age=0"));
        assert!(cookie.starts_with("access_token=;"));
    }

    #[test]
    fn test_get_cookie_value() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "cookie",
            HeaderValue::from_static("access_token=abc; refresh_token=def"),
        );
        assert_eq!(
            get_cookie_value(&headers, "access_token").as_deref(),
            Some("abc")
        );
        assert_eq!(
            get_cookie_value(&headers, "refresh_token").as_deref(),
            Some("def")
        );
        assert!(get_cookie_value(&headers, "session").is_none());
    }

    #[test]
    fn test_get_cookie_value_no_header() {
        let headers = HeaderMap::new();
        assert!(get_cookie_value(&headers, "access_token").is_none());
    }

    #[test]
    fn test_token_pair_headers_http_only_split() {
        let pair = TokenPair {
            access_token: "acc".to_string(),
            refresh_token: "ref".to_string(),
        };
        let headers = token_pair_headers(&pair, &test_auth_config(false));
        let values: Vec<&str> = headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        assert_eq!(values.len(), 2);

        let access = values
            .iter()
            .find(|v| v.starts_with("access_token="))
            .unwrap();
        let refresh = values
            .iter()
            .find(|v| v.starts_with("refresh_token="))
            .unwrap();
        assert!(!access.contains("HttpOnly"), "access token is script-readable");
        assert!(refresh.contains("HttpOnly"));
        assert!(!access.contains("Secure"));
    }

    #[test]
    fn test_secure_flag_follows_config() {
        let pair = TokenPair {
            access_token: "acc".to_string(),
            refresh_token: "ref".to_string(),
        };
        let headers = token_pair_headers(&pair, &test_auth_config(true));
        for value in headers.get_all(SET_COOKIE) {
            assert!(value.to_str().unwrap().contains("Secure"));
        }
    }
}
