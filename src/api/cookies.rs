//! Refresh-cookie plumbing.
//!
//! The refresh token travels only in an HTTP-only cookie: script-inaccessible,
//! `SameSite=Strict`, scoped to the whole API. Access tokens never touch
//! cookies and QR tokens never touch this module.

use anyhow::{Context, Result};
use axum::http::{HeaderMap, HeaderValue, header};

pub const REFRESH_COOKIE: &str = "refreshToken";

/// Pulls one cookie value out of the `Cookie` request header.
#[must_use]
pub fn get_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;

    raw.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

/// Builds the `Set-Cookie` value that plants the refresh token.
pub fn refresh_cookie(token: &str, max_age_secs: i64, secure: bool) -> Result<HeaderValue> {
    let mut cookie = format!(
        "{REFRESH_COOKIE}={token}; Max-Age={max_age_secs}; Path=/; HttpOnly; SameSite=Strict"
    );
    if secure {
        cookie.push_str("; Secure");
    }

    HeaderValue::from_str(&cookie).context("Refresh cookie value contained invalid characters")
}

/// Builds the `Set-Cookie` value that deletes the refresh cookie.
pub fn clear_refresh_cookie(secure: bool) -> Result<HeaderValue> {
    let mut cookie =
        format!("{REFRESH_COOKIE}=; Max-Age=0; Path=/; HttpOnly; SameSite=Strict");
    if secure {
        cookie.push_str("; Secure");
    }

    HeaderValue::from_str(&cookie).context("Clear-cookie value contained invalid characters")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_cookie_finds_named_value() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; refreshToken=abc123; lang=en"),
        );

        assert_eq!(
            get_cookie(&headers, REFRESH_COOKIE),
            Some("abc123".to_string())
        );
        assert_eq!(get_cookie(&headers, "lang"), Some("en".to_string()));
        assert_eq!(get_cookie(&headers, "missing"), None);
    }

    #[test]
    fn test_get_cookie_without_header() {
        let headers = HeaderMap::new();
        assert_eq!(get_cookie(&headers, REFRESH_COOKIE), None);
    }

    #[test]
    fn test_refresh_cookie_attributes() {
        let value = refresh_cookie("deadbeef", 604_800, true).unwrap();
        let s = value.to_str().unwrap();

        assert!(s.starts_with("refreshToken=deadbeef"));
        assert!(s.contains("Max-Age=604800"));
        assert!(s.contains("HttpOnly"));
        assert!(s.contains("SameSite=Strict"));
        assert!(s.contains("Path=/"));
        assert!(s.contains("Secure"));
    }

    #[test]
    fn test_refresh_cookie_insecure_for_local_dev() {
        let value = refresh_cookie("deadbeef", 60, false).unwrap();
        assert!(!value.to_str().unwrap().contains("Secure"));
    }

    #[test]
    fn test_clear_cookie_expires_immediately() {
        let value = clear_refresh_cookie(false).unwrap();
        let s = value.to_str().unwrap();

        assert!(s.starts_with("refreshToken=;"));
        assert!(s.contains("Max-Age=0"));
    }
}
