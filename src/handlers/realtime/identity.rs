//! Client identity resolution.
//!
//! A client is identified by the `X-Client-Id` header, falling back to the
//! `client_id` cookie, falling back to a freshly generated id. Whenever the
//! request carried no cookie, the response sets one so later requests from the
//! same browser map to the same quota.

use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use axum::response::Response;
use base64::prelude::*;
use uuid::Uuid;

use crate::config::ServerConfig;

pub const CLIENT_ID_HEADER: &str = "x-client-id";
pub const CLIENT_ID_COOKIE: &str = "client_id";

/// Lifetime of the identity cookie (30 days)
pub const CLIENT_ID_MAX_AGE_SECS: u64 = 30 * 24 * 60 * 60;

const MAX_CLIENT_ID_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub client_id: String,
    /// Whether the request already carried the identity cookie.
    pub has_cookie: bool,
}

/// Ids end up in a `Set-Cookie` header, so only URL-safe characters pass.
fn is_valid_client_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_CLIENT_ID_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b'.')
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().to_string())
}

/// 128 random bits, URL-safe base64 without padding.
pub fn generate_client_id() -> String {
    BASE64_URL_SAFE_NO_PAD.encode(Uuid::new_v4().as_bytes())
}

pub fn resolve_client_identity(headers: &HeaderMap) -> ClientIdentity {
    let cookie = cookie_value(headers, CLIENT_ID_COOKIE).filter(|id| is_valid_client_id(id));
    let has_cookie = cookie.is_some();

    let header = headers
        .get(CLIENT_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|id| is_valid_client_id(id));

    let client_id = header.or(cookie).unwrap_or_else(generate_client_id);
    ClientIdentity {
        client_id,
        has_cookie,
    }
}

pub fn identity_cookie(client_id: &str, config: &ServerConfig) -> Option<HeaderValue> {
    let mut cookie = format!(
        "{CLIENT_ID_COOKIE}={client_id}; Path=/; Max-Age={CLIENT_ID_MAX_AGE_SECS}; HttpOnly; SameSite={}",
        config.cookie_same_site
    );
    if config.cookie_secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).ok()
}

/// Attach the identity cookie to `response` unless the request already had one.
pub fn with_identity_cookie(
    mut response: Response,
    identity: &ClientIdentity,
    config: &ServerConfig,
) -> Response {
    if identity.has_cookie {
        return response;
    }
    if let Some(cookie) = identity_cookie(&identity.client_id, config) {
        response.headers_mut().append(SET_COOKIE, cookie);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_header_wins_over_cookie() {
        let identity = resolve_client_identity(&headers(&[
            ("x-client-id", "from-header"),
            ("cookie", "theme=dark; client_id=from-cookie"),
        ]));
        assert_eq!(identity.client_id, "from-header");
        assert!(identity.has_cookie);
    }

    #[test]
    fn test_cookie_fallback() {
        let identity =
            resolve_client_identity(&headers(&[("cookie", "a=1; client_id=abc_123; b=2")]));
        assert_eq!(identity.client_id, "abc_123");
        assert!(identity.has_cookie);
    }

    #[test]
    fn test_generated_when_absent() {
        let first = resolve_client_identity(&HeaderMap::new());
        let second = resolve_client_identity(&HeaderMap::new());
        assert!(!first.has_cookie);
        assert_eq!(first.client_id.len(), 22);
        assert_ne!(first.client_id, second.client_id);
        assert!(is_valid_client_id(&first.client_id));
    }

    #[test]
    fn test_invalid_ids_ignored() {
        let identity = resolve_client_identity(&headers(&[
            ("x-client-id", "evil; Domain=example.com"),
            ("cookie", "client_id=ok-id"),
        ]));
        assert_eq!(identity.client_id, "ok-id");

        let long = "a".repeat(MAX_CLIENT_ID_LEN + 1);
        let identity = resolve_client_identity(&headers(&[("x-client-id", long.as_str())]));
        assert_ne!(identity.client_id, long);
    }
}
