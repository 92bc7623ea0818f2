use axum::http::{header, HeaderMap};
use subtle::ConstantTimeEq;

use crate::config::Config;

/// Header accepted as an alternative to `Authorization: Bearer <key>`
pub const API_KEY_HEADER: &str = "x-api-key";

/// Constant-time string comparison to prevent timing attacks
/// Use this for comparing API keys and other sensitive values
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Key presented by the client, from `Authorization: Bearer` or `X-API-Key`.
pub fn presented_key(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")));

    bearer
        .or_else(|| headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()))
        .map(str::trim)
        .filter(|key| !key.is_empty())
}

/// Whether a write request may proceed.
///
/// Development mode leaves writes open. Otherwise a configured `API_KEY`
/// must be presented; without one, writes are refused.
pub fn is_write_authorized(config: &Config, headers: &HeaderMap) -> bool {
    if config.dev {
        return true;
    }

    match (config.api_key.as_deref(), presented_key(headers)) {
        (Some(expected), Some(presented)) => constant_time_compare(presented, expected),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn config(dev: bool, api_key: Option<&str>) -> Config {
        Config {
            dev,
            api_key: api_key.map(str::to_string),
            ..Config::default()
        }
    }

    fn headers(name: &'static str, value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("secret123", "secret123"));
        assert!(!constant_time_compare("secret123", "secret124"));
        assert!(!constant_time_compare("secret123", "secret12"));
        assert!(!constant_time_compare("", "secret"));
    }

    #[test]
    fn test_presented_key_sources() {
        assert_eq!(presented_key(&headers("authorization", "Bearer abc")), Some("abc"));
        assert_eq!(presented_key(&headers("x-api-key", "abc")), Some("abc"));
        assert_eq!(presented_key(&headers("authorization", "Basic abc")), None);
        assert_eq!(presented_key(&HeaderMap::new()), None);
    }

    #[test]
    fn test_dev_mode_allows_writes() {
        assert!(is_write_authorized(&config(true, None), &HeaderMap::new()));
    }

    #[test]
    fn test_key_required_outside_dev_mode() {
        let config = config(false, Some("secret"));
        assert!(is_write_authorized(&config, &headers("authorization", "Bearer secret")));
        assert!(is_write_authorized(&config, &headers("x-api-key", "secret")));
        assert!(!is_write_authorized(&config, &headers("x-api-key", "wrong")));
        assert!(!is_write_authorized(&config, &HeaderMap::new()));
    }

    #[test]
    fn test_no_configured_key_denies_writes() {
        let config = config(false, None);
        assert!(!is_write_authorized(&config, &headers("x-api-key", "anything")));
    }
}
