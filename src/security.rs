use axum::http::HeaderMap;
use subtle::ConstantTimeEq;

use crate::error::AppError;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Constant-time string comparison to prevent timing attacks
/// Use this for comparing API keys and other sensitive values
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Check the `x-api-key` header against the configured admin key.
///
/// With no key configured the admin surface is disabled outright.
pub fn verify_admin_key(headers: &HeaderMap, expected: Option<&str>) -> Result<(), AppError> {
    let expected = expected.ok_or(AppError::AdminDisabled)?;

    let provided = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or(AppError::Unauthorized)?;

    if constant_time_compare(provided, expected) {
        Ok(())
    } else {
        tracing::warn!("Rejected admin request with invalid API key");
        Err(AppError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("secret123", "secret123"));
        assert!(!constant_time_compare("secret123", "secret124"));
        assert!(!constant_time_compare("secret123", "secret12"));
        assert!(!constant_time_compare("", "secret"));
    }

    fn headers_with_key(key: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, HeaderValue::from_static(key));
        headers
    }

    #[test]
    fn test_verify_admin_key() {
        assert!(verify_admin_key(&headers_with_key("s3cret"), Some("s3cret")).is_ok());
        assert!(matches!(
            verify_admin_key(&headers_with_key("wrong"), Some("s3cret")),
            Err(AppError::Unauthorized)
        ));
        assert!(matches!(
            verify_admin_key(&HeaderMap::new(), Some("s3cret")),
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn test_admin_disabled_without_configured_key() {
        assert!(matches!(
            verify_admin_key(&headers_with_key("anything"), None),
            Err(AppError::AdminDisabled)
        ));
    }
}
