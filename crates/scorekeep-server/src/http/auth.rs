// SPDX-License-Identifier: Apache-2.0

use crate::config::Credentials;
use crate::http::response_contract::ApiError;
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::warn;

const MAX_AUTHORIZATION_BYTES: usize = 1024;

/// Username and password from an `Authorization: Basic ...` header.
pub(crate) fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let raw = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    if raw.len() > MAX_AUTHORIZATION_BYTES {
        return None;
    }
    let (scheme, encoded) = raw.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (user, password) = text.split_once(':')?;
    Some((user.to_string(), password.to_string()))
}

/// Returns the authenticated username.
pub(crate) fn authenticate(headers: &HeaderMap, expected: &Credentials) -> Result<String, ApiError> {
    match basic_credentials(headers) {
        Some((user, password)) if expected.matches(&user, &password) => Ok(user),
        Some((user, _)) => {
            warn!(user = %user, "rejected basic credentials");
            Err(ApiError::unauthorized())
        }
        None => {
            warn!("missing or malformed basic credentials");
            Err(ApiError::unauthorized())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).expect("header"));
        headers
    }

    fn basic(user: &str, password: &str) -> String {
        format!("Basic {}", STANDARD.encode(format!("{user}:{password}")))
    }

    #[test]
    fn parses_basic_header() {
        let headers = headers_with(&basic("alice", "s3:cret"));
        assert_eq!(
            basic_credentials(&headers),
            Some(("alice".to_string(), "s3:cret".to_string()))
        );
        let lower = headers_with(&basic("alice", "x").replace("Basic", "basic"));
        assert!(basic_credentials(&lower).is_some());
    }

    #[test]
    fn rejects_other_schemes_and_garbage() {
        assert_eq!(basic_credentials(&HeaderMap::new()), None);
        assert_eq!(basic_credentials(&headers_with("Bearer abc")), None);
        assert_eq!(basic_credentials(&headers_with("Basic !!!")), None);
        let no_colon = format!("Basic {}", STANDARD.encode("alice"));
        assert_eq!(basic_credentials(&headers_with(&no_colon)), None);
    }

    #[test]
    fn authenticate_checks_both_username_and_password() {
        let expected = Credentials::new("alice", "secret");
        assert_eq!(
            authenticate(&headers_with(&basic("alice", "secret")), &expected),
            Ok("alice".to_string())
        );
        assert!(authenticate(&headers_with(&basic("mallory", "secret")), &expected).is_err());
        assert!(authenticate(&headers_with(&basic("alice", "wrong")), &expected).is_err());
        assert!(authenticate(&HeaderMap::new(), &expected).is_err());
    }
}
