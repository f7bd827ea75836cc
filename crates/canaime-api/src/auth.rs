use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{HeaderMap, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::Engine;
use canaime::auth::Credentials;

use crate::{ApiError, AppState};

/// Rejects any request whose `Authorization: Basic` header does not match the
/// configured API credentials.
pub async fn require_basic_auth(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if !check_basic_auth(request.headers(), &state.credentials) {
        log::warn!("Rejected unauthenticated request to {}", request.uri().path());
        return ApiError::Unauthorized.into_response();
    }
    next.run(request).await
}

pub fn check_basic_auth(headers: &HeaderMap, expected: &Credentials) -> bool {
    let Some(auth) = headers.get(header::AUTHORIZATION) else {
        return false;
    };
    let Ok(auth_str) = auth.to_str() else {
        return false;
    };
    let Some(encoded) = auth_str.strip_prefix("Basic ") else {
        return false;
    };

    let decoded_bytes = match base64::engine::general_purpose::STANDARD.decode(encoded.trim()) {
        Ok(b) => b,
        Err(_) => return false,
    };
    let Ok(decoded) = String::from_utf8(decoded_bytes) else {
        return false;
    };
    let Some((username, password)) = decoded.split_once(':') else {
        return false;
    };

    // No short-circuit between the two halves.
    let username_ok = constant_time_eq(username.as_bytes(), expected.username.as_bytes());
    let password_ok = constant_time_eq(password.as_bytes(), expected.password.as_bytes());
    username_ok & password_ok
}

pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b.iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn basic(user_pass: &str) -> HeaderMap {
        let encoded = base64::engine::general_purpose::STANDARD.encode(user_pass);
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Basic {}", encoded)).unwrap(),
        );
        headers
    }

    fn admin() -> Credentials {
        Credentials::new("admin", "s3cr:et")
    }

    #[test]
    fn test_accepts_matching_credentials() {
        assert!(check_basic_auth(&basic("admin:s3cr:et"), &admin()));
    }

    #[test]
    fn test_rejects_wrong_credentials() {
        assert!(!check_basic_auth(&basic("admin:wrong"), &admin()));
        assert!(!check_basic_auth(&basic("root:s3cr:et"), &admin()));
        assert!(!check_basic_auth(&basic("admin"), &admin()));
    }

    #[test]
    fn test_rejects_malformed_headers() {
        assert!(!check_basic_auth(&HeaderMap::new(), &admin()));

        let mut bearer = HeaderMap::new();
        bearer.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert!(!check_basic_auth(&bearer, &admin()));

        let mut garbage = HeaderMap::new();
        garbage.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic %%%"));
        assert!(!check_basic_auth(&garbage, &admin()));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }
}
