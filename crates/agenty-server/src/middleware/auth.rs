//! Optional HTTP Basic authentication
//!
//! Credentials are compared through SHA-256 digests so the comparison
//! cost does not depend on how many leading bytes match.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Json, Response};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::json;
use sha2::{Digest, Sha256};

use agenty_core::AuthConfig;

pub async fn basic_auth(
    State(auth): State<Arc<AuthConfig>>,
    req: Request,
    next: Next,
) -> Response {
    if !auth.enabled {
        return next.run(req).await;
    }

    let Some((username, password)) = extract_credentials(&req) else {
        return unauthorized("authorization required");
    };

    if !digest_eq(&username, &auth.username) || !digest_eq(&password, &auth.password) {
        return unauthorized("invalid username or password");
    }

    next.run(req).await
}

fn extract_credentials(req: &Request) -> Option<(String, String)> {
    let header = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = BASE64.decode(encoded).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

fn digest_eq(left: &str, right: &str) -> bool {
    Sha256::digest(left.as_bytes()) == Sha256::digest(right.as_bytes())
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Basic realm=\"Authorization Required\"")],
        Json(json!({"code": 401, "message": message})),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_comparison_matches_equal_strings() {
        assert!(digest_eq("secret", "secret"));
        assert!(!digest_eq("secret", "Secret"));
        assert!(!digest_eq("secret", "secret2"));
    }

    #[test]
    fn credentials_are_decoded_from_basic_header() {
        let encoded = BASE64.encode("alice:wonder:land");
        let req = Request::builder()
            .header(header::AUTHORIZATION, format!("Basic {}", encoded))
            .body(axum::body::Body::empty())
            .unwrap();

        let (username, password) = extract_credentials(&req).unwrap();
        assert_eq!(username, "alice");
        // Everything after the first colon is the password.
        assert_eq!(password, "wonder:land");
    }

    #[test]
    fn malformed_header_yields_no_credentials() {
        let req = Request::builder()
            .header(header::AUTHORIZATION, "Bearer xyz")
            .body(axum::body::Body::empty())
            .unwrap();
        assert!(extract_credentials(&req).is_none());
    }
}
