//! Device identification and admin authentication middleware

use axum::{
    body::Body,
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};

use crate::error::{ApiError, Result};
use crate::models::DeviceId;
use crate::AppState;

/// Header carrying the device partition key
pub const DEVICE_HEADER: &str = "x-device-id";

/// Calling device, stored in request extensions
#[derive(Clone, Debug)]
pub struct DeviceContext {
    pub device_id: DeviceId,
}

/// Device middleware - extracts the device id from the `X-Device-Id` header
pub async fn device_middleware(mut request: Request<Body>, next: Next) -> Result<Response> {
    let raw = request
        .headers()
        .get(DEVICE_HEADER)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing X-Device-Id header".to_string()))?;

    let device_id = DeviceId::parse(raw).map_err(|e| ApiError::Unauthorized(e.to_string()))?;

    request.extensions_mut().insert(DeviceContext { device_id });

    Ok(next.run(request).await)
}

/// Admin middleware - requires `Authorization: Bearer <ADMIN_PASSWORD>`
pub async fn admin_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response> {
    let expected = state
        .config
        .admin_password
        .as_deref()
        .ok_or_else(|| ApiError::Unauthorized("Administration is disabled".to_string()))?;

    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".to_string()))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::Unauthorized("Invalid Authorization format".to_string()))?;

    if !token_matches(token, expected) {
        tracing::warn!(path = %request.uri().path(), "rejected admin request");
        return Err(ApiError::Unauthorized("Invalid admin token".to_string()));
    }

    Ok(next.run(request).await)
}

/// Compare a presented admin token with the configured one.
///
/// Both sides are hashed to fixed-length digests and every byte is
/// compared, so the time taken depends on neither the length of the
/// tokens nor the position of the first mismatch.
fn token_matches(given: &str, expected: &str) -> bool {
    let given = Sha256::digest(given.as_bytes());
    let expected = Sha256::digest(expected.as_bytes());
    given
        .iter()
        .zip(expected.iter())
        .fold(0u8, |diff, (a, b)| diff | (a ^ b))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_matches_exact_password() {
        assert!(token_matches("secret", "secret"));
        assert!(token_matches("", ""));
    }

    #[test]
    fn test_token_rejects_wrong_password() {
        assert!(!token_matches("secreT", "secret"));
        assert!(!token_matches("xecret", "secret"));
    }

    #[test]
    fn test_token_rejects_prefix_and_extension() {
        assert!(!token_matches("secre", "secret"));
        assert!(!token_matches("secret ", "secret"));
        assert!(!token_matches("", "secret"));
    }
}
