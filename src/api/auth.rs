// src/api/auth.rs

use crate::api::types::{error_response, ApiError};
use crate::api::ApiState;
use axum::http::{HeaderMap, StatusCode};

/// Verify the bearer token against the master key, if one is configured.
pub fn check_auth(state: &ApiState, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(ref expected) = state.master_key else {
        return Ok(());
    };

    let auth_header = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth_header.strip_prefix("Bearer ").unwrap_or("");

    if constant_time_eq(token.as_bytes(), expected.as_bytes()) {
        Ok(())
    } else {
        tracing::warn!("Rejected request with invalid or missing bearer token");
        Err(error_response(
            StatusCode::UNAUTHORIZED,
            "Invalid or missing bearer token",
        ))
    }
}

/// Constant-time byte comparison to prevent timing attacks on token auth.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |diff, (x, y)| diff | (x ^ y)) == 0
}
