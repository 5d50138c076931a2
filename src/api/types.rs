// src/api/types.rs

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::infra::errors::BridgeError;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn error_response(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

impl From<BridgeError> for ErrorResponse {
    fn from(err: BridgeError) -> Self {
        ErrorResponse {
            error: err.to_string(),
        }
    }
}

/// Map a pre-stream failure onto its HTTP status and body.
pub fn from_bridge_error(err: BridgeError) -> ApiError {
    if err.is_client_error() {
        tracing::warn!("Rejected request: {err}");
    } else {
        tracing::error!("Request failed: {err}");
    }

    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(err.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_error_statuses() {
        let (status, body) = from_bridge_error(BridgeError::InvalidModel("gpt-4o".into()));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "Unsupported model: gpt-4o");

        let (status, _) = from_bridge_error(BridgeError::NonceFetch("timeout".into()));
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let (status, _) = from_bridge_error(BridgeError::UpstreamRejected("bad nonce".into()));
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_client_errors_map_to_bad_request() {
        for err in [
            BridgeError::InvalidRequest("empty".into()),
            BridgeError::InvalidModel("x".into()),
        ] {
            assert!(err.is_client_error());
            let (status, _) = from_bridge_error(err);
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn test_error_body_shape() {
        let (_, body) = error_response(StatusCode::UNAUTHORIZED, "nope");
        let value = serde_json::to_value(&body.0).unwrap();
        assert_eq!(value, serde_json::json!({"error": "nope"}));
    }
}
