// src/infra/errors.rs — Error types for kimi2api

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    // Client errors (rejected before any upstream work)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unsupported model: {0}")]
    InvalidModel(String),

    // Upstream errors
    #[error("Unable to obtain upstream nonce: {0}")]
    NonceFetch(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Upstream rejected the request after retry: {0}")]
    UpstreamRejected(String),

    // Infra
    #[error("Configuration error: {0}")]
    Config(String),
}

impl BridgeError {
    /// Errors caused by the caller's input rather than the upstream or us.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            BridgeError::InvalidRequest(_) | BridgeError::InvalidModel(_)
        )
    }

    /// HTTP status used when the error is surfaced before a stream opens.
    pub fn status_code(&self) -> u16 {
        match self {
            BridgeError::InvalidRequest(_) | BridgeError::InvalidModel(_) => 400,
            BridgeError::NonceFetch(_) | BridgeError::UpstreamUnavailable(_) => 503,
            BridgeError::UpstreamRejected(_) => 502,
            BridgeError::Config(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors() {
        assert!(BridgeError::InvalidRequest("empty".into()).is_client_error());
        assert!(BridgeError::InvalidModel("gpt-4".into()).is_client_error());
        assert!(!BridgeError::NonceFetch("down".into()).is_client_error());
        assert!(!BridgeError::UpstreamRejected("bad nonce".into()).is_client_error());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(BridgeError::InvalidModel("x".into()).status_code(), 400);
        assert_eq!(BridgeError::NonceFetch("x".into()).status_code(), 503);
        assert_eq!(BridgeError::UpstreamUnavailable("x".into()).status_code(), 503);
        assert_eq!(BridgeError::UpstreamRejected("x".into()).status_code(), 502);
        assert_eq!(BridgeError::Config("x".into()).status_code(), 500);
    }

    #[test]
    fn test_rejected_message_keeps_upstream_description() {
        let err = BridgeError::UpstreamRejected("bad nonce".into());
        assert!(err.to_string().contains("bad nonce"));
    }
}
