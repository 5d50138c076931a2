// src/upstream/gateway.rs — The AJAX chat call with one nonce-refresh retry
//
// The upstream answers every call with `{success, data}`. A `success: false`
// reply almost always means the nonce went stale, so the gateway refreshes the
// nonce and resends exactly once. Transport failures are never retried.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use super::{upstream_model_id, NonceStore};
use crate::infra::errors::BridgeError;
use crate::util::preview;

/// Value of the `action` form field routing the call to the chat handler.
const SEND_ACTION: &str = "kimi_send_message";

/// Form body of one upstream call.
#[derive(Debug, Clone, Serialize)]
pub struct UpstreamPayload {
    pub action: &'static str,
    pub nonce: String,
    pub message: String,
    pub model: &'static str,
    pub session_id: String,
}

/// Interpreted `{success, data}` reply.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamReply {
    Answer(String),
    Failure(String),
}

impl UpstreamReply {
    /// Interpret a reply body. A missing `success` flag counts as failure.
    pub fn from_json(body: &serde_json::Value) -> Self {
        let data = &body["data"];
        if body["success"].as_bool().unwrap_or(false) {
            let answer = data["message"]
                .as_str()
                .or_else(|| data.as_str())
                .unwrap_or_default();
            UpstreamReply::Answer(answer.to_string())
        } else {
            let description = data
                .as_str()
                .or_else(|| data["message"].as_str())
                .unwrap_or("unknown error");
            UpstreamReply::Failure(description.to_string())
        }
    }
}

pub struct UpstreamGateway {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
    nonces: Arc<NonceStore>,
}

impl UpstreamGateway {
    pub fn new(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        timeout: Duration,
        nonces: Arc<NonceStore>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            timeout,
            nonces,
        }
    }

    /// Build the form payload for `model`, failing on names outside the table.
    pub fn build_payload(
        prompt: &str,
        model: &str,
        session_id: &str,
        nonce: String,
    ) -> Result<UpstreamPayload, BridgeError> {
        let upstream_model =
            upstream_model_id(model).ok_or_else(|| BridgeError::InvalidModel(model.to_string()))?;

        Ok(UpstreamPayload {
            action: SEND_ACTION,
            nonce,
            message: prompt.to_string(),
            model: upstream_model,
            session_id: session_id.to_string(),
        })
    }

    /// Send `prompt` upstream and return the answer text.
    pub async fn send(
        &self,
        prompt: &str,
        model: &str,
        session_id: &str,
    ) -> Result<String, BridgeError> {
        let nonce = self.nonces.get(false).await?;
        let mut payload = Self::build_payload(prompt, model, session_id, nonce)?;

        tracing::info!(session_id, model = payload.model, "Sending request upstream");
        tracing::debug!("Prompt: {}", preview(prompt, 200));

        let first_failure = match self.post(&payload).await? {
            UpstreamReply::Answer(answer) => return Ok(answer),
            UpstreamReply::Failure(description) => description,
        };

        tracing::warn!(
            session_id,
            "Upstream rejected request ({first_failure}); refreshing nonce and retrying once"
        );

        payload.nonce = self.nonces.get(true).await?;
        match self.post(&payload).await? {
            UpstreamReply::Answer(answer) => Ok(answer),
            UpstreamReply::Failure(description) => {
                tracing::warn!(session_id, "Upstream rejected retry: {description}");
                Err(BridgeError::UpstreamRejected(description))
            }
        }
    }

    async fn post(&self, payload: &UpstreamPayload) -> Result<UpstreamReply, BridgeError> {
        let response = self
            .client
            .post(&self.endpoint)
            .form(payload)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                let kind = if e.is_timeout() { "timed out" } else { "failed" };
                BridgeError::UpstreamUnavailable(format!("request {kind}: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BridgeError::UpstreamUnavailable(format!(
                "HTTP {status}: {}",
                preview(&body, 200)
            )));
        }

        let body: serde_json::Value = response.json().await.map_err(|e| {
            BridgeError::UpstreamUnavailable(format!("failed to parse response: {e}"))
        })?;

        Ok(UpstreamReply::from_json(&body))
    }
}
