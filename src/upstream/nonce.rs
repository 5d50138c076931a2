// src/upstream/nonce.rs — Cached anti-automation nonce scraped from the chat page
//
// The chat page embeds `var kimi_ajax = {...};` whose `nonce` field must be
// sent with every AJAX call. The value is cached until the upstream rejects a
// call, at which point the gateway forces a refresh.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use tokio::sync::Mutex;

use crate::infra::errors::BridgeError;

/// Script variable holding the AJAX settings object.
const SCRIPT_VAR: &str = "kimi_ajax";

/// Field of the settings object that carries the nonce.
const NONCE_FIELD: &str = "nonce";

fn script_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(&format!(r"var {SCRIPT_VAR} = (\{{.*?\}});"))
            .expect("static nonce pattern is valid")
    })
}

/// Pull the nonce out of the chat page HTML.
pub fn extract_nonce(html: &str) -> Result<String, BridgeError> {
    let captures = script_var_pattern().captures(html).ok_or_else(|| {
        BridgeError::NonceFetch(format!("'{SCRIPT_VAR}' variable not found in chat page"))
    })?;

    let settings: serde_json::Value = serde_json::from_str(&captures[1]).map_err(|e| {
        BridgeError::NonceFetch(format!("'{SCRIPT_VAR}' is not valid JSON: {e}"))
    })?;

    settings[NONCE_FIELD]
        .as_str()
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            BridgeError::NonceFetch(format!("'{SCRIPT_VAR}' has no '{NONCE_FIELD}' field"))
        })
}

/// Process-wide nonce cache. Only `get` is exposed; the cell itself never is.
pub struct NonceStore {
    client: reqwest::Client,
    page_url: String,
    timeout: Duration,
    cached: Mutex<Option<String>>,
    /// Bumped after every successful fetch.
    generation: AtomicU64,
}

impl NonceStore {
    pub fn new(client: reqwest::Client, page_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            page_url: page_url.into(),
            timeout,
            cached: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// Return the cached nonce, fetching it when absent or when `force_refresh`
    /// is set.
    ///
    /// The fetch runs while holding the lock, so concurrent callers queue
    /// behind an in-flight fetch and get its result. A forced refresh that had
    /// to wait for another caller's refresh reuses that result instead of
    /// fetching a second time.
    pub async fn get(&self, force_refresh: bool) -> Result<String, BridgeError> {
        let seen = self.generation.load(Ordering::Acquire);
        let mut guard = self.cached.lock().await;

        if let Some(ref nonce) = *guard {
            let refreshed_while_waiting = self.generation.load(Ordering::Acquire) != seen;
            if !force_refresh || refreshed_while_waiting {
                return Ok(nonce.clone());
            }
            tracing::debug!("Forcing nonce refresh");
        }

        let nonce = self.fetch().await?;
        *guard = Some(nonce.clone());
        self.generation.fetch_add(1, Ordering::Release);
        Ok(nonce)
    }

    /// Prefetch at startup. Failure is not fatal; the next request retries.
    pub async fn warm_up(&self) {
        match self.get(false).await {
            Ok(_) => tracing::info!("Upstream nonce prefetched"),
            Err(e) => tracing::warn!("Nonce prefetch failed, will retry on first request: {e}"),
        }
    }

    async fn fetch(&self) -> Result<String, BridgeError> {
        tracing::info!("Fetching upstream nonce from {}", self.page_url);

        let response = self
            .client
            .get(&self.page_url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Nonce page request failed: {e}");
                BridgeError::NonceFetch(format!("failed to load {}: {e}", self.page_url))
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!("Nonce page returned HTTP {status}");
            return Err(BridgeError::NonceFetch(format!(
                "chat page returned HTTP {status}"
            )));
        }

        let html = response
            .text()
            .await
            .map_err(|e| BridgeError::NonceFetch(format!("failed to read chat page: {e}")))?;

        let nonce = extract_nonce(&html).inspect_err(|e| tracing::error!("{e}"))?;
        tracing::info!("Obtained fresh upstream nonce");
        Ok(nonce)
    }
}
