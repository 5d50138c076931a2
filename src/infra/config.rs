// src/infra/config.rs — Configuration loading (TOML + env overrides)

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::infra::errors::BridgeError;
use crate::infra::paths;
use crate::upstream;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub models: ModelsConfig,

    #[serde(default)]
    pub stream: StreamConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Shared secret required as `Authorization: Bearer <key>` on /v1 routes.
    pub master_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8088,
            master_key: None,
        }
    }
}

impl ServerConfig {
    /// The master key, or `None` when unset or empty (auth disabled).
    pub fn auth_key(&self) -> Option<&str> {
        self.master_key.as_deref().filter(|k| !k.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Page that embeds the `kimi_ajax` script variable.
    pub chat_page_url: String,
    /// AJAX endpoint receiving the form-encoded chat call.
    pub endpoint_url: String,
    pub request_timeout_secs: u64,
    pub nonce_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            chat_page_url: "https://kimi-ai.chat/chat/".into(),
            endpoint_url: "https://kimi-ai.chat/wp-admin/admin-ajax.php".into(),
            request_timeout_secs: 180,
            nonce_timeout_secs: 20,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/128.0.0.0 Safari/537.36"
                .into(),
        }
    }
}

impl UpstreamConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn nonce_timeout(&self) -> Duration {
        Duration::from_secs(self.nonce_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub ttl_secs: u64,
    pub max_entries: usize,
    /// Character budget for the rendered prompt.
    pub context_max_chars: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 3600,
            max_entries: 1024,
            context_max_chars: 1000,
        }
    }
}

impl SessionConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Names advertised by GET /v1/models.
    pub known: Vec<String>,
    /// Used when a request omits `model`.
    pub default: String,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            known: vec!["kimi-k2-instruct-0905".into(), "kimi-k2-instruct".into()],
            default: "kimi-k2-instruct-0905".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub chunk_delay_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self { chunk_delay_ms: 20 }
    }
}

impl StreamConfig {
    pub fn chunk_delay(&self) -> Duration {
        Duration::from_millis(self.chunk_delay_ms)
    }
}

impl Config {
    /// Load config from the default location, falling back to defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = paths::config_file_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Apply overrides using `lookup` to read variables. Unparseable numbers
    /// are ignored with a warning.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("API_MASTER_KEY").filter(|k| !k.is_empty()) {
            self.server.master_key = Some(key);
        }
        if let Some(port) = parse_env(&lookup, "PORT") {
            self.server.port = port;
        }
        if let Some(secs) = parse_env(&lookup, "API_REQUEST_TIMEOUT") {
            self.upstream.request_timeout_secs = secs;
        }
        if let Some(secs) = parse_env(&lookup, "SESSION_CACHE_TTL") {
            self.session.ttl_secs = secs;
        }
        if let Some(chars) = parse_env(&lookup, "CONTEXT_MAX_LENGTH") {
            self.session.context_max_chars = chars;
        }
        if let Some(model) = lookup("DEFAULT_MODEL") {
            self.models.default = model;
        }
        if let Some(url) = lookup("UPSTREAM_URL") {
            self.upstream.endpoint_url = url;
        }
        if let Some(url) = lookup("CHAT_PAGE_URL") {
            self.upstream.chat_page_url = url;
        }
    }

    /// Reject settings the bridge cannot run with.
    pub fn validate(&self) -> Result<(), BridgeError> {
        if upstream::upstream_model_id(&self.models.default).is_none() {
            return Err(BridgeError::Config(format!(
                "default model '{}' has no upstream mapping",
                self.models.default
            )));
        }
        if let Some(unknown) = self
            .models
            .known
            .iter()
            .find(|m| upstream::upstream_model_id(m).is_none())
        {
            return Err(BridgeError::Config(format!(
                "model '{unknown}' has no upstream mapping"
            )));
        }
        if self.upstream.request_timeout_secs == 0 || self.upstream.nonce_timeout_secs == 0 {
            return Err(BridgeError::Config("timeouts must be non-zero".into()));
        }
        if self.session.max_entries == 0 {
            return Err(BridgeError::Config(
                "session.max_entries must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

fn parse_env<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("Ignoring {key}={raw:?}: not a valid number");
            None
        }
    }
}
