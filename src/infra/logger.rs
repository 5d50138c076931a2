// src/infra/logger.rs — Structured logging with tracing

use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable checked after RUST_LOG.
const LOG_ENV: &str = "KIMI2API_LOG";

/// Install the global subscriber. `RUST_LOG` wins, then `KIMI2API_LOG`,
/// then the level passed in (usually from the CLI).
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_from_env(LOG_ENV))
        .unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
