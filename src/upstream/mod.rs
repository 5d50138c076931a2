// src/upstream/mod.rs — kimi-ai.chat upstream: nonce scraping and the AJAX chat call

pub mod gateway;
pub mod nonce;

pub use gateway::UpstreamGateway;
pub use nonce::NonceStore;

/// Public model name → identifier expected by the upstream AJAX endpoint.
const MODEL_TABLE: &[(&str, &str)] = &[
    ("kimi-k2-instruct-0905", "moonshotai/Kimi-K2-Instruct-0905"),
    ("kimi-k2-instruct", "moonshotai/Kimi-K2-Instruct"),
];

/// Map a public model name to the upstream identifier.
pub fn upstream_model_id(model: &str) -> Option<&'static str> {
    MODEL_TABLE
        .iter()
        .find(|(public, _)| *public == model)
        .map(|(_, upstream)| *upstream)
}

/// Build the shared HTTP client used for both the page scrape and the chat call.
pub fn build_client(user_agent: &str) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder().user_agent(user_agent).build()
}
