// src/core/chat.rs — Request orchestration: validate, resolve session, exchange, emit
//
// Everything that can fail because of the caller (bad message list, unknown
// model) or because no nonce can be obtained is checked before a stream is
// opened and returned as an error. Once the stream is open, failures are
// written into it as a single error chunk.

use std::sync::Arc;

use futures::stream::BoxStream;
use futures::StreamExt;

use crate::core::context::build_prompt;
use crate::core::session::{new_upstream_session_id, Session, SessionStore};
use crate::core::stream::{StreamEmitter, StreamFrame};
use crate::core::types::{ChatCompletion, ChatCompletionRequest, ModelList, Role};
use crate::infra::config::Config;
use crate::infra::errors::BridgeError;
use crate::upstream::{self, NonceStore, UpstreamGateway};
use crate::util::unix_now;

/// A validated request, ready to be sent upstream.
#[derive(Debug, Clone)]
pub struct PreparedTurn {
    pub request_id: String,
    pub model: String,
    pub user_message: String,
    pub prompt: String,
    pub upstream_session_id: String,
    /// Present for stateful requests; updated after a successful exchange.
    pub session: Option<Session>,
}

pub struct ChatService {
    nonces: Arc<NonceStore>,
    gateway: UpstreamGateway,
    sessions: SessionStore,
    emitter: StreamEmitter,
    context_max_chars: usize,
    default_model: String,
    known_models: Vec<String>,
}

impl ChatService {
    pub fn new(
        nonces: Arc<NonceStore>,
        gateway: UpstreamGateway,
        sessions: SessionStore,
        emitter: StreamEmitter,
        config: &Config,
    ) -> Self {
        Self {
            nonces,
            gateway,
            sessions,
            emitter,
            context_max_chars: config.session.context_max_chars,
            default_model: config.models.default.clone(),
            known_models: config.models.known.clone(),
        }
    }

    /// Wire up the upstream client, nonce cache, gateway and session store.
    pub fn from_config(config: &Config) -> Result<Self, BridgeError> {
        let client = upstream::build_client(&config.upstream.user_agent)
            .map_err(|e| BridgeError::Config(format!("failed to build HTTP client: {e}")))?;

        let nonces = Arc::new(NonceStore::new(
            client.clone(),
            config.upstream.chat_page_url.clone(),
            config.upstream.nonce_timeout(),
        ));
        let gateway = UpstreamGateway::new(
            client,
            config.upstream.endpoint_url.clone(),
            config.upstream.request_timeout(),
            nonces.clone(),
        );
        let sessions = SessionStore::new(config.session.ttl(), config.session.max_entries);
        let emitter = StreamEmitter::new(config.stream.chunk_delay());

        Ok(Self::new(nonces, gateway, sessions, emitter, config))
    }

    pub fn nonces(&self) -> &NonceStore {
        &self.nonces
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn models(&self) -> ModelList {
        ModelList::new(&self.known_models, unix_now())
    }

    /// Validate `request` and make sure a nonce is available, then resolve
    /// the session and render the prompt.
    pub async fn prepare(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<PreparedTurn, BridgeError> {
        let last = match request.messages.last() {
            Some(m) if m.role == Role::User => m,
            _ => {
                return Err(BridgeError::InvalidRequest(
                    "'messages' must be non-empty and end with a user message".into(),
                ))
            }
        };

        let model = request
            .model
            .clone()
            .unwrap_or_else(|| self.default_model.clone());
        if upstream::upstream_model_id(&model).is_none() {
            return Err(BridgeError::InvalidModel(model));
        }

        self.nonces.get(false).await?;

        let user_message = last.content.to_text();
        let request_id = format!("chatcmpl-{}", uuid::Uuid::new_v4());

        let turn = match request.session_key() {
            Some(key) => {
                tracing::info!(key, "Stateful request");
                let mut session = self.sessions.get_or_create(key);
                let prompt =
                    build_prompt(&mut session.history, &user_message, self.context_max_chars);
                if prompt.was_truncated() {
                    // truncation is permanent even if this exchange fails
                    self.sessions.save(session.clone());
                }
                PreparedTurn {
                    request_id,
                    model,
                    prompt: prompt.text,
                    user_message,
                    upstream_session_id: session.upstream_session_id.clone(),
                    session: Some(session),
                }
            }
            None => {
                tracing::info!("Stateless request");
                PreparedTurn {
                    request_id,
                    model,
                    prompt: user_message.clone(),
                    user_message,
                    upstream_session_id: new_upstream_session_id(),
                    session: None,
                }
            }
        };

        Ok(turn)
    }

    /// Run the upstream exchange for `turn` and record it in the session on
    /// success. Failed exchanges leave the history untouched.
    pub async fn exchange(&self, turn: PreparedTurn) -> Result<String, BridgeError> {
        let answer = self
            .gateway
            .send(&turn.prompt, &turn.model, &turn.upstream_session_id)
            .await?;

        if let Some(mut session) = turn.session {
            session.record_exchange(turn.user_message, answer.clone());
            tracing::info!(key = %session.key, turns = session.history.len(), "Session updated");
            self.sessions.save(session);
        }

        Ok(answer)
    }

    /// Streaming completion. Errors returned here happen before the stream
    /// opens; later failures arrive as an error chunk inside the stream.
    pub async fn stream(
        self: &Arc<Self>,
        request: &ChatCompletionRequest,
    ) -> Result<BoxStream<'static, StreamFrame>, BridgeError> {
        let turn = self.prepare(request).await?;
        let service = Arc::clone(self);

        let frames = async_stream::stream! {
            let model = turn.model.clone();
            let request_id = turn.request_id.clone();

            match service.exchange(turn).await {
                Ok(answer) => {
                    let frames = service.emitter.emit(answer, model, request_id);
                    futures::pin_mut!(frames);
                    while let Some(frame) = frames.next().await {
                        yield frame;
                    }
                }
                Err(e) => {
                    tracing::error!(request_id = %request_id, "Exchange failed: {e}");
                    let message = format!("Error: {e}");
                    for frame in StreamEmitter::emit_error(message, &model, &request_id) {
                        yield frame;
                    }
                }
            }
        };
        Ok(frames.boxed())
    }

    /// Non-streaming completion.
    pub async fn complete(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletion, BridgeError> {
        let turn = self.prepare(request).await?;
        let request_id = turn.request_id.clone();
        let model = turn.model.clone();
        let answer = self.exchange(turn).await?;
        Ok(ChatCompletion::new(&request_id, &model, unix_now(), answer))
    }
}
