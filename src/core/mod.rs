// src/core/mod.rs — Chat orchestration, sessions, context and streaming

pub mod chat;
pub mod context;
pub mod session;
pub mod stream;
pub mod types;
