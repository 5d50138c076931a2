// src/core/stream.rs — Pseudo-streaming of a complete answer
//
// The upstream returns the whole answer at once. The emitter replays it one
// character per chunk with a fixed delay, then a stop chunk and the [DONE]
// marker. Streams are lazy: dropping one (client gone) stops the replay at the
// next await.

use std::time::Duration;

use futures::Stream;

use crate::core::types::ChatCompletionChunk;
use crate::util::unix_now;

/// Literal payload of the terminal SSE frame.
pub const DONE_MARKER: &str = "[DONE]";

/// One frame of the outbound event stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamFrame {
    Chunk(ChatCompletionChunk),
    Done,
}

impl StreamFrame {
    /// The `data:` payload of this frame.
    pub fn data(&self) -> String {
        match self {
            StreamFrame::Chunk(chunk) => {
                serde_json::to_string(chunk).unwrap_or_else(|_| "{}".into())
            }
            StreamFrame::Done => DONE_MARKER.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StreamEmitter {
    delay: Duration,
}

impl StreamEmitter {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// Replay `answer` as content chunks, then a stop chunk, then `Done`.
    pub fn emit(
        &self,
        answer: String,
        model: String,
        request_id: String,
    ) -> impl Stream<Item = StreamFrame> + Send + 'static {
        let delay = self.delay;
        let created = unix_now();

        async_stream::stream! {
            for ch in answer.chars() {
                yield StreamFrame::Chunk(ChatCompletionChunk::new(
                    &request_id,
                    &model,
                    created,
                    Some(ch.to_string()),
                    None,
                ));
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }

            yield StreamFrame::Chunk(ChatCompletionChunk::new(
                &request_id, &model, created, None, Some("stop"),
            ));
            yield StreamFrame::Done;
        }
    }

    /// A failure encoded as stream content: one terminal chunk carrying the
    /// message, then `Done`.
    pub fn emit_error(message: String, model: &str, request_id: &str) -> [StreamFrame; 2] {
        [
            StreamFrame::Chunk(ChatCompletionChunk::new(
                request_id,
                model,
                unix_now(),
                Some(message),
                Some("stop"),
            )),
            StreamFrame::Done,
        ]
    }
}
