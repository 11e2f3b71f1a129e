//! Chat event stream: wire records and the byte-stream adapter.

pub mod decoder;

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::Stream;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub use decoder::{DATA_PREFIX, Line, LineDecoder};

use crate::api::{ApiError, ApiErrorKind, ApiResult};

/// One event record from the chat stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// Incremental text fragment to append to the streaming buffer.
    Chunk { content: String },
    /// Complete assistant message: plain text or a structured payload.
    Final {
        #[serde(default)]
        content: Value,
    },
    /// Terminal failure message from the server.
    Error {
        #[serde(deserialize_with = "text_or_json")]
        content: String,
    },
}

impl ChatEvent {
    /// `final` and `error` end the request.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ChatEvent::Chunk { .. })
    }
}

/// Accepts a string as-is and renders any other JSON value as text.
fn text_or_json<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Adapts a response byte stream into decoded [`ChatEvent`]s.
///
/// Malformed and unknown records are logged and skipped. A body read error
/// is yielded once as `Err`, after which the stream ends.
pub struct ChatStream<S> {
    inner: S,
    decoder: LineDecoder,
    ready: VecDeque<ChatEvent>,
    done: bool,
}

impl<S> ChatStream<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            decoder: LineDecoder::new(),
            ready: VecDeque::new(),
            done: false,
        }
    }

    fn accept(&mut self, line: Line) {
        match line {
            Line::Event(event) => {
                tracing::debug!(?event, "chat event");
                self.ready.push_back(event);
            }
            Line::Malformed { line, error } => {
                tracing::warn!(%error, %line, "Skipping malformed stream record");
            }
            Line::Ignored => {}
        }
    }
}

impl<S, E> Stream for ChatStream<S>
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Unpin,
    E: std::error::Error + Send + Sync + 'static,
{
    type Item = ApiResult<ChatEvent>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if let Some(event) = this.ready.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }
            if this.done {
                return Poll::Ready(None);
            }

            match Pin::new(&mut this.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    for line in this.decoder.push(&bytes) {
                        this.accept(line);
                    }
                }
                Poll::Ready(Some(Err(err))) => {
                    this.done = true;
                    return Poll::Ready(Some(Err(ApiError::new(
                        ApiErrorKind::Connect,
                        format!("Failed to read response body: {err}"),
                    ))));
                }
                Poll::Ready(None) => {
                    this.done = true;
                    if let Some(line) = this.decoder.finish() {
                        this.accept(line);
                    }
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
