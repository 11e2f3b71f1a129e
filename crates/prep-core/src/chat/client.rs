//! `POST /chat` streaming client.

use std::fmt;

use futures_util::StreamExt;
use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
use serde::Serialize;

use crate::api::{ApiError, ApiResult, Backend, classify_reqwest_error};
use crate::stream::{ChatEvent, ChatStream};

/// Boxed stream of decoded chat events for one request.
pub type ChatEventStream = BoxStream<'static, ApiResult<ChatEvent>>;

/// Reasons a query is refused before (or instead of) opening a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    /// Query was empty after trimming.
    EmptyQuery,
    /// No valid session; no request is made.
    NotAuthenticated,
    /// The per-session query allowance is used up.
    QuotaExhausted,
    /// The request itself failed.
    Api(ApiError),
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendError::EmptyQuery => write!(f, "Query is empty"),
            SendError::NotAuthenticated => {
                write!(f, "Not logged in. Run `prep login --phone <number>` first.")
            }
            SendError::QuotaExhausted => write!(f, "You've reached your daily query limit"),
            SendError::Api(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for SendError {}

impl From<ApiError> for SendError {
    fn from(err: ApiError) -> Self {
        SendError::Api(err)
    }
}

/// Opens chat streams. The seam the chat driver is written against.
pub trait ChatTransport: Send + Sync + 'static {
    /// Synchronous gate checked before any request is spawned.
    fn ensure_ready(&self) -> Result<(), SendError> {
        Ok(())
    }

    /// Opens one streaming request for `query`.
    fn open(&self, query: String) -> BoxFuture<'static, Result<ChatEventStream, SendError>>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    query: &'a str,
}

/// HTTP transport against `{backend}/chat`.
#[derive(Debug, Clone)]
pub struct ChatClient {
    backend: Backend,
}

impl ChatClient {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }

    /// Sends `query` and returns the decoded event stream.
    ///
    /// Empty queries and unauthenticated sessions are rejected before any
    /// network call.
    pub async fn stream(&self, query: &str) -> Result<ChatEventStream, SendError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SendError::EmptyQuery);
        }
        self.ensure_ready()?;

        let builder = self
            .backend
            .post("/chat")
            .header("accept", "text/event-stream")
            .json(&ChatRequest { query });
        let builder = self.backend.authorize(builder)?;
        let response = self.backend.send(builder).await?;

        tracing::debug!(status = %response.status(), "chat stream opened");
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| classify_reqwest_error(&e)));
        Ok(ChatStream::new(Box::pin(body)).boxed())
    }
}

impl ChatTransport for ChatClient {
    fn ensure_ready(&self) -> Result<(), SendError> {
        if self.backend.session().is_authenticated() {
            Ok(())
        } else {
            Err(SendError::NotAuthenticated)
        }
    }

    fn open(&self, query: String) -> BoxFuture<'static, Result<ChatEventStream, SendError>> {
        let client = self.clone();
        Box::pin(async move { client.stream(&query).await })
    }
}
