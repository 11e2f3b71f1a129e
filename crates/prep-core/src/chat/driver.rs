//! Request lifecycle for one conversation.
//!
//! Each query spawns a pump task that reads the event stream and forwards
//! tagged updates over an unbounded channel. All conversation mutation
//! happens in [`ChatDriver::next_update`], one update at a time, in arrival
//! order. Starting a new query cancels the previous pump and bumps the
//! request id; updates carrying an old id are dropped on receipt.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::actions::QueryQuota;
use super::client::{ChatTransport, SendError};
use super::conversation::Conversation;
use crate::stream::ChatEvent;

/// Turn text shown for any transport failure.
pub const GENERIC_ERROR: &str = "Sorry, I encountered an error. Please try again.";

pub type RequestId = u64;

#[derive(Debug)]
enum StreamUpdate {
    Event(ChatEvent),
    /// Open or read failure; the message is only logged.
    Failed(String),
    /// Body ended without a terminal event.
    Closed,
}

/// What one applied update did to the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    /// Text appended to the streaming buffer.
    Delta(String),
    /// A turn was committed at this index and the request finished.
    Committed(usize),
    /// The request finished without committing anything.
    Ended,
}

struct ActiveRequest {
    id: RequestId,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct ChatDriver {
    transport: Arc<dyn ChatTransport>,
    conversation: Conversation,
    quota: QueryQuota,
    last_id: RequestId,
    active: Option<ActiveRequest>,
    tx: mpsc::UnboundedSender<(RequestId, StreamUpdate)>,
    rx: mpsc::UnboundedReceiver<(RequestId, StreamUpdate)>,
}

impl ChatDriver {
    pub fn new(transport: Arc<dyn ChatTransport>, quota: QueryQuota) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            transport,
            conversation: Conversation::new(),
            quota,
            last_id: 0,
            active: None,
            tx,
            rx,
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn quota(&self) -> QueryQuota {
        self.quota
    }

    pub fn is_busy(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_request(&self) -> Option<RequestId> {
        self.active.as_ref().map(|a| a.id)
    }

    /// Starts a request for `query`, cancelling any request in flight.
    ///
    /// Rejections leave the conversation and the running request untouched.
    pub fn send(&mut self, query: &str) -> Result<RequestId, SendError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SendError::EmptyQuery);
        }
        self.transport.ensure_ready()?;
        if self.quota.is_exhausted() {
            return Err(SendError::QuotaExhausted);
        }

        self.cancel();
        self.conversation.append_user_turn(query);
        self.quota.consume();
        self.conversation.begin_request();

        self.last_id += 1;
        let id = self.last_id;
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(pump(
            Arc::clone(&self.transport),
            query.to_string(),
            id,
            cancel.clone(),
            self.tx.clone(),
        ));
        tracing::info!(request = id, remaining = self.quota.remaining, "chat request started");

        self.active = Some(ActiveRequest { id, cancel, handle });
        Ok(id)
    }

    /// Cancels the request in flight, discarding its streamed text.
    /// Returns `false` when idle.
    pub fn cancel(&mut self) -> bool {
        let Some(active) = self.active.take() else {
            return false;
        };
        active.cancel.cancel();
        self.conversation.end_request();
        tracing::info!(request = active.id, "chat request cancelled");
        true
    }

    /// Waits for and applies the next update of the active request.
    ///
    /// Returns `None` when no request is in flight.
    pub async fn next_update(&mut self) -> Option<Progress> {
        loop {
            let active_id = self.active_request()?;
            let (id, update) = self.rx.recv().await?;
            if id != active_id {
                tracing::debug!(request = id, "dropping update from cancelled request");
                continue;
            }
            return Some(self.apply(update));
        }
    }

    fn apply(&mut self, update: StreamUpdate) -> Progress {
        match update {
            StreamUpdate::Event(ChatEvent::Chunk { content }) => {
                self.conversation.on_chunk(&content);
                Progress::Delta(content)
            }
            StreamUpdate::Event(ChatEvent::Final { content }) => {
                let index = self.conversation.on_final(content);
                self.finish();
                Progress::Committed(index)
            }
            StreamUpdate::Event(ChatEvent::Error { content }) => {
                tracing::warn!(message = %content, "server reported an error");
                let index = self.conversation.on_error(content);
                self.finish();
                Progress::Committed(index)
            }
            StreamUpdate::Failed(message) => {
                tracing::warn!(%message, "chat request failed");
                let index = self.conversation.on_error(GENERIC_ERROR);
                self.finish();
                Progress::Committed(index)
            }
            StreamUpdate::Closed => {
                let committed = self.conversation.commit_partial();
                self.finish();
                committed.map_or(Progress::Ended, Progress::Committed)
            }
        }
    }

    fn finish(&mut self) {
        if let Some(active) = self.active.take() {
            active.cancel.cancel();
            drop(active.handle);
        }
        self.conversation.end_request();
    }
}

impl Drop for ChatDriver {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.cancel.cancel();
        }
    }
}

impl std::fmt::Debug for ChatDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatDriver")
            .field("turns", &self.conversation.turns().len())
            .field("quota", &self.quota)
            .field("active", &self.active_request())
            .finish_non_exhaustive()
    }
}

async fn pump(
    transport: Arc<dyn ChatTransport>,
    query: String,
    id: RequestId,
    cancel: CancellationToken,
    tx: mpsc::UnboundedSender<(RequestId, StreamUpdate)>,
) {
    let work = async {
        let mut events = match transport.open(query).await {
            Ok(events) => events,
            Err(err) => {
                let _ = tx.send((id, StreamUpdate::Failed(err.to_string())));
                return;
            }
        };

        while let Some(item) = events.next().await {
            match item {
                Ok(event) => {
                    let terminal = event.is_terminal();
                    if tx.send((id, StreamUpdate::Event(event))).is_err() || terminal {
                        return;
                    }
                }
                Err(err) => {
                    let _ = tx.send((id, StreamUpdate::Failed(err.to_string())));
                    return;
                }
            }
        }
        let _ = tx.send((id, StreamUpdate::Closed));
    };

    tokio::select! {
        () = cancel.cancelled() => {}
        () = work => {}
    }
}
