//! Chat pipeline: HTTP client, conversation accumulator and request driver.

pub mod actions;
pub mod client;
pub mod conversation;
pub mod driver;

pub use actions::{QUICK_ACTIONS, QueryQuota, QuickAction, find_action};
pub use client::{ChatClient, ChatEventStream, ChatTransport, SendError};
pub use conversation::{Conversation, Role, StreamState, Turn, TurnContent, ViewItem};
pub use driver::{ChatDriver, GENERIC_ERROR, Progress, RequestId};
