//! Conversation state: committed turns plus the in-flight streaming buffer.
//!
//! Turns are append-only. Streamed text lives in one separate buffer until
//! a `final` or `error` commits a turn and clears it in the same mutation.

use serde::Serialize;
use serde_json::Value;

use crate::payload::Payload;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum TurnContent {
    Text(String),
    /// Structured assistant content, classified at render time.
    Payload(Value),
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Turn {
    pub role: Role,
    pub content: TurnContent,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: TurnContent::Text(text.into()),
        }
    }

    /// Assistant turn from a `final` payload. Strings are kept verbatim.
    pub fn assistant(content: Value) -> Self {
        let content = match content {
            Value::String(text) => TurnContent::Text(text),
            other => TurnContent::Payload(other),
        };
        Self {
            role: Role::Assistant,
            content,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: TurnContent::Error(message.into()),
        }
    }

    /// Typed view of the content. `None` for error turns.
    pub fn payload(&self) -> Option<Payload> {
        match &self.content {
            TurnContent::Text(text) if self.role == Role::Assistant => {
                Some(Payload::classify(&Value::String(text.clone())))
            }
            TurnContent::Text(text) => Some(Payload::Text(text.clone())),
            TurnContent::Payload(value) => Some(Payload::classify(value)),
            TurnContent::Error(_) => None,
        }
    }
}

/// Accumulated text of the active stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamState {
    pub text: String,
    pub active: bool,
}

/// One renderable row, in display order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewItem<'a> {
    Turn(&'a Turn),
    /// Non-empty streaming buffer (rendered with a trailing cursor).
    Streaming(&'a str),
    /// Shown only while loading with nothing streamed yet.
    Loading,
}

#[derive(Debug, Default)]
pub struct Conversation {
    turns: Vec<Turn>,
    stream: StreamState,
    loading: bool,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty() && self.stream.text.is_empty()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    #[cfg(test)]
    fn stream(&self) -> &StreamState {
        &self.stream
    }

    /// The streaming buffer, when it holds anything.
    pub fn streaming_text(&self) -> Option<&str> {
        (!self.stream.text.is_empty()).then_some(self.stream.text.as_str())
    }

    /// Pushes a user turn; returns its index.
    pub fn append_user_turn(&mut self, text: impl Into<String>) -> usize {
        self.push(Turn::user(text))
    }

    /// Marks a request in flight with an empty buffer.
    pub fn begin_request(&mut self) {
        self.stream = StreamState {
            text: String::new(),
            active: true,
        };
        self.loading = true;
    }

    pub fn on_chunk(&mut self, text: &str) {
        self.stream.text.push_str(text);
    }

    /// Commits the final payload and clears the buffer.
    pub fn on_final(&mut self, content: Value) -> usize {
        self.stream.text.clear();
        self.push(Turn::assistant(content))
    }

    /// Commits an error turn and clears the buffer.
    pub fn on_error(&mut self, message: impl Into<String>) -> usize {
        self.stream.text.clear();
        self.push(Turn::error(message))
    }

    /// Commits whatever streamed so far as a text turn (stream closed
    /// without a `final`). Returns `None` when nothing was buffered.
    pub fn commit_partial(&mut self) -> Option<usize> {
        if self.stream.text.is_empty() {
            return None;
        }
        let text = std::mem::take(&mut self.stream.text);
        Some(self.push(Turn::assistant(Value::String(text))))
    }

    /// Ends the current request. Returns `true` only for the call that
    /// actually cleared the loading flag.
    pub fn end_request(&mut self) -> bool {
        self.stream = StreamState::default();
        std::mem::take(&mut self.loading)
    }

    /// Rows in display order: turns, then the buffer, then the indicator.
    pub fn view(&self) -> Vec<ViewItem<'_>> {
        let mut items: Vec<_> = self.turns.iter().map(ViewItem::Turn).collect();
        if let Some(text) = self.streaming_text() {
            items.push(ViewItem::Streaming(text));
        } else if self.loading {
            items.push(ViewItem::Loading);
        }
        items
    }

    fn push(&mut self, turn: Turn) -> usize {
        self.turns.push(turn);
        self.turns.len() - 1
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_chunks_then_final_commit_exactly() {
        let mut conversation = Conversation::new();
        conversation.append_user_turn("What is 2+2?");
        conversation.begin_request();
        conversation.on_chunk("The ");
        conversation.on_chunk("answer is 4.");
        assert_eq!(conversation.streaming_text(), Some("The answer is 4."));

        let index = conversation.on_final(json!("The answer is 4."));
        assert!(conversation.end_request());

        assert_eq!(index, 1);
        assert_eq!(
            conversation.turns()[1],
            Turn {
                role: Role::Assistant,
                content: TurnContent::Text("The answer is 4.".to_string())
            }
        );
        assert_eq!(conversation.streaming_text(), None);
        assert!(!conversation.is_loading());
    }

    #[test]
    fn test_structured_final_is_kept_as_payload() {
        let mut conversation = Conversation::new();
        conversation.begin_request();
        conversation.on_chunk("{\"type\":");
        let payload = json!({"type": "practice", "questions": []});
        conversation.on_final(payload.clone());

        assert_eq!(
            conversation.turns()[0].content,
            TurnContent::Payload(payload)
        );
        assert_eq!(conversation.streaming_text(), None);
    }

    #[test]
    fn test_error_turn_clears_buffer() {
        let mut conversation = Conversation::new();
        conversation.begin_request();
        conversation.on_chunk("partial");
        conversation.on_error("Rate limit exceeded");
        assert!(conversation.end_request());

        assert_eq!(conversation.turns().len(), 1);
        assert_eq!(
            conversation.turns()[0],
            Turn::error("Rate limit exceeded")
        );
        assert!(conversation.turns()[0].payload().is_none());
        assert_eq!(conversation.streaming_text(), None);
    }

    #[test]
    fn test_loading_clears_exactly_once() {
        let mut conversation = Conversation::new();
        assert!(!conversation.end_request());
        conversation.begin_request();
        assert!(conversation.stream().active);
        assert!(conversation.end_request());
        assert!(!conversation.stream().active);
        assert!(!conversation.end_request());
    }

    #[test]
    fn test_view_order_and_loading_indicator() {
        let mut conversation = Conversation::new();
        assert!(conversation.view().is_empty());

        conversation.append_user_turn("hi");
        conversation.begin_request();
        assert!(matches!(
            conversation.view().as_slice(),
            [ViewItem::Turn(_), ViewItem::Loading]
        ));

        conversation.on_chunk("Hel");
        assert!(matches!(
            conversation.view().as_slice(),
            [ViewItem::Turn(_), ViewItem::Streaming("Hel")]
        ));

        conversation.on_final(json!("Hello"));
        conversation.end_request();
        assert!(matches!(
            conversation.view().as_slice(),
            [ViewItem::Turn(_), ViewItem::Turn(_)]
        ));
    }

    #[test]
    fn test_commit_partial() {
        let mut conversation = Conversation::new();
        conversation.begin_request();
        assert_eq!(conversation.commit_partial(), None);

        conversation.on_chunk("cut ");
        conversation.on_chunk("off");
        assert_eq!(conversation.commit_partial(), Some(0));
        assert_eq!(
            conversation.turns()[0].content,
            TurnContent::Text("cut off".to_string())
        );
    }

    #[test]
    fn test_assistant_text_turn_decodes_embedded_json() {
        let turn = Turn::assistant(json!(
            "{\"type\":\"mcq\",\"questions\":[{\"question\":\"?\",\"options\":[\"a\"],\"answer\":\"a\"}]}"
        ));
        assert_eq!(turn.payload().map(|p| p.kind()), Some("quiz"));
        assert_eq!(
            Turn::user("{\"type\":\"mcq\"}").payload().map(|p| p.kind()),
            Some("text")
        );
    }
}
