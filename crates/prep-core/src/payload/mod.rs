//! Classification of finished assistant content.
//!
//! Fixed fallback order: quiz → explanation → general object → raw.

pub mod explanation;
pub mod general;

use serde_json::Value;

pub use explanation::{Explanation, ExplanationBody, KeyConcept};
pub use general::Block;

use crate::quiz::{self, PracticeSet};

/// `type` substrings that mark a practice set (matched case-insensitively).
const QUIZ_TAGS: &[&str] = &["mcq", "practice", "quiz", "multiple_choice_questions"];

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Quiz(PracticeSet),
    Explanation(Explanation),
    General(Vec<Block>),
    Text(String),
    /// Structured content with nothing displayable; shown as pretty JSON.
    Raw(Value),
}

impl Payload {
    /// Classifies one assistant payload.
    ///
    /// Strings that hold a JSON object or array are decoded first; any
    /// other string is plain text.
    pub fn classify(value: &Value) -> Self {
        match value {
            Value::String(text) => match parse_embedded_json(text) {
                Some(parsed) => Self::classify_structured(&parsed),
                None => Payload::Text(text.clone()),
            },
            Value::Null => Payload::Text(String::new()),
            Value::Bool(_) | Value::Number(_) => Payload::Text(value.to_string()),
            Value::Object(_) | Value::Array(_) => Self::classify_structured(value),
        }
    }

    fn classify_structured(value: &Value) -> Self {
        if is_quiz(value)
            && let Some(set) = PracticeSet::from_value(value)
        {
            return Payload::Quiz(set);
        }
        if let Some(explanation) = Explanation::from_value(value) {
            return Payload::Explanation(explanation);
        }
        let blocks = general::layout(value);
        if blocks.is_empty() {
            Payload::Raw(value.clone())
        } else {
            Payload::General(blocks)
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Quiz(_) => "quiz",
            Payload::Explanation(_) => "explanation",
            Payload::General(_) => "general",
            Payload::Text(_) => "text",
            Payload::Raw(_) => "raw",
        }
    }
}

/// Pretty-printed JSON for the raw fallback.
pub fn pretty_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn parse_embedded_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
        return None;
    }
    serde_json::from_str::<Value>(trimmed)
        .ok()
        .filter(|v| v.is_object() || v.is_array())
}

fn is_quiz(value: &Value) -> bool {
    let tagged = value
        .get("type")
        .and_then(Value::as_str)
        .map(str::to_ascii_lowercase)
        .is_some_and(|tag| QUIZ_TAGS.iter().any(|t| tag.contains(t)));
    tagged && quiz::questions_array(value).is_some()
}
