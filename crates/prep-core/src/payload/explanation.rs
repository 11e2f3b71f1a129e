//! Topic explanation payloads.

use serde::Serialize;
use serde_json::Value;

/// Keys whose presence under `content` marks an untagged explanation.
const BODY_KEYS: &[&str] = &["introduction", "explanation", "key_concepts"];

/// Keys a tagged explanation must carry under `content` to be rendered as one.
const TAGGED_BODY_KEYS: &[&str] = &[
    "introduction",
    "explanation",
    "key_concepts",
    "tips",
    "common_mistakes",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyConcept {
    pub title: String,
    pub explanation: Option<String>,
    pub examples: Vec<String>,
    pub formulas: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ExplanationBody {
    /// Introduction, falling back to the `explanation` prose.
    pub summary: Option<String>,
    pub key_concepts: Vec<KeyConcept>,
    pub tips: Vec<String>,
    pub common_mistakes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Explanation {
    pub topic: Option<String>,
    /// `None` when the payload was tagged as an explanation but carried no
    /// `content` object.
    pub body: Option<ExplanationBody>,
}

impl Explanation {
    pub const DEFAULT_TOPIC: &str = "Topic Explanation";
    pub const MISSING_CONTENT: &str = "Missing content in explanation";

    /// Recognizes an explanation: a `type` mentioning `explanation` with
    /// either no `content` or a `content` object holding explanation fields,
    /// or an untagged object whose `content` carries them.
    ///
    /// Any other shape returns `None` so it falls through to the generic
    /// layout.
    pub fn from_value(value: &Value) -> Option<Self> {
        let tagged = value
            .get("type")
            .and_then(Value::as_str)
            .is_some_and(|t| t.to_ascii_lowercase().contains("explanation"));

        let keys = if tagged { TAGGED_BODY_KEYS } else { BODY_KEYS };

        let body = match value.get("content") {
            None | Some(Value::Null) if tagged => None,
            Some(content) if has_any_key(content, keys) => Some(ExplanationBody::from_value(content)),
            _ => return None,
        };

        Some(Self {
            topic: value_as_trimmed_str(value, "topic").map(str::to_string),
            body,
        })
    }

    pub fn title(&self) -> &str {
        self.topic.as_deref().unwrap_or(Self::DEFAULT_TOPIC)
    }
}

impl ExplanationBody {
    fn from_value(content: &Value) -> Self {
        let summary = value_as_trimmed_str(content, "introduction")
            .or_else(|| value_as_trimmed_str(content, "explanation"))
            .map(str::to_string);

        let key_concepts = content
            .get("key_concepts")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(KeyConcept::from_value).collect())
            .unwrap_or_default();

        Self {
            summary,
            key_concepts,
            tips: value_as_string_list(content, "tips"),
            common_mistakes: value_as_string_list(content, "common_mistakes"),
        }
    }
}

impl KeyConcept {
    fn from_value(value: &Value) -> Option<Self> {
        if let Some(title) = value.as_str() {
            let title = title.trim();
            return (!title.is_empty()).then(|| Self {
                title: title.to_string(),
                explanation: None,
                examples: Vec::new(),
                formulas: Vec::new(),
            });
        }

        let title = value_as_trimmed_str(value, "title")
            .or_else(|| value_as_trimmed_str(value, "name"))?;
        Some(Self {
            title: title.to_string(),
            explanation: value_as_trimmed_str(value, "explanation").map(str::to_string),
            examples: value_as_string_list(value, "examples"),
            formulas: value_as_string_list(value, "formulas"),
        })
    }
}

fn has_any_key(content: &Value, keys: &[&str]) -> bool {
    content
        .as_object()
        .is_some_and(|map| keys.iter().any(|key| map.contains_key(*key)))
}

fn value_as_trimmed_str<'a>(input: &'a Value, key: &str) -> Option<&'a str> {
    let value = input.get(key)?.as_str()?.trim();
    (!value.is_empty()).then_some(value)
}

fn value_as_string_list(input: &Value, key: &str) -> Vec<String> {
    match input.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(_) | Value::Bool(_) => Some(item.to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(item)) => {
            let item = item.trim();
            if item.is_empty() {
                Vec::new()
            } else {
                vec![item.to_string()]
            }
        }
        _ => Vec::new(),
    }
}
