//! Multiple-choice practice sets.
//!
//! Backends send questions in several shapes. Everything is normalized here,
//! at ingestion, into ordered `{id, text}` options plus a resolved correct
//! option id, so scoring is a plain id comparison.

pub mod engine;

use std::collections::HashSet;

use serde::Serialize;
use serde_json::{Map, Value};

pub use engine::{QuizEngine, QuizError, QuizPhase, Score};

const QUESTION_TEXT_KEYS: &[&str] = &["question", "text", "question_text", "prompt"];
const CORRECT_KEYS: &[&str] = &[
    "correctAnswer",
    "correct_answer",
    "correct_option",
    "answer",
    "correct",
];
const EXPLANATION_KEYS: &[&str] = &["explanation", "rationale", "solution"];
const OPTION_ID_KEYS: &[&str] = &["id", "key", "label", "letter"];
const OPTION_TEXT_KEYS: &[&str] = &["text", "option", "value", "content"];

/// How a question's correct answer is matched to its options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerStyle {
    /// Options carry their own ids and the correct answer names one.
    Identifier,
    /// Options are bare text; ids are synthesized `A, B, C, …`.
    Positional,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuizOption {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Question {
    pub id: String,
    pub text: String,
    pub options: Vec<QuizOption>,
    /// Resolved correct option id. `None` when the payload named an answer
    /// that matches no option; such a question can never be scored correct.
    pub correct: Option<String>,
    pub explanation: Option<String>,
    pub style: AnswerStyle,
}

impl Question {
    /// Normalizes one question object. `index` is its position in the set.
    pub fn from_value(index: usize, value: &Value) -> Self {
        let id = value
            .get("id")
            .and_then(scalar_to_string)
            .unwrap_or_else(|| format!("q{}", index + 1));
        let text = first_string(value, QUESTION_TEXT_KEYS).unwrap_or_default();
        let explanation = first_string(value, EXPLANATION_KEYS).filter(|s| !s.trim().is_empty());

        let raw_options = value.get("options").or_else(|| value.get("choices"));
        let (options, style) = normalize_options(raw_options);

        let declared = CORRECT_KEYS
            .iter()
            .find_map(|key| value.get(*key).and_then(scalar_to_string));
        let correct = declared
            .as_deref()
            .and_then(|answer| resolve_correct(&options, style, answer));
        if correct.is_none() {
            tracing::warn!(
                question = %id,
                answer = ?declared,
                "Correct answer does not match any option"
            );
        }

        Self {
            id,
            text,
            options,
            correct,
            explanation,
            style,
        }
    }

    pub fn option(&self, id: &str) -> Option<&QuizOption> {
        self.options.iter().find(|o| o.id == id)
    }

    pub fn is_correct(&self, option_id: &str) -> bool {
        self.correct.as_deref() == Some(option_id)
    }
}

/// A titled list of questions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PracticeSet {
    pub topic: Option<String>,
    pub questions: Vec<Question>,
}

impl PracticeSet {
    /// Heading shown when the payload has no topic.
    pub const DEFAULT_TOPIC: &str = "Practice Questions";

    /// Builds a set from a payload object with `questions` at the root or
    /// under `data`. Returns `None` when there are no questions.
    pub fn from_value(value: &Value) -> Option<Self> {
        let raw = questions_array(value)?;

        let mut seen = HashSet::new();
        let questions = raw
            .iter()
            .enumerate()
            .map(|(index, q)| {
                let mut question = Question::from_value(index, q);
                if !seen.insert(question.id.clone()) {
                    question.id = format!("q{}", index + 1);
                    seen.insert(question.id.clone());
                }
                question
            })
            .collect();

        let topic = ["topic", "title", "subject"].iter().find_map(|key| {
            value
                .get(*key)
                .or_else(|| value.pointer(&format!("/data/{key}")))
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        });

        Some(Self { topic, questions })
    }

    pub fn title(&self) -> &str {
        self.topic.as_deref().unwrap_or(Self::DEFAULT_TOPIC)
    }

    pub fn question(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }
}

/// Non-empty `questions` array at the root or under `data`.
pub(crate) fn questions_array(value: &Value) -> Option<&Vec<Value>> {
    value
        .get("questions")
        .or_else(|| value.pointer("/data/questions"))
        .and_then(Value::as_array)
        .filter(|questions| !questions.is_empty())
}

/// Letter id for a zero-based option position (`A`..`Z`, then `A27`, ...).
pub fn option_letter(position: usize) -> String {
    match u8::try_from(position) {
        Ok(p) if p < 26 => char::from(b'A' + p).to_string(),
        _ => format!("A{}", position + 1),
    }
}

fn normalize_options(raw: Option<&Value>) -> (Vec<QuizOption>, AnswerStyle) {
    match raw {
        Some(Value::Array(items)) => normalize_option_list(items),
        Some(Value::Object(map)) => (normalize_option_map(map), AnswerStyle::Identifier),
        _ => (Vec::new(), AnswerStyle::Positional),
    }
}

fn normalize_option_list(items: &[Value]) -> (Vec<QuizOption>, AnswerStyle) {
    let explicit: Option<Vec<QuizOption>> = items
        .iter()
        .map(|item| {
            let id = first_scalar(item, OPTION_ID_KEYS)?;
            let text = first_scalar(item, OPTION_TEXT_KEYS).unwrap_or_default();
            Some(QuizOption { id, text })
        })
        .collect();

    if let Some(options) = explicit {
        let unique: HashSet<_> = options.iter().map(|o| o.id.as_str()).collect();
        if unique.len() == options.len() {
            return (options, AnswerStyle::Identifier);
        }
    }

    let options = items
        .iter()
        .enumerate()
        .map(|(position, item)| QuizOption {
            id: option_letter(position),
            text: scalar_to_string(item)
                .or_else(|| first_scalar(item, OPTION_TEXT_KEYS))
                .unwrap_or_default(),
        })
        .collect();
    (options, AnswerStyle::Positional)
}

fn normalize_option_map(map: &Map<String, Value>) -> Vec<QuizOption> {
    map.iter()
        .map(|(id, text)| QuizOption {
            id: id.clone(),
            text: scalar_to_string(text).unwrap_or_default(),
        })
        .collect()
}

fn resolve_correct(options: &[QuizOption], style: AnswerStyle, answer: &str) -> Option<String> {
    let by_id_exact = || options.iter().find(|o| o.id == answer);
    let by_id_loose = || {
        options
            .iter()
            .find(|o| o.id.trim().eq_ignore_ascii_case(answer.trim()))
    };
    let by_text_exact = || options.iter().find(|o| o.text == answer);
    let by_text_trimmed = || options.iter().find(|o| o.text.trim() == answer.trim());

    let found = match style {
        AnswerStyle::Identifier => by_id_exact()
            .or_else(by_id_loose)
            .or_else(by_text_exact)
            .or_else(by_text_trimmed),
        AnswerStyle::Positional => by_text_exact()
            .or_else(by_text_trimmed)
            .or_else(by_id_loose),
    };
    found.map(|o| o.id.clone())
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn first_scalar(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| value.get(*key).and_then(scalar_to_string))
}

fn first_string(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}
