//! Best-effort rendering of structured content with no known tag.
//!
//! Objects become titled sections, arrays become enumerated lists and
//! bookkeeping keys are dropped.

use serde::Serialize;
use serde_json::{Map, Value};

const HIDDEN_KEYS: &[&str] = &[
    "metadata",
    "timestamp",
    "timestamps",
    "created_at",
    "updated_at",
    "type",
    "id",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Block {
    /// Section title; `level` starts at 1 for top-level keys.
    Heading { level: usize, text: String },
    Paragraph { text: String },
    /// Enumerated list entry (`n` is 1-based).
    Item { level: usize, n: usize, text: String },
}

/// Lays out `value` as blocks. Empty when nothing displayable remains.
pub fn layout(value: &Value) -> Vec<Block> {
    let mut blocks = Vec::new();
    match value {
        Value::Object(map) => layout_object(map, 1, &mut blocks),
        Value::Array(items) => layout_items(items, 1, &mut blocks),
        other => {
            let text = to_text(other);
            if !text.is_empty() {
                blocks.push(Block::Paragraph { text });
            }
        }
    }
    blocks
}

/// `key_concepts` → `Key Concepts`.
pub fn title_case(key: &str) -> String {
    key.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars).collect::<String>()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Flattens nested content into a single line.
pub fn to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        Value::Number(_) | Value::Bool(_) => value.to_string(),
        Value::Array(items) => items
            .iter()
            .map(to_text)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(map) => visible(map)
            .filter_map(|(key, value)| {
                let text = to_text(value);
                (!text.is_empty()).then(|| format!("{}: {text}", title_case(key)))
            })
            .collect::<Vec<_>>()
            .join("; "),
    }
}

fn visible(map: &Map<String, Value>) -> impl Iterator<Item = (&String, &Value)> {
    map.iter()
        .filter(|(key, _)| !HIDDEN_KEYS.contains(&key.as_str()))
}

fn layout_object(map: &Map<String, Value>, level: usize, blocks: &mut Vec<Block>) {
    for (key, value) in visible(map) {
        let mut section = Vec::new();
        match value {
            Value::Object(inner) => layout_object(inner, level + 1, &mut section),
            Value::Array(items) => layout_items(items, level, &mut section),
            other => {
                let text = to_text(other);
                if !text.is_empty() {
                    section.push(Block::Paragraph { text });
                }
            }
        }

        if !section.is_empty() {
            blocks.push(Block::Heading {
                level,
                text: title_case(key),
            });
            blocks.append(&mut section);
        }
    }
}

fn layout_items(items: &[Value], level: usize, blocks: &mut Vec<Block>) {
    let texts = items.iter().map(to_text).filter(|text| !text.is_empty());
    for (index, text) in texts.enumerate() {
        blocks.push(Block::Item {
            level,
            n: index + 1,
            text,
        });
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("key_concepts"), "Key Concepts");
        assert_eq!(title_case("study_plan__week"), "Study Plan Week");
        assert_eq!(title_case("summary"), "Summary");
    }

    #[test]
    fn test_layout_drops_bookkeeping_keys() {
        let blocks = layout(&json!({
            "type": "study_plan",
            "id": 42,
            "metadata": {"model": "x"},
            "created_at": "2024-01-01",
            "overview": "Four weeks of revision.",
            "weeks": ["Algebra", {"topic": "Geometry", "hours": 6}]
        }));

        assert_eq!(
            blocks,
            vec![
                Block::Heading {
                    level: 1,
                    text: "Overview".to_string()
                },
                Block::Paragraph {
                    text: "Four weeks of revision.".to_string()
                },
                Block::Heading {
                    level: 1,
                    text: "Weeks".to_string()
                },
                Block::Item {
                    level: 1,
                    n: 1,
                    text: "Algebra".to_string()
                },
                Block::Item {
                    level: 1,
                    n: 2,
                    text: "Hours: 6; Topic: Geometry".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_nested_objects_become_subsections() {
        let blocks = layout(&json!({"strategy": {"daily_goal": "2 mocks"}}));
        assert_eq!(
            blocks,
            vec![
                Block::Heading {
                    level: 1,
                    text: "Strategy".to_string()
                },
                Block::Heading {
                    level: 2,
                    text: "Daily Goal".to_string()
                },
                Block::Paragraph {
                    text: "2 mocks".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_only_hidden_keys_is_empty() {
        assert!(layout(&json!({"type": "x", "metadata": {}, "notes": null})).is_empty());
        assert!(layout(&json!([])).is_empty());
    }
}
