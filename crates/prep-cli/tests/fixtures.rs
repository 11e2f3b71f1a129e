//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::fs;

use serde_json::{Value, json};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const SESSION_JSON: &str =
    r#"{"token":"test-token","expires_at":"2099-01-01T00:00:00Z","user":{"name":"Lova"}}"#;

/// A PREP_HOME with no config and no session.
pub fn empty_home() -> TempDir {
    tempfile::tempdir().unwrap()
}

/// A PREP_HOME holding an unexpired session.
pub fn logged_in_home() -> TempDir {
    let home = empty_home();
    fs::write(home.path().join("session.json"), SESSION_JSON).unwrap();
    home
}

/// Event-stream body with one `data: ` line per event.
pub fn sse_body(events: &[Value]) -> String {
    events.iter().map(|event| format!("data: {event}\n\n")).collect()
}

pub fn sse_response(events: &[Value]) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_string(sse_body(events))
}

pub fn chunk(text: &str) -> Value {
    json!({"type": "chunk", "content": text})
}

pub fn final_event(content: Value) -> Value {
    json!({"type": "final", "content": content})
}

pub fn error_event(message: &str) -> Value {
    json!({"type": "error", "content": message})
}

/// Accepts the session monitor's checks.
pub async fn mount_session_ok(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/auth/verify-session"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"valid": true})))
        .mount(server)
        .await;
}
