//! Integration tests for streamed replies in `ask` and `chat`.

mod fixtures;

use assert_cmd::cargo::cargo_bin_cmd;
use fixtures::{
    chunk, empty_home, error_event, final_event, logged_in_home, mount_session_ok, sse_response,
};
use predicates::prelude::*;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_ask_streams_answer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(header("authorization", "Bearer test-token"))
        .and(body_json(json!({"query": "What is 2 + 2?"})))
        .respond_with(sse_response(&[
            chunk("The answer "),
            chunk("is 4."),
            final_event(json!("The answer is 4.")),
        ]))
        .expect(1)
        .mount(&server)
        .await;

    let home = logged_in_home();
    cargo_bin_cmd!("prep")
        .env("PREP_HOME", home.path())
        .env("PREP_BACKEND_URL", server.uri())
        .args(["ask", "-p", "What is 2 + 2?"])
        .assert()
        .success()
        .stdout(predicate::str::contains("The answer is 4."));
}

#[tokio::test]
async fn test_ask_with_quick_action() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(body_json(json!({"query": "Generate practice MCQs on Time and Work"})))
        .respond_with(sse_response(&[final_event(json!("Here you go."))]))
        .expect(1)
        .mount(&server)
        .await;

    let home = logged_in_home();
    cargo_bin_cmd!("prep")
        .env("PREP_HOME", home.path())
        .env("PREP_BACKEND_URL", server.uri())
        .args(["ask", "--action", "practice-mcqs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Here you go."));
}

#[tokio::test]
async fn test_ask_renders_explanation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(sse_response(&[final_event(json!({
            "type": "explanation",
            "topic": "Percentage",
            "content": {
                "introduction": "A fraction of 100.",
                "key_concepts": [
                    {"title": "Increase", "explanation": "New over old.", "formulas": ["(N-O)/O x 100"]}
                ],
                "tips": ["Memorise 1/8 = 12.5%"]
            }
        }))]))
        .mount(&server)
        .await;

    let home = logged_in_home();
    cargo_bin_cmd!("prep")
        .env("PREP_HOME", home.path())
        .env("PREP_BACKEND_URL", server.uri())
        .args(["ask", "-p", "percentages"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Percentage"))
        .stdout(predicate::str::contains("A fraction of 100."))
        .stdout(predicate::str::contains("Pro Tips:"));
}

#[tokio::test]
async fn test_ask_server_error_event_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(sse_response(&[
            chunk("partial"),
            error_event("Rate limit exceeded"),
        ]))
        .mount(&server)
        .await;

    let home = logged_in_home();
    cargo_bin_cmd!("prep")
        .env("PREP_HOME", home.path())
        .env("PREP_BACKEND_URL", server.uri())
        .args(["ask", "-p", "hello"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Error: Rate limit exceeded"))
        .stderr(predicate::str::contains("Rate limit exceeded"));
}

#[tokio::test]
async fn test_ask_http_failure_shows_generic_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let home = logged_in_home();
    cargo_bin_cmd!("prep")
        .env("PREP_HOME", home.path())
        .env("PREP_BACKEND_URL", server.uri())
        .args(["ask", "-p", "hello"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "Sorry, I encountered an error. Please try again.",
        ));
}

#[tokio::test]
async fn test_ask_requires_login() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(sse_response(&[final_event(json!("unreachable"))]))
        .expect(0)
        .mount(&server)
        .await;

    let home = empty_home();
    cargo_bin_cmd!("prep")
        .env("PREP_HOME", home.path())
        .env("PREP_BACKEND_URL", server.uri())
        .args(["ask", "-p", "hello"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not logged in"));
}

#[tokio::test]
async fn test_chat_responds_and_exits_on_quit() {
    let server = MockServer::start().await;
    mount_session_ok(&server).await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(body_json(json!({"query": "hi"})))
        .respond_with(sse_response(&[
            chunk("Hello there!"),
            final_event(json!("Hello there!")),
        ]))
        .expect(1)
        .mount(&server)
        .await;

    let home = logged_in_home();
    cargo_bin_cmd!("prep")
        .env("PREP_HOME", home.path())
        .env("PREP_BACKEND_URL", server.uri())
        .arg("chat")
        .write_stdin("\n\nhi\n:q\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Welcome to SSC CGL Preparation Assistant"))
        .stdout(predicate::str::contains("Hello there!"))
        .stdout(predicate::str::contains("9 / 10 queries left today"))
        .stdout(predicate::str::contains("Goodbye!"));
}

#[tokio::test]
async fn test_chat_quiz_flow() {
    let server = MockServer::start().await;
    mount_session_ok(&server).await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(sse_response(&[final_event(json!({
            "type": "mcq",
            "topic": "Arithmetic",
            "questions": [
                {"question": "2 + 2?", "options": ["3", "4"], "correct_answer": "4"}
            ]
        }))]))
        .expect(1)
        .mount(&server)
        .await;

    let home = logged_in_home();
    cargo_bin_cmd!("prep")
        .env("PREP_HOME", home.path())
        .env("PREP_BACKEND_URL", server.uri())
        .arg("chat")
        .write_stdin("give me a question\n1 B\nsubmit\n:q\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Arithmetic"))
        .stdout(predicate::str::contains("Question 1: B"))
        .stdout(predicate::str::contains("Question 1 [Correct]"))
        .stdout(predicate::str::contains(
            "You got 1 out of 1 questions correct! (100%)",
        ));
}

#[tokio::test]
async fn test_chat_shows_server_error() {
    let server = MockServer::start().await;
    mount_session_ok(&server).await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(sse_response(&[error_event("Rate limit exceeded")]))
        .mount(&server)
        .await;

    let home = logged_in_home();
    cargo_bin_cmd!("prep")
        .env("PREP_HOME", home.path())
        .env("PREP_BACKEND_URL", server.uri())
        .arg("chat")
        .write_stdin("hello\n:q\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Error: Rate limit exceeded"))
        .stdout(predicate::str::contains("Goodbye!"));
}

#[tokio::test]
async fn test_chat_stops_at_quota() {
    let server = MockServer::start().await;
    mount_session_ok(&server).await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(sse_response(&[final_event(json!("ok"))]))
        .expect(1)
        .mount(&server)
        .await;

    let home = logged_in_home();
    std::fs::write(home.path().join("config.toml"), "daily_query_limit = 1\n").unwrap();
    cargo_bin_cmd!("prep")
        .env("PREP_HOME", home.path())
        .env("PREP_BACKEND_URL", server.uri())
        .arg("chat")
        .write_stdin("first\nsecond\n:q\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("0 / 1 queries left today"))
        .stdout(predicate::str::contains("You've reached your daily query limit"));
}

#[test]
fn test_chat_requires_login() {
    let home = empty_home();
    cargo_bin_cmd!("prep")
        .env("PREP_HOME", home.path())
        .arg("chat")
        .write_stdin(":q\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not logged in"));
}
