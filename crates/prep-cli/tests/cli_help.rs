use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

#[test]
fn test_help_shows_all_commands() {
    cargo_bin_cmd!("prep")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("chat"))
        .stdout(predicate::str::contains("ask"))
        .stdout(predicate::str::contains("login"))
        .stdout(predicate::str::contains("register"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_login_help_shows_force() {
    cargo_bin_cmd!("prep")
        .args(["login", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--phone"))
        .stdout(predicate::str::contains("--force"));
}

#[test]
fn test_version_flag() {
    cargo_bin_cmd!("prep")
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("prep"));
}

#[test]
fn test_actions_lists_quick_prompts() {
    cargo_bin_cmd!("prep")
        .arg("actions")
        .assert()
        .success()
        .stdout(predicate::str::contains("1. Explain Topics"))
        .stdout(predicate::str::contains("Time and Work"))
        .stdout(predicate::str::contains("8. Current GK"));
}

#[test]
fn test_ask_requires_a_query() {
    let home = tempfile::tempdir().unwrap();

    cargo_bin_cmd!("prep")
        .env("PREP_HOME", home.path())
        .arg("ask")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Nothing to ask"));
}
