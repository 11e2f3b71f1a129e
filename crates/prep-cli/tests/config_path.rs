use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::tempdir;

#[test]
fn test_config_path_command() {
    let dir = tempdir().unwrap();

    cargo_bin_cmd!("prep")
        .env("PREP_HOME", dir.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_init_creates_file() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("config.toml");

    cargo_bin_cmd!("prep")
        .env("PREP_HOME", dir.path())
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created config at"));

    let contents = fs::read_to_string(&config_path).unwrap();
    assert!(contents.contains("backend_url ="));
    assert!(contents.contains("daily_query_limit = 10"));
}

#[test]
fn test_config_init_fails_if_exists() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("config.toml"), "# existing config").unwrap();

    cargo_bin_cmd!("prep")
        .env("PREP_HOME", dir.path())
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_set_backend_keeps_comments() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("config.toml");
    fs::write(&config_path, "# my settings\ndaily_query_limit = 5\n").unwrap();

    cargo_bin_cmd!("prep")
        .env("PREP_HOME", dir.path())
        .args(["config", "set-backend", "https://prep.example.com/api"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Backend set to https://prep.example.com/api",
        ));

    let contents = fs::read_to_string(&config_path).unwrap();
    assert!(contents.contains("# my settings"));
    assert!(contents.contains("daily_query_limit = 5"));
    assert!(contents.contains(r#"backend_url = "https://prep.example.com/api""#));
}

#[test]
fn test_invalid_config_reports_error() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("config.toml"), "daily_query_limit = \"lots\"").unwrap();

    cargo_bin_cmd!("prep")
        .env("PREP_HOME", dir.path())
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("load config"));
}
