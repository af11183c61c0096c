//! Binary surface tests.

use assert_cmd::Command;
use predicates::prelude::*;

fn stackherd() -> Command {
    Command::cargo_bin("stackherd").expect("binary builds")
}

#[test]
fn help_lists_subcommands() {
    stackherd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("monitor"));
}

#[test]
fn missing_config_is_fatal() {
    stackherd()
        .args(["--config", "/nonexistent/stack-config.yml", "check"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration error"));
}

#[test]
fn unknown_config_key_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("stack-config.yml");
    std::fs::write(&config, "stacks:\n  a/compose.yml:\n    enbaled: true\n").unwrap();

    stackherd()
        .args(["--config", config.to_str().unwrap(), "status"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration error"));
}

#[test]
fn status_with_no_stacks_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("stack-config.yml");
    std::fs::write(&config, "stacks: {}\n").unwrap();

    stackherd()
        .args(["--config", config.to_str().unwrap(), "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Stacks: 0/0 running"));
}

#[test]
fn check_with_no_stacks_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("stack-config.yml");
    std::fs::write(&config, "stacks: {}\n").unwrap();

    stackherd()
        .args(["--config", config.to_str().unwrap(), "check"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No stacks configured"));
}
