use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use std::path::PathBuf;

#[allow(deprecated)]
fn get_waypoint_bin() -> PathBuf {
    assert_cmd::cargo::cargo_bin("waypoint")
}

/// A command isolated from the caller's home directory and API keys.
fn waypoint(home: &tempfile::TempDir) -> Command {
    let mut cmd = Command::new(get_waypoint_bin());
    cmd.env("HOME", home.path())
        .env_remove("OPENAI_API_KEY")
        .env_remove("GROQ_API_KEY");
    cmd
}

#[test]
fn test_help_lists_commands() {
    let home = tempfile::tempdir().unwrap();
    waypoint(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("map"))
        .stdout(predicate::str::contains("completion"));
}

#[test]
fn test_run_help_lists_flags() {
    let home = tempfile::tempdir().unwrap();
    waypoint(&home)
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--max-iterations"))
        .stdout(predicate::str::contains("--no-completion-check"))
        .stdout(predicate::str::contains("--credentials"))
        .stdout(predicate::str::contains("--headless"));
}

#[test]
fn test_run_requires_message() {
    let home = tempfile::tempdir().unwrap();
    waypoint(&home)
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("MESSAGE"));
}

#[test]
fn test_run_without_api_key_fails() {
    let home = tempfile::tempdir().unwrap();
    waypoint(&home)
        .args(["run", "search for rust", "--url", "example.com"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("OPENAI_API_KEY"));
}

#[test]
fn test_run_without_groq_key_names_groq_variable() {
    let home = tempfile::tempdir().unwrap();
    waypoint(&home)
        .args(["run", "search", "--provider", "groq", "--url", "example.com"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("GROQ_API_KEY"));
}

#[test]
fn test_run_rejects_invalid_config_file() {
    let home = tempfile::tempdir().unwrap();
    let mut config = tempfile::NamedTempFile::new().unwrap();
    write!(config, "{{ not json").unwrap();

    waypoint(&home)
        .args(["run", "search", "--url", "example.com", "--api-key", "sk-test"])
        .arg("--config")
        .arg(config.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("config"));
}

#[test]
fn test_run_rejects_zero_iterations() {
    let home = tempfile::tempdir().unwrap();
    waypoint(&home)
        .args(["run", "search", "--url", "example.com", "--max-iterations", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("max_iterations"));
}

#[test]
fn test_run_rejects_malformed_credentials() {
    let home = tempfile::tempdir().unwrap();
    let mut credentials = tempfile::NamedTempFile::new().unwrap();
    write!(credentials, "[{{\"host\": \"example.com\"}}]").unwrap();

    waypoint(&home)
        .args(["run", "log in", "--url", "example.com", "--api-key", "sk-test"])
        .arg("--credentials")
        .arg(credentials.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load credentials"));
}

#[test]
fn test_profile_and_temp_conflict() {
    let home = tempfile::tempdir().unwrap();
    waypoint(&home)
        .args(["map", "example.com", "--profile", "work", "--temp"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn test_invalid_format_rejected() {
    let home = tempfile::tempdir().unwrap();
    waypoint(&home)
        .args(["--format", "table", "map", "example.com"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}
