use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;

#[allow(deprecated)]
fn get_waypoint_bin() -> PathBuf {
    assert_cmd::cargo::cargo_bin("waypoint")
}

#[test]
fn test_completion_command_help() {
    let mut cmd = Command::new(get_waypoint_bin());
    cmd.arg("completion").arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Generate shell completion scripts"))
        .stdout(predicate::str::contains("SUPPORTED SHELLS"))
        .stdout(predicate::str::contains("INSTALLATION"))
        .stdout(predicate::str::contains("~/.bashrc"));
}

#[test]
fn test_completion_bash_generates_script() {
    let mut cmd = Command::new(get_waypoint_bin());
    cmd.arg("completion").arg("--shell").arg("bash");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("_waypoint()"))
        .stdout(predicate::str::contains("complete -F _waypoint"));
}

#[test]
fn test_completion_zsh_generates_script() {
    let mut cmd = Command::new(get_waypoint_bin());
    cmd.arg("completion").arg("--shell").arg("zsh");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("#compdef waypoint"));
}

#[test]
fn test_completion_fish_generates_script() {
    let mut cmd = Command::new(get_waypoint_bin());
    cmd.arg("completion").arg("--shell").arg("fish");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("complete -c waypoint"));
}

#[test]
fn test_completion_invalid_shell() {
    let mut cmd = Command::new(get_waypoint_bin());
    cmd.arg("completion").arg("--shell").arg("invalid-shell");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}
