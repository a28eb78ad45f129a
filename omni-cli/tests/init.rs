use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

#[test]
fn test_init_creates_workspace() {
    let dir = tempdir().unwrap();
    let base_path = dir.path();

    Command::cargo_bin("omni").unwrap()
        .current_dir(base_path)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Successfully initialized OmniStudio workspace"));

    let omni_dir = base_path.join(".omni");
    assert!(omni_dir.join("secrets.json").is_file());
    assert!(omni_dir.join("settings.json").is_file());
    assert!(omni_dir.join("logs").is_dir());

    // Running init again keeps the workspace intact
    Command::cargo_bin("omni").unwrap()
        .current_dir(base_path)
        .arg("init")
        .assert()
        .success();
}

#[test]
fn test_commands_require_init() {
    let dir = tempdir().unwrap();

    Command::cargo_bin("omni").unwrap()
        .current_dir(dir.path())
        .args(["models", "ls"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Please run `omni init` first"));
}
