use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn vault_cmd(root: &Path) -> Command {
    let mut cmd = Command::cargo_bin("testvault").unwrap();
    cmd.env("TESTVAULT_ROOT", root);
    cmd
}

fn write_definition(dir: &Path, name: &str, json: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, json).unwrap();
    path
}

#[test]
fn test_init_then_add_then_list() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("state");

    vault_cmd(&root)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("initialized"));

    let def = write_definition(
        tmp.path(),
        "def.json",
        r#"{"name": "button click", "tags": ["ui"], "testLogic": "click('#btn')"}"#,
    );

    vault_cmd(&root)
        .arg("add")
        .arg(&def)
        .assert()
        .success()
        .stdout(predicate::str::contains("Test added"));

    vault_cmd(&root)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("button click"))
        .stdout(predicate::str::contains("tags: ui"));
}

#[test]
fn test_add_rejects_dangerous_logic_nonzero_exit() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("state");

    vault_cmd(&root).arg("init").assert().success();

    let def = write_definition(
        tmp.path(),
        "evil.json",
        r#"{"name": "t2", "testLogic": "require('fs').readFileSync('/etc/passwd')"}"#,
    );

    vault_cmd(&root)
        .arg("add")
        .arg(&def)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("filesystem module import"));

    // Nothing was registered
    vault_cmd(&root)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No tests match"));
}

#[test]
fn test_add_rejects_unknown_field() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("state");

    vault_cmd(&root).arg("init").assert().success();

    let def = write_definition(
        tmp.path(),
        "bad.json",
        r#"{"name": "t", "unexpected": true}"#,
    );

    vault_cmd(&root)
        .arg("add")
        .arg(&def)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("unexpected"));
}

#[test]
fn test_add_missing_definition_file_is_usage_error() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("state");

    vault_cmd(&root)
        .arg("add")
        .arg(tmp.path().join("nope.json"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("cannot read"));
}

#[test]
fn test_verify_single_and_all() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("state");

    vault_cmd(&root).arg("init").assert().success();

    let def = write_definition(tmp.path(), "def.json", r#"{"name": "t1"}"#);
    let output = vault_cmd(&root).arg("add").arg(&def).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let id = stdout
        .lines()
        .find_map(|l| l.trim().strip_prefix("ID: "))
        .expect("add output includes the id")
        .to_string();

    vault_cmd(&root)
        .args(["verify", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("OK"));

    vault_cmd(&root)
        .args(["verify", "--all"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Verified 1/1"));

    vault_cmd(&root)
        .args(["verify", "no-such-id"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_list_filters_by_after() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("state");

    vault_cmd(&root).arg("init").assert().success();
    let def = write_definition(tmp.path(), "def.json", r#"{"name": "t1"}"#);
    vault_cmd(&root).arg("add").arg(&def).assert().success();

    vault_cmd(&root)
        .args(["list", "--after", "2001-01-01T00:00:00Z"])
        .assert()
        .success()
        .stdout(predicate::str::contains("t1"));

    vault_cmd(&root)
        .args(["list", "--after", "2999-01-01T00:00:00Z"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No tests match"));

    vault_cmd(&root)
        .args(["list", "--after", "not-a-date"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid --after"));
}

#[test]
fn test_status_reports_counts() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("state");

    vault_cmd(&root).arg("init").assert().success();
    let def = write_definition(tmp.path(), "def.json", r#"{"name": "t1"}"#);
    vault_cmd(&root).arg("add").arg(&def).assert().success();

    vault_cmd(&root)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Registered tests: 1"))
        .stdout(predicate::str::contains("Integrity: VERIFIED"));
}

#[test]
fn test_logs_verify_and_recent() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("state");

    vault_cmd(&root).arg("init").assert().success();
    let def = write_definition(tmp.path(), "def.json", r#"{"name": "t1"}"#);
    vault_cmd(&root).arg("add").arg(&def).assert().success();

    vault_cmd(&root)
        .args(["logs", "verify"])
        .assert()
        .success()
        .stdout(predicate::str::contains("PASS"));

    vault_cmd(&root)
        .args(["logs", "recent", "--action", "TEST_ADD_SUCCESS"])
        .assert()
        .success()
        .stdout(predicate::str::contains("TEST_ADD_SUCCESS"));

    vault_cmd(&root)
        .args(["logs", "verify", "--date", "2001-01-01"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("log file missing"));
}
