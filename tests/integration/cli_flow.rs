//! Binary round-trips for the exit-code contract.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn botpack(root: &Path) -> Command {
    let mut cmd = Command::cargo_bin("botpack").unwrap();
    cmd.env("BOTPACK_ROOT", root);
    cmd.env("BOTPACK_STORE", root.join("store"));
    cmd.env_remove("BOTYARD_ROOT");
    cmd.env_remove("SMARTY_ROOT");
    cmd
}

fn write(root: &Path, rel: &str, content: &str) {
    let p = root.join(rel);
    fs::create_dir_all(p.parent().unwrap()).unwrap();
    fs::write(p, content).unwrap();
}

#[test]
fn status_reports_missing_manifest_cleanly() {
    let tmp = TempDir::new().unwrap();
    botpack(tmp.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("manifest"));
}

#[test]
fn install_and_sync_round_trip() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "botpack.toml", "version = 1\n");
    write(tmp.path(), "botpack/commands/hi.md", "hi\n");

    botpack(tmp.path()).arg("install").assert().success();
    assert!(tmp.path().join("botpack.lock").is_file());

    botpack(tmp.path())
        .args(["sync", "--target", "claude"])
        .assert()
        .success()
        .stdout(predicate::str::contains("created"));
    assert_eq!(
        fs::read_to_string(tmp.path().join(".claude/commands/assets.hi.md")).unwrap(),
        "hi\n"
    );
}

#[test]
fn sync_with_conflicts_exits_2() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "botpack.toml", "version = 1\n");
    write(tmp.path(), "botpack/commands/hi.md", "hi\n");

    botpack(tmp.path()).args(["sync", "--target", "claude"]).assert().success();
    write(tmp.path(), ".claude/commands/assets.hi.md", "user edit\n");

    botpack(tmp.path())
        .args(["sync", "--target", "claude"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("conflict"));

    botpack(tmp.path()).args(["sync", "--target", "claude", "--force"]).assert().success();
}

#[test]
fn invalid_manifest_exits_2() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "botpack.toml", "version = 1\nfrobnicate = true\n");

    botpack(tmp.path())
        .arg("install")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unknown keys"));
}

#[test]
fn trust_denial_exits_6() {
    let tmp = TempDir::new().unwrap();
    write(
        tmp.path(),
        "pack/agentpkg.toml",
        "agentpkg = \"1\"\nname = \"@acme/exec\"\nversion = \"1.0.0\"\n\n[capabilities]\nexec = true\n",
    );
    write(
        tmp.path(),
        "botpack.toml",
        "version = 1\n\n[dependencies]\n\"@acme/exec\" = { path = \"pack\" }\n",
    );

    botpack(tmp.path())
        .arg("install")
        .assert()
        .code(6)
        .stderr(predicate::str::contains("@acme/exec@1.0.0"));

    write(
        tmp.path(),
        ".botpack/trust.toml",
        "version = 1\n[\"@acme/exec@1.0.0\"]\nallowExec = true\n",
    );
    botpack(tmp.path()).arg("install").assert().success();
}

#[test]
fn offline_cache_miss_exits_4() {
    let tmp = TempDir::new().unwrap();
    write(
        tmp.path(),
        "botpack.toml",
        "version = 1\n\n[dependencies]\nx = { git = \"https://example.invalid/repo.git\" }\n",
    );

    botpack(tmp.path())
        .args(["install", "--offline"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("offline"));
}

#[test]
fn add_and_remove_edit_the_manifest_canonically() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "botpack.toml", "version = 1\n");

    botpack(tmp.path()).args(["add", "@acme/quality-skills@^2"]).assert().success();
    let text = fs::read_to_string(tmp.path().join("botpack.toml")).unwrap();
    assert!(text.contains("[dependencies]"));
    assert!(text.contains("\"@acme/quality-skills\""));
    assert!(text.contains("\"^2\""));

    botpack(tmp.path()).args(["remove", "@acme/quality-skills"]).assert().success();
    let text = fs::read_to_string(tmp.path().join("botpack.toml")).unwrap();
    assert!(!text.contains("[dependencies]"));
}

#[test]
fn explain_unknown_issue_exits_1() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "botpack.toml", "version = 1\n");
    botpack(tmp.path())
        .args(["explain", "conflict:00000000"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no such issue"));
}
