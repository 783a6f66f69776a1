//! CLI-level tests exercising the installed binary.

mod common;

use assert_cmd::Command;
use common::FixtureRepo;
use predicates::prelude::*;
use tempfile::TempDir;

fn changescope() -> Command {
    Command::cargo_bin("changescope").expect("binary builds")
}

#[test]
fn help_lists_all_stages() {
    changescope()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("extract"))
        .stdout(predicate::str::contains("breaking"))
        .stdout(predicate::str::contains("align"));
}

#[test]
fn missing_subcommand_is_a_usage_error() {
    changescope()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn unknown_ref_exits_one_with_message() {
    let repo = FixtureRepo::new();
    repo.commit("initial", &[("src/a.py", Some("def a():\n    pass\n"))]);
    let out = TempDir::new().unwrap();

    changescope()
        .args(["extract", "--old-ref", "no-such-ref", "--new-ref", "HEAD"])
        .arg("--repo")
        .arg(repo.path())
        .arg("--output-dir")
        .arg(out.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error:"))
        .stderr(predicate::str::contains("no-such-ref"));
}

#[test]
fn extract_writes_artifacts_for_a_real_range() {
    let repo = FixtureRepo::new();
    let v1 = repo.commit("one", &[("src/a.py", Some("def a():\n    pass\n"))]);
    let v2 = repo.commit(
        "two",
        &[("src/a.py", Some("def a():\n    pass\n\n\ndef b():\n    pass\n"))],
    );
    let out = TempDir::new().unwrap();

    changescope()
        .args(["extract", "--old-ref", &v1, "--new-ref", &v2, "--format", "both"])
        .arg("--repo")
        .arg(repo.path())
        .arg("--output-dir")
        .arg(out.path())
        .assert()
        .success();

    assert!(out.path().join("revision_diff.json").exists());
    assert!(out.path().join("revision_diff.md").exists());
    assert!(out.path().join("snapshot.json").exists());
}

#[test]
fn refs_strict_mode_fails_on_lonely_ids() {
    let corpus = TempDir::new().unwrap();
    std::fs::write(
        corpus.path().join("notes.md"),
        "RSK-001 is mentioned exactly once.\n",
    )
    .unwrap();
    let out = TempDir::new().unwrap();

    changescope()
        .args(["refs", "--strict"])
        .arg("--corpus")
        .arg(corpus.path())
        .arg("--output-dir")
        .arg(out.path())
        .assert()
        .code(1);

    assert!(out.path().join("reference_check.json").exists());
}
