//! CLI smoke tests: drive the `dedupe` binary end-to-end against a temp
//! store and check the exit policy plus maintenance surfaces.

use assert_cmd::Command;
use predicates::prelude::*;

fn write_input(dir: &std::path::Path) -> std::path::PathBuf {
    let path = dir.join("input.csv");
    std::fs::write(
        &path,
        "account_id,account_name,created_date,relationship\n\
         001aaaaaaaaaa01,Acme Holdings Inc,,client\n\
         001aaaaaaaaaa02,Acme Holdings Inc,,\n\
         001aaaaaaaaaa03,Zenith Partners LLC,,vendor\n",
    )
    .unwrap();
    path
}

fn dedupe() -> Command {
    Command::cargo_bin("dedupe").unwrap()
}

#[test]
fn run_and_list() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path());
    let outdir = dir.path().join("out");

    dedupe()
        .args(["run", "--input"])
        .arg(&input)
        .arg("--outdir")
        .arg(&outdir)
        .args(["--workers", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("dedupe: completed"));

    assert!(outdir.join("run_index.json").exists());
    assert!(outdir.join("latest.json").exists());

    dedupe()
        .args(["runs", "list", "--outdir"])
        .arg(&outdir)
        .assert()
        .success()
        .stdout(predicate::str::contains("complete"));

    dedupe()
        .args(["runs", "latest", "--outdir"])
        .arg(&outdir)
        .assert()
        .success()
        .stdout(predicate::str::is_match("^[0-9a-f]{8}_[0-9a-f]{8}_\\d{14}\n$").unwrap());

    dedupe()
        .args(["runs", "reconcile", "--outdir"])
        .arg(&outdir)
        .assert()
        .success()
        .stdout(predicate::str::contains("consistent"));

    // The two identical Acme rows collapse into one group of two.
    dedupe()
        .args(["runs", "stats", "--outdir"])
        .arg(&outdir)
        .assert()
        .success()
        .stdout(predicate::str::contains("size=2"));
}

#[test]
fn missing_input_is_exit_one() {
    let dir = tempfile::tempdir().unwrap();
    dedupe()
        .args(["run", "--input"])
        .arg(dir.path().join("nope.csv"))
        .arg("--outdir")
        .arg(dir.path().join("out"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error"));
}

#[test]
fn bad_stage_name_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path());
    dedupe()
        .args(["run", "--input"])
        .arg(&input)
        .arg("--outdir")
        .arg(dir.path().join("out"))
        .args(["--resume-from", "glooping"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("unknown stage"));
}

#[test]
fn cleanup_dry_run_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path());
    let outdir = dir.path().join("out");

    dedupe()
        .args(["run", "--input"])
        .arg(&input)
        .arg("--outdir")
        .arg(&outdir)
        .assert()
        .success();

    dedupe()
        .args(["runs", "cleanup", "--outdir"])
        .arg(&outdir)
        .args(["--keep", "0", "--override-floor"])
        .assert()
        .success()
        .stdout(predicate::str::contains("dry run"));

    // The run survives the dry run.
    dedupe()
        .args(["runs", "list", "--outdir"])
        .arg(&outdir)
        .assert()
        .success()
        .stdout(predicate::str::contains("complete"));
}
