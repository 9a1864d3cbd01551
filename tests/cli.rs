//! CLI test cases.
//!
//! Anything that talks to the real Mistral API (or needs a local
//! `tesseract` install) is `#[ignore]`d, so the default test run works on
//! machines with neither credentials nor OCR tooling.

use std::fs;

use assert_cmd::Command;
use predicates::str::contains;

/// Create a new `Command` with our binary.
fn cmd() -> Command {
    Command::cargo_bin("ocrmill").unwrap()
}

#[test]
fn test_help() {
    cmd().arg("--help").assert().success();
}

#[test]
fn test_version() {
    cmd().arg("--version").assert().success();
}

#[test]
fn test_run_rejects_missing_input_dir() {
    let scratch = tempfile::tempdir().unwrap();
    cmd()
        .current_dir(scratch.path())
        .env("MISTRAL_API_KEY", "test-key")
        .arg("run")
        .args(["--input-dir", "/no/such/directory"])
        .assert()
        .failure()
        .stderr(contains("input directory does not exist"));
}

#[test]
fn test_run_rejects_missing_api_key() {
    let scratch = tempfile::tempdir().unwrap();
    // Run from an empty scratch directory so no `.env` file is picked up.
    cmd()
        .current_dir(scratch.path())
        .env_remove("MISTRAL_API_KEY")
        .arg("run")
        .args(["--input-dir", "."])
        .assert()
        .failure()
        .stderr(contains("MISTRAL_API_KEY"));
}

#[test]
fn test_cleanup_removes_near_empty_outputs() {
    let output = tempfile::tempdir().unwrap();
    fs::write(output.path().join("tiny.md"), "x").unwrap();
    fs::write(output.path().join("real.md"), "x".repeat(500)).unwrap();

    cmd()
        .arg("cleanup")
        .args(["--output-dir", output.path().to_str().unwrap()])
        .assert()
        .success();

    assert!(!output.path().join("tiny.md").exists());
    assert!(output.path().join("real.md").exists());
}

#[test]
#[ignore = "Needs MISTRAL_API_KEY and network access (or a local tesseract install)"]
fn test_run_converts_a_directory() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    fs::copy("tests/fixtures/sample.pdf", input.path().join("sample.pdf")).unwrap();

    cmd()
        .arg("run")
        .args(["--input-dir", input.path().to_str().unwrap()])
        .args(["--output-dir", output.path().to_str().unwrap()])
        .assert()
        .success();

    assert!(output.path().join("sample.md").exists());
    assert!(output.path().join("processing_summary.md").exists());
}
