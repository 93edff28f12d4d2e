//! Binary tests for the `ac` command

use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn ac(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("ac").expect("ac binary is built");
    // Keep logs and config lookups inside the temp dir
    cmd.env("HOME", home.path())
        .env("XDG_DATA_HOME", home.path().join("data"))
        .env("XDG_CONFIG_HOME", home.path().join("config"))
        .current_dir(home.path());
    cmd
}

fn worksheet(dir: &TempDir, name: &str, text: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).expect("create worksheet");
    file.write_all(text.as_bytes()).expect("write worksheet");
    path
}

#[test]
fn test_extract_prints_problems() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = worksheet(&dir, "review.txt", "Review\n\n1. Solve for x: 3x + 7 = 22\n2. Evaluate 2(4) + 1\n");

    ac(&dir)
        .arg("extract")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("q1"))
        .stdout(predicate::str::contains("3x + 7 = 22"))
        .stdout(predicate::str::contains("q2"));
}

#[test]
fn test_extract_json_output() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = worksheet(&dir, "keyed.md", "# Quiz\n\n1. Solve 2x = 8\nAnswer: x = 4\n");

    let output = ac(&dir)
        .args(["extract", "--output", "json"])
        .arg(&path)
        .output()
        .expect("run ac");
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid json");
    assert_eq!(json["problems"][0]["id"], "q1");
    assert_eq!(json["problems"][0]["answer"]["expected"], "x = 4");
    assert_eq!(json["source"]["format"], "markdown");
}

#[test]
fn test_extract_unsupported_format_fails() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = worksheet(&dir, "sheet.docx", "1. Solve 2x = 8\n");

    ac(&dir)
        .arg("extract")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported document format"));
}

#[test]
fn test_extract_format_override() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = worksheet(&dir, "sheet.dat", "1. Solve 2x = 8\n");

    ac(&dir)
        .args(["extract", "--format", "text/plain"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Solve 2x = 8"));
}
