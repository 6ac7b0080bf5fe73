//! Basic CLI E2E tests.
//!
//! Tests invoke CLI commands via cargo run against a throwaway database and
//! config file, and verify the JSON written to stdout.

use std::path::Path;
use std::process::Command;

/// Run a CLI command against `dir` and return (stdout, stderr, exit code).
fn run_cli(dir: &Path, args: &[&str]) -> (String, String, i32) {
    let db = dir.join("autopilot.db");
    let config = dir.join("autopilot.toml");
    let output = Command::new("cargo")
        .args(["run", "-q", "-p", "oryxa-cli", "--"])
        .arg("--db")
        .arg(&db)
        .arg("--config")
        .arg(&config)
        .args(["--owner", "cli-test"])
        .args(args)
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn run_json(dir: &Path, args: &[&str]) -> serde_json::Value {
    let (stdout, stderr, code) = run_cli(dir, args);
    assert_eq!(code, 0, "{args:?} failed: {stderr}");
    serde_json::from_str(&stdout).expect("Failed to parse JSON output")
}

fn seed(dir: &Path) {
    run_json(dir, &["prayer", "set", "2026-03-01", "--isha", "19:20", "--fajr", "05:00"]);
    run_json(
        dir,
        &[
            "event",
            "add",
            "Dinner",
            "--start",
            "2026-03-01T19:00:00Z",
            "--end",
            "2026-03-01T19:45:00Z",
        ],
    );
}

#[test]
fn test_prayer_windows() {
    let dir = tempfile::tempdir().unwrap();
    run_json(dir.path(), &["prayer", "set", "2026-03-01", "--isha", "19:20"]);

    let windows = run_json(dir.path(), &["prayer", "windows", "2026-03-01"]);
    let windows = windows.as_array().unwrap();
    assert_eq!(windows.len(), 1);
    assert_eq!(windows[0]["prayer"], "isha");
    assert_eq!(windows[0]["start"], "2026-03-01T19:10:00Z");
}

#[test]
fn test_invalid_prayer_time_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (_, stderr, code) = run_cli(dir.path(), &["prayer", "set", "2026-03-01", "--isha", "late"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("error:"));
}

#[test]
fn test_detect_run_undo() {
    let dir = tempfile::tempdir().unwrap();
    seed(dir.path());

    let summary = run_json(dir.path(), &["conflict", "detect", "--from", "2026-03-01"]);
    assert_eq!(summary["created"], 1);

    let report = run_json(dir.path(), &["autopilot", "run"]);
    assert_eq!(report["processed"], 1);
    let item = &report["results"][0];
    assert_eq!(item["action"], "applied");
    assert_eq!(item["decision"]["action"], "reschedule");

    let conflict_id = item["conflict_id"].as_str().unwrap();
    let token = item["undo_token"].as_str().unwrap();
    let undo = run_json(dir.path(), &["autopilot", "undo", conflict_id, token]);
    assert_eq!(undo["ok"], true);

    let (_, stderr, code) = run_cli(dir.path(), &["autopilot", "undo", conflict_id, token]);
    assert_ne!(code, 0);
    assert!(stderr.contains("already used"));

    let audit = run_json(dir.path(), &["conflict", "audit", conflict_id]);
    assert_eq!(audit.as_array().unwrap().len(), 2);
}

#[test]
fn test_config_get_set() {
    let dir = tempfile::tempdir().unwrap();
    let (stdout, _, code) = run_cli(dir.path(), &["config", "get", "consent.threshold"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "70.0");

    let (_, _, code) = run_cli(dir.path(), &["config", "set", "engine.batch_size", "3"]);
    assert_eq!(code, 0);
    let (stdout, _, _) = run_cli(dir.path(), &["config", "get", "engine.batch_size"]);
    assert_eq!(stdout.trim(), "3");

    let (_, _, code) = run_cli(dir.path(), &["config", "set", "engine.nope", "1"]);
    assert_ne!(code, 0);
}

#[test]
fn test_learning_stats_empty() {
    let dir = tempfile::tempdir().unwrap();
    let stats = run_json(dir.path(), &["learning", "stats"]);
    assert_eq!(stats["total_decisions"], 0);
}
