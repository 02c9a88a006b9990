//! End-to-end tests driving the `tl` binary.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::{NamedTempFile, TempDir};

struct Workspace {
    _dir: TempDir,
    config: NamedTempFile,
}

impl Workspace {
    /// Temp database plus a config whose Jira endpoint refuses connections.
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("timelog.db");

        let mut config = NamedTempFile::new().unwrap();
        writeln!(
            config,
            r#"
database_path = "{}"
owner_id = "tester"

[jira]
base_url = "http://127.0.0.1:9"
timeout_secs = 5

[sync]
timeout_secs = 5
"#,
            db_path.display()
        )
        .unwrap();
        config.flush().unwrap();

        Self { _dir: dir, config }
    }

    fn tl(&self, args: &[&str]) -> Output {
        run_tl(self.config.path(), args)
    }

    fn ok(&self, args: &[&str]) -> String {
        let output = self.tl(args);
        assert!(
            output.status.success(),
            "tl {args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8(output.stdout).unwrap()
    }

    fn json(&self, args: &[&str]) -> Value {
        serde_json::from_str(&self.ok(args)).unwrap()
    }
}

fn run_tl(config: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_tl"))
        .arg("--config")
        .arg(config)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run tl")
}

/// The entry ID from `Recorded <id> on ...`.
fn recorded_id(stdout: &str) -> String {
    stdout
        .split_whitespace()
        .nth(1)
        .expect("entry id in output")
        .to_string()
}

#[test]
fn entry_lifecycle_round_trip() {
    let ws = Workspace::new();
    ws.ok(&["project", "add", "--id", "P1", "--name", "Ops"]);

    let stdout = ws.ok(&[
        "add",
        "--project",
        "P1",
        "--start",
        "2025-08-11T09:00:00Z",
        "--end",
        "2025-08-11T10:30:00Z",
        "--note",
        "review",
    ]);
    assert!(stdout.contains("Sync: not reported"), "{stdout}");
    let id = recorded_id(&stdout);

    let listed = ws.json(&["list", "--json"]);
    let entries = listed.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["id"], id.as_str());
    assert_eq!(entries[0]["period"]["duration_seconds"], 5400);
    assert!(entries[0].get("deleted_at").is_none());
    assert!(entries[0].get("reported").is_none());

    let stats = ws.json(&["stats", "--json"]);
    assert_eq!(stats["total_time"], 5400);
    assert_eq!(stats["format"], "d");
    assert_eq!(stats["entries_per_bucket"][0]["timeframe"], "2025-08-11");
    assert_eq!(stats["entries_per_project"][0]["project_id"], "P1");

    ws.ok(&["update", id.as_str(), "--note", "code review"]);
    let listed = ws.json(&["list", "--json"]);
    assert_eq!(listed[0]["note"], "code review");

    let stdout = ws.ok(&["delete", id.as_str()]);
    assert!(stdout.starts_with(&format!("Deleted {id}")));

    assert_eq!(ws.json(&["list", "--json"]), Value::Array(Vec::new()));
    let stats = ws.json(&["stats", "--json", "--format", "w"]);
    assert_eq!(stats["total_entries"], 0);
    assert_eq!(stats["entries_per_bucket"], Value::Array(Vec::new()));
}

#[test]
fn unreachable_tracker_does_not_block_create() {
    let ws = Workspace::new();
    ws.ok(&["credentials", "set", "--token", "token-123"]);
    // Link verification needs the tracker, so it fails loudly here.
    let output = ws.tl(&[
        "project",
        "add",
        "--id",
        "MNT",
        "--name",
        "Maintenance",
        "--jira-issue",
        "MNT-1",
        "--jira-issue-id",
        "10042",
    ]);
    assert!(!output.status.success());

    ws.ok(&["credentials", "disable"]);
    ws.ok(&[
        "project",
        "add",
        "--id",
        "MNT",
        "--name",
        "Maintenance",
        "--jira-issue",
        "MNT-1",
        "--jira-issue-id",
        "10042",
    ]);
    ws.ok(&["credentials", "set", "--token", "token-123"]);

    let stdout = ws.ok(&[
        "add",
        "--project",
        "MNT",
        "--start",
        "2025-08-11T09:00:00Z",
        "--end",
        "2025-08-11T10:00:00Z",
    ]);
    assert!(stdout.contains("Sync: not reported"), "{stdout}");
    assert_eq!(ws.json(&["list", "--json"]).as_array().unwrap().len(), 1);
}

#[test]
fn invalid_input_is_reported() {
    let ws = Workspace::new();

    let output = ws.tl(&["stats", "--format", "y"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("invalid format: y, must be one of 'd', 'w', or 'm'"),
        "{stderr}"
    );

    let output = ws.tl(&["add", "--project", "nope", "--start", "1 hour ago", "--end", "2025-01-01"]);
    assert!(!output.status.success());

    let output = ws.tl(&["delete", "missing"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("time entry not found: missing"));
}
