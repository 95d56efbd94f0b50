//! Integration tests for the stratum CLI.
//!
//! These tests run the compiled binary in a temporary working directory
//! holding `records/<project>.jsonl`, so the default configuration applies.

use std::path::Path;
use std::process::{Command, Output};

use rstest::{fixture, rstest};
use tempfile::TempDir;

mod common;
use common::{login_feature, write_project};

fn run_stratum_in_dir(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_stratum"))
        .args(args)
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to run stratum")
}

fn stdout_json(output: &Output) -> serde_json::Value {
    assert!(
        output.status.success(),
        "stratum failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

/// A working directory with the login feature as project `billing`.
#[fixture]
fn project_dir() -> TempDir {
    let dir = TempDir::new().expect("Failed to create temp directory");
    write_project(&dir.path().join("records"), "billing", &login_feature());
    dir
}

#[test]
fn help_lists_commands() {
    let dir = TempDir::new().unwrap();

    let output = run_stratum_in_dir(dir.path(), &["--help"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["init", "build", "impact", "path", "hubs", "dead-code", "cycles", "export"] {
        assert!(stdout.contains(command), "missing {command} in help");
    }
}

#[test]
fn init_creates_config_once() {
    let dir = TempDir::new().unwrap();

    let first = run_stratum_in_dir(dir.path(), &["init"]);
    assert!(
        first.status.success(),
        "init failed: {}",
        String::from_utf8_lossy(&first.stderr)
    );
    let yaml = std::fs::read_to_string(dir.path().join("stratum.yaml")).unwrap();
    assert!(yaml.contains("data-dir: records"), "{yaml}");
    assert!(dir.path().join("records").is_dir());

    let second = run_stratum_in_dir(dir.path(), &["init"]);
    assert!(!second.status.success());
    assert!(String::from_utf8_lossy(&second.stderr).contains("already initialized"));
}

#[rstest]
fn dry_run_build_reports_order_without_writing(project_dir: TempDir) {
    let path = project_dir.path().join("records/billing.jsonl");
    let before = std::fs::read(&path).unwrap();

    let output = run_stratum_in_dir(project_dir.path(), &["build", "billing", "--dry-run", "--json"]);

    let report = stdout_json(&output);
    assert_eq!(report["dry_run"], true);
    assert_eq!(report["nodes"], 6);
    assert_eq!(report["assignments"].as_array().unwrap().len(), 6);
    assert_eq!(report["assignments"][0]["key"], "Table:USUARIO");
    assert_eq!(std::fs::read(&path).unwrap(), before);
}

#[rstest]
fn build_lists_skipped_malformed_lines(project_dir: TempDir) {
    let path = project_dir.path().join("records/billing.jsonl");
    let mut content = std::fs::read_to_string(&path).unwrap();
    content.push_str("{\"kind\":\"table\",\n");
    std::fs::write(&path, content).unwrap();

    let output = run_stratum_in_dir(project_dir.path(), &["build", "billing", "--dry-run"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("skipped malformed record at billing.jsonl:7"),
        "{stdout}"
    );
}

#[rstest]
fn queries_degrade_before_first_sync(project_dir: TempDir) {
    let output = run_stratum_in_dir(project_dir.path(), &["impact", "Table:USUARIO", "--json"]);

    let outcome = stdout_json(&output);
    assert_eq!(outcome["unavailable"], true);
}

#[rstest]
fn synced_build_answers_queries(project_dir: TempDir) {
    let build = run_stratum_in_dir(project_dir.path(), &["build", "billing", "--sync", "--json"]);
    let report = stdout_json(&build);
    assert_eq!(report["written"], 6);
    assert_eq!(report["sync"]["nodes_synced"], 6);

    let impact = run_stratum_in_dir(
        project_dir.path(),
        &["impact", "Table:USUARIO", "--depth", "3", "--json"],
    );
    assert_eq!(stdout_json(&impact)["total_affected"], 4);

    let dead = run_stratum_in_dir(project_dir.path(), &["dead-code", "--json"]);
    assert_eq!(stdout_json(&dead)["procedures"], serde_json::json!([]));
}

#[rstest]
fn export_prints_dot(project_dir: TempDir) {
    let output = run_stratum_in_dir(project_dir.path(), &["export", "billing"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("digraph stratum {"));
    assert!(stdout.contains("INHERITS"));
}

#[rstest]
#[case::bad_key(&["impact", "USUARIO"])]
#[case::bad_type(&["cycles", "Widget"])]
#[case::missing_project(&["build", "nope"])]
fn invalid_input_fails_with_error(project_dir: TempDir, #[case] args: &[&str]) {
    let output = run_stratum_in_dir(project_dir.path(), args);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error"), "stderr: {stderr}");
}
