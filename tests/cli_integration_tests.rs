//! End-to-end CLI integration tests
//!
//! These tests use assert_cmd to drive the approval-flow binary inside a
//! temporary directory, so state, session and configuration never leak
//! between tests.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;
use tempfile::TempDir;

/// Helper for setting up an isolated CLI environment
struct CliTestEnvironment {
    temp_dir: TempDir,
}

impl CliTestEnvironment {
    fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("temp dir"),
        }
    }

    /// Environment with workflow state already created
    fn initialized() -> Self {
        let env = Self::new();
        env.cmd().arg("init").assert().success();
        env
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("approval-flow").expect("binary built");
        cmd.current_dir(self.temp_dir.path())
            .arg("--data-dir")
            .arg(self.temp_dir.path().join("state"))
            .env_remove("RUST_LOG")
            .env("APPROVAL_FLOW_OBSERVABILITY__LOG_LEVEL", "error");
        cmd
    }

    fn login(&self, role: &str) {
        self.cmd()
            .args(["login", "--role", role])
            .assert()
            .success()
            .stdout(predicate::str::contains("Signed in as"));
    }

    /// Create a task as the department user and return its id
    fn create_task(&self) -> String {
        self.login("department");
        let output = self
            .cmd()
            .args([
                "task",
                "create",
                "--title",
                "Quarterly Newsletter",
                "--description",
                "Customer newsletter for Q2",
                "--priority",
                "high",
                "--due",
                "2099-12-31",
                "--requirement",
                "Executive Summary",
            ])
            .output()
            .expect("run task create");
        assert!(output.status.success(), "create failed: {output:?}");

        let stdout = String::from_utf8_lossy(&output.stdout);
        stdout
            .lines()
            .find_map(|line| line.split("Created task ").nth(1))
            .map(|id| id.trim().to_string())
            .expect("task id in output")
    }

    fn submit_and_assign(&self, task_id: &str) {
        self.cmd()
            .args(["task", "submit", task_id, "--content", "## Executive Summary\nQ2 went well"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Draft submitted for review"));

        self.login("admin");
        self.cmd()
            .args(["review", "assign", task_id, "u_reviewer1"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Assigned to Miriam Reviewer"));
    }
}

#[test]
fn test_help_lists_commands() {
    let env = CliTestEnvironment::new();
    env.cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("task"))
        .stdout(predicate::str::contains("review"))
        .stdout(predicate::str::contains("audit"));
}

#[test]
fn test_init_creates_state_and_config() {
    let env = CliTestEnvironment::new();
    env.cmd()
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Workflow state created"))
        .stdout(predicate::str::contains("u_reviewer1"));

    assert!(env.temp_dir.path().join("state/state.json").exists());
    assert!(env.temp_dir.path().join("approval-flow.toml").exists());

    env.cmd()
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    env.cmd().args(["init", "--force"]).assert().success();
}

#[test]
fn test_commands_require_init_and_login() {
    let env = CliTestEnvironment::new();
    env.cmd()
        .args(["task", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("init"));

    env.cmd().arg("init").assert().success();
    env.cmd()
        .args(["task", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not logged in"));
}

#[test]
fn test_full_review_cycle() {
    let env = CliTestEnvironment::initialized();
    let task_id = env.create_task();
    env.submit_and_assign(&task_id);

    env.login("reviewer");
    env.cmd()
        .args([
            "review",
            "score",
            &task_id,
            "100",
            "--strength",
            "Clear summary",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("approved with 100/100"))
        .stdout(predicate::str::contains("flagged for admin attention"));

    env.login("admin");
    env.cmd()
        .args(["notifications", "list", "--unread"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Review Anomaly Detected"));

    env.cmd()
        .args(["audit", "verify"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 task(s) consistent"));

    env.cmd()
        .arg("dashboard")
        .assert()
        .success()
        .stdout(predicate::str::contains("Review anomalies:   1"));

    let export = env.temp_dir.path().join("audit.csv");
    env.cmd()
        .args(["audit", "export", "--output"])
        .arg(&export)
        .assert()
        .success();
    let csv = std::fs::read_to_string(&export).unwrap();
    assert!(csv.starts_with("Timestamp,Actor,Action,Details"));
    assert!(csv.contains("task_approved"));
    assert_eq!(csv.lines().count(), 5);
}

#[test]
fn test_score_out_of_range_is_rejected() {
    let env = CliTestEnvironment::initialized();
    let task_id = env.create_task();
    env.submit_and_assign(&task_id);

    env.login("reviewer");
    env.cmd()
        .args(["review", "score", &task_id, "101"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid score 101"));
    env.cmd()
        .args(["review", "score", &task_id, "-1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid score -1"));

    env.cmd()
        .args(["review", "score", &task_id, "70", "--issue", "Missing budget"])
        .assert()
        .success()
        .stdout(predicate::str::contains("now revisions_required"));
}

#[test]
fn test_permission_denied_for_wrong_role() {
    let env = CliTestEnvironment::initialized();
    let task_id = env.create_task();

    env.login("reviewer");
    env.cmd()
        .args(["task", "submit", &task_id, "--content", "not mine"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Permission denied"));

    env.cmd()
        .args(["audit", "export"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Permission denied"));
}

#[test]
fn test_search_and_show() {
    let env = CliTestEnvironment::initialized();
    let task_id = env.create_task();

    env.cmd()
        .args(["search", "newsletter"])
        .assert()
        .success()
        .stdout(predicate::str::contains(task_id.as_str()));

    env.cmd()
        .args(["task", "show", &task_id])
        .assert()
        .success()
        .stdout(predicate::str::contains("Executive Summary"))
        .stdout(predicate::str::contains("task_created"));
}
