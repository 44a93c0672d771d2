// End-to-end tests of the tasktime command line

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Temp HOME with an rc file pointing at a local task file
fn setup_test_env() -> (TempDir, std::sync::MutexGuard<'static, ()>) {
    setup_with_rc(|dir| format!("data.location={}\n", dir.join("tasks.json").display()))
}

fn setup_with_rc(rc: impl FnOnce(&std::path::Path) -> String) -> (TempDir, std::sync::MutexGuard<'static, ()>) {
    let guard = test_env::lock_test_env();
    let temp_dir = TempDir::new().unwrap();
    let config_dir = temp_dir.path().join(".tasktime");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(config_dir.join("rc"), rc(temp_dir.path())).unwrap();
    (temp_dir, guard)
}

fn new_cmd(temp_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("tasktime").unwrap();
    cmd.env("HOME", temp_dir.path());
    cmd.env_remove("TASKTIME_USER");
    cmd.env_remove("RUST_LOG");
    cmd
}

fn list_json(temp_dir: &TempDir, extra: &[&str]) -> Vec<serde_json::Value> {
    let output = new_cmd(temp_dir)
        .args(extra)
        .args(["list", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    serde_json::from_slice(&output.stdout).unwrap()
}

fn add(temp_dir: &TempDir, title: &str) {
    new_cmd(temp_dir).args(["add", title]).assert().success();
}

#[test]
fn test_add_and_list() {
    let (temp_dir, _guard) = setup_test_env();

    new_cmd(&temp_dir)
        .args(["add", "Read", "a", "book"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created task"))
        .stdout(predicate::str::contains("Read a book"));

    new_cmd(&temp_dir)
        .args(["list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Read a book"))
        .stdout(predicate::str::contains("00:00:00"));

    let tasks = list_json(&temp_dir, &[]);
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["title"], "Read a book");
    assert_eq!(tasks[0]["timeSpent"], 0);
    assert_eq!(tasks[0]["isRunning"], false);
    assert!(temp_dir.path().join("tasks.json").exists());
}

#[test]
fn test_empty_list() {
    let (temp_dir, _guard) = setup_test_env();
    new_cmd(&temp_dir)
        .args(["list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No tasks found."));
}

#[test]
fn test_add_blank_title_is_user_error() {
    let (temp_dir, _guard) = setup_test_env();

    new_cmd(&temp_dir)
        .args(["add", "   "])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::starts_with("Error:"))
        .stderr(predicate::str::contains("cannot be empty"));

    assert!(list_json(&temp_dir, &[]).is_empty());
}

#[test]
fn test_edit_time_and_title() {
    let (temp_dir, _guard) = setup_test_env();
    add(&temp_dir, "Read");

    new_cmd(&temp_dir)
        .args(["edit", "#1", "--time", "01:02:03", "--title", "Study"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Modified task"));

    let tasks = list_json(&temp_dir, &[]);
    assert_eq!(tasks[0]["timeSpent"], 3723);
    assert_eq!(tasks[0]["title"], "Study");
}

#[test]
fn test_edit_malformed_time_keeps_previous() {
    let (temp_dir, _guard) = setup_test_env();
    add(&temp_dir, "Read");
    new_cmd(&temp_dir).args(["edit", "#1", "--time", "00:10:00"]).assert().success();

    new_cmd(&temp_dir)
        .args(["edit", "#1", "--time", "ten minutes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing to change"));

    assert_eq!(list_json(&temp_dir, &[])[0]["timeSpent"], 600);
}

#[test]
fn test_show_task() {
    let (temp_dir, _guard) = setup_test_env();
    add(&temp_dir, "Read");
    let id = list_json(&temp_dir, &[])[0]["id"].as_str().unwrap().to_string();

    new_cmd(&temp_dir)
        .args(["show", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("Task {}: Read", id)))
        .stdout(predicate::str::contains("Status:      idle"));
}

#[test]
fn test_delete_with_yes() {
    let (temp_dir, _guard) = setup_test_env();
    add(&temp_dir, "A");
    add(&temp_dir, "B");

    new_cmd(&temp_dir)
        .args(["delete", "#1", "-y"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted task"));

    let tasks = list_json(&temp_dir, &[]);
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["title"], "B");
}

#[test]
fn test_delete_prompt_cancelled() {
    let (temp_dir, _guard) = setup_test_env();
    add(&temp_dir, "A");

    new_cmd(&temp_dir)
        .args(["delete", "#1"])
        .write_stdin("n\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Cancelled."));

    assert_eq!(list_json(&temp_dir, &[]).len(), 1);
}

#[test]
fn test_unknown_task_is_user_error() {
    let (temp_dir, _guard) = setup_test_env();

    new_cmd(&temp_dir)
        .args(["show", "12345"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Error:"))
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_move_reorders_and_persists() {
    let (temp_dir, _guard) = setup_test_env();
    for title in ["A", "B", "C"] {
        add(&temp_dir, title);
    }

    new_cmd(&temp_dir)
        .args(["move", "#3", "#1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("to position 1"));

    let titles: Vec<String> = list_json(&temp_dir, &[])
        .iter()
        .map(|t| t["title"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(titles, vec!["C", "A", "B"]);

    new_cmd(&temp_dir)
        .args(["move", "#2", "#2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing to move."));
}

#[test]
fn test_stats() {
    let (temp_dir, _guard) = setup_test_env();
    add(&temp_dir, "Deep work");
    add(&temp_dir, "Email");
    new_cmd(&temp_dir).args(["edit", "#1", "--time", "01:00:00"]).assert().success();
    new_cmd(&temp_dir).args(["edit", "#2", "--time", "00:30:00"]).assert().success();

    let output = new_cmd(&temp_dir).args(["stats", "--json"]).output().unwrap();
    assert!(output.status.success());
    let stats: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(stats["total_secs"], 5400);
    assert_eq!(stats["average_secs"], 2700.0);
    assert_eq!(stats["top_task"]["title"], "Deep work");
    assert_eq!(stats["chart"].as_array().unwrap().len(), 2);

    new_cmd(&temp_dir)
        .args(["stats"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Total time:     01:30:00 (1.5 h)"))
        .stdout(predicate::str::contains("Time per task (hours)"));
}

#[test]
fn test_status_local() {
    let (temp_dir, _guard) = setup_test_env();
    new_cmd(&temp_dir)
        .args(["status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Backend:  local"))
        .stdout(predicate::str::contains("User:     (none)"));
}

#[test]
fn test_run_session() {
    let (temp_dir, _guard) = setup_test_env();
    add(&temp_dir, "Read");

    new_cmd(&temp_dir)
        .args(["run"])
        .write_stdin("start #1\nstatus\nstop\nquit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Started 'Read'"))
        .stdout(predicate::str::contains("Running:"))
        .stdout(predicate::str::contains("Stopped 'Read'"));

    let tasks = list_json(&temp_dir, &[]);
    assert_eq!(tasks[0]["isRunning"], false);
}

#[test]
fn test_shared_store_requires_identity() {
    let (temp_dir, _guard) = setup_with_rc(|dir| {
        format!("data.backend=sqlite\ndata.location={}\n", dir.join("tasks.db").display())
    });

    new_cmd(&temp_dir)
        .args(["list"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("identity"));
}

#[test]
fn test_shared_store_is_per_user() {
    let (temp_dir, _guard) = setup_with_rc(|dir| {
        format!("data.backend=sqlite\ndata.location={}\n", dir.join("tasks.db").display())
    });

    new_cmd(&temp_dir)
        .args(["--user", "alice", "add", "Alice task"])
        .assert()
        .success();
    new_cmd(&temp_dir)
        .env("TASKTIME_USER", "bob")
        .args(["add", "Bob task"])
        .assert()
        .success();

    let alice = list_json(&temp_dir, &["--user", "alice"]);
    assert_eq!(alice.len(), 1);
    assert_eq!(alice[0]["title"], "Alice task");

    let bob = list_json(&temp_dir, &["--user", "bob"]);
    assert_eq!(bob.len(), 1);
    assert_eq!(bob[0]["title"], "Bob task");

    new_cmd(&temp_dir)
        .args(["--user", "alice", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Backend:  sqlite"))
        .stdout(predicate::str::contains("User:     alice"));
}

#[test]
fn test_rc_user_is_used() {
    let (temp_dir, _guard) = setup_with_rc(|dir| {
        format!(
            "data.backend=sqlite\ndata.location={}\nuser=carol\n",
            dir.join("tasks.db").display()
        )
    });

    add(&temp_dir, "Carol task");
    assert_eq!(list_json(&temp_dir, &["--user", "carol"]).len(), 1);
}

#[test]
fn test_invalid_backend_is_user_error() {
    let (temp_dir, _guard) = setup_with_rc(|_| "data.backend=cloud\n".to_string());

    new_cmd(&temp_dir)
        .args(["list"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::starts_with("Error:"));
}

#[test]
fn test_default_location_without_rc() {
    let _guard = test_env::lock_test_env();
    let temp_dir = TempDir::new().unwrap();

    new_cmd(&temp_dir).args(["add", "Read"]).assert().success();
    assert!(temp_dir.path().join(".tasktime").join("tasks.json").exists());
}

#[test]
fn test_version() {
    let (temp_dir, _guard) = setup_test_env();
    new_cmd(&temp_dir)
        .args(["--version"])
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}
