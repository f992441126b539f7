//! End-to-end tests driving the `al` binary.
//!
//! Each test gets its own HOME so that device identity and the default
//! config location are isolated; the database path comes from a config file.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

fn al_binary() -> String {
    env!("CARGO_BIN_EXE_al").to_string()
}

struct Env {
    home: TempDir,
    config: PathBuf,
}

impl Env {
    fn new(extra_config: &str) -> Self {
        let home = TempDir::new().unwrap();
        let db_path = home.path().join("al-test.db");
        let config = home.path().join("al-test.toml");
        std::fs::write(
            &config,
            format!("database_path = \"{}\"\n{extra_config}", db_path.display()),
        )
        .unwrap();
        Self { home, config }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(al_binary());
        cmd.env("HOME", self.home.path())
            .env_remove("XDG_DATA_HOME")
            .env_remove("XDG_CONFIG_HOME")
            .env_remove("AL_DATABASE_PATH")
            .env_remove("AL_MAX_RECORDS_PER_USER")
            .env_remove("RUST_LOG")
            .arg("--config")
            .arg(&self.config);
        cmd
    }

    fn run(&self, args: &[&str]) -> Output {
        self.command().args(args).output().expect("failed to run al")
    }

    fn run_ok(&self, args: &[&str]) -> String {
        let output = self.run(args);
        assert!(
            output.status.success(),
            "al {args:?} should succeed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8(output.stdout).unwrap()
    }

    fn init(&self) {
        self.run_ok(&["init", "--name", "test-device"]);
    }

    fn json(&self, args: &[&str]) -> Vec<serde_json::Value> {
        let stdout = self.run_ok(args);
        let value: serde_json::Value = serde_json::from_str(&stdout).unwrap();
        value.as_array().unwrap().clone()
    }

    fn home(&self) -> &Path {
        self.home.path()
    }
}

#[test]
fn test_login_session_folds_into_monthly_summary() {
    let env = Env::new("");
    env.init();

    env.run_ok(&["begin", "--user", "ada", "--activity", "login", "--at", "2025-03-10T10:00:00Z"]);
    env.run_ok(&["update", "--user", "ada", "--activity", "login", "--at", "2025-03-10T10:05:00Z"]);
    let stdout = env.run_ok(&[
        "end",
        "--user",
        "ada",
        "--activity",
        "login",
        "--at",
        "2025-03-10T10:07:00Z",
    ]);
    assert!(stdout.contains("Duration:    300s"), "unexpected output: {stdout}");

    let sessions = env.json(&["sessions", "--json"]);
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0]["end_time"], "2025-03-10T10:07:00Z");
    assert_eq!(sessions[0]["total_seconds"], 300);

    let summaries = env.json(&["summaries", "--user", "ada", "--json"]);
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0]["activity_type"], "login");
    assert_eq!(summaries[0]["period_start"], "2025-03-01T00:00:00Z");
    assert_eq!(summaries[0]["period_end"], "2025-03-31T23:59:59Z");
    assert_eq!(summaries[0]["count"], 1);
    assert_eq!(summaries[0]["total_seconds"], 300);

    let device: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(env.home().join(".local/share/al/device.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(summaries[0]["device"], device["device_id"]);
}

#[test]
fn test_missed_logout_is_healed_on_next_begin() {
    let env = Env::new("");
    env.init();

    env.run_ok(&["begin", "--user", "ada", "--at", "2025-03-10T10:00:00Z"]);
    env.run_ok(&["update", "--user", "ada", "--at", "2025-03-10T10:02:00Z"]);
    env.run_ok(&["begin", "--user", "ada", "--at", "2025-03-10T15:00:00Z"]);

    let sessions = env.json(&["sessions", "--json"]);
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[0]["end_time"], "2025-03-10T10:02:00Z");
    assert_eq!(sessions[0]["total_seconds"], 120);
    assert!(sessions[1]["end_time"].is_null());
}

#[test]
fn test_retention_cap_from_config_file() {
    let env = Env::new("max_records_per_user = 2\n");
    env.init();

    for day in 1..=3 {
        let start = format!("2025-03-0{day}T10:00:00Z");
        let end = format!("2025-03-0{day}T10:01:00Z");
        env.run_ok(&["begin", "--user", "ada", "--activity", "coachreport", "--at", &start]);
        env.run_ok(&["update", "--user", "ada", "--activity", "2", "--at", &end]);
        env.run_ok(&["end", "--user", "ada", "--activity", "coachreport", "--at", &end]);
    }

    let sessions = env.json(&["sessions", "--json"]);
    let starts: Vec<_> = sessions.iter().map(|s| s["start_time"].clone()).collect();
    assert_eq!(starts, ["2025-03-02T10:00:00Z", "2025-03-03T10:00:00Z"]);

    // Trimming raw sessions never touches the summary.
    let summaries = env.json(&["summaries", "--json"]);
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0]["count"], 3);
    assert_eq!(summaries[0]["total_seconds"], 180);
}

#[test]
fn test_trim_applies_lowered_cap() {
    let env = Env::new("");
    env.init();

    for day in 1..=3 {
        let start = format!("2025-03-0{day}T10:00:00Z");
        let end = format!("2025-03-0{day}T10:01:00Z");
        env.run_ok(&["begin", "--user", "ada", "--at", &start]);
        env.run_ok(&["end", "--user", "ada", "--at", &end]);
    }
    assert_eq!(env.json(&["sessions", "--json"]).len(), 3);

    let output = env
        .command()
        .env("AL_MAX_RECORDS_PER_USER", "1")
        .arg("trim")
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("- ada login: 2 deleted"), "unexpected output: {stdout}");

    let sessions = env.json(&["sessions", "--json"]);
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0]["start_time"], "2025-03-03T10:00:00Z");
}

#[test]
fn test_zero_cap_from_environment_disables_tracking() {
    let env = Env::new("");
    env.init();

    let output = env
        .command()
        .env("AL_MAX_RECORDS_PER_USER", "0")
        .args(["begin", "--user", "ada"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("disabled"));

    assert!(env.json(&["sessions", "--json"]).is_empty());
}

#[test]
fn test_activity_commands_require_init() {
    let env = Env::new("");
    let output = env.run(&["begin", "--user", "ada"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Run 'al init' first"), "unexpected stderr: {stderr}");
}

#[test]
fn test_unknown_activity_type_fails() {
    let env = Env::new("");
    env.init();

    let output = env.run(&["begin", "--user", "ada", "--activity", "quiz"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unrecognized activity type: quiz"), "unexpected stderr: {stderr}");
}

#[test]
fn test_progress_succeeds_even_for_invalid_user() {
    let env = Env::new("");
    env.init();

    env.run_ok(&["progress", "--user", " "]);
    env.run_ok(&["progress", "--user", "ada", "--at", "2025-03-10T10:00:00Z"]);

    let sessions = env.json(&["sessions", "--json"]);
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0]["user"], "ada");
    assert_eq!(sessions[0]["activity_type"], "login");
}

#[test]
fn test_weekly_period_is_rejected_at_startup() {
    let env = Env::new("[summary_period]\nquantity = 1\nunit = \"week\"\n");
    env.init();

    let output = env.run(&["status"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to load configuration"), "unexpected stderr: {stderr}");
}
