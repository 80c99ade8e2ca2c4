//! CLI acceptance tests for the pointledger binary
//!
//! Each test runs the real binary against an isolated XDG tree with an
//! embedded store, so data survives between invocations the way it does
//! in a deployment.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

struct CliTestEnv {
    _temp_dir: TempDir,
    home: PathBuf,
    xdg_data: PathBuf,
    xdg_config: PathBuf,
    xdg_state: PathBuf,
}

impl CliTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let base = temp_dir.path().to_path_buf();
        let home = base.join("home");
        let xdg_data = base.join("xdg-data");
        let xdg_config = base.join("xdg-config");
        let xdg_state = base.join("xdg-state");

        fs::create_dir_all(&home).expect("failed to create HOME");
        fs::create_dir_all(&xdg_data).expect("failed to create XDG_DATA_HOME");
        fs::create_dir_all(&xdg_config).expect("failed to create XDG_CONFIG_HOME");
        fs::create_dir_all(&xdg_state).expect("failed to create XDG_STATE_HOME");

        Self {
            _temp_dir: temp_dir,
            home,
            xdg_data,
            xdg_config,
            xdg_state,
        }
    }

    fn write_batch(&self, name: &str, content: &str) -> PathBuf {
        let path = self.home.join(name);
        fs::write(&path, content).expect("failed to write batch file");
        path
    }
}

fn run(env: &CliTestEnv, args: &[&str]) -> Output {
    let bin_path = PathBuf::from(assert_cmd::cargo::cargo_bin!("pointledger"));
    Command::new(bin_path)
        .args(args)
        .env("HOME", &env.home)
        .env("XDG_DATA_HOME", &env.xdg_data)
        .env("XDG_CONFIG_HOME", &env.xdg_config)
        .env("XDG_STATE_HOME", &env.xdg_state)
        .output()
        .unwrap_or_else(|e| panic!("failed to execute pointledger: {e}"))
}

fn assert_success(args: &[&str], output: &Output) -> String {
    assert!(
        output.status.success(),
        "pointledger {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn run_ok(env: &CliTestEnv, args: &[&str]) -> String {
    let output = run(env, args);
    assert_success(args, &output)
}

fn batch_path_arg(path: &Path) -> &str {
    path.to_str().expect("non-utf8 temp path")
}

#[test]
fn test_submit_then_totals_and_usage() {
    let env = CliTestEnv::new();
    let batch = env.write_batch(
        "batch.json",
        r#"{
            "activity": [
                ["on-site", "2024-01-01 meetup", "outreach", "Alice", "10"],
                ["livestream", "2024-01-02 stream", "poster", "Alice", "5"],
                ["2024-01-03 drive", "misc", "Bob", "7"]
            ],
            "usage": [["Alice", "5", "1"]]
        }"#,
    );

    let stdout = run_ok(&env, &["submit", batch_path_arg(&batch)]);
    assert!(stdout.contains("Stored 3 activity record(s)"));
    assert!(stdout.contains("merged 1 usage record(s)"));

    let stdout = run_ok(&env, &["totals"]);
    assert_eq!(stdout.lines().next().unwrap(), "Alice\t15");

    let stdout = run_ok(&env, &["totals", "--by-score"]);
    assert_eq!(stdout.lines().next().unwrap(), "Alice\t15");

    let stdout = run_ok(&env, &["usage"]);
    assert!(stdout.contains("Alice\ttotal 15\tused 5\tcourses 1"));
}

#[test]
fn test_export_sheets() {
    let env = CliTestEnv::new();
    let batch = env.write_batch(
        "batch.json",
        r#"{"activity": [["on-site", "2024-01-01 meetup", "outreach", "Alice", "10"]]}"#,
    );
    run_ok(&env, &["submit", batch_path_arg(&batch)]);

    let stdout = run_ok(&env, &["export", "activity"]);
    assert!(stdout.starts_with("Activity Type,Activity,Category,Volunteer,Points"));
    assert!(stdout.contains("on-site,2024-01-01 meetup,outreach,Alice,10"));

    let out_file = env.home.join("totals.csv");
    run_ok(
        &env,
        &["export", "totals", "--output", batch_path_arg(&out_file)],
    );
    let content = fs::read_to_string(&out_file).unwrap();
    assert!(content.contains("Alice,10"));
}

#[test]
fn test_health_with_default_config() {
    let env = CliTestEnv::new();
    let stdout = run_ok(&env, &["health"]);
    assert_eq!(stdout.trim(), "ok");
}

#[test]
fn test_config_file_selects_memory_mode() {
    let env = CliTestEnv::new();
    let config_dir = env.xdg_config.join("pointledger");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(
        config_dir.join("config.toml"),
        "[storage]\nmode = \"memory\"\n",
    )
    .unwrap();

    let stdout = run_ok(&env, &["health"]);
    assert_eq!(stdout.trim(), "ok");
    // Memory mode never touches the data directory
    assert!(!env.xdg_data.join("pointledger/pointledger.db").exists());
}
