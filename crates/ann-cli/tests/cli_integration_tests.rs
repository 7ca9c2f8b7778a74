//! CLI integration tests using `assert_cmd`, grounded in the teacher's
//! `velesdb-cli` test suite.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn ann_cli_cmd() -> Command {
    Command::cargo_bin("ann-cli").unwrap()
}

#[test]
fn help_displays_usage() {
    ann_cli_cmd().arg("--help").assert().success().stdout(predicate::str::contains("Benchmark harness"));
}

#[test]
fn missing_config_and_output_exits_with_code_one() {
    ann_cli_cmd().assert().failure().code(1).stderr(predicate::str::contains("required"));
}

#[test]
fn missing_output_alone_exits_with_code_one() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("bench.toml");
    fs::write(&config_path, "[dataset]\nvectors = 8\n").unwrap();

    ann_cli_cmd().arg("--config").arg(&config_path).assert().failure().code(1);
}

#[test]
fn tiny_run_writes_csv_json_and_checkpoint() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("bench.toml");
    fs::write(
        &config_path,
        r#"
[dataset]
vectors = 32
dimension = 4
queries = 3
top_k = 5
seed = 7
"#,
    )
    .unwrap();
    let output_stem = temp_dir.path().join("run1");

    ann_cli_cmd().arg("--config").arg(&config_path).arg("--output").arg(&output_stem).assert().success();

    assert!(temp_dir.path().join("run1.csv").exists());
    assert!(temp_dir.path().join("run1.json").exists());
    assert!(temp_dir.path().join("run1.checkpoint.json").exists());
}
