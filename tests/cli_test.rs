//! Integration tests for the conveyor binary.
// The cargo_bin function is marked deprecated in favor of cargo_bin! macro,
// but both work correctly. Suppressing until assert_cmd stabilizes the new API.
#![allow(deprecated)]

use assert_cmd::cargo::cargo_bin;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn setup_project(pipeline: &str) -> TempDir {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("ci.yml"), pipeline).unwrap();
    temp
}

fn conveyor(temp: &TempDir) -> Command {
    let mut cmd = Command::new(cargo_bin("conveyor"));
    cmd.current_dir(temp.path()).arg("--no-color");
    cmd
}

const PASSING: &str = r#"
name: smoke
stages:
  - stage: Build
    jobs:
      - job: compile
        steps:
          - script: echo compiling > build.log
"#;

const DEPENDENT: &str = r#"
jobs:
  - job: A
    steps:
      - script: exit 1
  - job: B
    dependsOn: A
    steps:
      - script: touch b.txt
"#;

#[test]
fn cli_shows_help() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin("conveyor"));
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("Validate a pipeline"));
    Ok(())
}

#[test]
fn cli_shows_version() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin("conveyor"));
    cmd.arg("--version");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
    Ok(())
}

#[test]
fn cli_requires_a_subcommand() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin("conveyor"));
    cmd.assert().failure();
    Ok(())
}

#[cfg(unix)]
#[test]
fn cli_run_succeeds() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(PASSING);
    conveyor(&temp)
        .args(["run", "ci.yml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Complete"));
    assert!(temp.path().join("build.log").exists());
    Ok(())
}

#[cfg(unix)]
#[test]
fn cli_run_failed_dependency_exits_one() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(DEPENDENT);
    conveyor(&temp).args(["run", "ci.yml"]).assert().code(1);
    assert!(!temp.path().join("b.txt").exists());
    Ok(())
}

#[cfg(unix)]
#[test]
fn cli_run_json_masks_secrets() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(PASSING);
    conveyor(&temp)
        .args(["run", "ci.yml", "--json", "--secret", "compile"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\": \"Complete\""))
        .stdout(predicate::str::contains("\"job\": \"********\""))
        .stdout(predicate::str::contains("compile").not());
    Ok(())
}

#[cfg(unix)]
#[test]
fn cli_run_passes_variables() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project("steps:\n  - script: echo $(greeting) > greeting.txt\n");
    conveyor(&temp)
        .args(["--quiet", "run", "ci.yml", "--var", "greeting=howdy"])
        .assert()
        .success();
    let written = fs::read_to_string(temp.path().join("greeting.txt"))?;
    assert_eq!(written.trim(), "howdy");
    Ok(())
}

#[test]
fn cli_run_dry_run_executes_nothing() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project("steps:\n  - script: touch marker\n");
    conveyor(&temp)
        .args(["run", "ci.yml", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Would run: touch marker"));
    assert!(!temp.path().join("marker").exists());
    Ok(())
}

#[test]
fn cli_run_rejects_malformed_var() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(PASSING);
    conveyor(&temp)
        .args(["run", "ci.yml", "--var", "novalue"])
        .assert()
        .failure();
    Ok(())
}

#[test]
fn cli_missing_pipeline_exits_two() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    conveyor(&temp)
        .args(["run", "missing.yml"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Pipeline not found"));
    Ok(())
}

#[test]
fn cli_invalid_yaml_exits_two() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project("stages: [unclosed\n");
    conveyor(&temp).args(["check", "ci.yml"]).assert().code(2);
    Ok(())
}

#[test]
fn cli_check_valid_pipeline() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(PASSING);
    conveyor(&temp)
        .args(["check", "ci.yml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ci.yml is valid"));
    Ok(())
}

#[test]
fn cli_check_reports_cycle() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(
        r#"
jobs:
  - job: a
    dependsOn: b
    steps:
      - script: echo a
  - job: b
    dependsOn: a
    steps:
      - script: echo b
"#,
    );
    conveyor(&temp)
        .args(["check", "ci.yml"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("circular dependency"));
    Ok(())
}

#[test]
fn cli_vars_masks_configured_secrets() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(
        r#"
variables:
  region: eu-west
  password: hunter2
steps:
  - script: echo
"#,
    );
    fs::create_dir_all(temp.path().join(".conveyor"))?;
    fs::write(
        temp.path().join(".conveyor/agent.yml"),
        "secrets: [hunter2]\n",
    )?;

    conveyor(&temp)
        .args(["vars", "ci.yml", "--no-host-env"])
        .assert()
        .success()
        .stdout(predicate::str::contains("region=eu-west"))
        .stdout(predicate::str::contains("password=********"))
        .stdout(predicate::str::contains("hunter2").not());
    Ok(())
}

#[test]
fn cli_vars_unknown_stage_exits_two() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(PASSING);
    conveyor(&temp)
        .args(["vars", "ci.yml", "--stage", "Nope"])
        .assert()
        .code(2);
    Ok(())
}
