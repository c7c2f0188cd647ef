// End-to-end tests driving the `charty` binary against the chart in tests/fixture.
#![cfg(unix)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn fixture() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixture")
}

/// An isolated environment: its own config dir and scratch dir.
struct Sandbox {
    root: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("scratch")).unwrap();
        Self { root }
    }

    fn path(&self) -> &Path {
        self.root.path()
    }

    fn scratch(&self) -> PathBuf {
        self.path().join("scratch")
    }

    fn charty(&self) -> Command {
        let mut cmd = Command::cargo_bin("charty").unwrap();
        cmd.env("HOME", self.path())
            .env("XDG_CONFIG_HOME", self.path().join("config"))
            .env("CHARTY_SCRATCH_DIR", self.scratch())
            .env_remove("CHARTY_SHELL")
            .env_remove("RUST_LOG")
            .current_dir(self.path());
        cmd
    }

    fn scratch_is_empty(&self) -> bool {
        fs::read_dir(self.scratch()).unwrap().next().is_none()
    }
}

#[test]
fn start_runs_the_fixture_and_cleans_up() {
    let sandbox = Sandbox::new();
    sandbox
        .charty()
        .arg("start")
        .arg(fixture())
        .assert()
        .success()
        .stdout(predicate::str::contains("Foo testreal"))
        .stdout(predicate::str::contains("-> OK"));
    assert!(sandbox.scratch_is_empty());
}

#[test]
fn set_overrides_chart_values() {
    let sandbox = Sandbox::new();
    sandbox
        .charty()
        .arg("start")
        .arg(fixture())
        .args(["--set", "foo=foo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Foo testfoo"));
}

#[test]
fn values_files_are_merged_before_set() {
    let sandbox = Sandbox::new();
    let values = sandbox.path().join("override.yaml");
    fs::write(&values, "foo: fromfile\n").unwrap();

    sandbox
        .charty()
        .arg("start")
        .arg(fixture())
        .arg("-f")
        .arg(&values)
        .assert()
        .success()
        .stdout(predicate::str::contains("Foo testfromfile"));

    sandbox
        .charty()
        .arg("start")
        .arg(fixture())
        .arg("-f")
        .arg(&values)
        .args(["--set", "foo=fromset"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Foo testfromset"));
}

#[test]
fn failing_commands_exit_non_zero() {
    let sandbox = Sandbox::new();
    sandbox
        .charty()
        .arg("start")
        .arg(fixture())
        .args(["--run", "commands[0].name=t,commands[0].run=sh fail.sh"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Error"))
        .stderr(predicate::str::contains("fail.sh"));
    assert!(sandbox.scratch_is_empty());
}

#[test]
fn failing_global_pre_hook_runs_nothing() {
    let sandbox = Sandbox::new();
    sandbox
        .charty()
        .arg("start")
        .arg(fixture())
        .args(["--run", "pre={sh fail.sh}"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("global-pre-run"))
        .stdout(predicate::str::contains("Foo testreal").not());
}

#[test]
fn commands_without_run_are_rejected_before_execution() {
    let sandbox = Sandbox::new();
    sandbox
        .charty()
        .arg("start")
        .arg(fixture())
        .args(["--run", "commands[0].name=empty"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("has no 'run' step"));
}

#[test]
fn json_output_is_a_single_document() {
    let sandbox = Sandbox::new();
    let output = sandbox
        .charty()
        .arg("start")
        .arg(fixture())
        .arg("--json")
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["chart"], "fixture");
    assert_eq!(report["version"], "0.1.0");
    assert_eq!(report["success"], true);
    assert_eq!(report["summary"]["tests"], 1);
    assert_eq!(report["results"][0]["output"], "Foo testreal\n");
}

#[test]
fn json_output_has_one_line_per_chart() {
    let sandbox = Sandbox::new();
    let output = sandbox
        .charty()
        .arg("start")
        .arg(fixture())
        .arg(fixture())
        .arg("--json")
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let reports: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(reports.len(), 2);
    assert!(reports.iter().all(|r| r["success"] == true));
}

#[test]
fn blank_global_hooks_are_rejected_before_execution() {
    let sandbox = Sandbox::new();
    let run_file = sandbox.path().join("run.yaml");
    fs::write(&run_file, "pre: [\"\"]\n").unwrap();

    sandbox
        .charty()
        .arg("start")
        .arg(fixture())
        .arg("--run-files")
        .arg(&run_file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("is blank"))
        .stdout(predicate::str::contains("global-pre-run").not());
}

#[test]
fn oversized_inline_index_is_an_error() {
    let sandbox = Sandbox::new();
    sandbox
        .charty()
        .arg("start")
        .arg(fixture())
        .args(["--run", "pre[18446744073709551615]=x"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("maximum supported index"));
}

#[test]
fn template_then_resume() {
    let sandbox = Sandbox::new();
    let dest = sandbox.path().join("rendered");

    sandbox
        .charty()
        .arg("template")
        .arg(fixture())
        .arg(&dest)
        .args(["--set", "foo=again"])
        .assert()
        .success();
    assert_eq!(
        fs::read_to_string(dest.join("test.sh")).unwrap(),
        "echo \"Foo testagain\""
    );
    assert!(dest.join("static/data.txt").is_file());
    assert!(dest.join("metadata.yaml").is_file());
    assert!(sandbox.scratch_is_empty());

    sandbox
        .charty()
        .arg("run")
        .arg(&dest)
        .assert()
        .success()
        .stdout(predicate::str::contains("Foo testagain"));
    assert!(dest.join("test.sh").is_file());
}

#[test]
fn packaged_charts_can_be_started() {
    let sandbox = Sandbox::new();
    let dist = sandbox.path().join("dist");

    sandbox
        .charty()
        .arg("package")
        .arg(fixture())
        .arg(&dist)
        .assert()
        .success()
        .stdout(predicate::str::contains("fixture-0.1.0.tar.gz"));
    let archive = dist.join("fixture-0.1.0.tar.gz");
    assert!(archive.is_file());

    sandbox
        .charty()
        .arg("start")
        .arg(&archive)
        .assert()
        .success()
        .stdout(predicate::str::contains("Foo testreal"));
    assert!(sandbox.scratch_is_empty());
}

#[test]
fn missing_chart_fails() {
    let sandbox = Sandbox::new();
    sandbox
        .charty()
        .args(["start", "./no-such-chart"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no-such-chart"));
}

#[test]
fn unknown_command_fails() {
    let sandbox = Sandbox::new();
    sandbox
        .charty()
        .arg("deploy")
        .assert()
        .failure()
        .stderr(predicate::str::contains("deploy"));
}

// `dirs` only honours XDG_CONFIG_HOME on Linux.
#[cfg(target_os = "linux")]
#[test]
fn malformed_settings_file_fails() {
    let sandbox = Sandbox::new();
    let config_dir = sandbox.path().join("config/charty");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(config_dir.join("config.toml"), "stream_output = 3").unwrap();

    sandbox
        .charty()
        .arg("start")
        .arg(fixture())
        .assert()
        .failure()
        .stderr(predicate::str::contains("config.toml"));
}
