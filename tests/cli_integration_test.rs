//! CLI integration tests: run the fxh binary to cover main.rs branches.
//! Uses CARGO_BIN_EXE_fxh when set (e.g. by `cargo test`).

use std::process::{Command, Output};

fn bin() -> Option<std::path::PathBuf> {
    std::env::var_os("CARGO_BIN_EXE_fxh").map(std::path::PathBuf::from)
}

fn fxh(args: &[&str]) -> Option<Output> {
    let Some(bin) = bin() else {
        eprintln!("Skipping CLI test: CARGO_BIN_EXE not set");
        return None;
    };
    Some(Command::new(bin).args(args).output().expect("run fxh"))
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

#[test]
fn test_cli_help_succeeds() {
    let Some(out) = fxh(&["--help"]) else { return };
    assert!(out.status.success());
    let text = stdout(&out);
    assert!(text.contains("fxh"));
    assert!(text.contains("run"));
    assert!(text.contains("list"));
}

#[test]
fn test_cli_run_all_passes() {
    let Some(out) = fxh(&["run"]) else { return };
    assert_eq!(
        out.status.code(),
        Some(0),
        "stdout: {}\nstderr: {}",
        stdout(&out),
        String::from_utf8_lossy(&out.stderr)
    );
    let text = stdout(&out);
    assert!(text.contains("PASSED"));
    assert!(text.contains("0 failed, 0 errored"));
}

#[test]
fn test_cli_run_with_filter() {
    let Some(out) = fxh(&["run", "1-simple-functions-example", "-k", "divide"]) else {
        return;
    };
    assert!(out.status.success());
    let text = stdout(&out);
    assert!(text.contains("1-simple-functions-example/test_main.py::test_divide PASSED"));
    assert!(!text.contains("test_add"));
    assert!(text.contains("1 passed"));
}

#[test]
fn test_cli_list_does_not_run() {
    let Some(out) = fxh(&["list", "4-parametrized-testing"]) else {
        return;
    };
    assert!(out.status.success());
    let text = stdout(&out);
    assert!(text.contains("4-parametrized-testing/test_main.py::test_is_prime[2-true]"));
    assert!(text.contains("13 test(s) collected, 0 error(s)"));
    assert!(!text.contains("PASSED"));
}

#[test]
fn test_cli_json_format_is_parseable() {
    let Some(out) = fxh(&["run", "2-fixtures-setup-example", "--format", "json"]) else {
        return;
    };
    assert!(out.status.success());
    let report: serde_json::Value = serde_json::from_slice(&out.stdout).expect("json report");
    assert_eq!(report["total"], 3);
    assert_eq!(report["passed"], 3);
}

#[test]
fn test_cli_writes_report_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.json");
    let path_arg = path.to_string_lossy().into_owned();
    let Some(out) = fxh(&["run", "3-fixtures-teardown", "--report", &path_arg]) else {
        return;
    };
    assert!(out.status.success());
    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(written["total"], 3);
    assert_eq!(written["results"][0]["outcome"], "passed");
}

#[test]
fn test_cli_rejects_non_positive_timeout() {
    let Some(out) = fxh(&["run", "--timeout=0"]) else { return };
    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&out.stderr).contains("--timeout"));
}

#[test]
fn test_cli_empty_selection_is_not_success() {
    let Some(out) = fxh(&["run", "-k", "no_such_test_anywhere"]) else {
        return;
    };
    assert_eq!(out.status.code(), Some(5));
    assert!(stdout(&out).contains("no tests ran"));
}
