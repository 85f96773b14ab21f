/*!
 * End-to-end tests for the mirror-speeds binary
 */

use std::process::{Command, Output};

use assert_fs::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;

const START: &str = "Wed Jul  8 18:27:44 CEST 2020 ManualUpdate[job]: Operation-Uuid=OP1 action=Start destination=vs1:vol1";
const END: &str = "Wed Jul  8 18:27:54 CEST 2020 ManualUpdate[job]: Operation-Uuid=OP1 action=End status=Success bytes_transferred=1048576";
const FAILED_START: &str = "Wed Jul  8 19:00:00 CEST 2020 ManualUpdate[job]: Operation-Uuid=OP2 action=Start destination=vs1:vol1";
const FAILED_END: &str = "Wed Jul  8 19:00:05 CEST 2020 ManualUpdate[job]: Operation-Uuid=OP2 action=End status=Failure message=Destination volume is offline";

fn mirror_speeds(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_mirror-speeds"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run mirror-speeds")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn sample_log(temp: &TempDir) -> assert_fs::fixture::ChildPath {
    let log = temp.child("snapmirror_audit.log");
    log.write_str(&[START, END, FAILED_START, FAILED_END].join("\n"))
        .unwrap();
    log
}

#[test]
fn test_report_on_stdout() {
    let temp = TempDir::new().unwrap();
    let log = sample_log(&temp);

    let output = mirror_speeds(&[log.path().to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(0));

    let report = stdout(&output);
    assert!(predicate::str::starts_with("Destination: vs1:vol1\n").eval(&report));
    assert!(predicate::str::contains("Triggered transferred     1048576 bytes (1024.0kb)").eval(&report));
    assert!(predicate::str::contains("Triggered FAILED: Destination volume is offline").eval(&report));
    // diagnostics stay on stderr
    assert!(predicate::str::contains("Total operations: 2 after loading").eval(&stderr(&output)));
    assert!(!report.contains("Total operations"));
}

#[test]
fn test_nofail_hides_failures() {
    let temp = TempDir::new().unwrap();
    let log = sample_log(&temp);

    let output = mirror_speeds(&["-n", log.path().to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(0));
    assert!(predicate::str::contains("FAILED").not().eval(&stdout(&output)));
}

#[test]
fn test_debug_shows_epoch_seconds() {
    let temp = TempDir::new().unwrap();
    let log = sample_log(&temp);

    let output = mirror_speeds(&["--debug", log.path().to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(0));
    assert!(predicate::str::contains("CEST 2020[647548064] to ").eval(&stdout(&output)));
    assert!(predicate::str::contains("DEBUG").eval(&stderr(&output)));

    let output = mirror_speeds(&["-l", log.path().to_str().unwrap()]);
    assert!(predicate::str::contains("DEBUG").eval(&stdout(&output)));
}

#[test]
fn test_json_and_summary() {
    let temp = TempDir::new().unwrap();
    let log = sample_log(&temp);

    let output = mirror_speeds(&["--json", "--summary", log.path().to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(0));
    let lines: Vec<serde_json::Value> = stdout(&output)
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0]["status"], "success");
    assert_eq!(lines[1]["status"], "failure");
    assert_eq!(lines[2]["successful"], 1);
    assert_eq!(lines[2]["failed"], 1);
}

#[test]
fn test_config_file() {
    let temp = TempDir::new().unwrap();
    let log = sample_log(&temp);
    let config = temp.child("mirror-speeds.toml");
    config.write_str("skip_failures = true\nsummary = true\n").unwrap();

    let output = mirror_speeds(&[
        "-c",
        config.path().to_str().unwrap(),
        log.path().to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(0));
    let report = stdout(&output);
    assert!(!report.contains("FAILED"));
    assert!(report.contains("Run Summary\n"));
    assert!(report.contains("  Failed: 1\n"));
}

#[test]
fn test_help_and_version_exit_zero() {
    let output = mirror_speeds(&["--help"]);
    assert_eq!(output.status.code(), Some(0));
    assert!(predicate::str::contains("--nofail").eval(&stdout(&output)));

    let output = mirror_speeds(&["-V"]);
    assert_eq!(output.status.code(), Some(0));
    assert!(predicate::str::contains(env!("CARGO_PKG_VERSION")).eval(&stdout(&output)));
}

#[test]
fn test_bad_arguments_exit_5() {
    let temp = TempDir::new().unwrap();
    let log = sample_log(&temp);

    let unknown = mirror_speeds(&["--bogus", log.path().to_str().unwrap()]);
    assert_eq!(unknown.status.code(), Some(5));
    assert!(predicate::str::contains("Unknown option: --bogus").eval(&stderr(&unknown)));

    let none = mirror_speeds(&[]);
    assert_eq!(none.status.code(), Some(5));

    let missing = temp.child("absent.log");
    let output = mirror_speeds(&[missing.path().to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(5));
    assert!(predicate::str::contains("Given log file does not exist").eval(&stderr(&output)));

    let bad_config = temp.child("bad.toml");
    bad_config.write_str("output = \"xml\"\n").unwrap();
    let output = mirror_speeds(&[
        "--config",
        bad_config.path().to_str().unwrap(),
        log.path().to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(5));
}

#[test]
fn test_missing_audit_log_exit_50() {
    let temp = TempDir::new().unwrap();
    let log = sample_log(&temp);
    let audit = temp.child("command-history.log");

    let output = mirror_speeds(&[
        "-x",
        audit.path().to_str().unwrap(),
        log.path().to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(50));
    assert!(predicate::str::contains("Given audit log file does not exist").eval(&stderr(&output)));

    // a directory is not an audit log either
    let output = mirror_speeds(&["--xml", temp.path().to_str().unwrap(), log.path().to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(50));
}

#[test]
fn test_directory_log_is_skipped() {
    let temp = TempDir::new().unwrap();
    let log = sample_log(&temp);

    let output = mirror_speeds(&[temp.path().to_str().unwrap(), log.path().to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(0));
    assert!(predicate::str::contains("is a directory").eval(&stderr(&output)));
    assert!(predicate::str::contains("Destination: vs1:vol1").eval(&stdout(&output)));
}
