// End-to-end tests for the handoff binary

use std::io::Write;
use std::process::{Command, Output, Stdio};

fn run_cli(args: &[&str], stdin: &str) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_handoff"))
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to start handoff");

    child
        .stdin
        .take()
        .expect("stdin is piped")
        .write_all(stdin.as_bytes())
        .expect("failed to write stdin");
    child.wait_with_output().expect("failed to wait for handoff")
}

#[test]
fn test_prints_the_sum() {
    let output = run_cli(&["4", "0"], "1 2 3 4 5 6 7 8 9 10\n");
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "55\n");
}

#[test]
fn test_debug_trace_goes_to_stderr() {
    let output = run_cli(&["1", "0", "-debug"], "1 2 3\n");
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "6\n");

    let stderr = String::from_utf8_lossy(&output.stderr);
    let trace: Vec<&str> = stderr.lines().filter(|line| line.starts_with("Thread ")).collect();
    assert_eq!(trace.len(), 3);
    assert!(trace[2].ends_with(" sum: 6"));
}

#[test]
fn test_invalid_arguments_print_usage() {
    let output = run_cli(&["0", "10"], "1 2 3\n");
    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Usage: "));
}

#[test]
fn test_missing_arguments_print_usage() {
    let output = run_cli(&["3"], "1\n");
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("<number of threads> <sleep limit> [-debug]"));
}

fn run_cli_with_log(args: &[&str], stdin: &str, log_file: &std::path::Path) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_handoff"))
        .args(args)
        .env("HANDOFF_LOG_FILE", log_file)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to start handoff");

    child
        .stdin
        .take()
        .expect("stdin is piped")
        .write_all(stdin.as_bytes())
        .expect("failed to write stdin");
    child.wait_with_output().expect("failed to wait for handoff")
}

#[test]
fn test_log_file_records_the_run() {
    let path = std::env::temp_dir().join(format!("handoff-cli-{}.log", std::process::id()));
    let _ = std::fs::remove_file(&path);

    let output = run_cli_with_log(&["3", "0"], "1 2 3 4\n", &path);
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "10\n");

    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.contains("pipeline finished"));
    std::fs::remove_file(&path).unwrap();
}

#[test]
fn test_unusable_log_file_falls_back_to_stderr() {
    let output = run_cli_with_log(&["2", "0"], "5 5\n", &std::env::temp_dir());
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "10\n");
    assert!(String::from_utf8_lossy(&output.stderr).contains("log file unavailable"));
}
