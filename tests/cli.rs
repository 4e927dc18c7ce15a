//! Command-line integration tests for history_bot.
//!
//! These run the built binary with a cleared environment, so they never
//! reach Telegram.

use std::process::{Command, Output};

fn run_bot(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_history_bot"))
        .args(args)
        .env_clear()
        .output()
        .expect("Failed to run history_bot")
}

/// Test that log lines never land on stdout, which carries `--history` output
#[test]
fn history_mode_keeps_logs_off_stdout() {
    let output = run_bot(&[
        "--log-level",
        "debug",
        "--env-file",
        "/nonexistent/history_bot.env",
        "--history",
        "@some_chat",
    ]);

    assert!(!output.status.success());
    assert!(output.stdout.is_empty(), "stdout: {}", String::from_utf8_lossy(&output.stdout));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Could not load .env file"));
    assert!(stderr.contains("TG_API_ID"));
}

/// Test that --limit is rejected without --history
#[test]
fn limit_requires_history() {
    let output = run_bot(&["--limit", "10"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--history"));
}
