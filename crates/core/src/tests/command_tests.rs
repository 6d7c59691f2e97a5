// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use std::time::{Duration, Instant};

use crate::{CommandRunner, CommandSpec, DuctRunner, HarnessError};

fn shell(script: &str) -> CommandSpec {
    CommandSpec::new("sh").args(["-c", script])
}

#[test]
fn test_command_spec_argv_and_display() {
    let command = CommandSpec::new("vagrant")
        .arg("up")
        .arg("--provision")
        .cwd("/vmdefs/centos7-httpd");

    assert_eq!(command.argv(), vec!["vagrant", "up", "--provision"]);
    assert_eq!(
        command.to_string(),
        r#"["vagrant", "up", "--provision"] in /vmdefs/centos7-httpd"#
    );
    assert_eq!(
        command.cwd.as_deref(),
        Some(std::path::Path::new("/vmdefs/centos7-httpd"))
    );
}

#[cfg(unix)]
#[test]
fn test_successful_command_returns_stdout() {
    let runner = DuctRunner::new(None);
    let output = runner.run(&shell("echo hello"), false).unwrap();
    assert_eq!(output, "hello\n");
}

#[cfg(unix)]
#[test]
fn test_failure_carries_exit_code_and_both_streams() {
    let runner = DuctRunner::new(None);
    let err = runner
        .run(&shell("echo out; echo err >&2; exit 3"), false)
        .unwrap_err();

    match err {
        HarnessError::CommandFailure {
            program,
            exit_code,
            stdout,
            stderr,
        } => {
            assert_eq!(program, "sh");
            assert_eq!(exit_code, Some(3));
            assert_eq!(stdout, "out\n");
            assert_eq!(stderr, "err\n");
        }
        other => panic!("expected command failure, got {other:?}"),
    }
}

#[cfg(unix)]
#[test]
fn test_ignore_errors_returns_stdout_of_failed_command() {
    let runner = DuctRunner::new(None);
    let output = runner.run(&shell("echo partial; exit 1"), true).unwrap();
    assert_eq!(output, "partial\n");
}

#[cfg(unix)]
#[test]
fn test_command_runs_in_requested_directory() {
    let dir = tempfile::tempdir().unwrap();
    let runner = DuctRunner::new(None);

    let output = runner.run(&shell("pwd").cwd(dir.path()), false).unwrap();

    let expected = dir.path().file_name().unwrap().to_str().unwrap();
    assert!(
        output.trim_end().ends_with(expected),
        "{output} is not inside {}",
        dir.path().display()
    );
}

#[test]
fn test_missing_program_is_a_spawn_error() {
    let runner = DuctRunner::new(None);
    let err = runner
        .run(&CommandSpec::new("migrate-harness-no-such-program"), true)
        .unwrap_err();
    assert!(matches!(
        err,
        HarnessError::Spawn { ref program, .. } if program == "migrate-harness-no-such-program"
    ));
}

#[cfg(unix)]
#[test]
fn test_timeout_kills_slow_command() {
    let runner = DuctRunner::new(Some(Duration::from_millis(100)));
    let start = Instant::now();

    let err = runner
        .run(&CommandSpec::new("sleep").arg("5"), true)
        .unwrap_err();

    assert!(start.elapsed() < Duration::from_secs(4));
    assert!(matches!(
        err,
        HarnessError::CommandTimeout { ref program, timeout }
            if program == "sleep" && timeout == Duration::from_millis(100)
    ));
}

#[cfg(unix)]
#[test]
fn test_fast_command_finishes_within_timeout() {
    let runner = DuctRunner::new(Some(Duration::from_secs(5)));
    let output = runner.run(&shell("echo quick"), false).unwrap();
    assert_eq!(output, "quick\n");
}

#[cfg(unix)]
#[test]
fn test_failure_under_timeout_still_reports_exit_code() {
    let runner = DuctRunner::new(Some(Duration::from_secs(5)));
    let err = runner.run(&shell("exit 7"), false).unwrap_err();
    assert!(matches!(
        err,
        HarnessError::CommandFailure {
            exit_code: Some(7),
            ..
        }
    ));
}

#[cfg(unix)]
#[test]
fn test_unrepresentable_timeout_never_expires() {
    let runner = DuctRunner::new(Some(Duration::from_secs(u64::MAX)));
    let output = runner.run(&shell("echo ok"), false).unwrap();
    assert_eq!(output, "ok\n");
}
