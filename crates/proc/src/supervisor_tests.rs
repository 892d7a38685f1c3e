// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Instant;

fn sh(script: &str, cwd: &std::path::Path, stdio: StdioSinks) -> Supervisor {
    Supervisor::new(SpawnSpec {
        command: "sh".to_string(),
        args: vec!["-c".to_string(), script.to_string()],
        cwd: cwd.to_path_buf(),
        env: Vec::new(),
        stdio,
    })
}

#[tokio::test]
async fn clean_exit_reports_code_zero() {
    let tmp = tempfile::tempdir().unwrap();
    let sup = sh("exit 0", tmp.path(), StdioSinks::Null);

    assert_eq!(sup.status(), Status::New);
    sup.start().unwrap();

    let exit = sup.wait().await.unwrap();
    assert_eq!(exit.code, 0);
    assert!(exit.error.is_none());
    assert_eq!(sup.status(), Status::Stopped);
}

#[tokio::test]
async fn nonzero_exit_surfaces_code_and_error() {
    let tmp = tempfile::tempdir().unwrap();
    let sup = sh("exit 3", tmp.path(), StdioSinks::Null);
    sup.start().unwrap();

    let exit = sup.wait().await.unwrap();
    assert_eq!(exit.code, 3);
    assert_eq!(exit.error.as_deref(), Some("exit status 3"));
}

#[tokio::test]
async fn start_while_running_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let sup = sh("sleep 30", tmp.path(), StdioSinks::Null);
    sup.start().unwrap();

    assert!(matches!(sup.start(), Err(ProcError::AlreadyRunning)));

    sup.stop().await.unwrap();
}

#[tokio::test]
async fn start_after_exit_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let sup = sh("exit 0", tmp.path(), StdioSinks::Null);
    sup.start().unwrap();
    sup.wait().await.unwrap();

    assert!(matches!(sup.start(), Err(ProcError::AlreadyStopped)));
}

#[tokio::test]
async fn stop_before_start_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let sup = sh("exit 0", tmp.path(), StdioSinks::Null);
    assert!(matches!(sup.stop().await, Err(ProcError::NotRunning)));
}

#[tokio::test]
async fn wait_before_start_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let sup = sh("exit 0", tmp.path(), StdioSinks::Null);
    assert!(matches!(sup.wait().await, Err(ProcError::NotRunning)));
}

#[tokio::test]
async fn wait_is_safe_after_exit() {
    let tmp = tempfile::tempdir().unwrap();
    let sup = sh("exit 0", tmp.path(), StdioSinks::Null);
    sup.start().unwrap();
    let first = sup.wait().await.unwrap();
    let second = sup.wait().await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn stop_kills_the_whole_tree_within_grace() {
    let tmp = tempfile::tempdir().unwrap();
    let sup = sh("sleep 100 & sleep 100 & wait", tmp.path(), StdioSinks::Null);
    let pid = sup.start().unwrap();

    // Give the shell a moment to fork its children.
    tokio::time::sleep(Duration::from_millis(300)).await;
    let victims = platform::list_descendants(pid);
    assert!(victims.len() >= 3, "expected shell + 2 sleeps, got {victims:?}");

    let started = Instant::now();
    sup.stop().await.unwrap();
    assert!(started.elapsed() < GRACE_PERIOD + Duration::from_secs(1));

    // No recorded pid survives past the grace window.
    let deadline = Instant::now() + Duration::from_secs(1);
    loop {
        if victims.iter().all(|&v| !platform::pid_exists(v)) {
            break;
        }
        assert!(Instant::now() < deadline, "descendants survived stop: {victims:?}");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    let exit = sup.wait().await.unwrap();
    assert_eq!(exit.code, 143);
    assert_eq!(exit.error.as_deref(), Some("terminated"));
}

#[tokio::test]
async fn stop_after_exit_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let sup = sh("exit 0", tmp.path(), StdioSinks::Null);
    sup.start().unwrap();
    sup.wait().await.unwrap();

    assert!(matches!(sup.stop().await, Err(ProcError::NotRunning)));
}

#[tokio::test]
async fn log_file_captures_output_and_truncates_per_start() {
    let tmp = tempfile::tempdir().unwrap();
    let log = tmp.path().join("logs").join("app.log");

    let first = sh("echo hello", tmp.path(), StdioSinks::LogFile(log.clone()));
    first.start().unwrap();
    first.wait().await.unwrap();
    // Stdio file handles flush on close; poll briefly for the content.
    let deadline = Instant::now() + Duration::from_secs(1);
    while std::fs::read_to_string(&log).unwrap_or_default().is_empty() {
        assert!(Instant::now() < deadline);
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(std::fs::read_to_string(&log).unwrap(), "hello\n");

    let second = sh("echo world", tmp.path(), StdioSinks::LogFile(log.clone()));
    second.start().unwrap();
    second.wait().await.unwrap();
    let deadline = Instant::now() + Duration::from_secs(1);
    loop {
        let content = std::fs::read_to_string(&log).unwrap_or_default();
        if content == "world\n" {
            break;
        }
        assert!(Instant::now() < deadline, "log not truncated: {content:?}");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn stderr_is_captured_too() {
    let tmp = tempfile::tempdir().unwrap();
    let log = tmp.path().join("app.log");
    let sup = sh("echo oops >&2", tmp.path(), StdioSinks::LogFile(log.clone()));
    sup.start().unwrap();
    sup.wait().await.unwrap();

    let deadline = Instant::now() + Duration::from_secs(1);
    while std::fs::read_to_string(&log).unwrap_or_default().is_empty() {
        assert!(Instant::now() < deadline);
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(std::fs::read_to_string(&log).unwrap(), "oops\n");
}

#[tokio::test]
async fn stdio_failure_fails_start_and_stops_supervisor() {
    let tmp = tempfile::tempdir().unwrap();
    // Parent of the log path is a regular file, so mkdir fails.
    let blocker = tmp.path().join("blocker");
    std::fs::write(&blocker, "x").unwrap();
    let log = blocker.join("logs").join("app.log");

    let sup = sh("exit 0", tmp.path(), StdioSinks::LogFile(log));
    let err = sup.start().unwrap_err();
    assert!(matches!(err, ProcError::StdioLog { .. }));
    assert_eq!(sup.status(), Status::Stopped);

    // Waiters observe the failure instead of hanging.
    let exit = sup.wait().await.unwrap();
    assert_eq!(exit.code, -1);
}

#[tokio::test]
async fn spawn_failure_fails_start_and_stops_supervisor() {
    let tmp = tempfile::tempdir().unwrap();
    let sup = Supervisor::new(SpawnSpec {
        command: "/nonexistent/binary".to_string(),
        args: Vec::new(),
        cwd: tmp.path().to_path_buf(),
        env: Vec::new(),
        stdio: StdioSinks::Null,
    });

    assert!(matches!(sup.start(), Err(ProcError::Spawn { .. })));
    assert_eq!(sup.status(), Status::Stopped);
}

#[tokio::test]
async fn env_overlay_reaches_the_child() {
    let tmp = tempfile::tempdir().unwrap();
    let log = tmp.path().join("app.log");
    let sup = Supervisor::new(SpawnSpec {
        command: "sh".to_string(),
        args: vec!["-c".to_string(), "echo $DEMO_VAR".to_string()],
        cwd: tmp.path().to_path_buf(),
        env: vec![("DEMO_VAR".to_string(), "from-overlay".to_string())],
        stdio: StdioSinks::LogFile(log.clone()),
    });
    sup.start().unwrap();
    sup.wait().await.unwrap();

    let deadline = Instant::now() + Duration::from_secs(1);
    while std::fs::read_to_string(&log).unwrap_or_default().is_empty() {
        assert!(Instant::now() < deadline);
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(std::fs::read_to_string(&log).unwrap(), "from-overlay\n");
}
