// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Git-based app installs via the `git` binary.

use std::path::Path;
use std::process::Output;
use std::time::Duration;

use crate::AppError;

const GIT_CLONE_TIMEOUT: Duration = Duration::from_secs(300);
const GIT_CHECKOUT_TIMEOUT: Duration = Duration::from_secs(60);

/// Run a command to completion under a timeout.
pub(crate) async fn run_with_timeout(
    mut cmd: tokio::process::Command,
    timeout: Duration,
    what: &'static str,
) -> Result<Output, AppError> {
    cmd.kill_on_drop(true);
    let output = tokio::time::timeout(timeout, cmd.output())
        .await
        .map_err(|_| AppError::CommandTimeout { what, timeout })?
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::GitNotAvailable
            } else {
                AppError::Io(e)
            }
        })?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(AppError::CommandFailed { what, detail: stderr.trim().to_string() });
    }
    Ok(output)
}

/// True when a usable `git` binary is on PATH.
pub(crate) async fn git_available() -> bool {
    let mut cmd = tokio::process::Command::new("git");
    cmd.arg("--version");
    run_with_timeout(cmd, Duration::from_secs(5), "git --version").await.is_ok()
}

/// Clone `url` into `dest`.
///
/// Shallow unless a commit is pinned: pinned commits need history, so
/// the repo is cloned in full and the commit checked out afterwards.
pub(crate) async fn clone(
    url: &str,
    dest: &Path,
    branch: Option<&str>,
    tag: Option<&str>,
    commit: Option<&str>,
) -> Result<(), AppError> {
    let mut cmd = tokio::process::Command::new("git");
    cmd.arg("clone");
    if commit.is_none() {
        cmd.arg("--depth=1");
        if let Some(reference) = branch.or(tag) {
            cmd.arg("--branch").arg(reference);
        }
    }
    cmd.arg(url).arg(dest);
    run_with_timeout(cmd, GIT_CLONE_TIMEOUT, "git clone").await?;

    if let Some(commit) = commit {
        let mut cmd = tokio::process::Command::new("git");
        cmd.arg("-C").arg(dest).arg("checkout").arg(commit);
        run_with_timeout(cmd, GIT_CHECKOUT_TIMEOUT, "git checkout").await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn failed_command_reports_stderr() {
        let mut cmd = tokio::process::Command::new("sh");
        cmd.args(["-c", "echo boom >&2; exit 1"]);
        let err = run_with_timeout(cmd, Duration::from_secs(5), "sh").await.unwrap_err();
        match err {
            AppError::CommandFailed { detail, .. } => assert_eq!(detail, "boom"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn timeout_is_reported() {
        let mut cmd = tokio::process::Command::new("sleep");
        cmd.arg("10");
        let err = run_with_timeout(cmd, Duration::from_millis(50), "sleep")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::CommandTimeout { .. }));
    }

    #[tokio::test]
    async fn missing_binary_maps_to_git_not_available() {
        let cmd = tokio::process::Command::new("/definitely/not/git");
        let err = run_with_timeout(cmd, Duration::from_secs(1), "git clone")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::GitNotAvailable));
    }
}
