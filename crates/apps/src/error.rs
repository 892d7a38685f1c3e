// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! App manager and scheduler error types.

use std::path::PathBuf;
use std::time::Duration;

/// Errors from app installation and inventory.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The directory does not look like an app (no `run.sh`).
    #[error("invalid app at {0}: missing run.sh")]
    InvalidApp(PathBuf),

    #[error("app not found: {0}")]
    AppNotFound(String),

    /// Install target already exists and `force` was not set.
    #[error("app already installed: {0}")]
    AlreadyInstalled(String),

    #[error("invalid app uri {0:?}")]
    InvalidUri(String),

    /// `git` is not on PATH; callers may retry with `use_git = false`.
    #[error("git is not available")]
    GitNotAvailable,

    /// Archive installs only know how to build URLs for some hosts.
    #[error("unsupported archive host: {0}")]
    UnsupportedHost(String),

    #[error("command `{what}` timed out after {timeout:?}")]
    CommandTimeout { what: &'static str, timeout: Duration },

    #[error("command `{what}` failed: {detail}")]
    CommandFailed { what: &'static str, detail: String },

    #[error("archive download failed: {0}")]
    Download(#[from] reqwest::Error),

    #[error("archive download failed: server returned {status} for {url}")]
    DownloadStatus { status: u16, url: String },

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("malformed app manifest at {path}: {source}")]
    Manifest {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors from the app scheduler.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("app not found: {0}")]
    AppNotFound(String),

    #[error("app already running: {0}")]
    AlreadyRunning(String),

    /// A scan is already in flight; retry after it finishes.
    #[error("refresh already in progress")]
    RefreshInProgress,

    #[error(transparent)]
    App(#[from] AppError),

    #[error(transparent)]
    Proc(#[from] sb_proc::ProcError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
