// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervisor error types.

use std::path::PathBuf;

/// Errors from process supervision.
#[derive(Debug, thiserror::Error)]
pub enum ProcError {
    /// `start()` called while the process is running.
    #[error("process already running")]
    AlreadyRunning,

    /// `start()` called after the supervisor reached its terminal state.
    #[error("process already stopped")]
    AlreadyStopped,

    /// `stop()` (or `wait()`) called before `start()` or after exit.
    #[error("process not running")]
    NotRunning,

    /// The command could not be spawned.
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    /// The stdio log file could not be created.
    #[error("failed to open stdio log {path}: {source}")]
    StdioLog {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
