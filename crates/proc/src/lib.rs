// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sb-proc: process supervision for SyftBox apps.
//!
//! A [`Supervisor`] spawns one command in its own OS process group,
//! streams its stdio to a log file, tracks a monotonic
//! `new → running → stopped` lifecycle, and terminates the entire
//! process tree on stop.

pub mod command;
mod error;
pub mod path_env;
pub mod platform;
mod supervisor;

pub use command::{login_shell_command, ShellCommand};
pub use error::ProcError;
pub use path_env::{build_app_path, sanitize_path};
pub use supervisor::{ExitStatus, SpawnSpec, Status, StdioSinks, Supervisor};
