// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Platform adapter for process-group operations.
//!
//! The supervisor core is platform-neutral; this module supplies
//! `spawn_in_group`, `list_descendants`, `soft_terminate`, `hard_kill`,
//! and `pid_exists` per OS.

#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub use unix::*;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub use windows::*;
