// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! PATH sanitization for supervised apps.
//!
//! Apps must see an interactive-looking PATH without inheriting the
//! supervisor's Python virtual environment. Segments pointing into a
//! venv, conda, or pyenv tree are dropped before the app is spawned.

use sb_core::env;

/// Case-insensitive substrings that mark a PATH segment as belonging to
/// a Python environment.
const VENV_HINTS: &[&str] = &["env/bin", "env/scripts", "conda", ".virtualenvs", "pyenv"];

fn path_separator() -> char {
    if cfg!(windows) {
        ';'
    } else {
        ':'
    }
}

/// Remove virtual-environment segments from a PATH value.
///
/// A segment is dropped when it case-insensitively contains one of the
/// venv hints, or when it equals `virtual_env` (the `$VIRTUAL_ENV`
/// root) exactly.
pub fn sanitize_path(path: &str, virtual_env: Option<&str>) -> String {
    let sep = path_separator();
    path.split(sep)
        .filter(|segment| !segment.is_empty())
        .filter(|segment| keep_segment(segment, virtual_env))
        .collect::<Vec<_>>()
        .join(&sep.to_string())
}

fn keep_segment(segment: &str, virtual_env: Option<&str>) -> bool {
    // Normalize for matching only; the kept value stays untouched.
    let normalized = segment.to_lowercase().replace('\\', "/");
    if VENV_HINTS.iter().any(|hint| normalized.contains(hint)) {
        return false;
    }
    if let Some(venv) = virtual_env {
        if !venv.is_empty() && segment == venv {
            return false;
        }
    }
    true
}

/// Build the PATH injected into an app process: the current PATH,
/// sanitized, with `SYFTBOX_DESKTOP_BINARIES_PATH` and
/// `SYFTBOX_EXTRA_PATH` prepended when set.
pub fn build_app_path() -> String {
    let current = std::env::var("PATH").unwrap_or_default();
    let virtual_env = std::env::var("VIRTUAL_ENV").ok();
    let sanitized = sanitize_path(&current, virtual_env.as_deref());

    let sep = path_separator();
    let mut segments = Vec::new();
    for var in [env::DESKTOP_BINARIES_PATH, env::EXTRA_PATH] {
        if let Ok(extra) = std::env::var(var) {
            if !extra.trim().is_empty() {
                segments.push(extra);
            }
        }
    }
    segments.push(sanitized);
    segments.retain(|s| !s.is_empty());
    segments.join(&sep.to_string())
}

#[cfg(test)]
#[path = "path_env_tests.rs"]
mod tests;
