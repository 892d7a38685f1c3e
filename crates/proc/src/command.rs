// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Login-shell command construction for app scripts.
//!
//! App scripts expect an interactive PATH and tool activation (`uv`,
//! `pyenv`, shell hooks), so they run under the user's login shell with
//! its rc file sourced. The script is made executable and `exec`'d so
//! the shell does not linger as an extra tree level.

use std::path::{Path, PathBuf};

/// A resolved program + argument vector ready to spawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    pub program: String,
    pub args: Vec<String>,
}

/// Select the rc file for a login shell by its basename.
pub fn rc_file_for_shell(shell_basename: &str, home: &Path) -> PathBuf {
    match shell_basename {
        "zsh" => home.join(".zshrc"),
        "bash" => home.join(".bashrc"),
        "fish" => home.join(".config/fish/config.fish"),
        _ => home.join(".profile"),
    }
}

/// Build the command that runs `script` under the user's login shell.
#[cfg(unix)]
pub fn login_shell_command(script: &Path) -> ShellCommand {
    let shell = std::env::var("SHELL")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "sh".to_string());
    let basename = Path::new(&shell)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "sh".to_string());
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("/"));
    let rc_file = rc_file_for_shell(&basename, &home);

    let mut parts = Vec::new();
    if rc_file.is_file() {
        parts.push(format!("source {}", quote(&rc_file)));
    }
    parts.push(format!("chmod +x {}", quote(script)));
    parts.push(format!("exec {}", quote(script)));

    ShellCommand {
        program: shell,
        args: vec!["-lc".to_string(), parts.join("; ")],
    }
}

/// Build the command that runs `script` under git-bash, converting the
/// script path with `cygpath`.
#[cfg(windows)]
pub fn login_shell_command(script: &Path) -> ShellCommand {
    let bash = git_bash_path();
    let script = script.display().to_string().replace('\'', "'\\''");
    let body = format!(
        "script=$(cygpath -u '{script}'); chmod +x \"$script\"; exec \"$script\""
    );
    ShellCommand {
        program: bash,
        args: vec!["-lc".to_string(), body],
    }
}

#[cfg(windows)]
fn git_bash_path() -> String {
    for candidate in [
        r"C:\Program Files\Git\bin\bash.exe",
        r"C:\Program Files (x86)\Git\bin\bash.exe",
    ] {
        if Path::new(candidate).is_file() {
            return candidate.to_string();
        }
    }
    "bash.exe".to_string()
}

/// Single-quote a path for the POSIX shell.
#[cfg(unix)]
fn quote(path: &Path) -> String {
    let raw = path.display().to_string();
    format!("'{}'", raw.replace('\'', "'\\''"))
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
