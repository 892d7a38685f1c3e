// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unix process-group adapter: setsid-style group spawn via
//! `process_group(0)`, signal delivery via nix, descendant discovery
//! via `/proc` (falling back to `ps` where `/proc` is absent).

use std::collections::HashMap;
use std::path::Path;

use nix::sys::signal::{kill, killpg, Signal};
use nix::unistd::Pid;

/// Place the child in a fresh process group so the whole tree can be
/// signalled through one pgid.
pub fn spawn_in_group(cmd: &mut tokio::process::Command) {
    cmd.process_group(0);
}

/// True while a process with this pid exists (signal 0 probe).
pub fn pid_exists(pid: u32) -> bool {
    kill(Pid::from_raw(pid as i32), None).is_ok()
}

pub fn soft_terminate(pid: u32) {
    let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
}

pub fn hard_kill(pid: u32) {
    let _ = kill(Pid::from_raw(pid as i32), Signal::SIGKILL);
}

/// SIGTERM the whole process group rooted at `root` (pgid == root pid).
pub fn terminate_group(root: u32) {
    let _ = killpg(Pid::from_raw(root as i32), Signal::SIGTERM);
}

/// SIGKILL the whole process group rooted at `root`.
pub fn kill_group(root: u32) {
    let _ = killpg(Pid::from_raw(root as i32), Signal::SIGKILL);
}

/// Walk the process table and return the tree rooted at `root` in
/// bottom-up order: leaves first, `root` itself last.
///
/// Best-effort: an unreadable table yields `[root]`, and termination
/// still covers the group via [`terminate_group`]/[`kill_group`].
pub fn list_descendants(root: u32) -> Vec<u32> {
    let mut children: HashMap<u32, Vec<u32>> = HashMap::new();
    for (pid, ppid) in process_table() {
        children.entry(ppid).or_default().push(pid);
    }

    let mut ordered = Vec::new();
    collect_postorder(root, &children, &mut ordered, 0);
    ordered
}

fn collect_postorder(pid: u32, children: &HashMap<u32, Vec<u32>>, out: &mut Vec<u32>, depth: u32) {
    // Depth cap guards against a cyclic table from a racing `ps` parse.
    if depth > 64 {
        return;
    }
    if let Some(kids) = children.get(&pid) {
        for &kid in kids {
            if kid != pid {
                collect_postorder(kid, children, out, depth + 1);
            }
        }
    }
    out.push(pid);
}

fn process_table() -> Vec<(u32, u32)> {
    if Path::new("/proc").is_dir() {
        proc_table()
    } else {
        ps_table()
    }
}

/// Read `(pid, ppid)` pairs from `/proc/<pid>/stat`.
fn proc_table() -> Vec<(u32, u32)> {
    let Ok(entries) = std::fs::read_dir("/proc") else {
        return Vec::new();
    };
    let mut table = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(pid) = name.to_str().and_then(|s| s.parse::<u32>().ok()) else {
            continue;
        };
        let Ok(stat) = std::fs::read_to_string(entry.path().join("stat")) else {
            continue;
        };
        if let Some(ppid) = parse_stat_ppid(&stat) {
            table.push((pid, ppid));
        }
    }
    table
}

/// Extract the ppid from a `/proc/<pid>/stat` line.
///
/// The comm field is parenthesized and may itself contain parentheses
/// or spaces, so fields are taken after the last `)`.
fn parse_stat_ppid(stat: &str) -> Option<u32> {
    let rest = &stat[stat.rfind(')')? + 1..];
    // rest: " <state> <ppid> <pgrp> ..."
    rest.split_whitespace().nth(1)?.parse().ok()
}

/// `ps` fallback for unixes without `/proc` (macOS).
fn ps_table() -> Vec<(u32, u32)> {
    let Ok(output) = std::process::Command::new("ps").args(["-axo", "pid=,ppid="]).output() else {
        return Vec::new();
    };
    let text = String::from_utf8_lossy(&output.stdout);
    text.lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let pid = fields.next()?.parse().ok()?;
            let ppid = fields.next()?.parse().ok()?;
            Some((pid, ppid))
        })
        .collect()
}
