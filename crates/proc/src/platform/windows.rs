// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Windows adapter: hidden window + new process group at spawn,
//! tree termination via `taskkill /T`.

const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

pub fn spawn_in_group(cmd: &mut tokio::process::Command) {
    cmd.creation_flags(CREATE_NEW_PROCESS_GROUP | CREATE_NO_WINDOW);
}

/// `taskkill /T` already walks the tree, so only the root is listed.
pub fn list_descendants(root: u32) -> Vec<u32> {
    vec![root]
}

pub fn soft_terminate(pid: u32) {
    let _ = std::process::Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/T"])
        .output();
}

pub fn hard_kill(pid: u32) {
    let _ = std::process::Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/T", "/F"])
        .output();
}

pub fn terminate_group(root: u32) {
    soft_terminate(root);
}

pub fn kill_group(root: u32) {
    hard_kill(root);
}

pub fn pid_exists(pid: u32) -> bool {
    let filter = format!("PID eq {pid}");
    match std::process::Command::new("tasklist").args(["/FI", &filter, "/NH"]).output() {
        Ok(output) => String::from_utf8_lossy(&output.stdout).contains(&pid.to_string()),
        Err(_) => false,
    }
}
