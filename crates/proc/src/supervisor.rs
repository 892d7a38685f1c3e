// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The process supervisor: spawn one command in its own process group,
//! track a monotonic `new → running → stopped` lifecycle, and tear the
//! whole tree down on stop.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::platform;
use crate::ProcError;

/// How long a tree gets to exit after soft termination.
pub const GRACE_PERIOD: Duration = Duration::from_secs(3);

/// Supervisor lifecycle state. Transitions are monotonic:
/// `New → Running → Stopped`; `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    New,
    Running,
    Stopped,
}

/// Outcome of a supervised process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitStatus {
    pub code: i32,
    pub error: Option<String>,
}

/// Where the child's stdout/stderr go.
#[derive(Debug)]
pub enum StdioSinks {
    /// Truncate this file on start and stream both streams into it.
    LogFile(PathBuf),
    /// Caller-supplied sinks.
    Files {
        stdout: std::fs::File,
        stderr: std::fs::File,
    },
    /// Discard all output.
    Null,
}

/// Everything needed to spawn the supervised command.
#[derive(Debug)]
pub struct SpawnSpec {
    pub command: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    /// Environment overlay applied on top of the inherited environment.
    pub env: Vec<(String, String)>,
    pub stdio: StdioSinks,
}

#[derive(Debug)]
struct Inner {
    status: Status,
    pid: Option<u32>,
}

/// Supervises exactly one process for its lifetime. A stopped
/// supervisor is never restarted; the scheduler builds a fresh one.
#[derive(Debug)]
pub struct Supervisor {
    spec: Mutex<Option<SpawnSpec>>,
    inner: Arc<Mutex<Inner>>,
    exit_tx: Arc<watch::Sender<Option<ExitStatus>>>,
    exit_rx: watch::Receiver<Option<ExitStatus>>,
}

impl Supervisor {
    pub fn new(spec: SpawnSpec) -> Self {
        let (exit_tx, exit_rx) = watch::channel(None);
        Self {
            spec: Mutex::new(Some(spec)),
            inner: Arc::new(Mutex::new(Inner { status: Status::New, pid: None })),
            exit_tx: Arc::new(exit_tx),
            exit_rx,
        }
    }

    pub fn status(&self) -> Status {
        self.inner.lock().status
    }

    pub fn pid(&self) -> Option<u32> {
        self.inner.lock().pid
    }

    /// Exit outcome, if the process has already exited.
    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.exit_rx.borrow().clone()
    }

    /// Spawn the command in a new process group and start the monitor
    /// task. Returns the child pid.
    pub fn start(&self) -> Result<u32, ProcError> {
        let spec = {
            let inner = self.inner.lock();
            match inner.status {
                Status::Running => return Err(ProcError::AlreadyRunning),
                Status::Stopped => return Err(ProcError::AlreadyStopped),
                Status::New => {}
            }
            match self.spec.lock().take() {
                Some(spec) => spec,
                None => return Err(ProcError::AlreadyStopped),
            }
        };

        let (stdout, stderr) = match resolve_sinks(spec.stdio) {
            Ok(sinks) => sinks,
            Err(e) => {
                self.fail_to_stopped(&e.to_string());
                return Err(e);
            }
        };

        let mut cmd = tokio::process::Command::new(&spec.command);
        cmd.args(&spec.args)
            .current_dir(&spec.cwd)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr);
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }
        // The app must not inherit the supervisor's Python venv.
        cmd.env_remove("VIRTUAL_ENV");
        platform::spawn_in_group(&mut cmd);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(source) => {
                self.fail_to_stopped(&format!("spawn failed: {source}"));
                return Err(ProcError::Spawn { command: spec.command.clone(), source });
            }
        };

        let pid = child.id().unwrap_or_default();
        {
            let mut inner = self.inner.lock();
            inner.status = Status::Running;
            inner.pid = Some(pid);
        }
        tracing::debug!(pid, command = %spec.command, "process started");

        // Monitor: single producer of the exit signal.
        let inner = Arc::clone(&self.inner);
        let exit_tx = Arc::clone(&self.exit_tx);
        tokio::spawn(async move {
            let exit = match child.wait().await {
                Ok(status) => classify_exit(pid, exit_code(&status)),
                Err(e) => {
                    tracing::error!(pid, error = %e, "wait on child failed");
                    ExitStatus { code: -1, error: Some(format!("wait failed: {e}")) }
                }
            };
            inner.lock().status = Status::Stopped;
            let _ = exit_tx.send(Some(exit));
        });

        Ok(pid)
    }

    /// Block until the process exits and return its outcome.
    pub async fn wait(&self) -> Result<ExitStatus, ProcError> {
        if self.status() == Status::New {
            return Err(ProcError::NotRunning);
        }
        let mut rx = self.exit_rx.clone();
        let value = rx.wait_for(|v| v.is_some()).await.map_err(|_| ProcError::NotRunning)?;
        value.clone().ok_or(ProcError::NotRunning)
    }

    /// Terminate the whole process tree: soft-terminate bottom-up, wait
    /// out the grace period, then hard-kill survivors.
    pub async fn stop(&self) -> Result<(), ProcError> {
        let pid = {
            let inner = self.inner.lock();
            if inner.status != Status::Running {
                return Err(ProcError::NotRunning);
            }
            match inner.pid {
                Some(pid) => pid,
                None => return Err(ProcError::NotRunning),
            }
        };

        // Leaves first, root last; plus a group-wide signal to cover
        // anything the table walk missed.
        let victims = platform::list_descendants(pid);
        tracing::debug!(pid, tree_size = victims.len(), "terminating process tree");
        for &victim in &victims {
            platform::soft_terminate(victim);
        }
        platform::terminate_group(pid);

        let mut rx = self.exit_rx.clone();
        let exited = tokio::time::timeout(GRACE_PERIOD, rx.wait_for(|v| v.is_some()))
            .await
            .is_ok();

        if !exited {
            tracing::warn!(pid, "grace period expired, force killing");
            platform::hard_kill(pid);
            platform::kill_group(pid);
        }
        for &victim in victims.iter().filter(|&&v| v != pid) {
            if platform::pid_exists(victim) {
                platform::hard_kill(victim);
            }
        }
        if !exited {
            let mut rx = self.exit_rx.clone();
            let _ = tokio::time::timeout(Duration::from_secs(1), rx.wait_for(|v| v.is_some()))
                .await;
        }
        Ok(())
    }

    /// Record a start failure: the supervisor moves straight to
    /// `Stopped` and the exit signal fires so waiters never hang.
    fn fail_to_stopped(&self, reason: &str) {
        self.inner.lock().status = Status::Stopped;
        let _ = self
            .exit_tx
            .send(Some(ExitStatus { code: -1, error: Some(reason.to_string()) }));
    }
}

fn resolve_sinks(sinks: StdioSinks) -> Result<(Stdio, Stdio), ProcError> {
    match sinks {
        StdioSinks::Null => Ok((Stdio::null(), Stdio::null())),
        StdioSinks::Files { stdout, stderr } => Ok((Stdio::from(stdout), Stdio::from(stderr))),
        StdioSinks::LogFile(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|source| ProcError::StdioLog { path: path.clone(), source })?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&path)
                .map_err(|source| ProcError::StdioLog { path: path.clone(), source })?;
            let stderr = file
                .try_clone()
                .map_err(|source| ProcError::StdioLog { path: path.clone(), source })?;
            Ok((Stdio::from(file), Stdio::from(stderr)))
        }
    }
}

fn exit_code(status: &std::process::ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

fn classify_exit(pid: u32, code: i32) -> ExitStatus {
    match code {
        0 => {
            tracing::debug!(pid, "process exited cleanly");
            ExitStatus { code, error: None }
        }
        137 => {
            tracing::warn!(pid, "process killed");
            ExitStatus { code, error: Some("killed".to_string()) }
        }
        143 => {
            tracing::info!(pid, "process terminated");
            ExitStatus { code, error: Some("terminated".to_string()) }
        }
        code => {
            tracing::warn!(pid, code, "process exited with error");
            ExitStatus { code, error: Some(format!("exit status {code}")) }
        }
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
