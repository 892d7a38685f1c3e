// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The app scheduler: a periodic scan of the apps directory that keeps
//! one supervisor per discovered app.
//!
//! Apps that appear on disk are started with their per-run port and
//! environment; apps that disappear are stopped and forgotten. Records
//! of exited apps are kept (status `stopped`) so a crash is visible
//! rather than silently relaunched.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use sb_core::env;
use sb_proc::{build_app_path, login_shell_command, SpawnSpec, Status, StdioSinks, Supervisor};

use crate::{AppError, AppInfo, AppManager, SchedulerError};

/// Scheduler tunables.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// How often the apps directory is scanned.
    pub scan_interval: Duration,
    /// Value injected as `SYFTBOX_CLIENT_CONFIG_PATH`.
    pub config_path: PathBuf,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { scan_interval: Duration::from_secs(5), config_path: PathBuf::new() }
    }
}

/// Snapshot of one supervised app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRecord {
    pub id: String,
    pub pid: Option<u32>,
    pub status: Status,
    pub port: u16,
    pub exit_code: Option<i32>,
    pub exit_error: Option<String>,
}

#[derive(Debug)]
struct RunningApp {
    info: AppInfo,
    port: u16,
    supervisor: Arc<Supervisor>,
    lifecycle: Mutex<Option<JoinHandle<()>>>,
}

/// Drives one supervisor per app. One record per id at any time.
#[derive(Debug)]
pub struct AppScheduler {
    manager: Arc<AppManager>,
    config: SchedulerConfig,
    apps: RwLock<HashMap<String, Arc<RunningApp>>>,
    /// Serializes scans; `refresh` fails fast when one is in flight.
    scan_gate: tokio::sync::Mutex<()>,
    cancel: CancellationToken,
    scan_task: Mutex<Option<JoinHandle<()>>>,
}

impl AppScheduler {
    pub fn new(manager: Arc<AppManager>, config: SchedulerConfig) -> Self {
        Self {
            manager,
            config,
            apps: RwLock::new(HashMap::new()),
            scan_gate: tokio::sync::Mutex::new(()),
            cancel: CancellationToken::new(),
            scan_task: Mutex::new(None),
        }
    }

    /// Run the first scan inline, then start the tick loop.
    pub async fn start(self: &Arc<Self>) -> Result<(), SchedulerError> {
        self.refresh().await?;

        let sched = Arc::clone(self);
        let handle = tokio::spawn(async move { sched.scan_loop().await });
        *self.scan_task.lock() = Some(handle);
        Ok(())
    }

    /// Stop the scan loop, then every running app, and wait for all
    /// lifecycle tasks.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let task = self.scan_task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }

        let apps: Vec<Arc<RunningApp>> = self.apps.read().values().cloned().collect();
        for app in &apps {
            if let Err(e) = self.halt(app).await {
                tracing::warn!(id = %app.info.id, error = %e, "failed to stop app on shutdown");
            }
        }
        self.apps.write().clear();
        tracing::info!(count = apps.len(), "app scheduler stopped");
    }

    /// Run one scan now. Fails with [`SchedulerError::RefreshInProgress`]
    /// when a scan is already running.
    pub async fn refresh(&self) -> Result<(), SchedulerError> {
        let _gate = self
            .scan_gate
            .try_lock()
            .map_err(|_| SchedulerError::RefreshInProgress)?;
        self.scan().await
    }

    /// Start one app by id, replacing a stopped record if present.
    pub async fn start_app(&self, app_id: &str) -> Result<(), SchedulerError> {
        {
            let apps = self.apps.read();
            if let Some(app) = apps.get(app_id) {
                if app.supervisor.status() == Status::Running {
                    return Err(SchedulerError::AlreadyRunning(app_id.to_string()));
                }
            }
        }
        let info = self.manager.get_by_id(app_id).map_err(|e| match e {
            AppError::AppNotFound(id) => SchedulerError::AppNotFound(id),
            other => SchedulerError::App(other),
        })?;

        let previous = self.apps.write().remove(app_id);
        if let Some(previous) = previous {
            let _ = self.halt(&previous).await;
        }
        self.launch(info)
    }

    /// Stop one app. Stopping an already-stopped record is a no-op.
    pub async fn stop_app(&self, app_id: &str) -> Result<(), SchedulerError> {
        let app = self
            .apps
            .read()
            .get(app_id)
            .cloned()
            .ok_or_else(|| SchedulerError::AppNotFound(app_id.to_string()))?;
        if app.supervisor.status() != Status::Running {
            return Ok(());
        }
        self.halt(&app).await
    }

    /// Snapshot of every known app record, sorted by id.
    pub fn get_apps(&self) -> Vec<ProcessRecord> {
        let mut records: Vec<ProcessRecord> = self
            .apps
            .read()
            .values()
            .map(|app| {
                let exit = app.supervisor.exit_status();
                ProcessRecord {
                    id: app.info.id.clone(),
                    pid: app.supervisor.pid(),
                    status: app.supervisor.status(),
                    port: app.port,
                    exit_code: exit.as_ref().map(|e| e.code),
                    exit_error: exit.and_then(|e| e.error),
                }
            })
            .collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records
    }

    async fn scan_loop(&self) {
        let first = tokio::time::Instant::now() + self.config.scan_interval;
        let mut ticker = tokio::time::interval_at(first, self.config.scan_interval);
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {
                    match self.refresh().await {
                        Ok(()) => {}
                        Err(SchedulerError::RefreshInProgress) => {
                            tracing::debug!("scan tick skipped, previous scan still running");
                        }
                        Err(e) => tracing::warn!(error = %e, "app scan failed"),
                    }
                }
            }
        }
    }

    async fn scan(&self) -> Result<(), SchedulerError> {
        let on_disk = self.manager.list()?;
        let disk_ids: HashSet<&str> = on_disk.iter().map(|a| a.id.as_str()).collect();

        // Apps gone from disk: stop and forget.
        let stale: Vec<Arc<RunningApp>> = self
            .apps
            .read()
            .values()
            .filter(|app| !disk_ids.contains(app.info.id.as_str()))
            .cloned()
            .collect();
        for app in stale {
            tracing::info!(id = %app.info.id, "app removed from disk, stopping");
            if let Err(e) = self.halt(&app).await {
                tracing::warn!(id = %app.info.id, error = %e, "failed to stop removed app");
            }
            self.apps.write().remove(&app.info.id);
        }

        // New apps: launch. A single failing app must not stall the scan.
        for info in on_disk {
            if self.apps.read().contains_key(&info.id) {
                continue;
            }
            if let Err(e) = self.launch(info.clone()) {
                tracing::warn!(id = %info.id, error = %e, "failed to start app");
            }
        }
        Ok(())
    }

    fn launch(&self, info: AppInfo) -> Result<(), SchedulerError> {
        let port = assign_port()?;
        let script = info.path.join("run.sh");
        let shell = login_shell_command(&script);
        let log_file = self.manager.workspace().app_log_file(&info.id);

        let env = vec![
            (env::APP_ID.to_string(), info.id.clone()),
            (env::APP_DIR.to_string(), info.path.display().to_string()),
            (env::APP_PORT.to_string(), port.to_string()),
            (env::ASSIGNED_PORT.to_string(), port.to_string()),
            (
                env::CLIENT_CONFIG_PATH.to_string(),
                self.config.config_path.display().to_string(),
            ),
            ("PATH".to_string(), build_app_path()),
        ];

        let supervisor = Arc::new(Supervisor::new(SpawnSpec {
            command: shell.program,
            args: shell.args,
            cwd: info.path.clone(),
            env,
            stdio: StdioSinks::LogFile(log_file),
        }));
        let pid = supervisor.start()?;
        tracing::info!(id = %info.id, pid, port, "app started");

        let app_id = info.id.clone();
        let record = Arc::new(RunningApp {
            info,
            port,
            supervisor: Arc::clone(&supervisor),
            lifecycle: Mutex::new(None),
        });

        let lifecycle = tokio::spawn({
            let id = app_id.clone();
            async move {
                match supervisor.wait().await {
                    Ok(exit) if exit.code == 0 => tracing::info!(id = %id, "app exited"),
                    Ok(exit) => {
                        tracing::warn!(id = %id, code = exit.code, error = ?exit.error, "app exited")
                    }
                    Err(e) => tracing::warn!(id = %id, error = %e, "app wait failed"),
                }
            }
        });
        *record.lifecycle.lock() = Some(lifecycle);
        self.apps.write().insert(app_id, record);
        Ok(())
    }

    async fn halt(&self, app: &RunningApp) -> Result<(), SchedulerError> {
        if app.supervisor.status() == Status::Running {
            match app.supervisor.stop().await {
                Ok(()) => {}
                // Lost the race with a natural exit; that's fine.
                Err(sb_proc::ProcError::NotRunning) => {}
                Err(e) => return Err(e.into()),
            }
        }
        let handle = app.lifecycle.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        Ok(())
    }
}

/// Bind an ephemeral port and hand its number to the app.
///
/// This is a hint, not a reservation: the listener closes before the
/// app starts, so the app must bind promptly.
fn assign_port() -> std::io::Result<u16> {
    let listener = std::net::TcpListener::bind(("127.0.0.1", 0))?;
    Ok(listener.local_addr()?.port())
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
