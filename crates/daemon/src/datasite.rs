// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Datasite assembly: one config, one identity, one server.
//!
//! Startup order: validate config → authenticate → API client →
//! events channel → app scheduler. Shutdown runs the same chain in
//! reverse so no component outlives what it depends on.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use sb_apps::{AppManager, AppScheduler, SchedulerConfig, SchedulerError};
use sb_core::{Config, ConfigError, SystemClock, Workspace};
use sb_sdk::auth::{AuthError, Authenticator, TokenUpdateFn};
use sb_sdk::events::{EventsChannel, EventsError};
use sb_sdk::{ApiClient, ApiError};

/// Daemon-level errors.
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Events(#[from] EventsError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A running datasite client.
#[derive(Debug)]
pub struct Datasite {
    config: Config,
    workspace: Workspace,
    api: Arc<ApiClient>,
    events: Arc<EventsChannel>,
    scheduler: Option<Arc<AppScheduler>>,
    cancel: CancellationToken,
    auth_task: Mutex<Option<JoinHandle<()>>>,
}

impl Datasite {
    /// Bring the whole client up. Fails fast if authentication or the
    /// first scheduler scan fails; the events channel connects in the
    /// background and retries on its own.
    pub async fn start(config: Config) -> Result<Arc<Self>, DaemonError> {
        config.validate()?;
        let workspace = Workspace::new(config.data_dir.clone());
        workspace.ensure_dirs()?;
        tracing::info!(
            email = %config.email,
            server = %config.server_url,
            data_dir = %config.data_dir.display(),
            "starting datasite"
        );

        let api = Arc::new(ApiClient::new(&config.server_url)?);

        // Rotated refresh tokens are written back to the config file.
        // Empty rotations are dropped here, per the persistence rule.
        let persisted = Arc::new(Mutex::new(config.clone()));
        let on_update: TokenUpdateFn = {
            let persisted = Arc::clone(&persisted);
            Arc::new(move |token: &str| {
                if token.is_empty() {
                    return;
                }
                let mut config = persisted.lock();
                config.update_refresh_token(token);
                if let Err(e) = config.save() {
                    tracing::warn!(error = %e, "failed to persist rotated refresh token");
                }
            })
        };

        let authenticator = Arc::new(
            Authenticator::new(
                Arc::clone(&api),
                config.email.clone(),
                config.access_token.clone(),
                config.refresh_token.clone(),
                SystemClock,
            )
            .with_token_update(on_update),
        );
        let access_token = authenticator.authenticate().await?;
        api.set_auth_token(Some(access_token.clone()));

        let cancel = CancellationToken::new();
        let auth_task = tokio::spawn(Arc::clone(&authenticator).run(cancel.child_token()));

        let events = Arc::new(EventsChannel::new(api.base_url(), Some(access_token))?);
        events.connect();

        let scheduler = if config.apps_enabled {
            let manager = Arc::new(AppManager::new(workspace.clone()));
            let scheduler = Arc::new(AppScheduler::new(
                manager,
                SchedulerConfig { config_path: config.path.clone(), ..Default::default() },
            ));
            scheduler.start().await?;
            Some(scheduler)
        } else {
            tracing::info!("apps disabled, scheduler not started");
            None
        };

        tracing::info!("datasite started");
        Ok(Arc::new(Self {
            config,
            workspace,
            api,
            events,
            scheduler,
            cancel,
            auth_task: Mutex::new(Some(auth_task)),
        }))
    }

    /// Graceful shutdown: scheduler (kills every app tree), events,
    /// then the auth refresher.
    pub async fn stop(&self) {
        tracing::info!("datasite shutting down");
        self.cancel.cancel();

        if let Some(scheduler) = &self.scheduler {
            scheduler.stop().await;
        }
        self.events.close().await;

        let task = self.auth_task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
        tracing::info!("datasite stopped");
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn api(&self) -> &Arc<ApiClient> {
        &self.api
    }

    pub fn events(&self) -> &Arc<EventsChannel> {
        &self.events
    }

    pub fn scheduler(&self) -> Option<&Arc<AppScheduler>> {
        self.scheduler.as_ref()
    }
}

#[cfg(test)]
#[path = "datasite_tests.rs"]
mod tests;
