// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command implementations for the syftbox CLI.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;

use sb_apps::{AppInstallOpts, AppManager};
use sb_core::config::DEFAULT_SERVER_URL;
use sb_core::{Config, ConfigOverrides, Workspace};
use sb_daemon::Datasite;
use sb_sdk::auth::AuthClient;
use sb_sdk::ApiClient;

use crate::AppCommands;

/// `syftbox login [--code]`
pub async fn login(
    config_path: PathBuf,
    email: Option<String>,
    server: Option<String>,
    data_dir: Option<PathBuf>,
    code: Option<String>,
) -> anyhow::Result<()> {
    let email = email
        .or_else(|| std::env::var(sb_core::env::EMAIL).ok().filter(|v| !v.is_empty()))
        .context("--email is required for login")?;
    let server_url = server.unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());

    let api = Arc::new(ApiClient::new(&server_url)?);
    let auth = AuthClient::new(api);

    match code {
        None => {
            auth.request_otp(&email).await?;
            println!("An 8-character code was sent to {email}.");
            println!("Finish with: syftbox login --email {email} --code <CODE>");
        }
        Some(code) => {
            let pair = auth.verify_otp(&email, &code.trim().to_uppercase()).await?;
            let config = Config {
                path: config_path.clone(),
                data_dir: data_dir.unwrap_or_else(Config::default_data_dir),
                email,
                server_url,
                refresh_token: Some(pair.refresh_token).filter(|t| !t.is_empty()),
                access_token: Some(pair.access_token),
                apps_enabled: true,
                client_url: None,
            };
            config.save()?;
            Workspace::new(config.data_dir.clone()).ensure_dirs()?;
            println!("Logged in as {}.", config.email);
            println!("Config written to {}", config_path.display());
        }
    }
    Ok(())
}

/// `syftbox daemon` — run until interrupted.
pub async fn daemon(config_path: PathBuf, overrides: ConfigOverrides) -> anyhow::Result<()> {
    let config = Config::load(&config_path, overrides)
        .with_context(|| format!("cannot load config at {}", config_path.display()))?;

    let log_dir = Workspace::new(config.data_dir.clone()).metadata_dir.join("logs");
    let _log_guard = sb_daemon::logging::init(&log_dir)?;
    tracing::info!(version = %version(), "syftbox daemon starting");

    let datasite = Datasite::start(config).await?;
    tokio::signal::ctrl_c().await?;
    datasite.stop().await;
    Ok(())
}

/// `syftbox app <list|install|uninstall>`
pub async fn app(
    config_path: PathBuf,
    overrides: ConfigOverrides,
    command: AppCommands,
) -> anyhow::Result<()> {
    let config = Config::load(&config_path, overrides)
        .with_context(|| format!("cannot load config at {}", config_path.display()))?;
    let manager = AppManager::new(Workspace::new(config.data_dir.clone()));

    match command {
        AppCommands::List => {
            let apps = manager.list()?;
            if apps.is_empty() {
                println!("No apps installed in {}", manager.workspace().apps_dir.display());
                return Ok(());
            }
            for app in apps {
                println!("{}\t{:?}\t{}", app.id, app.source, app.source_uri);
            }
        }
        AppCommands::Install { uri, branch, tag, commit, force, use_git } => {
            let info = manager
                .install(AppInstallOpts { uri, branch, tag, commit, use_git, force })
                .await?;
            println!("Installed {} at {}", info.id, info.path.display());
        }
        AppCommands::Uninstall { uri } => {
            let id = manager.uninstall(&uri).await?;
            println!("Uninstalled {id}");
        }
    }
    Ok(())
}

pub fn version() -> String {
    format!(
        "{} ({}/{})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_carries_the_crate_version() {
        assert!(version().starts_with(env!("CARGO_PKG_VERSION")));
    }
}
