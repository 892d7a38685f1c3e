// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! App installation, inventory, and removal.
//!
//! All mutating operations hold the datasite-wide install lock, so at
//! most one install/uninstall runs at a time — across processes, not
//! just tasks.

use std::path::Path;

use chrono::Utc;
use url::Url;

use sb_core::Workspace;

use crate::lock::InstallLock;
use crate::{archive, git, id, AppError, AppInfo, AppSource};

/// A directory is a valid app iff it contains a regular `run.sh`.
pub fn is_valid_app(dir: &Path) -> bool {
    dir.join("run.sh").is_file()
}

/// Inputs to an install.
#[derive(Debug, Clone, Default)]
pub struct AppInstallOpts {
    /// Local directory path or repository URL.
    pub uri: String,
    pub branch: Option<String>,
    pub tag: Option<String>,
    pub commit: Option<String>,
    /// Prefer `git clone`; archive download is the fallback.
    pub use_git: bool,
    /// Replace an existing install.
    pub force: bool,
}

/// Installs, enumerates, and removes apps under `<data_dir>/apps`.
#[derive(Debug)]
pub struct AppManager {
    workspace: Workspace,
    http: reqwest::Client,
}

impl AppManager {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace, http: reqwest::Client::new() }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Install an app from a local directory or a repository URL.
    pub async fn install(&self, opts: AppInstallOpts) -> Result<AppInfo, AppError> {
        let _lock = InstallLock::acquire(&self.workspace.apps_lock).await?;
        std::fs::create_dir_all(&self.workspace.apps_dir)?;

        let local = Path::new(&opts.uri);
        if local.is_dir() {
            self.install_local(local, opts.force)
        } else if opts.uri.starts_with("http://") || opts.uri.starts_with("https://") {
            self.install_remote(&opts).await
        } else {
            Err(AppError::InvalidUri(opts.uri.clone()))
        }
    }

    /// Symlink a local directory into the apps dir.
    fn install_local(&self, source: &Path, force: bool) -> Result<AppInfo, AppError> {
        let source = source.canonicalize()?;
        if !is_valid_app(&source) {
            return Err(AppError::InvalidApp(source));
        }

        let app_id = id::local_app_id(&source);
        let target = self.workspace.app_dir(&app_id);
        self.prepare_target(&target, &app_id, force)?;
        symlink_dir(&source, &target)?;

        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let info = AppInfo {
            id: app_id,
            name,
            path: target.clone(),
            source: AppSource::Local,
            source_uri: source.display().to_string(),
            branch: None,
            tag: None,
            commit: None,
            installed_on: Utc::now(),
        };
        // Written through the symlink, next to the app's run.sh.
        info.write_to(&target)?;
        tracing::info!(id = %info.id, source = %info.source_uri, "installed local app");
        Ok(info)
    }

    /// Clone or download a repository into the apps dir.
    async fn install_remote(&self, opts: &AppInstallOpts) -> Result<AppInfo, AppError> {
        let trimmed = id::trim_git_suffix(opts.uri.trim_end_matches('/'));
        let url = Url::parse(trimmed).map_err(|_| AppError::InvalidUri(opts.uri.clone()))?;
        let app_id = id::app_id_from_url(&url)?;
        let target = self.workspace.app_dir(&app_id);
        self.prepare_target(&target, &app_id, opts.force)?;

        let use_git = opts.use_git && git::git_available().await;
        let fetched = if use_git {
            git::clone(
                url.as_str(),
                &target,
                opts.branch.as_deref(),
                opts.tag.as_deref(),
                opts.commit.as_deref(),
            )
            .await
        } else {
            self.install_from_archive(&url, &app_id, &target, opts).await
        };
        if let Err(e) = fetched {
            remove_install(&target);
            return Err(e);
        }

        if !is_valid_app(&target) {
            remove_install(&target);
            return Err(AppError::InvalidApp(target));
        }

        let info = AppInfo {
            id: app_id,
            name: id::app_name_from_url(&url),
            path: target.clone(),
            source: AppSource::Git,
            source_uri: url.to_string(),
            branch: opts.branch.clone(),
            tag: opts.tag.clone(),
            commit: opts.commit.clone(),
            installed_on: Utc::now(),
        };
        info.write_to(&target)?;
        tracing::info!(id = %info.id, source = %info.source_uri, git = use_git, "installed app");
        Ok(info)
    }

    async fn install_from_archive(
        &self,
        url: &Url,
        app_id: &str,
        target: &Path,
        opts: &AppInstallOpts,
    ) -> Result<(), AppError> {
        let zip_url = archive::archive_url(
            url,
            opts.branch.as_deref(),
            opts.tag.as_deref(),
            opts.commit.as_deref(),
        )?;
        let zip_path = self.workspace.metadata_dir.join("downloads").join(format!("{app_id}.zip"));
        archive::download_zip(&self.http, &zip_url, &zip_path).await?;
        let extracted = archive::extract_zip(&zip_path, target).await;
        let _ = std::fs::remove_file(&zip_path);
        extracted
    }

    fn prepare_target(&self, target: &Path, app_id: &str, force: bool) -> Result<(), AppError> {
        if target.symlink_metadata().is_ok() {
            if !force {
                return Err(AppError::AlreadyInstalled(app_id.to_string()));
            }
            remove_install(target);
        }
        Ok(())
    }

    /// Uninstall by install directory path, app id, or repository URL.
    /// Returns the removed id.
    pub async fn uninstall(&self, uri: &str) -> Result<String, AppError> {
        let _lock = InstallLock::acquire(&self.workspace.apps_lock).await?;

        let app_id = self.resolve_id(uri)?;
        let target = self.workspace.app_dir(&app_id);
        if target.symlink_metadata().is_err() {
            return Err(AppError::AppNotFound(uri.to_string()));
        }
        if !is_valid_app(&target) {
            return Err(AppError::InvalidApp(target));
        }
        remove_install(&target);
        tracing::info!(id = %app_id, "uninstalled app");
        Ok(app_id)
    }

    fn resolve_id(&self, uri: &str) -> Result<String, AppError> {
        // An installed id, verbatim. Ids are single path components, so
        // anything with a separator is a path, never an id.
        if !uri.contains(['/', '\\']) && self.workspace.app_dir(uri).symlink_metadata().is_ok() {
            return Ok(uri.to_string());
        }
        if uri.starts_with("http://") || uri.starts_with("https://") {
            let trimmed = id::trim_git_suffix(uri.trim_end_matches('/'));
            let url = Url::parse(trimmed).map_err(|_| AppError::InvalidUri(uri.to_string()))?;
            return id::app_id_from_url(&url);
        }
        let path = Path::new(uri);
        if path.is_dir() {
            return Ok(id::local_app_id(&path.canonicalize()?));
        }
        Err(AppError::AppNotFound(uri.to_string()))
    }

    /// Snapshot every valid app directory (including symlinks).
    pub fn list(&self) -> Result<Vec<AppInfo>, AppError> {
        let entries = match std::fs::read_dir(&self.workspace.apps_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut apps = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            // is_dir follows symlinks, which is exactly what we want.
            if !path.is_dir() || !is_valid_app(&path) {
                continue;
            }
            apps.push(load_or_synthesize(&path));
        }
        apps.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(apps)
    }

    pub fn get_by_id(&self, app_id: &str) -> Result<AppInfo, AppError> {
        let dir = self.workspace.app_dir(app_id);
        if !dir.is_dir() {
            return Err(AppError::AppNotFound(app_id.to_string()));
        }
        if !is_valid_app(&dir) {
            return Err(AppError::InvalidApp(dir));
        }
        Ok(load_or_synthesize(&dir))
    }
}

fn load_or_synthesize(dir: &Path) -> AppInfo {
    match AppInfo::read_from(dir) {
        Ok(Some(info)) => info,
        Ok(None) => AppInfo::synthesized(dir),
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "unreadable app manifest");
            AppInfo::synthesized(dir)
        }
    }
}

/// Remove an install: symlinks are unlinked, directories removed
/// recursively.
fn remove_install(target: &Path) {
    match target.symlink_metadata() {
        Ok(meta) if meta.file_type().is_symlink() => {
            let _ = std::fs::remove_file(target);
        }
        Ok(_) => {
            let _ = std::fs::remove_dir_all(target);
        }
        Err(_) => {}
    }
}

#[cfg(unix)]
fn symlink_dir(source: &Path, target: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(source, target)
}

#[cfg(windows)]
fn symlink_dir(source: &Path, target: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_dir(source, target)
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
