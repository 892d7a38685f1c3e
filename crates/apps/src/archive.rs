// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Archive-based app installs: host-specific ZIP URL derivation,
//! download, and extraction with the archive's top-level directory
//! stripped.

use std::path::{Path, PathBuf};

use url::Url;

use crate::AppError;

/// Derive the ZIP download URL for a repository.
///
/// The most specific selector wins: commit, then tag, then branch,
/// defaulting to the `main` branch.
pub(crate) fn archive_url(
    repo: &Url,
    branch: Option<&str>,
    tag: Option<&str>,
    commit: Option<&str>,
) -> Result<String, AppError> {
    let host = repo
        .host_str()
        .ok_or_else(|| AppError::InvalidUri(repo.to_string()))?;
    let base = repo.as_str().trim_end_matches('/');

    match host {
        "github.com" => Ok(match (commit, tag, branch) {
            (Some(commit), _, _) => format!("{base}/archive/{commit}.zip"),
            (None, Some(tag), _) => format!("{base}/archive/refs/tags/{tag}.zip"),
            (None, None, Some(branch)) => format!("{base}/archive/refs/heads/{branch}.zip"),
            (None, None, None) => format!("{base}/archive/refs/heads/main.zip"),
        }),
        "gitlab.com" => {
            let reference = commit.or(tag).or(branch).unwrap_or("main");
            Ok(format!("{base}/-/archive/{reference}/archive.zip"))
        }
        other => Err(AppError::UnsupportedHost(other.to_string())),
    }
}

/// Download a ZIP to `dest`.
pub(crate) async fn download_zip(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
) -> Result<(), AppError> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(AppError::DownloadStatus { status: status.as_u16(), url: url.to_string() });
    }
    let body = response.bytes().await?;
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(dest, &body)?;
    Ok(())
}

/// Extract a repository ZIP into `target`, skipping the archive's
/// implicit top-level directory and restoring stored unix modes.
pub(crate) async fn extract_zip(zip_path: &Path, target: &Path) -> Result<(), AppError> {
    let zip_path = zip_path.to_path_buf();
    let target = target.to_path_buf();
    tokio::task::spawn_blocking(move || extract_zip_blocking(&zip_path, &target))
        .await
        .map_err(|e| AppError::Io(std::io::Error::other(e)))?
}

fn extract_zip_blocking(zip_path: &Path, target: &Path) -> Result<(), AppError> {
    let file = std::fs::File::open(zip_path)?;
    let mut archive = zip::ZipArchive::new(file)?;

    std::fs::create_dir_all(target)?;
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        // enclosed_name rejects entries that would escape the target.
        let Some(raw) = entry.enclosed_name() else {
            tracing::warn!(name = entry.name(), "skipping unsafe archive entry");
            continue;
        };

        // Strip the top-level "<repo>-<ref>/" component.
        let mut components = raw.components();
        components.next();
        let relative: PathBuf = components.as_path().to_path_buf();
        if relative.as_os_str().is_empty() {
            continue;
        }

        let dest = target.join(relative);
        if entry.is_dir() {
            std::fs::create_dir_all(&dest)?;
            continue;
        }
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = std::fs::File::create(&dest)?;
        std::io::copy(&mut entry, &mut out)?;
        restore_mode(&dest, entry.unix_mode())?;
    }
    Ok(())
}

#[cfg(unix)]
fn restore_mode(path: &Path, mode: Option<u32>) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    if let Some(mode) = mode {
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn restore_mode(_path: &Path, _mode: Option<u32>) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
#[path = "archive_tests.rs"]
mod tests;
