// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-app metadata persisted as `.syftboxapp.json` inside the install
//! directory. Absence of the file is allowed and means "local app".

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::AppError;

/// Metadata file name inside every install directory.
pub const MANIFEST_FILE: &str = ".syftboxapp.json";

/// Where an app came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppSource {
    Git,
    Local,
}

/// One installed app.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppInfo {
    /// Stable id; equals the install directory name.
    pub id: String,
    /// Lowercased basename.
    pub name: String,
    /// Absolute install directory.
    pub path: PathBuf,
    pub source: AppSource,
    #[serde(rename = "sourceURI")]
    pub source_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    #[serde(rename = "installedOn")]
    pub installed_on: DateTime<Utc>,
}

impl AppInfo {
    /// Read the manifest from an install directory. A missing file is
    /// `Ok(None)`; a malformed one is an error.
    pub fn read_from(dir: &Path) -> Result<Option<Self>, AppError> {
        let path = dir.join(MANIFEST_FILE);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let info = serde_json::from_str(&raw).map_err(|source| AppError::Manifest { path, source })?;
        Ok(Some(info))
    }

    /// Write the manifest into the install directory.
    pub fn write_to(&self, dir: &Path) -> Result<(), AppError> {
        let path = dir.join(MANIFEST_FILE);
        let body = serde_json::to_string_pretty(self)
            .map_err(|source| AppError::Manifest { path: path.clone(), source })?;
        std::fs::write(&path, body)?;
        Ok(())
    }

    /// Synthesize a minimal record for a directory with no manifest.
    pub fn synthesized(dir: &Path) -> Self {
        let id = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            name: id.to_lowercase(),
            id,
            path: dir.to_path_buf(),
            source: AppSource::Local,
            source_uri: dir.display().to_string(),
            branch: None,
            tag: None,
            commit: None,
            installed_on: Utc::now(),
        }
    }
}

#[cfg(test)]
#[path = "manifest_tests.rs"]
mod tests;
