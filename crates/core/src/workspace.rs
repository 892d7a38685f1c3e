// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Datasite workspace layout derived from the data directory.
//!
//! ```text
//! <data_dir>/
//!   apps.lock        advisory lock serializing app installs
//!   apps/<id>/       installed apps
//!   .data/           client metadata
//!   datasites/       replicated datasite trees
//! ```

use std::path::{Path, PathBuf};

/// Resolved directory layout of one datasite.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub data_dir: PathBuf,
    pub apps_dir: PathBuf,
    pub apps_lock: PathBuf,
    pub metadata_dir: PathBuf,
    pub datasites_dir: PathBuf,
}

impl Workspace {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            apps_dir: data_dir.join("apps"),
            apps_lock: data_dir.join("apps.lock"),
            metadata_dir: data_dir.join(".data"),
            datasites_dir: data_dir.join("datasites"),
            data_dir,
        }
    }

    /// Create every directory of the layout.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [&self.apps_dir, &self.metadata_dir, &self.datasites_dir] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Install directory of an app.
    pub fn app_dir(&self, id: &str) -> PathBuf {
        self.apps_dir.join(id)
    }

    /// Stdio log file of an app, truncated on every start.
    pub fn app_log_file(&self, id: &str) -> PathBuf {
        self.app_dir(id).join("logs").join("app.log")
    }
}

/// Stdio log file for an app rooted at an arbitrary install directory.
pub fn app_log_file_in(app_dir: &Path) -> PathBuf {
    app_dir.join("logs").join("app.log")
}

#[cfg(test)]
#[path = "workspace_tests.rs"]
mod tests;
