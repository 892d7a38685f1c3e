// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! On-disk advisory lock serializing app installs.
//!
//! Only one install or uninstall may run per datasite, across
//! processes. The lock file lives at `<data_dir>/apps.lock`.

use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::AppError;

/// Held for the duration of one install/uninstall. Released on drop.
pub(crate) struct InstallLock {
    file: std::fs::File,
}

impl InstallLock {
    /// Block until the lock is acquired.
    ///
    /// The blocking flock runs on the blocking pool so the runtime
    /// stays responsive while another process holds the lock.
    pub(crate) async fn acquire(path: &Path) -> Result<Self, AppError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let path: PathBuf = path.to_path_buf();
        let file = tokio::task::spawn_blocking(move || -> std::io::Result<std::fs::File> {
            let file = std::fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(false)
                .open(&path)?;
            file.lock_exclusive()?;
            Ok(file)
        })
        .await
        .map_err(|e| std::io::Error::other(e))??;
        Ok(Self { file })
    }
}

impl Drop for InstallLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
    }
}
