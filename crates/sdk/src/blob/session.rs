// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persisted resume ledger for in-flight multipart uploads.
//!
//! One JSON file per upload, addressed by `sha1(key + "|" + filePath)`,
//! rewritten after every completed part so an interrupted upload resumes
//! with only its missing parts.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use super::upload::{MAX_PARTS, MIN_PART_SIZE};

/// The on-disk resume state of one multipart upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSession {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_id: Option<String>,
    pub key: String,
    pub file_path: PathBuf,
    /// `size:mtime_ns`, or caller-supplied.
    pub fingerprint: String,
    pub size: u64,
    pub part_size: u64,
    pub part_count: u32,
    /// Completed part number → etag. Ordered, so iteration is ascending.
    #[serde(default)]
    pub completed: BTreeMap<u32, String>,
}

impl UploadSession {
    /// Byte length of one part; the last part may be shorter.
    pub fn part_size_for(&self, part: u32) -> u64 {
        if part == self.part_count {
            self.size - (u64::from(self.part_count) - 1) * self.part_size
        } else {
            self.part_size
        }
    }

    /// Part numbers still missing, ascending.
    pub fn remaining_parts(&self) -> Vec<u32> {
        (1..=self.part_count).filter(|p| !self.completed.contains_key(p)).collect()
    }

    /// Completed part numbers, ascending.
    pub fn completed_parts(&self) -> Vec<u32> {
        self.completed.keys().copied().collect()
    }

    /// Sum of completed part sizes.
    pub fn uploaded_bytes(&self) -> u64 {
        self.completed.keys().map(|&p| self.part_size_for(p)).sum()
    }

    /// Re-validate a loaded session against the multipart invariants.
    /// A session that fails is discarded rather than resumed.
    pub fn is_valid(&self) -> bool {
        self.part_size >= MIN_PART_SIZE
            && self.part_count > 0
            && self.part_count <= MAX_PARTS
            && u64::from(self.part_count) == self.size.div_ceil(self.part_size)
            && self.completed.keys().all(|&p| p >= 1 && p <= self.part_count)
    }
}

/// Fingerprint of a file: `<size>:<mtime_ns>`.
pub fn fingerprint_of(path: &Path) -> std::io::Result<String> {
    let meta = std::fs::metadata(path)?;
    let mtime_ns = meta
        .modified()?
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    Ok(format!("{}:{}", meta.len(), mtime_ns))
}

/// Directory of session files; one file per in-flight upload.
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The process-wide default resume directory.
    pub fn default_dir() -> &'static Path {
        static DIR: OnceLock<PathBuf> = OnceLock::new();
        DIR.get_or_init(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("syftbox")
                .join("uploads")
        })
    }

    pub fn ensure_dir(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)
    }

    fn path_for(&self, key: &str, file_path: &Path) -> PathBuf {
        let mut hasher = Sha1::new();
        hasher.update(key.as_bytes());
        hasher.update(b"|");
        hasher.update(file_path.display().to_string().as_bytes());
        self.dir.join(format!("{}.json", hex::encode(hasher.finalize())))
    }

    /// Load a session; unreadable or unparsable files read as absent.
    pub fn load(&self, key: &str, file_path: &Path) -> Option<UploadSession> {
        let raw = std::fs::read_to_string(self.path_for(key, file_path)).ok()?;
        match serde_json::from_str(&raw) {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::warn!(key, error = %e, "discarding unreadable upload session");
                None
            }
        }
    }

    pub fn save(&self, session: &UploadSession) -> std::io::Result<()> {
        let body = serde_json::to_string(session)?;
        std::fs::write(self.path_for(&session.key, &session.file_path), body)
    }

    pub fn delete(&self, key: &str, file_path: &Path) {
        let _ = std::fs::remove_file(self.path_for(key, file_path));
    }

    pub fn exists(&self, key: &str, file_path: &Path) -> bool {
        self.path_for(key, file_path).is_file()
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
