// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pooled presigned downloads with classified errors.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::types::{DownloadRequest, DownloadResponse};
use super::DOWNLOAD_PATH;
use crate::{ApiClient, ApiError};

/// Default worker pool size.
pub const DEFAULT_WORKERS: usize = 8;
/// Default job queue capacity.
pub const DEFAULT_JOBS: usize = 64;

/// Errors attached to a failed download job.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("presigned url expired")]
    PresignedUrlExpired,

    #[error("presigned url signature mismatch")]
    PresignedUrlInvalid,

    #[error("presigned url forbidden")]
    PresignedUrlForbidden,

    #[error("object not found")]
    PresignedUrlNotFound,

    #[error("rate limited")]
    PresignedUrlRateLimit,

    #[error("server error {0}")]
    Internal(u16),

    #[error("unexpected status {0}")]
    Unknown(u16),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Map a non-2xx object-store response to an error kind.
pub fn classify_status(status: u16, body: &str) -> DownloadError {
    match status {
        403 if body.contains("expired") => DownloadError::PresignedUrlExpired,
        403 if body.contains("SignatureDoesNotMatch") => DownloadError::PresignedUrlInvalid,
        403 => DownloadError::PresignedUrlForbidden,
        404 => DownloadError::PresignedUrlNotFound,
        429 => DownloadError::PresignedUrlRateLimit,
        500..=599 => DownloadError::Internal(status),
        other => DownloadError::Unknown(other),
    }
}

/// Per-job progress callback: `(downloaded_bytes, total_bytes)`;
/// total is 0 when the server sends no Content-Length.
pub type DownloadProgressFn = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// One download to perform.
#[derive(Clone, Default)]
pub struct DownloadJob {
    pub url: String,
    pub target_dir: PathBuf,
    /// Output file name; basename of the URL path when absent.
    pub name: Option<String>,
    pub callback: Option<DownloadProgressFn>,
}

impl std::fmt::Debug for DownloadJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadJob")
            .field("url", &self.url)
            .field("target_dir", &self.target_dir)
            .field("name", &self.name)
            .finish()
    }
}

/// Outcome of one job.
#[derive(Debug)]
pub struct DownloadResult {
    pub job: DownloadJob,
    pub download_path: Option<PathBuf>,
    pub error: Option<DownloadError>,
}

/// Pool configuration.
#[derive(Debug, Clone)]
pub struct DownloaderOpts {
    pub workers: usize,
    pub jobs: usize,
}

impl Default for DownloaderOpts {
    fn default() -> Self {
        Self { workers: DEFAULT_WORKERS, jobs: DEFAULT_JOBS }
    }
}

/// Handle for enqueueing download jobs.
pub struct Downloader {
    jobs_tx: mpsc::Sender<DownloadJob>,
}

impl Downloader {
    /// Spawn the worker pool. The result stream closes once every
    /// submitted job has been consumed (drop the handle to finish) or
    /// the cancellation token fires.
    pub fn spawn(
        http: reqwest::Client,
        opts: DownloaderOpts,
        cancel: CancellationToken,
    ) -> (Self, mpsc::Receiver<DownloadResult>) {
        let workers = opts.workers.max(1);
        let (jobs_tx, jobs_rx) = mpsc::channel::<DownloadJob>(opts.jobs.max(1));
        let (results_tx, results_rx) = mpsc::channel::<DownloadResult>(opts.jobs.max(1));
        let jobs_rx = Arc::new(tokio::sync::Mutex::new(jobs_rx));

        for worker in 0..workers {
            let http = http.clone();
            let jobs_rx = Arc::clone(&jobs_rx);
            let results_tx = results_tx.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                loop {
                    let job = tokio::select! {
                        _ = cancel.cancelled() => break,
                        job = async { jobs_rx.lock().await.recv().await } => match job {
                            Some(job) => job,
                            None => break,
                        },
                    };
                    let result = match fetch(&http, &job).await {
                        Ok(path) => {
                            DownloadResult { job, download_path: Some(path), error: None }
                        }
                        Err(e) => {
                            tracing::warn!(worker, error = %e, "download failed");
                            DownloadResult { job, download_path: None, error: Some(e) }
                        }
                    };
                    if results_tx.send(result).await.is_err() {
                        break; // consumer went away
                    }
                }
            });
        }

        (Self { jobs_tx }, results_rx)
    }

    /// Enqueue a job; waits when the queue is full.
    pub async fn submit(&self, job: DownloadJob) -> Result<(), DownloadJobRejected> {
        self.jobs_tx.send(job).await.map_err(|e| DownloadJobRejected(Box::new(e.0)))
    }
}

/// The pool is gone (cancelled or all workers exited).
#[derive(Debug, thiserror::Error)]
#[error("download pool is closed")]
pub struct DownloadJobRejected(pub Box<DownloadJob>);

/// Ask the server for presigned GET URLs for a batch of keys.
pub async fn presign_downloads(
    api: &ApiClient,
    keys: Vec<String>,
) -> Result<DownloadResponse, ApiError> {
    api.post_json(DOWNLOAD_PATH, &DownloadRequest { keys }).await
}

async fn fetch(http: &reqwest::Client, job: &DownloadJob) -> Result<PathBuf, DownloadError> {
    let mut response = http.get(&job.url).send().await?;
    let status = response.status();
    if !status.is_success() {
        // The poisoned body is classified, never written to disk.
        let body = response.text().await.unwrap_or_default();
        return Err(classify_status(status.as_u16(), &body));
    }

    let name = match &job.name {
        Some(name) if !name.is_empty() => name.clone(),
        _ => basename_of(&job.url),
    };
    tokio::fs::create_dir_all(&job.target_dir).await?;
    let path = job.target_dir.join(name);

    let total = response.content_length().unwrap_or(0);
    let mut downloaded: u64 = 0;
    let mut file = tokio::fs::File::create(&path).await?;
    loop {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                if let Err(e) = file.write_all(&chunk).await {
                    drop(file);
                    let _ = tokio::fs::remove_file(&path).await;
                    return Err(e.into());
                }
                downloaded += chunk.len() as u64;
                if let Some(callback) = &job.callback {
                    callback(downloaded, total);
                }
            }
            Ok(None) => break,
            Err(e) => {
                // Partial output must not look like a finished download.
                drop(file);
                let _ = tokio::fs::remove_file(&path).await;
                return Err(e.into());
            }
        }
    }
    file.flush().await?;
    Ok(path)
}

/// Last path segment of the URL, or a fixed fallback.
fn basename_of(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|s| s.filter(|p| !p.is_empty()).next_back().map(String::from))
        })
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "download".to_string())
}

#[cfg(test)]
#[path = "download_tests.rs"]
mod tests;
