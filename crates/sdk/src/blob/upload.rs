// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Uploads: a single PUT for small files, resumable multipart for
//! everything else.
//!
//! The session file on disk is the resume ledger: it is rewritten after
//! every completed part, and only deleted once the server confirms
//! completion. Transient failures leave it in place so the next call
//! picks up where this one stopped.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

use super::session::{fingerprint_of, SessionStore, UploadSession};
use super::types::{
    BlobInfo, CompletedPart, MultipartCompleteRequest, MultipartInitRequest, MultipartInitResponse,
};
use super::{COMPLETE_PATH, MULTIPART_PATH, UPLOAD_PATH};
use crate::{ApiClient, ApiError};

/// Files at or under this size go up as one PUT.
pub const MULTIPART_THRESHOLD: u64 = 32 * 1024 * 1024;
/// Default multipart part size.
pub const DEFAULT_PART_SIZE: u64 = 64 * 1024 * 1024;
/// Object stores reject parts smaller than this.
pub const MIN_PART_SIZE: u64 = 5 * 1024 * 1024;
/// Object stores reject uploads with more parts than this.
pub const MAX_PARTS: u32 = 10_000;
/// Simple progress reporting kicks in from this file size.
const PROGRESS_MIN_SIZE: u64 = 1024 * 1024;

/// Simple progress callback: `(uploaded_bytes, total_bytes)`.
pub type ProgressFn = Arc<dyn Fn(u64, u64) + Send + Sync>;
/// Multipart progress callback.
pub type AdvancedProgressFn = Arc<dyn Fn(&UploadProgress) + Send + Sync>;

/// Multipart progress snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadProgress {
    pub uploaded_bytes: u64,
    pub total_bytes: u64,
    pub part_size: u64,
    pub part_count: u32,
    /// Ascending.
    pub completed_parts: Vec<u32>,
}

/// Inputs to one upload.
#[derive(Clone, Default)]
pub struct UploadParams {
    pub key: String,
    pub file_path: PathBuf,
    pub callback: Option<ProgressFn>,
    pub advanced_callback: Option<AdvancedProgressFn>,
    /// Forces the multipart path when set; defaults to the process-wide
    /// cache directory otherwise.
    pub resume_dir: Option<PathBuf>,
    /// Caller-supplied fingerprint; `size:mtime_ns` otherwise.
    pub fingerprint: Option<String>,
    pub part_size: Option<u64>,
    /// Per-part deadline; a timed-out part is retried on the next round.
    pub part_upload_timeout: Option<Duration>,
}

/// Upload errors.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("part {part} upload failed: server returned {status}")]
    PartStatus { part: u32, status: u16 },

    #[error("part {part} upload failed: {source}")]
    PartTransport { part: u32, source: reqwest::Error },

    #[error("part {part} timed out after {timeout:?}")]
    PartTimeout { part: u32, timeout: Duration },

    #[error("upload session invalid: {0}")]
    InvalidSession(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The upload half of the blob engine.
pub struct BlobUploader {
    api: Arc<ApiClient>,
    /// Presigned PUTs carry their own auth; they bypass the API client.
    store_http: reqwest::Client,
}

impl BlobUploader {
    pub fn new(api: Arc<ApiClient>) -> Self {
        let store_http = api.http().clone();
        Self { api, store_http }
    }

    /// Upload a file. Single PUT when no resume dir is forced and the
    /// file fits the threshold; resumable multipart otherwise.
    pub async fn upload(&self, params: UploadParams) -> Result<BlobInfo, UploadError> {
        let size = tokio::fs::metadata(&params.file_path).await?.len();
        if params.resume_dir.is_none() && size <= MULTIPART_THRESHOLD {
            self.single_put(&params, size).await
        } else {
            self.multipart(&params, size).await
        }
    }

    async fn single_put(&self, params: &UploadParams, size: u64) -> Result<BlobInfo, UploadError> {
        let file = tokio::fs::File::open(&params.file_path).await?;
        let stream = ReaderStream::new(file);

        let body = match &params.callback {
            Some(callback) if size >= PROGRESS_MIN_SIZE => {
                let callback = Arc::clone(callback);
                let sent = Arc::new(AtomicU64::new(0));
                reqwest::Body::wrap_stream(stream.inspect(move |chunk| {
                    if let Ok(bytes) = chunk {
                        let total =
                            sent.fetch_add(bytes.len() as u64, Ordering::Relaxed) + bytes.len() as u64;
                        callback(total, size);
                    }
                }))
            }
            _ => reqwest::Body::wrap_stream(stream),
        };

        tracing::debug!(key = %params.key, size, "uploading blob (single put)");
        let info = self
            .api
            .put_octet_stream(UPLOAD_PATH, &[("key", params.key.as_str())], body, size)
            .await?;
        Ok(info)
    }

    async fn multipart(&self, params: &UploadParams, size: u64) -> Result<BlobInfo, UploadError> {
        let store = SessionStore::new(
            params
                .resume_dir
                .clone()
                .unwrap_or_else(|| SessionStore::default_dir().to_path_buf()),
        );
        store.ensure_dir()?;

        let fingerprint = match &params.fingerprint {
            Some(fingerprint) => fingerprint.clone(),
            None => fingerprint_of(&params.file_path)?,
        };

        let mut session = match store.load(&params.key, &params.file_path) {
            Some(existing)
                if existing.key == params.key
                    && existing.file_path == params.file_path
                    && existing.fingerprint == fingerprint
                    && existing.size == size
                    && existing.is_valid() =>
            {
                tracing::info!(
                    key = %params.key,
                    completed = existing.completed.len(),
                    of = existing.part_count,
                    "resuming multipart upload"
                );
                existing
            }
            Some(_) => {
                tracing::info!(key = %params.key, "upload session is stale, starting fresh");
                store.delete(&params.key, &params.file_path);
                fresh_session(params, size, fingerprint)
            }
            None => fresh_session(params, size, fingerprint),
        };

        let file = tokio::fs::File::open(&params.file_path).await?;

        loop {
            let remaining = session.remaining_parts();
            if remaining.is_empty() {
                break;
            }

            let init: MultipartInitResponse = self
                .api
                .post_json(
                    MULTIPART_PATH,
                    &MultipartInitRequest {
                        key: params.key.clone(),
                        size,
                        part_size: session.part_size,
                        upload_id: session.upload_id.clone(),
                        part_numbers: remaining,
                    },
                )
                .await?;
            session.upload_id = Some(init.upload_id);
            session.part_size = init.part_size;
            session.part_count = init.part_count;
            store.save(&session)?;

            // Ascending part order keeps resumption simple.
            let mut urls: Vec<(u32, String)> = init.urls.into_iter().collect();
            urls.sort_unstable_by_key(|(part, _)| *part);

            let mut completed_this_round = 0u32;
            let mut timed_out: Option<UploadError> = None;
            for (part, url) in urls {
                if session.completed.contains_key(&part) {
                    continue;
                }
                match self
                    .upload_part(&file, &session, part, &url, params.part_upload_timeout)
                    .await
                {
                    Ok(etag) => {
                        session.completed.insert(part, etag);
                        store.save(&session)?;
                        completed_this_round += 1;
                        report_progress(params, &session, size);
                    }
                    Err(UploadError::PartTimeout { part, timeout }) => {
                        tracing::warn!(part, ?timeout, "part timed out, retrying next round");
                        timed_out = Some(UploadError::PartTimeout { part, timeout });
                    }
                    // Anything else bubbles up; the session file stays
                    // behind so the next call resumes.
                    Err(e) => return Err(e),
                }
            }

            if completed_this_round == 0 {
                return Err(timed_out.unwrap_or_else(|| {
                    UploadError::InvalidSession("no parts made progress".to_string())
                }));
            }
        }

        let upload_id = session
            .upload_id
            .clone()
            .ok_or_else(|| UploadError::InvalidSession("missing upload id".to_string()))?;
        let parts: Vec<CompletedPart> = session
            .completed
            .iter()
            .map(|(&part_number, etag)| CompletedPart { part_number, etag: etag.clone() })
            .collect();

        let info: BlobInfo = self
            .api
            .post_json(
                COMPLETE_PATH,
                &MultipartCompleteRequest { key: params.key.clone(), upload_id, parts },
            )
            .await?;
        store.delete(&params.key, &params.file_path);
        tracing::info!(key = %params.key, parts = session.part_count, "multipart upload complete");
        Ok(info)
    }

    async fn upload_part(
        &self,
        file: &tokio::fs::File,
        session: &UploadSession,
        part: u32,
        url: &str,
        part_timeout: Option<Duration>,
    ) -> Result<String, UploadError> {
        let len = session.part_size_for(part);
        let offset = u64::from(part - 1) * session.part_size;

        let mut handle = file.try_clone().await?;
        handle.seek(std::io::SeekFrom::Start(offset)).await?;
        let body = reqwest::Body::wrap_stream(ReaderStream::new(handle.take(len)));

        let request = self
            .store_http
            .put(url)
            .header(reqwest::header::CONTENT_LENGTH, len)
            .body(body)
            .send();
        let response = match part_timeout {
            Some(timeout) if timeout > Duration::ZERO => tokio::time::timeout(timeout, request)
                .await
                .map_err(|_| UploadError::PartTimeout { part, timeout })?,
            _ => request.await,
        }
        .map_err(|source| UploadError::PartTransport { part, source })?;

        match response.status().as_u16() {
            200 | 201 | 204 => {
                let etag = response
                    .headers()
                    .get(reqwest::header::ETAG)
                    .and_then(|v| v.to_str().ok())
                    .map(|v| v.trim_matches('"').to_string())
                    .filter(|v| !v.is_empty())
                    .unwrap_or_else(|| format!("{part}-{len}"));
                Ok(etag)
            }
            status => Err(UploadError::PartStatus { part, status }),
        }
    }
}

fn fresh_session(params: &UploadParams, size: u64, fingerprint: String) -> UploadSession {
    let part_size = choose_part_size(size, params.part_size);
    UploadSession {
        upload_id: None,
        key: params.key.clone(),
        file_path: params.file_path.clone(),
        fingerprint,
        size,
        part_size,
        part_count: size.div_ceil(part_size).max(1) as u32,
        completed: Default::default(),
    }
}

/// Clamp to the store minimum, then double until the part count fits.
fn choose_part_size(size: u64, requested: Option<u64>) -> u64 {
    let mut part_size = requested.unwrap_or(DEFAULT_PART_SIZE).max(MIN_PART_SIZE);
    while size.div_ceil(part_size) > u64::from(MAX_PARTS) {
        part_size *= 2;
    }
    part_size
}

fn report_progress(params: &UploadParams, session: &UploadSession, total: u64) {
    if let Some(callback) = &params.advanced_callback {
        callback(&UploadProgress {
            uploaded_bytes: session.uploaded_bytes(),
            total_bytes: total,
            part_size: session.part_size,
            part_count: session.part_count,
            completed_parts: session.completed_parts(),
        });
    }
    if let Some(callback) = &params.callback {
        callback(session.uploaded_bytes(), total);
    }
}

#[cfg(test)]
#[path = "upload_tests.rs"]
mod tests;
