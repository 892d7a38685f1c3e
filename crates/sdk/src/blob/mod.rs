// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Blob transfer engine: uploads (single PUT or resumable multipart)
//! and pooled presigned downloads.

mod download;
mod session;
mod types;
mod upload;

pub use download::{
    classify_status, presign_downloads, DownloadError, DownloadJob, DownloadJobRejected,
    DownloadProgressFn, DownloadResult, Downloader, DownloaderOpts, DEFAULT_JOBS, DEFAULT_WORKERS,
};
pub use session::{fingerprint_of, SessionStore, UploadSession};
pub use types::{
    BlobInfo, CompletedPart, DownloadKeyError, DownloadRequest, DownloadResponse, DownloadUrl,
    MultipartInitRequest, MultipartInitResponse, MultipartCompleteRequest,
};
pub use upload::{
    AdvancedProgressFn, BlobUploader, ProgressFn, UploadError, UploadParams, UploadProgress,
    DEFAULT_PART_SIZE, MAX_PARTS, MIN_PART_SIZE, MULTIPART_THRESHOLD,
};

/// Server API paths.
pub const UPLOAD_PATH: &str = "/api/v1/blob/upload";
pub const MULTIPART_PATH: &str = "/api/v1/blob/upload/multipart";
pub const COMPLETE_PATH: &str = "/api/v1/blob/upload/complete";
pub const DOWNLOAD_PATH: &str = "/api/v1/blob/download";
