// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire envelopes for the blob endpoints.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Server's description of a stored blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobInfo {
    pub key: String,
    #[serde(default)]
    pub version: String,
    pub etag: String,
    pub size: u64,
    #[serde(default)]
    pub last_modified: String,
}

/// `POST /api/v1/blob/upload/multipart`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultipartInitRequest {
    pub key: String,
    pub size: u64,
    pub part_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_id: Option<String>,
    pub part_numbers: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultipartInitResponse {
    pub upload_id: String,
    pub part_size: u64,
    pub part_count: u32,
    /// Presigned PUT URL per requested part number.
    pub urls: HashMap<u32, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedPart {
    pub part_number: u32,
    pub etag: String,
}

/// `POST /api/v1/blob/upload/complete`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultipartCompleteRequest {
    pub key: String,
    pub upload_id: String,
    /// Sorted ascending by part number.
    pub parts: Vec<CompletedPart>,
}

/// `POST /api/v1/blob/download`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadRequest {
    pub keys: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadUrl {
    pub key: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadKeyError {
    pub key: String,
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadResponse {
    #[serde(default)]
    pub urls: Vec<DownloadUrl>,
    #[serde(default)]
    pub errors: Vec<DownloadKeyError>,
}
