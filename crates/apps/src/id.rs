// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! App id derivation.
//!
//! Remote apps get a reverse-DNS id from their repository URL
//! (`https://github.com/OpenMined/ring → com.github.openmined.ring`);
//! local installs get `local.<basename>` with dots replaced so the id
//! stays a single path component.

use std::path::Path;

use url::Url;

use crate::AppError;

/// Replace dots with hyphens inside one id segment.
fn sanitize_segment(segment: &str) -> String {
    segment.replace('.', "-")
}

/// Id for a local install: `local.` + sanitized basename, original
/// case preserved.
pub fn local_app_id(path: &Path) -> String {
    let basename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("local.{}", sanitize_segment(&basename))
}

/// Id for a repository URL: reversed host joined with the lowercased,
/// sanitized path segments.
pub fn app_id_from_url(url: &Url) -> Result<String, AppError> {
    let host = url
        .host_str()
        .ok_or_else(|| AppError::InvalidUri(url.to_string()))?;

    let mut parts: Vec<String> = host.split('.').rev().map(|p| p.to_lowercase()).collect();
    let segments = url
        .path_segments()
        .ok_or_else(|| AppError::InvalidUri(url.to_string()))?;
    for segment in segments.filter(|s| !s.is_empty()) {
        parts.push(sanitize_segment(&segment.to_lowercase()));
    }
    if parts.len() < 3 {
        // Need at least host + one path segment to name an app.
        return Err(AppError::InvalidUri(url.to_string()));
    }
    Ok(parts.join("."))
}

/// Lowercased basename used as the app's display name.
pub fn app_name_from_url(url: &Url) -> String {
    url.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).next_back())
        .map(|s| s.to_lowercase())
        .unwrap_or_default()
}

/// Strip a trailing `.git` from a repository URL string.
pub fn trim_git_suffix(uri: &str) -> &str {
    uri.strip_suffix(".git").unwrap_or(uri)
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
