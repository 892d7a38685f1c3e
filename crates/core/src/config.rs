// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client configuration: JSON file + environment/flag overrides.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::env;

/// Default server every datasite replicates with.
pub const DEFAULT_SERVER_URL: &str = "https://syftbox.net";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },

    #[error("failed to write config at {path}: {source}")]
    Write { path: PathBuf, source: std::io::Error },

    #[error("malformed config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid email {0:?}")]
    InvalidEmail(String),

    #[error("invalid server url {url:?}: {source}")]
    InvalidServerUrl { url: String, source: url::ParseError },

    #[error("data dir must be absolute, got {0:?}")]
    RelativeDataDir(PathBuf),
}

/// Field-level overrides applied on top of the config file.
///
/// Flags beat environment variables, which beat the file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub email: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub server_url: Option<String>,
}

/// The client configuration.
///
/// The access token is transient: it is accepted from the file for
/// compatibility but never written back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where this config was loaded from (not part of the file).
    #[serde(skip)]
    pub path: PathBuf,

    pub data_dir: PathBuf,
    pub email: String,
    pub server_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    #[serde(default, skip_serializing)]
    pub access_token: Option<String>,

    #[serde(default = "default_apps_enabled")]
    pub apps_enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_url: Option<String>,
}

fn default_apps_enabled() -> bool {
    true
}

impl Config {
    /// Resolve the config file path: explicit flag, then
    /// `SYFTBOX_CONFIG_PATH`, then `~/.syftbox/config.json`.
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(p) = explicit {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var(env::CONFIG_PATH) {
            if !p.trim().is_empty() {
                return PathBuf::from(p);
            }
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".syftbox")
            .join("config.json")
    }

    /// Default datasite data directory: `~/SyftBox`.
    pub fn default_data_dir() -> PathBuf {
        dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join("SyftBox")
    }

    /// Load the config file and apply overrides, then validate.
    pub fn load(path: &Path, overrides: ConfigOverrides) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        let mut cfg: Config = serde_json::from_str(&raw)?;
        cfg.path = path.to_path_buf();
        cfg.apply_env();
        cfg.apply_overrides(overrides);
        cfg.validate()?;
        Ok(cfg)
    }

    /// Persist as pretty JSON, creating parent directories.
    ///
    /// The access token is never written (serde skip).
    pub fn save(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|source| ConfigError::Write { path: self.path.clone(), source })?;
        }
        let body = serde_json::to_string_pretty(self)?;
        std::fs::write(&self.path, body)
            .map_err(|source| ConfigError::Write { path: self.path.clone(), source })
    }

    /// Record a rotated refresh token.
    ///
    /// An empty rotation is ignored so a server that returns no token
    /// never clobbers a good one.
    pub fn update_refresh_token(&mut self, token: &str) {
        if token.is_empty() {
            return;
        }
        self.refresh_token = Some(token.to_string());
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_valid_email(&self.email) {
            return Err(ConfigError::InvalidEmail(self.email.clone()));
        }
        url::Url::parse(&self.server_url).map_err(|source| ConfigError::InvalidServerUrl {
            url: self.server_url.clone(),
            source,
        })?;
        if !self.data_dir.is_absolute() {
            return Err(ConfigError::RelativeDataDir(self.data_dir.clone()));
        }
        Ok(())
    }

    fn apply_env(&mut self) {
        if let Ok(v) = std::env::var(env::EMAIL) {
            if !v.trim().is_empty() {
                self.email = v;
            }
        }
        if let Ok(v) = std::env::var(env::DATA_DIR) {
            if !v.trim().is_empty() {
                self.data_dir = PathBuf::from(v);
            }
        }
        if let Ok(v) = std::env::var(env::SERVER_URL) {
            if !v.trim().is_empty() {
                self.server_url = v;
            }
        }
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(email) = overrides.email {
            self.email = email;
        }
        if let Some(data_dir) = overrides.data_dir {
            self.data_dir = data_dir;
        }
        if let Some(server_url) = overrides.server_url {
            self.server_url = server_url;
        }
    }
}

/// Validate an email address.
///
/// Structural check (single `@`, dotted domain, no quoting support)
/// plus the stricter whitespace backstop.
pub fn is_valid_email(email: &str) -> bool {
    static BACKSTOP: OnceLock<Regex> = OnceLock::new();
    let backstop = BACKSTOP.get_or_init(|| {
        #[allow(clippy::unwrap_used)] // literal pattern
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap()
    });

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.is_empty() {
        return false;
    }
    if domain.starts_with('.') || domain.ends_with('.') || !domain.contains('.') {
        return false;
    }
    backstop.is_match(email)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
