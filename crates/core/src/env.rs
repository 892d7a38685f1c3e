// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable names for the client.
//!
//! Variables in the `injected` half are set on every supervised app
//! process; the `consumed` half is read by the client itself.

// --- consumed by the client ---

/// Config file path override.
pub const CONFIG_PATH: &str = "SYFTBOX_CONFIG_PATH";
/// Email override.
pub const EMAIL: &str = "SYFTBOX_EMAIL";
/// Data directory override.
pub const DATA_DIR: &str = "SYFTBOX_DATA_DIR";
/// Server URL override.
pub const SERVER_URL: &str = "SYFTBOX_SERVER_URL";
/// Log filter override (tracing EnvFilter syntax).
pub const LOG: &str = "SYFTBOX_LOG";
/// Extra PATH segment prepended for desktop-bundled binaries.
pub const DESKTOP_BINARIES_PATH: &str = "SYFTBOX_DESKTOP_BINARIES_PATH";
/// Extra PATH segment prepended for user-supplied tools.
pub const EXTRA_PATH: &str = "SYFTBOX_EXTRA_PATH";

// --- injected into every supervised app ---

/// The app's id (install directory name).
pub const APP_ID: &str = "SYFTBOX_APP_ID";
/// The app's install directory.
pub const APP_DIR: &str = "SYFTBOX_APP_DIR";
/// The port assigned to the app for this run.
pub const APP_PORT: &str = "SYFTBOX_APP_PORT";
/// Alias of [`APP_PORT`] kept for older apps.
pub const ASSIGNED_PORT: &str = "SYFTBOX_ASSIGNED_PORT";
/// Path to the client config file, for apps that use the SDK.
pub const CLIENT_CONFIG_PATH: &str = "SYFTBOX_CLIENT_CONFIG_PATH";
