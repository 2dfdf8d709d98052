// SPDX-FileCopyrightText: 2026 Snapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Snapline relay.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup. API base URLs are configurable so tests can point
//! the LINE and Google clients at local mock servers.

use serde::{Deserialize, Serialize};

/// Top-level Snapline configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values;
/// credentials must be supplied before `serve` will start.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SnaplineConfig {
    /// Webhook HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// LINE Messaging API settings.
    #[serde(default)]
    pub line: LineConfig,

    /// Google OAuth2 / Drive API settings.
    #[serde(default)]
    pub google: GoogleConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Batching, retry worker, and quota settings.
    #[serde(default)]
    pub relay: RelayConfig,
}

/// Webhook HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to bind the webhook server to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

/// LINE Messaging API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LineConfig {
    /// Channel secret used to verify webhook signatures.
    #[serde(default)]
    pub channel_secret: Option<String>,

    /// Long-lived channel access token for the Messaging API.
    #[serde(default)]
    pub channel_access_token: Option<String>,

    /// Base URL of the Messaging API (reply, push, profile).
    #[serde(default = "default_line_api_base")]
    pub api_base: String,

    /// Base URL of the content API (binary message payloads).
    #[serde(default = "default_line_data_api_base")]
    pub data_api_base: String,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            channel_secret: None,
            channel_access_token: None,
            api_base: default_line_api_base(),
            data_api_base: default_line_data_api_base(),
        }
    }
}

fn default_line_api_base() -> String {
    "https://api.line.me".to_string()
}

fn default_line_data_api_base() -> String {
    "https://api-data.line.me".to_string()
}

/// Google OAuth2 and Drive API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GoogleConfig {
    /// OAuth2 client id for the refresh-token exchange.
    #[serde(default)]
    pub client_id: Option<String>,

    /// OAuth2 client secret.
    #[serde(default)]
    pub client_secret: Option<String>,

    /// OAuth2 token endpoint.
    #[serde(default = "default_token_endpoint")]
    pub token_endpoint: String,

    /// Drive API base URL (metadata operations).
    #[serde(default = "default_drive_api_base")]
    pub api_base: String,

    /// Drive upload base URL (`files.create` media uploads).
    #[serde(default = "default_drive_upload_base")]
    pub upload_base: String,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            token_endpoint: default_token_endpoint(),
            api_base: default_drive_api_base(),
            upload_base: default_drive_upload_base(),
        }
    }
}

fn default_token_endpoint() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

fn default_drive_api_base() -> String {
    "https://www.googleapis.com".to_string()
}

fn default_drive_upload_base() -> String {
    "https://www.googleapis.com/upload".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("snapline").join("snapline.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("snapline.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Batching, retry worker, and quota configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RelayConfig {
    /// Inactivity window in seconds after the most recent upload before the
    /// batch summary is pushed. The window slides: every upload re-arms it.
    #[serde(default = "default_batch_window_secs")]
    pub batch_window_secs: u64,

    /// Interval in seconds between retry worker passes.
    #[serde(default = "default_worker_interval_secs")]
    pub worker_interval_secs: u64,

    /// Maximum pending-queue rows processed per worker pass.
    #[serde(default = "default_worker_batch_size")]
    pub worker_batch_size: u32,

    /// Upload ceiling applied when the user has no package row.
    #[serde(default = "default_upload_limit")]
    pub default_upload_limit: i64,

    /// Public URL of the account-linking frontend, embedded in guidance replies.
    #[serde(default = "default_frontend_url")]
    pub frontend_url: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            batch_window_secs: default_batch_window_secs(),
            worker_interval_secs: default_worker_interval_secs(),
            worker_batch_size: default_worker_batch_size(),
            default_upload_limit: default_upload_limit(),
            frontend_url: default_frontend_url(),
        }
    }
}

fn default_batch_window_secs() -> u64 {
    300 // 5 minutes of inactivity before the summary fires
}

fn default_worker_interval_secs() -> u64 {
    30
}

fn default_worker_batch_size() -> u32 {
    10
}

fn default_upload_limit() -> i64 {
    10_000
}

fn default_frontend_url() -> String {
    "https://app.snapline.example".to_string()
}
