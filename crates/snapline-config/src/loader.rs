// SPDX-FileCopyrightText: 2026 Snapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./snapline.toml` > `~/.config/snapline/snapline.toml`
//! > `/etc/snapline/snapline.toml` with environment variable overrides via
//! the `SNAPLINE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::SnaplineConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/snapline/snapline.toml` (system-wide)
/// 3. `~/.config/snapline/snapline.toml` (user XDG config)
/// 4. `./snapline.toml` (local directory)
/// 5. `SNAPLINE_*` environment variables
pub fn load_config() -> Result<SnaplineConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SnaplineConfig::default()))
        .merge(Toml::file("/etc/snapline/snapline.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("snapline/snapline.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("snapline.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup).
///
/// Used for testing and for loading an explicitly named config file.
pub fn load_config_from_str(toml_content: &str) -> Result<SnaplineConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SnaplineConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<SnaplineConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SnaplineConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `SNAPLINE_LINE_CHANNEL_SECRET` must map
/// to `line.channel_secret`, not `line.channel.secret`.
fn env_provider() -> Env {
    Env::prefixed("SNAPLINE_").map(|key| {
        // `key` is the lowercased env var name with prefix stripped.
        // Example: SNAPLINE_LINE_CHANNEL_SECRET -> "line_channel_secret"
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("server_", "server.", 1)
            .replacen("line_", "line.", 1)
            .replacen("google_", "google.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("relay_", "relay.", 1);
        mapped.into()
    })
}
