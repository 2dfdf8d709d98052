// SPDX-FileCopyrightText: 2026 Snapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as valid bind addresses, non-empty paths, and sane
//! timing parameters. Credential presence is checked at `serve` startup,
//! not here, so `migrate` and `config` work without secrets.

use crate::diagnostic::ConfigError;
use crate::model::SnaplineConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &SnaplineConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let host = config.server.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::Validation {
            message: "server.host must not be empty".to_string(),
        });
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(ConfigError::Validation {
                message: format!("server.host `{host}` is not a valid IP address or hostname"),
            });
        }
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    if config.relay.batch_window_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "relay.batch_window_secs must be at least 1".to_string(),
        });
    }

    if config.relay.worker_interval_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "relay.worker_interval_secs must be at least 1".to_string(),
        });
    }

    if config.relay.worker_batch_size == 0 || config.relay.worker_batch_size > 100 {
        errors.push(ConfigError::Validation {
            message: format!(
                "relay.worker_batch_size must be between 1 and 100, got {}",
                config.relay.worker_batch_size
            ),
        });
    }

    if config.relay.default_upload_limit < 0 {
        errors.push(ConfigError::Validation {
            message: format!(
                "relay.default_upload_limit must be non-negative, got {}",
                config.relay.default_upload_limit
            ),
        });
    }

    if !config.relay.frontend_url.starts_with("http://")
        && !config.relay.frontend_url.starts_with("https://")
    {
        errors.push(ConfigError::Validation {
            message: format!(
                "relay.frontend_url must be an http(s) URL, got `{}`",
                config.relay.frontend_url
            ),
        });
    }

    for (key, url) in [
        ("line.api_base", &config.line.api_base),
        ("line.data_api_base", &config.line.data_api_base),
        ("google.token_endpoint", &config.google.token_endpoint),
        ("google.api_base", &config.google.api_base),
        ("google.upload_base", &config.google.upload_base),
    ] {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            errors.push(ConfigError::Validation {
                message: format!("{key} must be an http(s) URL, got `{url}`"),
            });
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
