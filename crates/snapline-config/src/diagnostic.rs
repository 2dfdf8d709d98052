// SPDX-FileCopyrightText: 2026 Snapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Figment-to-miette error bridge.
//!
//! Converts Figment deserialization errors and semantic validation failures
//! into miette diagnostics so config mistakes render with actionable help
//! text instead of a bare Debug dump.

use miette::Diagnostic;
use thiserror::Error;

/// A configuration error with diagnostic help text.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// The configuration failed to parse or deserialize.
    #[error("configuration parse error: {message}")]
    #[diagnostic(
        code(snapline::config::parse),
        help("check `snapline.toml` against the documented keys; unknown keys are rejected")
    )]
    Parse {
        /// Figment's description of the failure, including the offending key.
        message: String,
    },

    /// A value parsed correctly but violates a semantic constraint.
    #[error("invalid configuration: {message}")]
    #[diagnostic(code(snapline::config::validation))]
    Validation {
        /// Description of the violated constraint.
        message: String,
    },
}

/// Convert a Figment error (which may aggregate several failures) into
/// one [`ConfigError::Parse`] per underlying failure.
pub fn figment_to_config_errors(err: figment::Error) -> Vec<ConfigError> {
    err.into_iter()
        .map(|e| ConfigError::Parse {
            message: e.to_string(),
        })
        .collect()
}

/// Render collected configuration errors to stderr via miette.
pub fn render_errors(errors: &[ConfigError]) {
    for error in errors {
        let report = miette::Report::msg(format!("{error}"));
        eprintln!("{report:?}");
        if let Some(help) = error.help() {
            eprintln!("  help: {help}");
        }
    }
}
