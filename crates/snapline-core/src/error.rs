// SPDX-FileCopyrightText: 2026 Snapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Snapline relay.
//!
//! Upload failures carry a typed classification so the dispatcher can pick a
//! targeted user-facing reply without string matching: credential revocation,
//! missing destination folder, and revoked Drive scope each get their own
//! variant, everything else lands in `TransientUpload` and is queued for one
//! retry pass.

use thiserror::Error;

/// The primary error type used across all Snapline crates.
#[derive(Debug, Error)]
pub enum SnaplineError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Chat platform errors (LINE API failure, message delivery, content fetch).
    #[error("chat error: {message}")]
    Chat {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// No user row exists for the given chat identifier.
    #[error("no user bound to chat id {line_user_id}")]
    UserNotFound { line_user_id: String },

    /// The stored refresh token was rejected by the OAuth endpoint
    /// (typically `invalid_grant` after the user revoked access).
    #[error("credential refresh rejected: {detail}")]
    CredentialRefresh { detail: String },

    /// The bound destination folder no longer exists upstream.
    #[error("destination folder not found: {folder_id}")]
    DestinationNotFound { folder_id: String },

    /// The storage scope was revoked or is insufficient for the upload.
    #[error("drive permission denied: {detail}")]
    PermissionDenied { detail: String },

    /// Any other upload failure. These are queued for exactly one retry pass.
    #[error("upload failed: {message}")]
    TransientUpload {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SnaplineError {
    /// Whether this error should be persisted to the pending queue for retry.
    ///
    /// Credential, folder, and permission failures require user action and are
    /// not retried; only transient failures (and unclassified chat/internal
    /// errors reaching the upload path) earn a queue entry.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            SnaplineError::UserNotFound { .. }
                | SnaplineError::CredentialRefresh { .. }
                | SnaplineError::DestinationNotFound { .. }
                | SnaplineError::PermissionDenied { .. }
        )
    }
}
