// SPDX-FileCopyrightText: 2026 Snapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Snapline photo relay.
//!
//! Provides the error taxonomy, domain types, and the chat-platform trait
//! seam used throughout the Snapline workspace.

pub mod error;
pub mod traits;
pub mod types;

pub use error::SnaplineError;
pub use traits::ChatApi;
pub use types::{
    ChatProfile, DriveFolder, LedgerEntry, PendingUpload, UploadOutcome, UploadStatus, User,
};
