// SPDX-FileCopyrightText: 2026 Snapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common domain types shared across the Snapline workspace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// A registered user: identity plus Google Drive binding state.
///
/// A row may exist before the LINE account is linked (`line_user_id` null)
/// and before OAuth completes (`google_refresh_token` null). Rows are never
/// deleted in normal operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub line_user_id: Option<String>,
    pub google_email: Option<String>,
    pub google_refresh_token: Option<String>,
    pub google_folder_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Whether the user has completed the full Drive binding
    /// (OAuth consent granted and a destination folder selected).
    pub fn is_fully_bound(&self) -> bool {
        self.google_refresh_token.is_some() && self.google_folder_id.is_some()
    }
}

/// Outcome of one successful Drive upload, as reported by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadOutcome {
    pub file_id: String,
    pub file_name: String,
    pub file_size: u64,
    pub view_link: Option<String>,
}

/// Status of an upload-ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Success,
    Failed,
}

/// One row of the append-only upload ledger.
///
/// Immutable once written, except for the best-effort late attach of
/// `line_message_id` after a queued retry succeeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub user_id: i64,
    pub line_message_id: Option<String>,
    pub google_file_id: Option<String>,
    pub file_name: String,
    pub file_size: i64,
    pub status: UploadStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A durable queue entry holding the raw image bytes of an upload that
/// failed synchronously, awaiting exactly one retry pass.
#[derive(Debug, Clone)]
pub struct PendingUpload {
    pub id: i64,
    pub line_user_id: String,
    pub message_id: String,
    pub image_data: Vec<u8>,
    pub processed: bool,
    pub created_at: DateTime<Utc>,
}

/// A Drive folder as returned by the folder listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveFolder {
    pub id: String,
    pub name: String,
}

/// A chat-platform user profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatProfile {
    pub user_id: String,
    pub display_name: String,
    pub picture_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn user(token: Option<&str>, folder: Option<&str>) -> User {
        User {
            id: 1,
            line_user_id: Some("U1".into()),
            google_email: Some("a@example.com".into()),
            google_refresh_token: token.map(String::from),
            google_folder_id: folder.map(String::from),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn fully_bound_requires_token_and_folder() {
        assert!(user(Some("rt"), Some("fid")).is_fully_bound());
        assert!(!user(Some("rt"), None).is_fully_bound());
        assert!(!user(None, Some("fid")).is_fully_bound());
        assert!(!user(None, None).is_fully_bound());
    }

    #[test]
    fn upload_status_round_trips_as_lowercase() {
        assert_eq!(UploadStatus::Success.to_string(), "success");
        assert_eq!(UploadStatus::Failed.to_string(), "failed");
        assert_eq!(
            UploadStatus::from_str("success").unwrap(),
            UploadStatus::Success
        );
        assert_eq!(
            UploadStatus::from_str("failed").unwrap(),
            UploadStatus::Failed
        );
    }

    #[test]
    fn upload_status_serde() {
        let json = serde_json::to_string(&UploadStatus::Failed).unwrap();
        assert_eq!(json, r#""failed""#);
        let back: UploadStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, UploadStatus::Failed);
    }
}
