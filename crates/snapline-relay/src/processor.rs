// SPDX-FileCopyrightText: 2026 Snapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Immediate upload processing.
//!
//! Shared by the webhook path and the retry worker: both resolve the user
//! fresh at attempt time, so a binding fixed between failure and retry is
//! picked up automatically.

use std::sync::Arc;

use snapline_core::error::SnaplineError;
use snapline_core::types::{UploadOutcome, User};
use snapline_drive::DriveClient;
use snapline_storage::Database;
use snapline_storage::queries::{ledger, users};
use tracing::warn;

/// Uploads one image for one sender and links the ledger row back to the
/// source message.
pub struct UploadProcessor {
    db: Database,
    drive: Arc<DriveClient>,
}

impl UploadProcessor {
    pub fn new(db: Database, drive: Arc<DriveClient>) -> Self {
        Self { db, drive }
    }

    /// Resolve the sender and upload the image now.
    ///
    /// The Drive client records the attempt in the ledger on both paths;
    /// on success the source message id is attached to the row afterwards,
    /// best effort.
    pub async fn process_immediately(
        &self,
        line_user_id: &str,
        message_id: &str,
        image: &[u8],
    ) -> Result<UploadOutcome, SnaplineError> {
        let user = self.resolve_user(line_user_id).await?;
        let outcome = self.drive.upload(image, &user, None).await?;

        if let Err(e) = ledger::attach_message_id(&self.db, &outcome.file_id, message_id).await {
            warn!(
                message_id,
                file_id = %outcome.file_id,
                error = %e,
                "failed to attach message id to ledger entry"
            );
        }
        Ok(outcome)
    }

    /// Look up the sender's user row, erroring when no account is linked.
    pub async fn resolve_user(&self, line_user_id: &str) -> Result<User, SnaplineError> {
        users::find_by_line_id(&self.db, line_user_id)
            .await?
            .ok_or_else(|| SnaplineError::UserNotFound {
                line_user_id: line_user_id.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snapline_config::model::GoogleConfig;
    use snapline_storage::UploadStatus;
    use tempfile::tempdir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup(server: &MockServer) -> (UploadProcessor, Database, i64, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap())
            .await
            .unwrap();
        let user_id = users::create(
            &db,
            Some("U1".into()),
            None,
            Some("refresh-1".into()),
            Some("folder-1".into()),
        )
        .await
        .unwrap();

        let config = GoogleConfig {
            client_id: Some("cid".into()),
            client_secret: Some("cs".into()),
            token_endpoint: format!("{}/token", server.uri()),
            api_base: server.uri(),
            upload_base: format!("{}/upload", server.uri()),
        };
        let drive = Arc::new(DriveClient::new(&config, db.clone()).unwrap());
        (UploadProcessor::new(db.clone(), drive), db, user_id, dir)
    }

    fn mount_drive_ok(server: &MockServer) -> (Mock, Mock) {
        let token = Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at-1",
            })));
        let upload = Mock::given(method("POST"))
            .and(path("/upload/drive/v3/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "file-1",
                "name": "LINE_20260824_103000.jpg",
                "size": "3",
            })));
        (token, upload)
    }

    #[tokio::test]
    async fn unknown_sender_maps_to_user_not_found() {
        let server = MockServer::start().await;
        let (processor, db, _uid, _dir) = setup(&server).await;

        let err = processor
            .process_immediately("U-unknown", "m-1", &[1])
            .await
            .unwrap_err();
        assert!(matches!(err, SnaplineError::UserNotFound { .. }));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn success_attaches_message_id_to_ledger_row() {
        let server = MockServer::start().await;
        let (processor, db, user_id, _dir) = setup(&server).await;
        let (token, upload) = mount_drive_ok(&server);
        token.mount(&server).await;
        upload.mount(&server).await;

        let outcome = processor
            .process_immediately("U1", "msg-42", &[1, 2, 3])
            .await
            .unwrap();
        assert_eq!(outcome.file_id, "file-1");

        let entries = ledger::recent(&db, user_id, 10).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, UploadStatus::Success);
        assert_eq!(entries[0].line_message_id.as_deref(), Some("msg-42"));
        db.close().await.unwrap();
    }
}
