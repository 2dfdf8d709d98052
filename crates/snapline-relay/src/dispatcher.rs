// SPDX-FileCopyrightText: 2026 Snapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook event dispatch.
//!
//! Routes inbound chat events: image messages run the quota check and the
//! immediate upload path, text messages answer the status keyword and
//! onboarding guidance. Every upload failure keeps its bytes in the
//! pending queue; the typed classification only picks the user-facing
//! notice. The retry pass re-resolves the user, so a credential or folder
//! failure can still succeed once the binding is repaired.
//!
//! Outbound notices are best effort: a failed reply or push is logged, not
//! bubbled, so the webhook endpoint still acknowledges the delivery and the
//! platform does not redeliver (and double-upload) the event.

use std::sync::Arc;

use chrono::Utc;
use snapline_core::error::SnaplineError;
use snapline_core::traits::ChatApi;
use snapline_core::types::User;
use snapline_drive::DriveClient;
use snapline_line::webhook::WebhookEvent;
use snapline_storage::Database;
use snapline_storage::queries::{ledger, packages, pending};
use tracing::{debug, info, warn};

use crate::batch::{BatchAggregator, BatchUpload};
use crate::processor::UploadProcessor;
use crate::replies;

/// Keywords (any language) that trigger the status reply.
const STATUS_KEYWORDS: [&str; 3] = ["status", "สถานะ", "เช็คสถานะ"];

/// Routes one webhook event through the upload pipeline.
pub struct Dispatcher {
    db: Database,
    chat: Arc<dyn ChatApi>,
    drive: Arc<DriveClient>,
    processor: Arc<UploadProcessor>,
    batches: Arc<BatchAggregator>,
    default_upload_limit: i64,
    frontend_url: String,
}

impl Dispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: Database,
        chat: Arc<dyn ChatApi>,
        drive: Arc<DriveClient>,
        processor: Arc<UploadProcessor>,
        batches: Arc<BatchAggregator>,
        default_upload_limit: i64,
        frontend_url: String,
    ) -> Self {
        Self {
            db,
            chat,
            drive,
            processor,
            batches,
            default_upload_limit,
            frontend_url,
        }
    }

    /// Handle one inbound event. Unknown event kinds are ignored.
    pub async fn handle_event(&self, event: &WebhookEvent) -> Result<(), SnaplineError> {
        if event.is_message_of_kind("image") {
            self.handle_image(event).await
        } else if event.is_message_of_kind("text") {
            self.handle_text(event).await
        } else {
            debug!(kind = %event.kind, "ignoring event");
            Ok(())
        }
    }

    async fn handle_image(&self, event: &WebhookEvent) -> Result<(), SnaplineError> {
        let (Some(line_user_id), Some(message)) = (event.user_id(), event.message.as_ref()) else {
            return Ok(());
        };
        let reply_token = event.reply_token.as_deref();

        let user = match self.processor.resolve_user(line_user_id).await {
            Ok(user) => user,
            Err(SnaplineError::UserNotFound { .. }) => {
                self.reply(
                    reply_token,
                    &replies::link_account(&self.frontend_url, line_user_id),
                )
                .await;
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        if user.google_refresh_token.is_none() {
            self.reply(reply_token, &replies::connect_google(&self.frontend_url))
                .await;
            return Ok(());
        }
        if user.google_folder_id.is_none() {
            self.reply(reply_token, &replies::choose_folder(&self.frontend_url))
                .await;
            return Ok(());
        }

        // Quota is a live count over the success ledger against the user's
        // most recent package, checked before any bytes move.
        let used = ledger::count_success(&self.db, user.id).await?;
        let limit = packages::latest_upload_limit(&self.db, user.id)
            .await?
            .unwrap_or(self.default_upload_limit);
        if used >= limit {
            info!(line_user_id, used, limit, "upload rejected, quota exhausted");
            self.reply(reply_token, &replies::quota_exhausted(used, limit))
                .await;
            return Ok(());
        }

        let image = match self.chat.get_message_content(&message.id).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(message_id = %message.id, error = %e, "content fetch failed");
                self.reply(reply_token, &replies::upload_failed()).await;
                return Ok(());
            }
        };

        match self
            .processor
            .process_immediately(line_user_id, &message.id, &image)
            .await
        {
            Ok(outcome) => {
                let folder_name = self.folder_display_name(&user).await;
                let started = self.batches.add_upload(
                    line_user_id,
                    BatchUpload {
                        file_name: outcome.file_name,
                        file_id: outcome.file_id,
                        view_link: outcome.view_link,
                        at: Utc::now(),
                    },
                    folder_name,
                    user.google_folder_id.clone(),
                );
                if started {
                    self.reply(reply_token, &replies::batch_started()).await;
                }
                Ok(())
            }
            Err(err) => {
                self.handle_upload_failure(line_user_id, &message.id, image, err)
                    .await
            }
        }
    }

    async fn handle_upload_failure(
        &self,
        line_user_id: &str,
        message_id: &str,
        image: Vec<u8>,
        err: SnaplineError,
    ) -> Result<(), SnaplineError> {
        warn!(line_user_id, message_id, error = %err, "upload failed");
        // The bytes survive every failure mode; the retry pass resolves the
        // user fresh, so a repaired binding lets the queued image through.
        pending::enqueue(&self.db, line_user_id, message_id, image).await?;
        match &err {
            SnaplineError::CredentialRefresh { .. } => {
                self.push(line_user_id, &replies::reauthorize(&self.frontend_url))
                    .await;
            }
            SnaplineError::DestinationNotFound { .. } => {
                self.push(line_user_id, &replies::folder_missing(&self.frontend_url))
                    .await;
            }
            SnaplineError::PermissionDenied { .. } => {
                self.push(
                    line_user_id,
                    &replies::permission_denied(&self.frontend_url),
                )
                .await;
            }
            e if e.is_retryable() => {
                self.push(line_user_id, &replies::upload_queued()).await;
            }
            _ => {
                self.push(line_user_id, &replies::upload_failed()).await;
            }
        }
        Ok(())
    }

    async fn handle_text(&self, event: &WebhookEvent) -> Result<(), SnaplineError> {
        let (Some(line_user_id), Some(message)) = (event.user_id(), event.message.as_ref()) else {
            return Ok(());
        };
        let Some(text) = message.text.as_deref() else {
            return Ok(());
        };
        let reply_token = event.reply_token.as_deref();

        let user = match self.processor.resolve_user(line_user_id).await {
            Ok(user) => user,
            Err(SnaplineError::UserNotFound { .. }) => {
                self.reply(
                    reply_token,
                    &replies::link_account(&self.frontend_url, line_user_id),
                )
                .await;
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let text = text.trim();
        if STATUS_KEYWORDS
            .iter()
            .any(|k| text.eq_ignore_ascii_case(k))
        {
            let used = ledger::count_success(&self.db, user.id).await?;
            let limit = packages::latest_upload_limit(&self.db, user.id)
                .await?
                .unwrap_or(self.default_upload_limit);
            let connected = user.google_refresh_token.is_some();
            let folder_name = if connected && user.google_folder_id.is_some() {
                Some(
                    self.folder_display_name(&user)
                        .await
                        .unwrap_or_else(|| "your selected folder".to_string()),
                )
            } else {
                None
            };
            self.reply(
                reply_token,
                &replies::status(used, limit, connected, folder_name.as_deref()),
            )
            .await;
        }
        // Other text is conversation, not a command; stay silent.
        Ok(())
    }

    /// Best-effort folder name lookup for summaries and status replies.
    async fn folder_display_name(&self, user: &User) -> Option<String> {
        let folder_id = user.google_folder_id.as_deref()?;
        let refresh_token = user.google_refresh_token.as_deref()?;
        self.drive.folder_name(folder_id, refresh_token).await.ok()
    }

    async fn reply(&self, reply_token: Option<&str>, text: &str) {
        let Some(token) = reply_token else {
            return;
        };
        if let Err(e) = self.chat.reply(token, text).await {
            warn!(error = %e, "failed to send reply");
        }
    }

    async fn push(&self, to: &str, text: &str) {
        if let Err(e) = self.chat.push(to, text).await {
            warn!(to, error = %e, "failed to send push message");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MockChat;
    use snapline_config::model::GoogleConfig;
    use snapline_line::webhook::{EventMessage, EventSource};
    use snapline_storage::UploadStatus;
    use snapline_storage::queries::users;
    use std::time::Duration;
    use tempfile::tempdir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Harness {
        dispatcher: Dispatcher,
        chat: Arc<MockChat>,
        db: Database,
        _dir: tempfile::TempDir,
    }

    async fn harness(server: &MockServer) -> Harness {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap())
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
        let processor = Arc::new(UploadProcessor::new(db.clone(), drive.clone()));
        let chat = Arc::new(MockChat::default());
        let batches = Arc::new(BatchAggregator::new(
            Duration::from_millis(200),
            chat.clone() as Arc<dyn ChatApi>,
        ));
        let dispatcher = Dispatcher::new(
            db.clone(),
            chat.clone() as Arc<dyn ChatApi>,
            drive,
            processor,
            batches,
            10_000,
            "https://app.example.com".into(),
        );
        Harness {
            dispatcher,
            chat,
            db,
            _dir: dir,
        }
    }

    async fn bound_user(db: &Database) -> i64 {
        users::create(
            db,
            Some("U1".into()),
            Some("u@example.com".into()),
            Some("refresh-1".into()),
            Some("folder-1".into()),
        )
        .await
        .unwrap()
    }

    fn image_event(message_id: &str) -> WebhookEvent {
        WebhookEvent {
            kind: "message".into(),
            message: Some(EventMessage {
                id: message_id.into(),
                kind: "image".into(),
                text: None,
            }),
            source: Some(EventSource {
                kind: Some("user".into()),
                user_id: Some("U1".into()),
            }),
            reply_token: Some(format!("rt-{message_id}")),
        }
    }

    fn text_event(text: &str) -> WebhookEvent {
        WebhookEvent {
            kind: "message".into(),
            message: Some(EventMessage {
                id: "m-text".into(),
                kind: "text".into(),
                text: Some(text.into()),
            }),
            source: Some(EventSource {
                kind: Some("user".into()),
                user_id: Some("U1".into()),
            }),
            reply_token: Some("rt-text".into()),
        }
    }

    async fn mount_drive_ok(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at-1",
            })))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/upload/drive/v3/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "file-1",
                "name": "LINE_20260824_103000.jpg",
                "size": "3",
            })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/drive/v3/files/folder-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "folder-1",
                "name": "Holiday",
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn unknown_sender_gets_signup_link_and_nothing_persists() {
        let server = MockServer::start().await;
        let h = harness(&server).await;

        h.dispatcher
            .handle_event(&image_event("m-1"))
            .await
            .unwrap();

        let replies = h.chat.replies();
        assert_eq!(replies.len(), 1);
        assert!(replies[0].1.contains("?line_user_id=U1"));
        assert!(
            pending::take_unprocessed(&h.db, 10)
                .await
                .unwrap()
                .is_empty()
        );
        h.db.close().await.unwrap();
    }

    #[tokio::test]
    async fn missing_folder_gets_guidance_without_upload() {
        let server = MockServer::start().await;
        let h = harness(&server).await;
        users::create(
            &h.db,
            Some("U1".into()),
            None,
            Some("refresh-1".into()),
            None,
        )
        .await
        .unwrap();

        h.dispatcher
            .handle_event(&image_event("m-1"))
            .await
            .unwrap();

        let replies = h.chat.replies();
        assert_eq!(replies.len(), 1);
        assert!(replies[0].1.contains("destination folder"));
        // No upload request ever left the process.
        assert!(server.received_requests().await.unwrap().is_empty());
        h.db.close().await.unwrap();
    }

    #[tokio::test]
    async fn quota_exhausted_rejects_before_fetching_content() {
        let server = MockServer::start().await;
        let h = harness(&server).await;
        let user_id = bound_user(&h.db).await;
        packages::grant(&h.db, user_id, "starter", 1).await.unwrap();
        ledger::record(
            &h.db,
            user_id,
            "old.jpg".into(),
            Some("f-old".into()),
            1,
            UploadStatus::Success,
            None,
        )
        .await
        .unwrap();

        h.dispatcher
            .handle_event(&image_event("m-1"))
            .await
            .unwrap();

        let replies = h.chat.replies();
        assert_eq!(replies.len(), 1);
        assert!(replies[0].1.contains("Upload limit reached: 1 of 1"));
        assert!(server.received_requests().await.unwrap().is_empty());
        h.db.close().await.unwrap();
    }

    #[tokio::test]
    async fn batch_of_three_gets_one_ack_and_one_summary() {
        let server = MockServer::start().await;
        let h = harness(&server).await;
        let user_id = bound_user(&h.db).await;
        mount_drive_ok(&server).await;

        for i in 1..=3 {
            let id = format!("m-{i}");
            h.chat.set_content(&id, vec![0xFF, 0xD8, i as u8]);
            h.dispatcher.handle_event(&image_event(&id)).await.unwrap();
        }

        // One acknowledgement for the whole batch, on the first upload.
        let replies = h.chat.replies();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].0, "rt-m-1");
        assert!(replies[0].1.contains("Got it"));

        assert_eq!(ledger::count_success(&h.db, user_id).await.unwrap(), 3);

        // Summary arrives once the window closes.
        tokio::time::sleep(Duration::from_millis(600)).await;
        let pushes = h.chat.pushes();
        assert_eq!(pushes.len(), 1);
        assert_eq!(pushes[0].0, "U1");
        assert!(pushes[0].1.contains("3 photos"));
        assert!(pushes[0].1.contains("Holiday"));
        h.db.close().await.unwrap();
    }

    #[tokio::test]
    async fn transient_failure_queues_retry_and_notifies() {
        let server = MockServer::start().await;
        let h = harness(&server).await;
        bound_user(&h.db).await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at-1",
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/upload/drive/v3/files"))
            .respond_with(ResponseTemplate::new(503).set_body_string("backend unavailable"))
            .mount(&server)
            .await;

        let bytes = vec![0xFF, 0xD8, 0x01];
        h.chat.set_content("m-1", bytes.clone());
        h.dispatcher
            .handle_event(&image_event("m-1"))
            .await
            .unwrap();

        let queued = pending::take_unprocessed(&h.db, 10).await.unwrap();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].message_id, "m-1");
        assert_eq!(queued[0].image_data, bytes);

        let pushes = h.chat.pushes();
        assert_eq!(pushes.len(), 1);
        assert!(pushes[0].1.contains("retry automatically"));
        h.db.close().await.unwrap();
    }

    #[tokio::test]
    async fn revoked_credentials_prompt_reauthorization_and_keep_bytes() {
        let server = MockServer::start().await;
        let h = harness(&server).await;
        bound_user(&h.db).await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(serde_json::json!({"error": "invalid_grant"})),
            )
            .mount(&server)
            .await;

        let bytes = vec![0xFF, 0xD8, 0x01];
        h.chat.set_content("m-1", bytes.clone());
        h.dispatcher
            .handle_event(&image_event("m-1"))
            .await
            .unwrap();

        let pushes = h.chat.pushes();
        assert_eq!(pushes.len(), 1);
        assert!(pushes[0].1.contains("sign in again"));

        // The image waits in the queue; a retry after the user reconnects
        // can still deliver it.
        let queued = pending::take_unprocessed(&h.db, 10).await.unwrap();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].image_data, bytes);
        h.db.close().await.unwrap();
    }

    #[tokio::test]
    async fn deleted_folder_notifies_and_keeps_bytes() {
        let server = MockServer::start().await;
        let h = harness(&server).await;
        bound_user(&h.db).await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at-1",
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/upload/drive/v3/files"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "error": {"code": 404, "message": "File not found: folder-1."}
            })))
            .mount(&server)
            .await;

        let bytes = vec![0xFF, 0xD8, 0x02];
        h.chat.set_content("m-1", bytes.clone());
        h.dispatcher
            .handle_event(&image_event("m-1"))
            .await
            .unwrap();

        let pushes = h.chat.pushes();
        assert_eq!(pushes.len(), 1);
        assert!(pushes[0].1.contains("choose a new folder"));

        let queued = pending::take_unprocessed(&h.db, 10).await.unwrap();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].message_id, "m-1");
        assert_eq!(queued[0].image_data, bytes);
        h.db.close().await.unwrap();
    }

    #[tokio::test]
    async fn unconnected_user_gets_connect_prompt_not_signup_link() {
        let server = MockServer::start().await;
        let h = harness(&server).await;
        users::create(&h.db, Some("U1".into()), None, None, None)
            .await
            .unwrap();

        h.dispatcher
            .handle_event(&image_event("m-1"))
            .await
            .unwrap();

        let replies = h.chat.replies();
        assert_eq!(replies.len(), 1);
        assert!(replies[0].1.contains("isn't connected"));
        assert!(!replies[0].1.contains("?line_user_id="));
        h.db.close().await.unwrap();
    }

    #[tokio::test]
    async fn status_keyword_reports_usage() {
        let server = MockServer::start().await;
        let h = harness(&server).await;
        let user_id = bound_user(&h.db).await;
        mount_drive_ok(&server).await;
        ledger::record(
            &h.db,
            user_id,
            "a.jpg".into(),
            Some("f-1".into()),
            1,
            UploadStatus::Success,
            None,
        )
        .await
        .unwrap();

        h.dispatcher
            .handle_event(&text_event("  Status "))
            .await
            .unwrap();
        h.dispatcher
            .handle_event(&text_event("สถานะ"))
            .await
            .unwrap();

        let replies = h.chat.replies();
        assert_eq!(replies.len(), 2);
        assert!(replies[0].1.contains("1 / 10000"));
        assert!(replies[0].1.contains("Holiday"));
        h.db.close().await.unwrap();
    }

    #[tokio::test]
    async fn status_for_unconnected_user_reflects_the_missing_binding() {
        let server = MockServer::start().await;
        let h = harness(&server).await;
        users::create(&h.db, Some("U1".into()), None, None, None)
            .await
            .unwrap();

        h.dispatcher
            .handle_event(&text_event("status"))
            .await
            .unwrap();

        let replies = h.chat.replies();
        assert_eq!(replies.len(), 1);
        assert!(replies[0].1.contains("not connected"));
        assert!(!replies[0].1.contains("Destination folder"));
        h.db.close().await.unwrap();
    }

    #[tokio::test]
    async fn non_command_text_is_ignored() {
        let server = MockServer::start().await;
        let h = harness(&server).await;
        bound_user(&h.db).await;

        h.dispatcher
            .handle_event(&text_event("hello there"))
            .await
            .unwrap();
        assert!(h.chat.replies().is_empty());
        assert!(h.chat.pushes().is_empty());
        h.db.close().await.unwrap();
    }
}
