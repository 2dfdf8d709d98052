// SPDX-FileCopyrightText: 2026 Snapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Background retry worker for the pending upload queue.
//!
//! Runs one pass immediately at startup, then on a fixed interval. Each
//! pass drains up to `batch_size` of the oldest unprocessed rows and gives
//! every row exactly one retry attempt; the row is marked processed whether
//! the retry succeeds or not, so a persistently failing image never wedges
//! the queue. The outcome stays auditable through the ledger.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use snapline_core::error::SnaplineError;
use snapline_storage::Database;
use snapline_storage::queries::pending;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::processor::UploadProcessor;

/// Periodic one-shot retry of queued uploads.
pub struct RetryWorker {
    db: Database,
    processor: Arc<UploadProcessor>,
    batch_size: u32,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl RetryWorker {
    pub fn new(db: Database, processor: Arc<UploadProcessor>, batch_size: u32) -> Self {
        Self {
            db,
            processor,
            batch_size,
            handle: Mutex::new(None),
        }
    }

    /// Spawn the worker loop. Calling `start` on a running worker is a
    /// logged no-op.
    pub fn start(&self, interval: Duration) {
        let mut handle = self.lock_handle();
        if handle.as_ref().is_some_and(|h| !h.is_finished()) {
            warn!("retry worker already running, ignoring start");
            return;
        }

        let db = self.db.clone();
        let processor = Arc::clone(&self.processor);
        let batch_size = self.batch_size;
        *handle = Some(tokio::spawn(async move {
            info!(interval_secs = interval.as_secs(), "retry worker started");
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                // First tick completes immediately: one pass at startup.
                ticker.tick().await;
                match run_pass(&db, &processor, batch_size).await {
                    Ok(0) => {}
                    Ok(n) => debug!(processed = n, "retry pass complete"),
                    Err(e) => error!(error = %e, "retry pass failed"),
                }
            }
        }));
    }

    /// Abort the worker loop. Idempotent; an in-flight row may finish after
    /// the next await point is cancelled and simply stays unprocessed.
    pub fn stop(&self) {
        if let Some(handle) = self.lock_handle().take() {
            handle.abort();
            info!("retry worker stopped");
        }
    }

    /// Run one retry pass. Returns the number of rows attempted.
    pub async fn process_pending(&self) -> Result<usize, SnaplineError> {
        run_pass(&self.db, &self.processor, self.batch_size).await
    }

    fn lock_handle(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        match self.handle.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// One retry pass over the queue.
///
/// Per-row failures are logged and swallowed; the pass continues with the
/// remaining rows.
async fn run_pass(
    db: &Database,
    processor: &UploadProcessor,
    batch_size: u32,
) -> Result<usize, SnaplineError> {
    let entries = pending::take_unprocessed(db, batch_size).await?;
    if entries.is_empty() {
        return Ok(0);
    }
    info!(count = entries.len(), "retrying queued uploads");

    let mut attempted = 0;
    for entry in entries {
        // Fresh user resolution per attempt: a binding repaired since the
        // failure is honored here.
        match processor
            .process_immediately(&entry.line_user_id, &entry.message_id, &entry.image_data)
            .await
        {
            Ok(outcome) => {
                info!(
                    queue_id = entry.id,
                    file_id = %outcome.file_id,
                    "queued upload retried successfully"
                );
            }
            Err(e) => {
                warn!(
                    queue_id = entry.id,
                    line_user_id = %entry.line_user_id,
                    error = %e,
                    "queued upload retry failed, not retrying again"
                );
            }
        }
        // One attempt per row, success or not.
        pending::mark_processed(db, entry.id).await?;
        attempted += 1;
    }
    Ok(attempted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use snapline_config::model::GoogleConfig;
    use snapline_drive::DriveClient;
    use snapline_storage::UploadStatus;
    use snapline_storage::queries::{ledger, users};
    use tempfile::tempdir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup(server: &MockServer) -> (Arc<RetryWorker>, Database, i64, tempfile::TempDir) {
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
        let processor = Arc::new(UploadProcessor::new(db.clone(), drive));
        let worker = Arc::new(RetryWorker::new(db.clone(), processor, 10));
        (worker, db, user_id, dir)
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
                "size": "1",
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn pass_retries_and_marks_rows_processed() {
        let server = MockServer::start().await;
        let (worker, db, user_id, _dir) = setup(&server).await;
        mount_drive_ok(&server).await;

        pending::enqueue(&db, "U1", "m-1", vec![1]).await.unwrap();
        pending::enqueue(&db, "U1", "m-2", vec![2]).await.unwrap();

        assert_eq!(worker.process_pending().await.unwrap(), 2);
        // Both rows consumed: a second pass finds nothing.
        assert_eq!(worker.process_pending().await.unwrap(), 0);

        assert_eq!(ledger::count_success(&db, user_id).await.unwrap(), 2);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn failed_retry_is_not_offered_again() {
        let server = MockServer::start().await;
        let (worker, db, user_id, _dir) = setup(&server).await;
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

        pending::enqueue(&db, "U1", "m-1", vec![1]).await.unwrap();

        assert_eq!(worker.process_pending().await.unwrap(), 1);
        assert_eq!(worker.process_pending().await.unwrap(), 0);

        // The failed attempt is still audited.
        let entries = ledger::recent(&db, user_id, 10).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, UploadStatus::Failed);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn unknown_sender_row_is_consumed_without_ledger_entry() {
        let server = MockServer::start().await;
        let (worker, db, user_id, _dir) = setup(&server).await;

        pending::enqueue(&db, "U-gone", "m-1", vec![1]).await.unwrap();
        assert_eq!(worker.process_pending().await.unwrap(), 1);
        assert_eq!(worker.process_pending().await.unwrap(), 0);
        assert!(ledger::recent(&db, user_id, 10).await.unwrap().is_empty());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn respects_batch_size_per_pass() {
        let server = MockServer::start().await;
        let (_, db, _uid, _dir) = setup(&server).await;
        mount_drive_ok(&server).await;

        let drive_config = GoogleConfig {
            client_id: Some("cid".into()),
            client_secret: Some("cs".into()),
            token_endpoint: format!("{}/token", server.uri()),
            api_base: server.uri(),
            upload_base: format!("{}/upload", server.uri()),
        };
        let drive = Arc::new(DriveClient::new(&drive_config, db.clone()).unwrap());
        let processor = Arc::new(UploadProcessor::new(db.clone(), drive));
        let worker = Arc::new(RetryWorker::new(db.clone(), processor, 3));

        for i in 0..5 {
            pending::enqueue(&db, "U1", &format!("m-{i}"), vec![i as u8])
                .await
                .unwrap();
        }

        assert_eq!(worker.process_pending().await.unwrap(), 3);
        assert_eq!(worker.process_pending().await.unwrap(), 2);
        assert_eq!(worker.process_pending().await.unwrap(), 0);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn start_is_idempotent_and_stop_aborts() {
        let server = MockServer::start().await;
        let (worker, db, _uid, _dir) = setup(&server).await;

        worker.start(Duration::from_secs(3600));
        worker.start(Duration::from_secs(3600)); // no-op
        worker.stop();
        worker.stop(); // idempotent

        // Restart after stop works.
        worker.start(Duration::from_secs(3600));
        worker.stop();
        db.close().await.unwrap();
    }
}
