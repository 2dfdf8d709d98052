// SPDX-FileCopyrightText: 2026 Snapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-user batch aggregation with a sliding inactivity window.
//!
//! Each successful upload lands in the sender's open batch session and
//! re-arms a flush timer. The session flushes (pushes one summary message
//! and disappears) only after a full window passes with no new uploads, so
//! a user sending photos every few minutes gets exactly one summary at the
//! end instead of one per photo.
//!
//! Sessions are in-memory only. A restart drops open batches; the uploads
//! themselves are already durable in Drive and the ledger, only the
//! courtesy summary is lost.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use snapline_core::traits::ChatApi;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::replies;

/// One upload recorded in an open batch session.
#[derive(Debug, Clone)]
pub struct BatchUpload {
    pub file_name: String,
    pub file_id: String,
    pub view_link: Option<String>,
    pub at: DateTime<Utc>,
}

/// Diagnostic snapshot of an open session.
#[derive(Debug, Clone)]
pub struct BatchStatus {
    pub count: usize,
    pub started_at: DateTime<Utc>,
    pub elapsed_secs: u64,
}

struct BatchSession {
    uploads: Vec<BatchUpload>,
    started_at: DateTime<Utc>,
    folder_name: Option<String>,
    folder_id: Option<String>,
    flush_task: Option<JoinHandle<()>>,
}

type SessionMap = Arc<Mutex<HashMap<String, BatchSession>>>;

/// Collects uploads into per-user sessions and pushes a summary once a
/// user has been quiet for the configured window.
pub struct BatchAggregator {
    sessions: SessionMap,
    window: Duration,
    chat: Arc<dyn ChatApi>,
}

impl BatchAggregator {
    pub fn new(window: Duration, chat: Arc<dyn ChatApi>) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            window,
            chat,
        }
    }

    /// Record an upload in the sender's session, re-arming its flush timer.
    ///
    /// Folder name/id are refreshed from every upload that knows them.
    /// Returns `true` when this upload opened a new session, which is the
    /// dispatcher's cue to send the one-per-batch acknowledgement.
    pub fn add_upload(
        &self,
        line_user_id: &str,
        upload: BatchUpload,
        folder_name: Option<String>,
        folder_id: Option<String>,
    ) -> bool {
        let mut sessions = lock_sessions(&self.sessions);
        let is_new = !sessions.contains_key(line_user_id);
        let session = sessions
            .entry(line_user_id.to_string())
            .or_insert_with(|| BatchSession {
                uploads: Vec::new(),
                started_at: Utc::now(),
                folder_name: None,
                folder_id: None,
                flush_task: None,
            });

        // The latest upload that knows the folder wins: a folder change
        // mid-session shows the current destination in the summary.
        if folder_name.is_some() {
            session.folder_name = folder_name;
        }
        if folder_id.is_some() {
            session.folder_id = folder_id;
        }
        session.uploads.push(upload);

        // Sliding window: every upload cancels the previous timer and
        // starts a fresh one.
        if let Some(task) = session.flush_task.take() {
            task.abort();
        }
        let map = Arc::clone(&self.sessions);
        let chat = Arc::clone(&self.chat);
        let uid = line_user_id.to_string();
        // The Sleep pins its deadline at construction, before the task is
        // first polled, so the window starts counting from this upload.
        let window_elapsed = tokio::time::sleep(self.window);
        session.flush_task = Some(tokio::spawn(async move {
            window_elapsed.await;
            flush_session(&map, chat.as_ref(), &uid).await;
        }));

        debug!(
            line_user_id,
            uploads = session.uploads.len(),
            is_new,
            "upload added to batch session"
        );
        is_new
    }

    /// Close the user's session now and push its summary message.
    pub async fn flush(&self, line_user_id: &str) {
        flush_session(&self.sessions, self.chat.as_ref(), line_user_id).await;
    }

    /// Number of uploads waiting in the user's open session, if any.
    pub fn pending_count(&self, line_user_id: &str) -> usize {
        self.status(line_user_id).map(|s| s.count).unwrap_or(0)
    }

    /// Diagnostic snapshot of the user's open session. Non-mutating.
    pub fn status(&self, line_user_id: &str) -> Option<BatchStatus> {
        lock_sessions(&self.sessions)
            .get(line_user_id)
            .map(|s| BatchStatus {
                count: s.uploads.len(),
                started_at: s.started_at,
                elapsed_secs: (Utc::now() - s.started_at).num_seconds().max(0) as u64,
            })
    }

    /// Drop the user's session without a summary, cancelling its timer.
    pub fn cancel(&self, line_user_id: &str) {
        if let Some(session) = lock_sessions(&self.sessions).remove(line_user_id)
            && let Some(task) = session.flush_task
        {
            task.abort();
        }
    }

    /// Drop every open session. Used at shutdown; open batches lose their
    /// summary, never their uploads.
    pub fn cancel_all(&self) {
        for (_, session) in lock_sessions(&self.sessions).drain() {
            if let Some(task) = session.flush_task {
                task.abort();
            }
        }
    }
}

/// Remove the session and push its summary. Shared by the timer task and
/// the explicit flush path; the map lock is released before the push.
async fn flush_session(sessions: &SessionMap, chat: &dyn ChatApi, line_user_id: &str) {
    let Some(session) = lock_sessions(sessions).remove(line_user_id) else {
        return;
    };

    let file_names: Vec<String> = session
        .uploads
        .iter()
        .map(|u| u.file_name.clone())
        .collect();
    let elapsed_secs = (Utc::now() - session.started_at).num_seconds().max(0) as u64;
    info!(
        line_user_id,
        uploads = file_names.len(),
        elapsed_secs,
        "flushing batch session"
    );

    let summary = replies::batch_summary(
        &file_names,
        elapsed_secs,
        session.folder_name.as_deref(),
        session.folder_id.as_deref(),
    );
    if let Err(e) = chat.push(line_user_id, &summary).await {
        warn!(line_user_id, error = %e, "failed to deliver batch summary");
    }
}

fn lock_sessions(sessions: &SessionMap) -> MutexGuard<'_, HashMap<String, BatchSession>> {
    // The map is only touched from non-poisoning paths; recover the guard
    // rather than propagate a poison.
    match sessions.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
