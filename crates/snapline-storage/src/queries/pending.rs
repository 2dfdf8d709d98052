// SPDX-FileCopyrightText: 2026 Snapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pending-queue queries for the one-shot retry pass.
//!
//! Entries are created only when a synchronous upload fails. A row is marked
//! processed after exactly one retry attempt regardless of outcome; the image
//! bytes then remain as a dead row. The failed attempt stays auditable
//! through its ledger entry.

use rusqlite::{Row, params};
use snapline_core::SnaplineError;

use crate::database::{Database, map_tr_err};
use crate::models::PendingUpload;
use crate::queries::parse_ts;

fn map_pending_row(row: &Row<'_>) -> rusqlite::Result<PendingUpload> {
    Ok(PendingUpload {
        id: row.get(0)?,
        line_user_id: row.get(1)?,
        message_id: row.get(2)?,
        image_data: row.get(3)?,
        processed: row.get::<_, i64>(4)? != 0,
        created_at: parse_ts(5, row.get(5)?)?,
    })
}

/// Persist the raw bytes of a failed upload for one retry pass.
/// Returns the auto-generated queue entry id.
pub async fn enqueue(
    db: &Database,
    line_user_id: &str,
    message_id: &str,
    image_data: Vec<u8>,
) -> Result<i64, SnaplineError> {
    let line_user_id = line_user_id.to_string();
    let message_id = message_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO pending_uploads (line_user_id, message_id, image_data)
                 VALUES (?1, ?2, ?3)",
                params![line_user_id, message_id, image_data],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// Select up to `limit` unprocessed entries, oldest first.
///
/// Read-only: the worker marks rows processed individually after each
/// attempt, so a crash mid-pass re-offers the untouched remainder.
pub async fn take_unprocessed(
    db: &Database,
    limit: u32,
) -> Result<Vec<PendingUpload>, SnaplineError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, line_user_id, message_id, image_data, processed, created_at
                 FROM pending_uploads
                 WHERE processed = 0
                 ORDER BY created_at ASC, id ASC
                 LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit], map_pending_row)?;
            let mut entries = Vec::new();
            for row in rows {
                entries.push(row?);
            }
            Ok(entries)
        })
        .await
        .map_err(map_tr_err)
}

/// Mark a queue entry processed. Called unconditionally after the single
/// retry attempt, success or failure.
pub async fn mark_processed(db: &Database, id: i64) -> Result<(), SnaplineError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE pending_uploads SET processed = 1 WHERE id = ?1",
                params![id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
