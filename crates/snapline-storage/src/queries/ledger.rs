// SPDX-FileCopyrightText: 2026 Snapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Upload-ledger queries.
//!
//! The ledger is the append-only audit trail of every upload attempt and the
//! sole source of truth for quota accounting: the quota check is a live
//! COUNT over success rows, never a separate counter.

use rusqlite::{Row, params};
use snapline_core::SnaplineError;

use crate::database::{Database, map_tr_err};
use crate::models::{LedgerEntry, UploadStatus};
use crate::queries::parse_ts;

const LEDGER_COLUMNS: &str = "id, user_id, line_message_id, google_file_id, file_name, \
                              file_size, status, error_message, created_at";

fn map_ledger_row(row: &Row<'_>) -> rusqlite::Result<LedgerEntry> {
    let status: String = row.get(6)?;
    let status = status.parse::<UploadStatus>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(LedgerEntry {
        id: row.get(0)?,
        user_id: row.get(1)?,
        line_message_id: row.get(2)?,
        google_file_id: row.get(3)?,
        file_name: row.get(4)?,
        file_size: row.get(5)?,
        status,
        error_message: row.get(7)?,
        created_at: parse_ts(8, row.get(8)?)?,
    })
}

/// Append one upload attempt to the ledger. Returns the entry id.
pub async fn record(
    db: &Database,
    user_id: i64,
    file_name: String,
    google_file_id: Option<String>,
    file_size: i64,
    status: UploadStatus,
    error_message: Option<String>,
) -> Result<i64, SnaplineError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO upload_ledger
                     (user_id, google_file_id, file_name, file_size, status, error_message)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    user_id,
                    google_file_id,
                    file_name,
                    file_size,
                    status.to_string(),
                    error_message
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// Best-effort late attach of the source message id, matched by Drive file id.
///
/// Not transactional with the original insert; bounded by file-id uniqueness.
/// Returns the number of rows updated (0 when no ledger row matches).
pub async fn attach_message_id(
    db: &Database,
    google_file_id: &str,
    line_message_id: &str,
) -> Result<usize, SnaplineError> {
    let google_file_id = google_file_id.to_string();
    let line_message_id = line_message_id.to_string();
    db.connection()
        .call(move |conn| {
            let updated = conn.execute(
                "UPDATE upload_ledger SET line_message_id = ?1 WHERE google_file_id = ?2",
                params![line_message_id, google_file_id],
            )?;
            Ok(updated)
        })
        .await
        .map_err(map_tr_err)
}

/// Count of successful uploads for a user. O(rows) per check by design.
pub async fn count_success(db: &Database, user_id: i64) -> Result<i64, SnaplineError> {
    db.connection()
        .call(move |conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM upload_ledger WHERE user_id = ?1 AND status = 'success'",
                params![user_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
        .await
        .map_err(map_tr_err)
}

/// Most recent ledger entries for a user, newest first. Used by the
/// history/dashboard boundary.
pub async fn recent(
    db: &Database,
    user_id: i64,
    limit: u32,
) -> Result<Vec<LedgerEntry>, SnaplineError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {LEDGER_COLUMNS} FROM upload_ledger
                 WHERE user_id = ?1 ORDER BY id DESC LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![user_id, limit], map_ledger_row)?;
            let mut entries = Vec::new();
            for row in rows {
                entries.push(row?);
            }
            Ok(entries)
        })
        .await
        .map_err(map_tr_err)
}
