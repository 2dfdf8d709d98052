// SPDX-FileCopyrightText: 2026 Snapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! User identity queries.
//!
//! Rows are created by the account-binding boundary (OAuth callback / LINE
//! link) and only ever read by the relay core, which resolves users fresh by
//! chat identifier on every upload and retry.

use rusqlite::{Row, params};
use snapline_core::SnaplineError;

use crate::database::{Database, map_tr_err};
use crate::models::User;
use crate::queries::parse_ts;

const USER_COLUMNS: &str = "id, line_user_id, google_email, google_refresh_token, \
                            google_folder_id, created_at, updated_at";

fn map_user_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        line_user_id: row.get(1)?,
        google_email: row.get(2)?,
        google_refresh_token: row.get(3)?,
        google_folder_id: row.get(4)?,
        created_at: parse_ts(5, row.get(5)?)?,
        updated_at: parse_ts(6, row.get(6)?)?,
    })
}

/// Create a user row. Returns the auto-generated user id.
pub async fn create(
    db: &Database,
    line_user_id: Option<String>,
    google_email: Option<String>,
    google_refresh_token: Option<String>,
    google_folder_id: Option<String>,
) -> Result<i64, SnaplineError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO users (line_user_id, google_email, google_refresh_token, google_folder_id)
                 VALUES (?1, ?2, ?3, ?4)",
                params![line_user_id, google_email, google_refresh_token, google_folder_id],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// Look up a user by LINE user id. Returns `None` when unbound.
pub async fn find_by_line_id(
    db: &Database,
    line_user_id: &str,
) -> Result<Option<User>, SnaplineError> {
    let line_user_id = line_user_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users WHERE line_user_id = ?1"
            ))?;
            let mut rows = stmt.query_map(params![line_user_id], map_user_row)?;
            match rows.next() {
                Some(row) => Ok(Some(row?)),
                None => Ok(None),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Look up a user by internal id.
pub async fn find_by_id(db: &Database, id: i64) -> Result<Option<User>, SnaplineError> {
    db.connection()
        .call(move |conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))?;
            let mut rows = stmt.query_map(params![id], map_user_row)?;
            match rows.next() {
                Some(row) => Ok(Some(row?)),
                None => Ok(None),
            }
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    #[tokio::test]
    async fn create_and_find_by_line_id() {
        let (db, _dir) = setup_db().await;

        let id = create(
            &db,
            Some("U123".into()),
            Some("user@example.com".into()),
            Some("refresh-token".into()),
            Some("folder-1".into()),
        )
        .await
        .unwrap();
        assert!(id > 0);

        let user = find_by_line_id(&db, "U123").await.unwrap().unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.google_email.as_deref(), Some("user@example.com"));
        assert!(user.is_fully_bound());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn find_missing_user_returns_none() {
        let (db, _dir) = setup_db().await;
        assert!(find_by_line_id(&db, "Unope").await.unwrap().is_none());
        assert!(find_by_id(&db, 999).await.unwrap().is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn user_may_exist_before_binding() {
        let (db, _dir) = setup_db().await;
        let id = create(&db, None, Some("early@example.com".into()), None, None)
            .await
            .unwrap();
        let user = find_by_id(&db, id).await.unwrap().unwrap();
        assert!(user.line_user_id.is_none());
        assert!(!user.is_fully_bound());
        db.close().await.unwrap();
    }
}
