// SPDX-FileCopyrightText: 2026 Snapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Package/quota queries.
//!
//! The upload ceiling is the `upload_limit` of the user's most recently
//! started package. Callers apply the configured default when the user has
//! no package row.

use rusqlite::params;
use snapline_core::SnaplineError;

use crate::database::{Database, map_tr_err};

/// Resolve the user's current upload limit, or `None` when no package is assigned.
pub async fn latest_upload_limit(
    db: &Database,
    user_id: i64,
) -> Result<Option<i64>, SnaplineError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT p.upload_limit
                 FROM user_packages up
                 JOIN packages p ON up.package_id = p.id
                 WHERE up.user_id = ?1
                 ORDER BY up.start_date DESC, up.id DESC
                 LIMIT 1",
            )?;
            let mut rows = stmt.query_map(params![user_id], |row| row.get::<_, i64>(0))?;
            match rows.next() {
                Some(row) => Ok(Some(row?)),
                None => Ok(None),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Assign a package to a user, creating the package row. Used by the
/// subscription boundary and by tests.
pub async fn grant(
    db: &Database,
    user_id: i64,
    name: &str,
    upload_limit: i64,
) -> Result<(), SnaplineError> {
    let name = name.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO packages (name, upload_limit) VALUES (?1, ?2)",
                params![name, upload_limit],
            )?;
            let package_id = conn.last_insert_rowid();
            conn.execute(
                "INSERT INTO user_packages (user_id, package_id) VALUES (?1, ?2)",
                params![user_id, package_id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::users;
    use tempfile::tempdir;

    #[tokio::test]
    async fn limit_is_none_without_package_and_latest_wins() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap())
            .await
            .unwrap();
        let user_id = users::create(&db, Some("U1".into()), None, None, None)
            .await
            .unwrap();

        assert!(latest_upload_limit(&db, user_id).await.unwrap().is_none());

        grant(&db, user_id, "starter", 100).await.unwrap();
        grant(&db, user_id, "pro", 5000).await.unwrap();

        // Same start_date timestamps resolve by insertion order.
        assert_eq!(latest_upload_limit(&db, user_id).await.unwrap(), Some(5000));
    }
}
