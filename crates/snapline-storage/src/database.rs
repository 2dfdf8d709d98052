// SPDX-FileCopyrightText: 2026 Snapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background
//! thread. Do NOT create additional Connection instances for writes.

use std::path::Path;

use snapline_core::SnaplineError;
use tokio_rusqlite::Connection;
use tracing::debug;

use crate::migrations;

/// Handle to the Snapline SQLite database.
///
/// Cheap to clone; all clones share the same single-writer connection.
#[derive(Clone)]
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (creating if necessary) the database at `path`, apply PRAGMAs,
    /// and run pending migrations.
    pub async fn open(path: &str) -> Result<Self, SnaplineError> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| SnaplineError::Storage {
                source: Box::new(e),
            })?;
        }

        // Migrations run on a short-lived synchronous connection; refinery
        // needs `&mut rusqlite::Connection` directly.
        {
            let mut conn = rusqlite::Connection::open(path).map_err(map_sq_err)?;
            conn.pragma_update(None, "journal_mode", "WAL")
                .map_err(map_sq_err)?;
            migrations::run_migrations(&mut conn)?;
        }

        let conn = Connection::open(path).await.map_err(map_sq_err)?;
        conn.call(|conn| {
            conn.pragma_update(None, "journal_mode", "WAL")?;
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            conn.pragma_update(None, "foreign_keys", "ON")?;
            conn.pragma_update(None, "busy_timeout", 5000)?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        debug!(path, "database opened");
        Ok(Self { conn })
    }

    /// Returns the shared tokio-rusqlite connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Close the database, flushing the WAL.
    pub async fn close(self) -> Result<(), SnaplineError> {
        self.conn
            .close()
            .await
            .map_err(|e| SnaplineError::Storage {
                source: Box::new(e),
            })
    }
}

/// Map a tokio-rusqlite error into the storage error variant.
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error) -> SnaplineError {
    SnaplineError::Storage {
        source: Box::new(e),
    }
}

/// Map a plain rusqlite error into the storage error variant.
pub(crate) fn map_sq_err(e: rusqlite::Error) -> SnaplineError {
    SnaplineError::Storage {
        source: Box::new(e),
    }
}
