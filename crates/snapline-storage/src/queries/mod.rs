// SPDX-FileCopyrightText: 2026 Snapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query operations over the Snapline schema.

pub mod ledger;
pub mod packages;
pub mod pending;
pub mod users;

use chrono::{DateTime, Utc};

/// Parse a stored ISO-8601 timestamp column into a `DateTime<Utc>`.
///
/// Timestamps are written by SQLite's `strftime('%Y-%m-%dT%H:%M:%fZ', 'now')`,
/// which is RFC 3339 compatible.
pub(crate) fn parse_ts(idx: usize, value: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}
