// SPDX-FileCopyrightText: 2026 Snapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Google Drive upload client for the Snapline relay.
//!
//! Wraps the OAuth2 refresh flow and the Drive v3 multipart upload, folder
//! listing, and folder lookup APIs. Every upload attempt is recorded in the
//! storage ledger, and API errors are classified into the shared error
//! taxonomy at this boundary.

pub mod client;
pub mod types;

pub use client::{DriveClient, generate_file_name};
