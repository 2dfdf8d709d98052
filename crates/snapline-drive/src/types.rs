// SPDX-FileCopyrightText: 2026 Snapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire types for the OAuth2 token endpoint and the Drive v3 API.

use serde::{Deserialize, Serialize};

/// MIME type Drive uses for folders.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Successful response from the OAuth2 token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Error response from the OAuth2 token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenError {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// A file resource as returned by `files.create` / `files.get` / `files.list`.
///
/// Drive serializes int64 fields (`size`) as JSON strings.
#[derive(Debug, Clone, Deserialize)]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(rename = "webViewLink", default)]
    pub web_view_link: Option<String>,
    #[serde(rename = "mimeType", default)]
    pub mime_type: Option<String>,
}

/// Response body of `files.list`.
#[derive(Debug, Clone, Deserialize)]
pub struct FileList {
    #[serde(default)]
    pub files: Vec<DriveFile>,
}

/// Metadata part of a multipart `files.create` upload.
#[derive(Debug, Serialize)]
pub struct FileMetadata<'a> {
    pub name: &'a str,
    #[serde(rename = "mimeType")]
    pub mime_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parents: Option<Vec<&'a str>>,
}
