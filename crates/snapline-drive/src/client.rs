// SPDX-FileCopyrightText: 2026 Snapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Google Drive upload client.
//!
//! Each upload attempt refreshes a short-lived access token from the user's
//! stored refresh token, streams the bytes via a multipart `files.create`
//! call, and records the outcome in the upload ledger on BOTH paths. The
//! ledger is the append-only audit trail; an attempt must never go
//! unrecorded, so ledger write failures are logged loudly but do not mask
//! the upload result.
//!
//! Drive API failures are classified here, at the boundary, into the typed
//! error taxonomy; callers match on variants instead of scraping messages.

use std::time::Duration;

use chrono::Utc;
use snapline_config::model::GoogleConfig;
use snapline_core::error::SnaplineError;
use snapline_core::types::{DriveFolder, UploadOutcome, User};
use snapline_storage::queries::ledger;
use snapline_storage::{Database, UploadStatus};
use tracing::{debug, error, info};

use crate::types::{DriveFile, FileList, FileMetadata, FOLDER_MIME_TYPE, TokenError, TokenResponse};

/// Boundary string for multipart/related upload bodies.
const MULTIPART_BOUNDARY: &str = "snapline-drive-upload";

/// Drive client bound to one OAuth2 application and the upload ledger.
#[derive(Clone)]
pub struct DriveClient {
    http: reqwest::Client,
    db: Database,
    client_id: String,
    client_secret: String,
    token_endpoint: String,
    api_base: String,
    upload_base: String,
}

impl DriveClient {
    /// Creates a new Drive client from the Google section of the config.
    ///
    /// Requires `google.client_id` and `google.client_secret` to be set.
    pub fn new(config: &GoogleConfig, db: Database) -> Result<Self, SnaplineError> {
        let client_id = config
            .client_id
            .clone()
            .ok_or_else(|| SnaplineError::Config("google.client_id is required".into()))?;
        let client_secret = config
            .client_secret
            .clone()
            .ok_or_else(|| SnaplineError::Config("google.client_secret is required".into()))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| SnaplineError::TransientUpload {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            http,
            db,
            client_id,
            client_secret,
            token_endpoint: config.token_endpoint.trim_end_matches('/').to_string(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            upload_base: config.upload_base.trim_end_matches('/').to_string(),
        })
    }

    /// Exchange a long-lived refresh token for a short-lived access token.
    ///
    /// An `invalid_grant` response means the user revoked access: callers
    /// must be able to tell that apart from transient failure, so it maps to
    /// [`SnaplineError::CredentialRefresh`].
    pub async fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<String, SnaplineError> {
        let response = self
            .http
            .post(&self.token_endpoint)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| SnaplineError::TransientUpload {
                message: format!("token endpoint unreachable: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if let Ok(err) = serde_json::from_str::<TokenError>(&body)
                && err.error == "invalid_grant"
            {
                return Err(SnaplineError::CredentialRefresh {
                    detail: err
                        .error_description
                        .unwrap_or_else(|| "invalid_grant".to_string()),
                });
            }
            return Err(SnaplineError::TransientUpload {
                message: format!("token refresh failed with {status}: {body}"),
                source: None,
            });
        }

        let token: TokenResponse =
            response
                .json()
                .await
                .map_err(|e| SnaplineError::TransientUpload {
                    message: format!("token response unparsable: {e}"),
                    source: Some(Box::new(e)),
                })?;
        debug!("access token refreshed");
        Ok(token.access_token)
    }

    /// Perform one upload attempt for `user` and record the outcome.
    ///
    /// A missing file name is synthesized from the timestamp naming scheme.
    /// On failure the original (classified) error is re-raised after the
    /// `failed` ledger row is written.
    pub async fn upload(
        &self,
        image: &[u8],
        user: &User,
        file_name: Option<String>,
    ) -> Result<UploadOutcome, SnaplineError> {
        let file_name = file_name.unwrap_or_else(generate_file_name);

        match self.try_upload(image, user, &file_name).await {
            Ok(outcome) => {
                self.record_attempt(
                    user.id,
                    outcome.file_name.clone(),
                    Some(outcome.file_id.clone()),
                    outcome.file_size as i64,
                    UploadStatus::Success,
                    None,
                )
                .await;
                info!(
                    user_id = user.id,
                    file_id = %outcome.file_id,
                    size = outcome.file_size,
                    "upload succeeded"
                );
                Ok(outcome)
            }
            Err(err) => {
                self.record_attempt(
                    user.id,
                    file_name,
                    None,
                    0,
                    UploadStatus::Failed,
                    Some(err.to_string()),
                )
                .await;
                Err(err)
            }
        }
    }

    async fn try_upload(
        &self,
        image: &[u8],
        user: &User,
        file_name: &str,
    ) -> Result<UploadOutcome, SnaplineError> {
        let refresh_token = user.google_refresh_token.as_deref().ok_or_else(|| {
            SnaplineError::CredentialRefresh {
                detail: "no refresh token stored for user".into(),
            }
        })?;
        let access_token = self.refresh_access_token(refresh_token).await?;

        let metadata = FileMetadata {
            name: file_name,
            mime_type: "image/jpeg",
            parents: user
                .google_folder_id
                .as_deref()
                .map(|folder| vec![folder]),
        };
        let metadata_json =
            serde_json::to_string(&metadata).map_err(|e| SnaplineError::Internal(e.to_string()))?;
        let body = build_multipart_related(&metadata_json, image, MULTIPART_BOUNDARY);

        let url = format!(
            "{}/drive/v3/files?uploadType=multipart&fields=id,name,size,webViewLink",
            self.upload_base
        );
        let response = self
            .http
            .post(&url)
            .bearer_auth(&access_token)
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={MULTIPART_BOUNDARY}"),
            )
            .body(body)
            .send()
            .await
            .map_err(|e| SnaplineError::TransientUpload {
                message: format!("upload request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_api_error(status, &body));
        }

        let file: DriveFile = response
            .json()
            .await
            .map_err(|e| SnaplineError::TransientUpload {
                message: format!("upload response unparsable: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(UploadOutcome {
            file_id: file.id,
            file_name: file.name,
            file_size: file
                .size
                .as_deref()
                .and_then(|s| s.parse().ok())
                .unwrap_or(image.len() as u64),
            view_link: file.web_view_link,
        })
    }

    /// Look up a folder's display name. Used to label batch summaries.
    pub async fn folder_name(
        &self,
        folder_id: &str,
        refresh_token: &str,
    ) -> Result<String, SnaplineError> {
        let access_token = self.refresh_access_token(refresh_token).await?;
        let url = format!("{}/drive/v3/files/{folder_id}?fields=id,name", self.api_base);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&access_token)
            .send()
            .await
            .map_err(|e| SnaplineError::TransientUpload {
                message: format!("folder lookup failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_api_error(status, &body));
        }

        let file: DriveFile = response
            .json()
            .await
            .map_err(|e| SnaplineError::TransientUpload {
                message: format!("folder response unparsable: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(file.name)
    }

    /// List the user's Drive folders (non-trashed, name order).
    pub async fn list_folders(&self, user: &User) -> Result<Vec<DriveFolder>, SnaplineError> {
        let refresh_token = user.google_refresh_token.as_deref().ok_or_else(|| {
            SnaplineError::CredentialRefresh {
                detail: "no refresh token stored for user".into(),
            }
        })?;
        let access_token = self.refresh_access_token(refresh_token).await?;

        let url = format!("{}/drive/v3/files", self.api_base);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&access_token)
            .query(&[
                (
                    "q",
                    format!("mimeType='{FOLDER_MIME_TYPE}' and trashed=false"),
                ),
                ("fields", "files(id, name, mimeType)".to_string()),
                ("orderBy", "name".to_string()),
                ("pageSize", "100".to_string()),
            ])
            .send()
            .await
            .map_err(|e| SnaplineError::TransientUpload {
                message: format!("folder listing failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_api_error(status, &body));
        }

        let list: FileList = response
            .json()
            .await
            .map_err(|e| SnaplineError::TransientUpload {
                message: format!("folder listing unparsable: {e}"),
                source: Some(Box::new(e)),
            })?;

        // The query already filters by MIME type; drop anything that slipped through.
        Ok(list
            .files
            .into_iter()
            .filter(|f| f.mime_type.as_deref() == Some(FOLDER_MIME_TYPE))
            .map(|f| DriveFolder {
                id: f.id,
                name: f.name,
            })
            .collect())
    }

    /// Create a folder in the user's Drive.
    pub async fn create_folder(
        &self,
        name: &str,
        user: &User,
    ) -> Result<DriveFolder, SnaplineError> {
        let refresh_token = user.google_refresh_token.as_deref().ok_or_else(|| {
            SnaplineError::CredentialRefresh {
                detail: "no refresh token stored for user".into(),
            }
        })?;
        let access_token = self.refresh_access_token(refresh_token).await?;

        let url = format!("{}/drive/v3/files?fields=id,name", self.api_base);
        let metadata = FileMetadata {
            name,
            mime_type: FOLDER_MIME_TYPE,
            parents: None,
        };
        let response = self
            .http
            .post(&url)
            .bearer_auth(&access_token)
            .json(&metadata)
            .send()
            .await
            .map_err(|e| SnaplineError::TransientUpload {
                message: format!("folder creation failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_api_error(status, &body));
        }

        let file: DriveFile = response
            .json()
            .await
            .map_err(|e| SnaplineError::TransientUpload {
                message: format!("folder creation response unparsable: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(DriveFolder {
            id: file.id,
            name: file.name,
        })
    }

    /// Append the attempt to the ledger. The audit trail must never silently
    /// drop an attempt, so a write failure is logged as an error.
    async fn record_attempt(
        &self,
        user_id: i64,
        file_name: String,
        google_file_id: Option<String>,
        file_size: i64,
        status: UploadStatus,
        error_message: Option<String>,
    ) {
        if let Err(e) = ledger::record(
            &self.db,
            user_id,
            file_name,
            google_file_id,
            file_size,
            status,
            error_message,
        )
        .await
        {
            error!(user_id, error = %e, "failed to write upload ledger entry");
        }
    }
}

/// Synthesize the timestamp-based upload name: `LINE_YYYYMMDD_HHMMSS.jpg`.
///
/// Lexicographically sortable; collisions within one second are accepted for
/// this workload.
pub fn generate_file_name() -> String {
    format!("LINE_{}.jpg", Utc::now().format("%Y%m%d_%H%M%S"))
}

/// Assemble a multipart/related body: JSON metadata part + media part.
fn build_multipart_related(metadata_json: &str, image: &[u8], boundary: &str) -> Vec<u8> {
    let mut body = Vec::with_capacity(image.len() + metadata_json.len() + 256);
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata_json}\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(
        format!("--{boundary}\r\nContent-Type: image/jpeg\r\n\r\n").as_bytes(),
    );
    body.extend_from_slice(image);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

/// Classify a Drive API error response into the typed taxonomy.
fn classify_api_error(status: reqwest::StatusCode, body: &str) -> SnaplineError {
    if status == reqwest::StatusCode::NOT_FOUND || body.contains("notFound") {
        return SnaplineError::DestinationNotFound {
            folder_id: extract_not_found_id(body).unwrap_or_else(|| "unknown".into()),
        };
    }
    if status == reqwest::StatusCode::FORBIDDEN
        || body.contains("insufficientPermissions")
        || body.contains("Insufficient Permission")
    {
        return SnaplineError::PermissionDenied {
            detail: format!("{status}: {body}"),
        };
    }
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return SnaplineError::CredentialRefresh {
            detail: format!("access token rejected: {body}"),
        };
    }
    SnaplineError::TransientUpload {
        message: format!("drive API error {status}: {body}"),
        source: None,
    }
}

/// Pull the file id out of Drive's "File not found: <id>." error text.
fn extract_not_found_id(body: &str) -> Option<String> {
    let rest = body.split("File not found: ").nth(1)?;
    let id: String = rest
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    (!id.is_empty()).then_some(id)
}
