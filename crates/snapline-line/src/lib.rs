// SPDX-FileCopyrightText: 2026 Snapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! LINE Messaging API client for the Snapline relay.
//!
//! Implements [`ChatApi`] over the Messaging API via reqwest: reply, push,
//! profile lookup, and binary content fetch (images arrive on a separate
//! data host). Webhook payload types and signature verification live in
//! [`webhook`] and [`signature`].

pub mod signature;
pub mod webhook;

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use snapline_config::model::LineConfig;
use snapline_core::error::SnaplineError;
use snapline_core::traits::ChatApi;
use snapline_core::types::ChatProfile;
use tracing::debug;

/// LINE Messaging API client implementing [`ChatApi`].
#[derive(Debug, Clone)]
pub struct LineClient {
    http: reqwest::Client,
    api_base: String,
    data_api_base: String,
}

impl LineClient {
    /// Creates a new client from the LINE section of the config.
    ///
    /// Requires `line.channel_access_token` to be set.
    pub fn new(config: &LineConfig) -> Result<Self, SnaplineError> {
        let token = config.channel_access_token.as_deref().ok_or_else(|| {
            SnaplineError::Config("line.channel_access_token is required".into())
        })?;
        if token.is_empty() {
            return Err(SnaplineError::Config(
                "line.channel_access_token cannot be empty".into(),
            ));
        }

        let mut headers = reqwest::header::HeaderMap::new();
        let mut auth = reqwest::header::HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| SnaplineError::Config(format!("invalid channel access token: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(reqwest::header::AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SnaplineError::Chat {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            data_api_base: config.data_api_base.trim_end_matches('/').to_string(),
        })
    }

    async fn post_message(
        &self,
        path: &str,
        body: serde_json::Value,
        what: &str,
    ) -> Result<(), SnaplineError> {
        let url = format!("{}{path}", self.api_base);
        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| SnaplineError::Chat {
                message: format!("failed to send {what}: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(SnaplineError::Chat {
                message: format!("{what} rejected with {status}: {detail}"),
                source: None,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ProfileResponse {
    #[serde(rename = "userId")]
    user_id: String,
    #[serde(rename = "displayName")]
    display_name: String,
    #[serde(rename = "pictureUrl", default)]
    picture_url: Option<String>,
}

#[async_trait]
impl ChatApi for LineClient {
    async fn reply(&self, reply_token: &str, text: &str) -> Result<(), SnaplineError> {
        debug!(reply_token, "sending reply message");
        self.post_message(
            "/v2/bot/message/reply",
            json!({
                "replyToken": reply_token,
                "messages": [{"type": "text", "text": text}],
            }),
            "reply",
        )
        .await
    }

    async fn push(&self, to: &str, text: &str) -> Result<(), SnaplineError> {
        debug!(to, "sending push message");
        self.post_message(
            "/v2/bot/message/push",
            json!({
                "to": to,
                "messages": [{"type": "text", "text": text}],
            }),
            "push",
        )
        .await
    }

    async fn get_message_content(&self, message_id: &str) -> Result<Vec<u8>, SnaplineError> {
        let url = format!("{}/v2/bot/message/{message_id}/content", self.data_api_base);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| SnaplineError::Chat {
                message: format!("content fetch failed for {message_id}: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SnaplineError::Chat {
                message: format!("content fetch for {message_id} rejected with {status}"),
                source: None,
            });
        }

        let bytes = response.bytes().await.map_err(|e| SnaplineError::Chat {
            message: format!("content stream for {message_id} aborted: {e}"),
            source: Some(Box::new(e)),
        })?;
        debug!(message_id, size = bytes.len(), "fetched message content");
        Ok(bytes.to_vec())
    }

    async fn get_profile(&self, user_id: &str) -> Result<ChatProfile, SnaplineError> {
        let url = format!("{}/v2/bot/profile/{user_id}", self.api_base);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| SnaplineError::Chat {
                message: format!("profile fetch failed for {user_id}: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SnaplineError::Chat {
                message: format!("profile fetch for {user_id} rejected with {status}"),
                source: None,
            });
        }

        let profile: ProfileResponse =
            response.json().await.map_err(|e| SnaplineError::Chat {
                message: format!("profile response for {user_id} unparsable: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(ChatProfile {
            user_id: profile.user_id,
            display_name: profile.display_name,
            picture_url: profile.picture_url,
        })
    }
}
