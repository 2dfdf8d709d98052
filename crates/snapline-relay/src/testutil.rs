// SPDX-FileCopyrightText: 2026 Snapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory [`ChatApi`] double shared by the relay tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use snapline_core::error::SnaplineError;
use snapline_core::traits::ChatApi;
use snapline_core::types::ChatProfile;

/// Records every outbound message and serves canned message content.
#[derive(Default)]
pub struct MockChat {
    replies: Mutex<Vec<(String, String)>>,
    pushes: Mutex<Vec<(String, String)>>,
    content: Mutex<HashMap<String, Vec<u8>>>,
}

impl MockChat {
    pub fn set_content(&self, message_id: &str, bytes: Vec<u8>) {
        self.content
            .lock()
            .unwrap()
            .insert(message_id.to_string(), bytes);
    }

    pub fn replies(&self) -> Vec<(String, String)> {
        self.replies.lock().unwrap().clone()
    }

    pub fn pushes(&self) -> Vec<(String, String)> {
        self.pushes.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatApi for MockChat {
    async fn reply(&self, reply_token: &str, text: &str) -> Result<(), SnaplineError> {
        self.replies
            .lock()
            .unwrap()
            .push((reply_token.to_string(), text.to_string()));
        Ok(())
    }

    async fn push(&self, to: &str, text: &str) -> Result<(), SnaplineError> {
        self.pushes
            .lock()
            .unwrap()
            .push((to.to_string(), text.to_string()));
        Ok(())
    }

    async fn get_message_content(&self, message_id: &str) -> Result<Vec<u8>, SnaplineError> {
        self.content
            .lock()
            .unwrap()
            .get(message_id)
            .cloned()
            .ok_or_else(|| SnaplineError::Chat {
                message: format!("no content staged for {message_id}"),
                source: None,
            })
    }

    async fn get_profile(&self, user_id: &str) -> Result<ChatProfile, SnaplineError> {
        Ok(ChatProfile {
            user_id: user_id.to_string(),
            display_name: "Test User".to_string(),
            picture_url: None,
        })
    }
}
