// SPDX-FileCopyrightText: 2026 Snapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait seams for external collaborators.
//!
//! The relay core talks to the chat platform only through [`ChatApi`], so
//! tests can substitute an in-memory mock and the batch aggregator stays
//! independent of the concrete LINE client.

use async_trait::async_trait;

use crate::error::SnaplineError;
use crate::types::ChatProfile;

/// Outbound chat-platform operations consumed by the relay core.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Reply to a specific inbound event using its one-shot reply token.
    async fn reply(&self, reply_token: &str, text: &str) -> Result<(), SnaplineError>;

    /// Push a message to a user outside any reply context.
    async fn push(&self, to: &str, text: &str) -> Result<(), SnaplineError>;

    /// Fetch the binary payload of an inbound message (image bytes).
    async fn get_message_content(&self, message_id: &str) -> Result<Vec<u8>, SnaplineError>;

    /// Fetch the user's chat-platform profile.
    async fn get_profile(&self, user_id: &str) -> Result<ChatProfile, SnaplineError>;
}
