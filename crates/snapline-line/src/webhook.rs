// SPDX-FileCopyrightText: 2026 Snapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound webhook payload types.
//!
//! Only the fields the dispatcher consumes are modeled; unknown fields are
//! ignored so new LINE event types never break parsing.

use serde::Deserialize;

/// A webhook delivery: zero or more events.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub events: Vec<WebhookEvent>,
}

/// One inbound event.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub message: Option<EventMessage>,
    #[serde(default)]
    pub source: Option<EventSource>,
    #[serde(rename = "replyToken", default)]
    pub reply_token: Option<String>,
}

impl WebhookEvent {
    /// The sending user's chat identifier, when present.
    pub fn user_id(&self) -> Option<&str> {
        self.source.as_ref()?.user_id.as_deref()
    }

    /// Whether this is an inbound message event of the given message kind.
    pub fn is_message_of_kind(&self, kind: &str) -> bool {
        self.kind == "message" && self.message.as_ref().is_some_and(|m| m.kind == kind)
    }
}

/// The message part of a message event.
#[derive(Debug, Clone, Deserialize)]
pub struct EventMessage {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

/// The source part of an event (user, group, or room).
#[derive(Debug, Clone, Deserialize)]
pub struct EventSource {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(rename = "userId", default)]
    pub user_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_image_message_event() {
        let payload: WebhookPayload = serde_json::from_str(
            r#"{
                "destination": "Ubot",
                "events": [{
                    "type": "message",
                    "replyToken": "rt-1",
                    "source": {"type": "user", "userId": "U123"},
                    "timestamp": 1756000000000,
                    "message": {"id": "m-1", "type": "image", "contentProvider": {"type": "line"}}
                }]
            }"#,
        )
        .unwrap();

        assert_eq!(payload.events.len(), 1);
        let event = &payload.events[0];
        assert!(event.is_message_of_kind("image"));
        assert!(!event.is_message_of_kind("text"));
        assert_eq!(event.user_id(), Some("U123"));
        assert_eq!(event.reply_token.as_deref(), Some("rt-1"));
        assert_eq!(event.message.as_ref().unwrap().id, "m-1");
    }

    #[test]
    fn parses_text_message_event() {
        let payload: WebhookPayload = serde_json::from_str(
            r#"{"events": [{
                "type": "message",
                "replyToken": "rt-2",
                "source": {"type": "user", "userId": "U9"},
                "message": {"id": "m-2", "type": "text", "text": "status"}
            }]}"#,
        )
        .unwrap();
        let event = &payload.events[0];
        assert!(event.is_message_of_kind("text"));
        assert_eq!(
            event.message.as_ref().unwrap().text.as_deref(),
            Some("status")
        );
    }

    #[test]
    fn tolerates_unknown_event_types_and_empty_payloads() {
        let payload: WebhookPayload =
            serde_json::from_str(r#"{"events": [{"type": "follow", "source": {"type": "user"}}]}"#)
                .unwrap();
        assert_eq!(payload.events[0].kind, "follow");
        assert!(payload.events[0].user_id().is_none());

        let empty: WebhookPayload = serde_json::from_str(r#"{}"#).unwrap();
        assert!(empty.events.is_empty());
    }
}
