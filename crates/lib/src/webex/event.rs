//! Webhook payload and REST resource types.

use serde::{Deserialize, Serialize};

/// Webhook POST body. `resource` is e.g. "messages" or "memberships", `event` is e.g. "created".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    pub resource: String,
    pub event: String,
    /// Person who caused the event (e.g. who added the bot to a room).
    #[serde(default)]
    pub actor_id: String,
    /// Owner of the webhook registration, i.e. the bot's own person id.
    #[serde(default)]
    pub created_by: String,
    #[serde(default)]
    pub data: WebhookData,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookData {
    /// Message id for message events, membership id for membership events.
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub person_email: Option<String>,
    #[serde(default)]
    pub room_id: Option<String>,
    /// Attachment URLs; only the message resource carries these.
    #[serde(default)]
    pub files: Vec<String>,
}

/// A Webex room (conversation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    #[serde(default)]
    pub title: String,
}

impl Room {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub emails: Vec<String>,
}

impl Person {
    pub fn primary_email(&self) -> &str {
        self.emails.first().map(String::as_str).unwrap_or("")
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    #[serde(default)]
    pub person_email: String,
}

/// GET /messages/{id}. Rich messages carry `html`; plain ones only `text`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageDetail {
    #[serde(default)]
    pub html: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

/// A message body as Webex returned it. Only `Html` needs markup conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    Html(String),
    Text(String),
}

impl MessageDetail {
    pub fn into_body(self) -> MessageBody {
        match (self.html, self.text) {
            (Some(html), _) => MessageBody::Html(html),
            (None, text) => MessageBody::Text(text.unwrap_or_default()),
        }
    }
}
