//! Webex platform: webhook payloads, the REST client, and deep-link rendering.
//!
//! The relay core only talks to Webex through the [`Platform`] trait so it can be
//! driven by a mock in tests; [`WebexClient`] is the reqwest-backed implementation.

mod client;
mod event;
mod link;
mod platform;

pub use client::{WebexClient, DEFAULT_API_BASE};
pub use event::{
    Membership, MessageBody, MessageDetail, Person, Room, WebhookData, WebhookEvent,
};
pub use link::{person_link, room_link, space_uuid};
pub use platform::{AttachmentMeta, Download, OutgoingMessage, Platform, WebexError};
