//! Platform seam: every Webex call the relay makes goes through this trait.

use crate::webex::event::{MessageBody, Person, Room};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum WebexError {
    #[error("webex request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("HTTPError {status}: {body}")]
    Api { status: u16, body: String },
    #[error("local file error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of a HEAD request against an attachment URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachmentMeta {
    /// `content-length`; `None` when the header is absent or unparseable.
    pub size_bytes: Option<u64>,
    /// Raw `content-disposition` header value.
    pub content_disposition: Option<String>,
}

/// One download attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Download {
    /// The body was written to the destination path.
    Saved { bytes: u64 },
    /// HTTP 423: the file is still being scanned; try again after `retry_after`.
    Locked { retry_after: Duration },
}

/// A markdown message, optionally threaded and optionally carrying one file.
#[derive(Debug, Clone, Copy)]
pub struct OutgoingMessage<'a> {
    pub room_id: &'a str,
    pub markdown: &'a str,
    pub parent_id: Option<&'a str>,
    pub file: Option<&'a Path>,
}

impl<'a> OutgoingMessage<'a> {
    pub fn new(room_id: &'a str, markdown: &'a str) -> Self {
        Self {
            room_id,
            markdown,
            parent_id: None,
            file: None,
        }
    }

    pub fn in_thread(mut self, parent_id: &'a str) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn with_file(mut self, file: Option<&'a Path>) -> Self {
        self.file = file;
        self
    }
}

#[async_trait]
pub trait Platform: Send + Sync {
    /// GET /people/{id}.
    async fn person(&self, id: &str) -> Result<Person, WebexError>;

    /// GET /rooms/{id}.
    async fn room(&self, id: &str) -> Result<Room, WebexError>;

    /// Group rooms the bot belongs to (1:1 rooms excluded). Limited to one page.
    async fn group_rooms(&self) -> Result<Vec<Room>, WebexError>;

    /// Email addresses of everyone in a room.
    async fn member_emails(&self, room_id: &str) -> Result<Vec<String>, WebexError>;

    /// Rich-text (HTML) body of a message, or its plain text when it has no HTML.
    async fn message_body(&self, message_id: &str) -> Result<MessageBody, WebexError>;

    async fn send_message(&self, message: OutgoingMessage<'_>) -> Result<(), WebexError>;

    async fn head_attachment(&self, url: &str) -> Result<AttachmentMeta, WebexError>;

    /// Single download attempt to `dest`. Any status other than success or 423 is an error.
    async fn download_attachment(&self, url: &str, dest: &Path) -> Result<Download, WebexError>;
}
