//! In-memory platform and recording doubles for relay tests.

use crate::relay::attachment::{RetrievalObserver, Sleeper};
use crate::webex::{
    AttachmentMeta, Download, MessageBody, OutgoingMessage, Person, Platform, Room, WebexError,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub room_id: String,
    pub markdown: String,
    pub parent_id: Option<String>,
    pub file: Option<PathBuf>,
    /// Whether the file was on disk at send time.
    pub file_present: bool,
}

#[derive(Default)]
struct MockState {
    people: HashMap<String, Person>,
    rooms: HashMap<String, Room>,
    group_rooms: Vec<Room>,
    group_rooms_fail: bool,
    members: HashMap<String, Vec<String>>,
    bodies: HashMap<String, MessageBody>,
    failing_rooms: HashSet<String>,
    head: AttachmentMeta,
    downloads: VecDeque<Result<Download, WebexError>>,
    sent: Vec<SentMessage>,
    head_calls: usize,
    download_calls: usize,
    download_dests: Vec<PathBuf>,
}

fn not_found(what: &str) -> WebexError {
    WebexError::Api {
        status: 404,
        body: format!("{} not found", what),
    }
}

#[derive(Default)]
pub struct MockPlatform {
    inner: Mutex<MockState>,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().expect("mock state poisoned")
    }

    pub fn with_person(self, person: Person) -> Self {
        self.state().people.insert(person.id.clone(), person);
        self
    }

    pub fn with_room(self, room: Room) -> Self {
        self.state().rooms.insert(room.id.clone(), room);
        self
    }

    pub fn with_group_rooms(self, rooms: Vec<Room>) -> Self {
        self.state().group_rooms = rooms;
        self
    }

    pub fn failing_directory(self) -> Self {
        self.state().group_rooms_fail = true;
        self
    }

    pub fn with_members(self, room_id: &str, emails: &[&str]) -> Self {
        self.state().members.insert(
            room_id.to_string(),
            emails.iter().map(|e| e.to_string()).collect(),
        );
        self
    }

    pub fn with_message(self, message_id: &str, html: &str) -> Self {
        self.state()
            .bodies
            .insert(message_id.to_string(), MessageBody::Html(html.to_string()));
        self
    }

    /// A message with no HTML rendition.
    pub fn with_text_message(self, message_id: &str, text: &str) -> Self {
        self.state()
            .bodies
            .insert(message_id.to_string(), MessageBody::Text(text.to_string()));
        self
    }

    pub fn failing_room(self, room_id: &str) -> Self {
        self.state().failing_rooms.insert(room_id.to_string());
        self
    }

    pub fn with_head(self, meta: AttachmentMeta) -> Self {
        self.state().head = meta;
        self
    }

    /// Scripted download results; once exhausted, downloads succeed.
    pub fn with_downloads(self, script: Vec<Result<Download, WebexError>>) -> Self {
        self.state().downloads = script.into();
        self
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.state().sent.clone()
    }

    pub fn head_calls(&self) -> usize {
        self.state().head_calls
    }

    pub fn download_calls(&self) -> usize {
        self.state().download_calls
    }

    /// Every path a download was asked to write to, in call order.
    pub fn download_dests(&self) -> Vec<PathBuf> {
        self.state().download_dests.clone()
    }
}

#[async_trait]
impl Platform for MockPlatform {
    async fn person(&self, id: &str) -> Result<Person, WebexError> {
        self.state().people.get(id).cloned().ok_or_else(|| not_found(id))
    }

    async fn room(&self, id: &str) -> Result<Room, WebexError> {
        self.state().rooms.get(id).cloned().ok_or_else(|| not_found(id))
    }

    async fn group_rooms(&self) -> Result<Vec<Room>, WebexError> {
        let state = self.state();
        if state.group_rooms_fail {
            return Err(WebexError::Api {
                status: 502,
                body: "bad gateway".to_string(),
            });
        }
        Ok(state.group_rooms.clone())
    }

    async fn member_emails(&self, room_id: &str) -> Result<Vec<String>, WebexError> {
        self.state()
            .members
            .get(room_id)
            .cloned()
            .ok_or_else(|| not_found(room_id))
    }

    async fn message_body(&self, message_id: &str) -> Result<MessageBody, WebexError> {
        self.state()
            .bodies
            .get(message_id)
            .cloned()
            .ok_or_else(|| not_found(message_id))
    }

    async fn send_message(&self, message: OutgoingMessage<'_>) -> Result<(), WebexError> {
        let mut state = self.state();
        state.sent.push(SentMessage {
            room_id: message.room_id.to_string(),
            markdown: message.markdown.to_string(),
            parent_id: message.parent_id.map(str::to_string),
            file: message.file.map(Path::to_path_buf),
            file_present: message.file.map(Path::exists).unwrap_or(false),
        });
        if state.failing_rooms.contains(message.room_id) {
            return Err(WebexError::Api {
                status: 500,
                body: "delivery failed".to_string(),
            });
        }
        Ok(())
    }

    async fn head_attachment(&self, _url: &str) -> Result<AttachmentMeta, WebexError> {
        let mut state = self.state();
        state.head_calls += 1;
        Ok(state.head.clone())
    }

    async fn download_attachment(&self, _url: &str, dest: &Path) -> Result<Download, WebexError> {
        let next = {
            let mut state = self.state();
            state.download_calls += 1;
            state.download_dests.push(dest.to_path_buf());
            state.downloads.pop_front()
        };
        match next {
            Some(Ok(Download::Saved { .. })) | None => {
                let content = b"attachment-bytes";
                std::fs::write(dest, content)?;
                Ok(Download::Saved {
                    bytes: content.len() as u64,
                })
            }
            Some(other) => other,
        }
    }
}

/// Records requested sleeps and returns immediately.
#[derive(Default)]
pub struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn slept(&self) -> Vec<Duration> {
        self.slept.lock().expect("sleeper poisoned").clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.slept.lock().expect("sleeper poisoned").push(duration);
    }
}

#[derive(Default)]
pub struct RecordingObserver {
    sizes: Mutex<Vec<u64>>,
}

impl RecordingObserver {
    pub fn sizes(&self) -> Vec<u64> {
        self.sizes.lock().expect("observer poisoned").clone()
    }
}

#[async_trait]
impl RetrievalObserver for RecordingObserver {
    async fn large_attachment(&self, size_bytes: u64) {
        self.sizes.lock().expect("observer poisoned").push(size_bytes);
    }
}
