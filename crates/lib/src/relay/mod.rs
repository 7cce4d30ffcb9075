//! Relay core: one webhook event in, at most one broadcast out.
//!
//! `Relay::handle` runs a single event through classification, normalization and
//! command dispatch. `/send` and `/test` continue into attachment retrieval, the
//! serial fan-out and the graded report. Every reply to the administrator goes to the
//! admin room; failures of those replies are logged and otherwise ignored.

pub mod attachment;
pub mod classify;
pub mod command;
pub mod directory;
pub mod dispatch;
pub mod normalize;
pub mod report;

#[cfg(test)]
pub(crate) mod mock;

use crate::webex::{
    person_link, room_link, OutgoingMessage, Platform, Room, WebexError, WebhookEvent,
};
use async_trait::async_trait;
use attachment::{
    single_attachment, AttachmentPolicy, AttachmentRetriever, RetrievalError, RetrievalObserver,
    Sleeper, StagedAttachment, TokioSleeper, LARGE_FILE_NOTICE,
};
use classify::{classify, Classified, MessageEvent, Rejection};
use command::{check_word_count, help_text, test_body, Command, DEFAULT_MINIMUM_WORD_COUNT};
use normalize::{normalize_body, Html2Markdown, MarkupConverter};
use report::{BroadcastReport, WebexLinks, NO_RECIPIENTS};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub const ACKNOWLEDGEMENT: &str = "👍🏻 I received your message and I am processing it now.";
pub const UNRECOGNIZED: &str =
    "🤔 I didn't see a command I recognized. Try sending `/help` to see which commands I understand.";

/// Admin-facing rendering of a platform failure.
pub fn api_error(err: &dyn fmt::Display) -> String {
    format!("⚠️ Webex API Error\n\n```\n{}\n```", err)
}

/// Failures that abort a command after it was accepted.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("fetching message body: {0}")]
    MessageBody(WebexError),
    #[error("listing rooms: {0}")]
    Directory(WebexError),
    #[error(transparent)]
    Attachment(#[from] RetrievalError),
}

impl RelayError {
    pub fn admin_message(&self) -> String {
        match self {
            RelayError::MessageBody(e) | RelayError::Directory(e) => api_error(e),
            RelayError::Attachment(e) => e.admin_message(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelaySettings {
    pub admin_room: String,
    pub minimum_word_count: usize,
    pub attachments: AttachmentPolicy,
    /// Only act on messages posted in the admin room.
    pub restrict_to_admin_room: bool,
}

impl RelaySettings {
    pub fn new(admin_room: impl Into<String>) -> Self {
        Self {
            admin_room: admin_room.into(),
            minimum_word_count: DEFAULT_MINIMUM_WORD_COUNT,
            attachments: AttachmentPolicy::default(),
            restrict_to_admin_room: true,
        }
    }
}

/// What handling one event amounted to.
#[derive(Debug)]
pub enum Outcome {
    Ignored(Rejection),
    MembershipNotified,
    /// A read-only command (or the unrecognized reply) was answered.
    Answered(&'static str),
    /// A broadcast was refused by policy; carries the reply that was posted.
    Declined(String),
    Failed(RelayError),
    /// A broadcast ran. An empty report means there was no one to send to.
    Broadcast(BroadcastReport),
}

/// Which rooms a broadcast command targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Audience {
    AdminOnly,
    Everyone,
}

/// Posts to the admin room, threaded under the triggering message when it lives there.
struct Responder<'a> {
    platform: &'a dyn Platform,
    admin_room: &'a str,
    parent_id: Option<&'a str>,
}

impl Responder<'_> {
    async fn reply(&self, markdown: &str) {
        let mut message = OutgoingMessage::new(self.admin_room, markdown);
        if let Some(parent) = self.parent_id {
            message = message.in_thread(parent);
        }
        if let Err(e) = self.platform.send_message(message).await {
            log::warn!("reply to admin room failed: {}", e);
        }
    }
}

#[async_trait]
impl<'a> RetrievalObserver for Responder<'a> {
    async fn large_attachment(&self, size_bytes: u64) {
        log::info!("attachment of {} bytes is above the warning size", size_bytes);
        self.reply(LARGE_FILE_NOTICE).await;
    }
}

pub struct Relay {
    platform: Arc<dyn Platform>,
    sleeper: Arc<dyn Sleeper>,
    converter: Arc<dyn MarkupConverter>,
    settings: RelaySettings,
}

impl Relay {
    pub fn new(platform: Arc<dyn Platform>, settings: RelaySettings) -> Self {
        Self {
            platform,
            sleeper: Arc::new(TokioSleeper),
            converter: Arc::new(Html2Markdown),
            settings,
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_converter(mut self, converter: Arc<dyn MarkupConverter>) -> Self {
        self.converter = converter;
        self
    }

    pub fn settings(&self) -> &RelaySettings {
        &self.settings
    }

    /// Handle one event, abandoning it once `deadline` elapses. Abandoning drops any staged
    /// attachment, which removes it from disk.
    pub async fn handle_within(&self, event: &WebhookEvent, deadline: Duration) -> Option<Outcome> {
        match tokio::time::timeout(deadline, self.handle(event)).await {
            Ok(outcome) => Some(outcome),
            Err(_) => {
                log::warn!(
                    "event {}/{} abandoned after {}s",
                    event.resource,
                    event.event,
                    deadline.as_secs()
                );
                None
            }
        }
    }

    pub async fn handle(&self, event: &WebhookEvent) -> Outcome {
        let admin_room = self.settings.admin_room.as_str();
        let classified = match classify(event, admin_room, self.settings.restrict_to_admin_room) {
            Ok(classified) => classified,
            Err(rejection) => {
                log::info!("ignoring event: {}", rejection);
                return Outcome::Ignored(rejection);
            }
        };
        match classified {
            Classified::Membership { actor_id, room_id } => {
                self.announce_membership(actor_id, room_id).await;
                Outcome::MembershipNotified
            }
            Classified::Message(message) => {
                let in_admin_room = event.data.room_id.as_deref() == Some(admin_room);
                let responder = Responder {
                    platform: self.platform.as_ref(),
                    admin_room,
                    parent_id: in_admin_room.then_some(message.message_id),
                };
                self.handle_message(&message, &responder).await
            }
        }
    }

    async fn announce_membership(&self, actor_id: &str, room_id: &str) {
        let person = match self.platform.person(actor_id).await {
            Ok(person) => person,
            Err(e) => {
                log::warn!("looking up person {} failed: {}", actor_id, e);
                return;
            }
        };
        let room = match self.platform.room(room_id).await {
            Ok(room) => room,
            Err(e) => {
                log::warn!("looking up room {} failed: {}", room_id, e);
                return;
            }
        };
        let text = format!("📢 {} added me to {}", person_link(&person), room_link(&room));
        let message = OutgoingMessage::new(&self.settings.admin_room, &text);
        match self.platform.send_message(message).await {
            Ok(()) => log::info!("{} added me to {}", person.display_name, room.title),
            Err(e) => log::warn!("membership notification failed: {}", e),
        }
    }

    async fn handle_message(&self, message: &MessageEvent<'_>, responder: &Responder<'_>) -> Outcome {
        let body = match self.platform.message_body(message.message_id).await {
            Ok(body) => body,
            Err(e) => return self.fail(responder, RelayError::MessageBody(e)).await,
        };
        let text = normalize_body(&body, message.bot_id, self.converter.as_ref());
        let command = Command::parse(&text);
        let name = command.name();
        log::info!("dispatching {}", name);

        match command {
            Command::Help => {
                responder.reply(&help_text()).await;
                Outcome::Answered(name)
            }
            Command::ListRooms => match self.targets(Audience::Everyone).await {
                Ok(rooms) => {
                    responder.reply(&directory::rooms_message(&rooms)).await;
                    Outcome::Answered(name)
                }
                Err(e) => self.fail(responder, e).await,
            },
            Command::ReachEstimate => match self.targets(Audience::Everyone).await {
                Ok(rooms) => {
                    let reach = directory::reach(self.platform.as_ref(), &rooms).await;
                    responder.reply(&reach.message()).await;
                    Outcome::Answered(name)
                }
                Err(e) => self.fail(responder, e).await,
            },
            Command::TestSend(body) => {
                self.broadcast_command(responder, message.files, &body, Audience::AdminOnly)
                    .await
            }
            Command::Send(body) => {
                self.broadcast_command(responder, message.files, &body, Audience::Everyone)
                    .await
            }
            Command::Unrecognized => {
                responder.reply(UNRECOGNIZED).await;
                Outcome::Answered(name)
            }
        }
    }

    async fn broadcast_command(
        &self,
        responder: &Responder<'_>,
        files: &[String],
        body: &str,
        audience: Audience,
    ) -> Outcome {
        if let Err(short) = check_word_count(body, self.settings.minimum_word_count) {
            let reply = short.message();
            log::info!("declined broadcast: {} words", short.words);
            responder.reply(&reply).await;
            return Outcome::Declined(reply);
        }
        responder.reply(ACKNOWLEDGEMENT).await;

        // Held until the end of this function; dropping it deletes the file.
        let staged = match self.stage(files, responder).await {
            Ok(staged) => staged,
            Err(e) => return self.fail(responder, e.into()).await,
        };

        let rooms = match self.targets(audience).await {
            Ok(rooms) => rooms,
            Err(e) => return self.fail(responder, e).await,
        };
        if rooms.is_empty() {
            log::info!("no rooms to send to");
            responder.reply(NO_RECIPIENTS).await;
            return Outcome::Broadcast(BroadcastReport::from_outcomes(Vec::new()));
        }

        let markdown = match audience {
            Audience::AdminOnly => test_body(body),
            Audience::Everyone => body.to_string(),
        };
        let outcomes = dispatch::broadcast(
            self.platform.as_ref(),
            &rooms,
            &markdown,
            staged.as_ref().map(StagedAttachment::path),
        )
        .await;
        let report = BroadcastReport::from_outcomes(outcomes);
        log::info!(
            "broadcast finished: {} of {} rooms",
            report.successes().len(),
            report.total()
        );
        responder.reply(&report.render(&WebexLinks)).await;
        Outcome::Broadcast(report)
    }

    async fn stage(
        &self,
        files: &[String],
        responder: &Responder<'_>,
    ) -> Result<Option<StagedAttachment>, RetrievalError> {
        let Some(url) = single_attachment(files)? else {
            return Ok(None);
        };
        let retriever = AttachmentRetriever::new(
            self.platform.as_ref(),
            self.sleeper.as_ref(),
            self.settings.attachments,
        );
        let staged = retriever.retrieve(url, responder).await?;
        log::info!(
            "staged {} ({} bytes) at {}",
            staged.name(),
            staged.size_bytes(),
            staged.path().display()
        );
        Ok(Some(staged))
    }

    async fn targets(&self, audience: Audience) -> Result<Vec<Room>, RelayError> {
        match audience {
            Audience::AdminOnly => Ok(directory::admin_only(&self.settings.admin_room)),
            Audience::Everyone => {
                directory::target_rooms(self.platform.as_ref(), &self.settings.admin_room)
                    .await
                    .map_err(RelayError::Directory)
            }
        }
    }

    async fn fail(&self, responder: &Responder<'_>, err: RelayError) -> Outcome {
        log::warn!("command aborted: {}", err);
        responder.reply(&err.admin_message()).await;
        Outcome::Failed(err)
    }
}
