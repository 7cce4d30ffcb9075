//! Event classification: which webhook events the relay acts on.

use crate::webex::WebhookEvent;

/// Sender addresses with this suffix are bot accounts; answering them risks reply loops.
pub const BOT_EMAIL_SUFFIX: &str = "@webex.bot";

/// An event worth acting on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classified<'a> {
    /// The bot was added to a room by `actor_id`.
    Membership { actor_id: &'a str, room_id: &'a str },
    /// A message addressed to the bot.
    Message(MessageEvent<'a>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEvent<'a> {
    pub message_id: &'a str,
    /// The bot's own person id, used to strip its @mention.
    pub bot_id: &'a str,
    pub files: &'a [String],
}

/// Why an event was dropped. Not an error: the relay simply does nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("resource of {0} not expected")]
    UnexpectedResource(String),
    #[error("event type of {0} not expected")]
    UnexpectedEvent(String),
    #[error("message from another bot ({0}), ignoring")]
    FromBot(String),
    #[error("message posted outside the admin room ({0}), ignoring")]
    OutsideAdminRoom(String),
    #[error("event is missing {0}")]
    MissingField(&'static str),
}

pub fn classify<'a>(
    event: &'a WebhookEvent,
    admin_room: &str,
    restrict_to_admin_room: bool,
) -> Result<Classified<'a>, Rejection> {
    if event.resource != "memberships" && event.resource != "messages" {
        return Err(Rejection::UnexpectedResource(event.resource.clone()));
    }
    if event.event != "created" {
        return Err(Rejection::UnexpectedEvent(event.event.clone()));
    }

    if event.resource == "memberships" {
        let room_id = event
            .data
            .room_id
            .as_deref()
            .ok_or(Rejection::MissingField("data.roomId"))?;
        return Ok(Classified::Membership {
            actor_id: &event.actor_id,
            room_id,
        });
    }

    let sender = event.data.person_email.as_deref().unwrap_or("");
    if sender.ends_with(BOT_EMAIL_SUFFIX) {
        return Err(Rejection::FromBot(sender.to_string()));
    }
    if restrict_to_admin_room {
        let room_id = event.data.room_id.as_deref().unwrap_or("");
        if room_id != admin_room {
            return Err(Rejection::OutsideAdminRoom(room_id.to_string()));
        }
    }
    if event.data.id.is_empty() {
        return Err(Rejection::MissingField("data.id"));
    }
    Ok(Classified::Message(MessageEvent {
        message_id: &event.data.id,
        bot_id: &event.created_by,
        files: &event.data.files,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webex::WebhookData;

    fn event(resource: &str, action: &str, email: &str, room: &str) -> WebhookEvent {
        WebhookEvent {
            resource: resource.to_string(),
            event: action.to_string(),
            actor_id: "actor".to_string(),
            created_by: "bot".to_string(),
            data: WebhookData {
                id: "msg-1".to_string(),
                person_email: Some(email.to_string()),
                room_id: Some(room.to_string()),
                files: Vec::new(),
            },
        }
    }

    #[test]
    fn admin_message_is_accepted() {
        let e = event("messages", "created", "ops@example.com", "admin");
        let c = classify(&e, "admin", true).unwrap();
        assert_eq!(
            c,
            Classified::Message(MessageEvent {
                message_id: "msg-1",
                bot_id: "bot",
                files: &[],
            })
        );
    }

    #[test]
    fn membership_created_is_accepted() {
        let e = event("memberships", "created", "ops@example.com", "new-room");
        assert_eq!(
            classify(&e, "admin", true).unwrap(),
            Classified::Membership {
                actor_id: "actor",
                room_id: "new-room"
            }
        );
    }

    #[test]
    fn other_resources_and_actions_are_rejected() {
        let e = event("rooms", "created", "ops@example.com", "admin");
        assert_eq!(
            classify(&e, "admin", true),
            Err(Rejection::UnexpectedResource("rooms".to_string()))
        );
        let e = event("messages", "deleted", "ops@example.com", "admin");
        assert_eq!(
            classify(&e, "admin", true),
            Err(Rejection::UnexpectedEvent("deleted".to_string()))
        );
    }

    #[test]
    fn bot_authors_are_ignored() {
        let e = event("messages", "created", "helper@webex.bot", "admin");
        assert!(matches!(
            classify(&e, "admin", true),
            Err(Rejection::FromBot(_))
        ));
    }

    #[test]
    fn admin_room_restriction_is_optional() {
        let e = event("messages", "created", "ops@example.com", "elsewhere");
        assert!(matches!(
            classify(&e, "admin", true),
            Err(Rejection::OutsideAdminRoom(_))
        ));
        assert!(classify(&e, "admin", false).is_ok());
    }
}
