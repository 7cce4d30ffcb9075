//! Conversation directory: who a broadcast goes to, and how many people that reaches.

use crate::relay::classify::BOT_EMAIL_SUFFIX;
use crate::webex::{Platform, Room, WebexError};
use std::collections::HashSet;

pub const ADMIN_ROOM_TITLE: &str = "This Admin Room";

/// Every group room the bot is in, minus the admin room.
pub async fn target_rooms(platform: &dyn Platform, admin_room: &str) -> Result<Vec<Room>, WebexError> {
    let rooms: Vec<Room> = platform
        .group_rooms()
        .await?
        .into_iter()
        .filter(|room| room.id != admin_room)
        .collect();
    log::debug!("directory lists {} target room(s)", rooms.len());
    Ok(rooms)
}

/// `/test` target set: the admin room alone.
pub fn admin_only(admin_room: &str) -> Vec<Room> {
    vec![Room::new(admin_room, ADMIN_ROOM_TITLE)]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reach {
    pub people: usize,
    pub rooms: usize,
}

impl Reach {
    pub fn message(&self) -> String {
        format!(
            "📈 I have a reach of **{} people**, across **{} rooms**.",
            self.people, self.rooms
        )
    }
}

/// Distinct non-bot people across `rooms`. Rooms whose membership lookup fails count as empty.
pub async fn reach(platform: &dyn Platform, rooms: &[Room]) -> Reach {
    let mut people = HashSet::new();
    for room in rooms {
        match platform.member_emails(&room.id).await {
            Ok(emails) => people.extend(
                emails
                    .into_iter()
                    .filter(|email| !email.ends_with(BOT_EMAIL_SUFFIX)),
            ),
            Err(e) => log::debug!("membership lookup for {} failed: {}", room.id, e),
        }
    }
    Reach {
        people: people.len(),
        rooms: rooms.len(),
    }
}

pub fn rooms_message(rooms: &[Room]) -> String {
    let lines: Vec<String> = rooms.iter().map(|room| format!("* {}", room.title)).collect();
    format!("🚪 These are all of the rooms I am in:\n{}", lines.join("\n"))
}
