//! Markdown deep links into the Webex client for rooms and people.

use crate::webex::event::{Person, Room};
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;

/// Room ids arrive both with and without trailing padding.
const ROOM_ID_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Room ids are base64 of a URI like `ciscospark://us/ROOM/<uuid>`; the client links by that uuid.
pub fn space_uuid(room_id: &str) -> Option<String> {
    let decoded = ROOM_ID_ENGINE.decode(room_id.trim()).ok()?;
    let uri = String::from_utf8(decoded).ok()?;
    let uuid = uri.rsplit('/').next()?.trim();
    if uuid.is_empty() || uuid == uri {
        None
    } else {
        Some(uuid.to_string())
    }
}

/// `[title](webexteams://im?space=<uuid>)`, or the bare title when the id is not a room URI.
pub fn room_link(room: &Room) -> String {
    match space_uuid(&room.id) {
        Some(uuid) => format!("[{}](webexteams://im?space={})", room.title, uuid),
        None => room.title.clone(),
    }
}

pub fn person_link(person: &Person) -> String {
    format!(
        "[{}](webexteams://im?email={})",
        person.display_name,
        person.primary_email()
    )
}
