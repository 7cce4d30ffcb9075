//! Broadcast dispatch: one serial delivery attempt per room, every outcome recorded.

use crate::webex::{OutgoingMessage, Platform, Room};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub room: Room,
    pub succeeded: bool,
}

/// Deliver `markdown` (and `file`, when staged) to each room in order. Rooms are sent
/// to one at a time; a failed room is recorded and the loop moves on. No retries.
pub async fn broadcast(
    platform: &dyn Platform,
    rooms: &[Room],
    markdown: &str,
    file: Option<&Path>,
) -> Vec<DeliveryOutcome> {
    log::info!(
        "begin posting to {} room{}",
        rooms.len(),
        if rooms.len() == 1 { "" } else { "s" }
    );
    let mut outcomes = Vec::with_capacity(rooms.len());
    for room in rooms {
        log::info!("posting to {}", room.title);
        let message = OutgoingMessage::new(&room.id, markdown).with_file(file);
        let succeeded = match platform.send_message(message).await {
            Ok(()) => true,
            Err(e) => {
                log::warn!("posting to {} failed: {}", room.title, e);
                false
            }
        };
        outcomes.push(DeliveryOutcome {
            room: room.clone(),
            succeeded,
        });
    }
    log::info!("finished posting to rooms");
    outcomes
}
