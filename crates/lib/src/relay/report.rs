//! Broadcast report: fold delivery outcomes into successes/failures, grade them, render.

use crate::relay::dispatch::DeliveryOutcome;
use crate::webex::{room_link, Room};

pub const NO_RECIPIENTS: &str = "📭 I am not in any rooms besides this one, so there was no one to send to.";

/// How a room is written in the report.
pub trait LinkRenderer {
    fn render_link(&self, room: &Room) -> String;
}

impl<F: Fn(&Room) -> String> LinkRenderer for F {
    fn render_link(&self, room: &Room) -> String {
        self(room)
    }
}

/// Markdown deep links into the Webex client.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebexLinks;

impl LinkRenderer for WebexLinks {
    fn render_link(&self, room: &Room) -> String {
        room_link(room)
    }
}

/// Five-tier grade of the delivery success ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rating {
    /// Every room.
    Perfect,
    /// At least 90%.
    Great,
    /// At least 70%.
    Fair,
    /// At least 50%.
    Poor,
    Failing,
}

impl Rating {
    /// Integer comparisons so the thresholds are exact. `total` must be non-zero.
    pub fn from_counts(successes: usize, total: usize) -> Rating {
        if successes >= total {
            Rating::Perfect
        } else if successes * 10 >= total * 9 {
            Rating::Great
        } else if successes * 10 >= total * 7 {
            Rating::Fair
        } else if successes * 2 >= total {
            Rating::Poor
        } else {
            Rating::Failing
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Rating::Perfect => "🥳",
            Rating::Great => "😎",
            Rating::Fair => "🤔",
            Rating::Poor => "🤨",
            Rating::Failing => "🤬",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastReport {
    successes: Vec<Room>,
    failures: Vec<Room>,
}

impl BroadcastReport {
    pub fn from_outcomes(outcomes: Vec<DeliveryOutcome>) -> Self {
        let (successes, failures) = outcomes.into_iter().fold(
            (Vec::new(), Vec::new()),
            |(mut ok, mut failed), outcome| {
                if outcome.succeeded {
                    ok.push(outcome.room);
                } else {
                    failed.push(outcome.room);
                }
                (ok, failed)
            },
        );
        Self {
            successes,
            failures,
        }
    }

    pub fn successes(&self) -> &[Room] {
        &self.successes
    }

    pub fn failures(&self) -> &[Room] {
        &self.failures
    }

    pub fn total(&self) -> usize {
        self.successes.len() + self.failures.len()
    }

    /// `None` when there were no recipients at all.
    pub fn ratio(&self) -> Option<f64> {
        match self.total() {
            0 => None,
            total => Some(self.successes.len() as f64 / total as f64),
        }
    }

    pub fn rating(&self) -> Option<Rating> {
        match self.total() {
            0 => None,
            total => Some(Rating::from_counts(self.successes.len(), total)),
        }
    }

    pub fn render(&self, links: &dyn LinkRenderer) -> String {
        let Some(rating) = self.rating() else {
            return NO_RECIPIENTS.to_string();
        };
        let total = self.total();
        format!(
            "{} Your post was sent to {} of {} Room{}\n\nFailures\n{}\n\nSuccesses\n{}",
            rating.symbol(),
            self.successes.len(),
            total,
            if total == 1 { "" } else { "s" },
            render_list(&self.failures, links),
            render_list(&self.successes, links),
        )
    }
}

fn render_list(rooms: &[Room], links: &dyn LinkRenderer) -> String {
    if rooms.is_empty() {
        return "* None".to_string();
    }
    rooms
        .iter()
        .map(|room| format!("* {}", links.render_link(room)))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcomes(flags: &[bool]) -> Vec<DeliveryOutcome> {
        flags
            .iter()
            .enumerate()
            .map(|(i, ok)| DeliveryOutcome {
                room: Room::new(format!("r{}", i), format!("Room {}", i)),
                succeeded: *ok,
            })
            .collect()
    }

    fn titles(room: &Room) -> String {
        room.title.clone()
    }

    #[test]
    fn rating_thresholds_are_closed_above() {
        assert_eq!(Rating::from_counts(10, 10), Rating::Perfect);
        assert_eq!(Rating::from_counts(9, 10), Rating::Great);
        assert_eq!(Rating::from_counts(89, 100), Rating::Fair);
        assert_eq!(Rating::from_counts(7, 10), Rating::Fair);
        assert_eq!(Rating::from_counts(69, 100), Rating::Poor);
        assert_eq!(Rating::from_counts(5, 10), Rating::Poor);
        assert_eq!(Rating::from_counts(49, 100), Rating::Failing);
        assert_eq!(Rating::from_counts(0, 3), Rating::Failing);
    }

    #[test]
    fn every_room_lands_in_exactly_one_list() {
        let input = outcomes(&[true, false, true, true, false]);
        let report = BroadcastReport::from_outcomes(input.clone());
        assert_eq!(report.total(), input.len());
        for outcome in &input {
            let in_ok = report.successes().contains(&outcome.room);
            let in_failed = report.failures().contains(&outcome.room);
            assert!(in_ok != in_failed);
            assert_eq!(in_ok, outcome.succeeded);
        }
        assert_eq!(report.ratio(), Some(0.6));
    }

    #[test]
    fn empty_outcomes_render_no_recipients() {
        let report = BroadcastReport::from_outcomes(Vec::new());
        assert_eq!(report.ratio(), None);
        assert_eq!(report.rating(), None);
        assert_eq!(report.render(&titles), NO_RECIPIENTS);
    }

    #[test]
    fn render_lists_failures_then_successes() {
        let report = BroadcastReport::from_outcomes(outcomes(&[true, false]));
        assert_eq!(
            report.render(&titles),
            "🤨 Your post was sent to 1 of 2 Rooms\n\nFailures\n* Room 1\n\nSuccesses\n* Room 0"
        );
    }

    #[test]
    fn empty_lists_render_none() {
        let report = BroadcastReport::from_outcomes(outcomes(&[true]));
        assert_eq!(
            report.render(&titles),
            "🥳 Your post was sent to 1 of 1 Room\n\nFailures\n* None\n\nSuccesses\n* Room 0"
        );
    }
}
