//! Command dispatch: normalized text -> [`Command`].

/// Prepended to `/test` broadcasts so nobody mistakes them for the real thing.
pub const TEST_DISCLAIMER: &str =
    "**THIS IS A TEST MESSAGE ONLY SENT TO THIS ROOM.  REPLACE /test WITH /send TO GO LIVE.**";

/// Default minimum number of words a broadcast body must have.
pub const DEFAULT_MINIMUM_WORD_COUNT: usize = 3;

const COMMANDS: [(&str, &str); 6] = [
    ("/help", "Displays this help"),
    ("/rooms", "Displays a list of rooms I am in (not including this room)"),
    ("/spaces", "Alias for `/rooms`"),
    ("/reach", "Displays a count of all spaces and all people who I can reach"),
    ("/test", "Sends a test broadcast message into this room"),
    ("/send", "Sends a broadcast message to all the spaces I am in"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    ListRooms,
    ReachEstimate,
    /// Broadcast body (token removed) to be sent to the admin room only.
    TestSend(String),
    /// Broadcast body (token removed) to be sent to every group room.
    Send(String),
    Unrecognized,
}

impl Command {
    /// Prefix-anchored, case-sensitive match in fixed order.
    pub fn parse(text: &str) -> Command {
        if text.starts_with("/help") {
            Command::Help
        } else if text.starts_with("/rooms") || text.starts_with("/spaces") {
            Command::ListRooms
        } else if text.starts_with("/reach") {
            Command::ReachEstimate
        } else if text.starts_with("/send") {
            Command::Send(strip_token(text, "/send").to_string())
        } else if text.starts_with("/test") {
            Command::TestSend(strip_token(text, "/test").to_string())
        } else {
            Command::Unrecognized
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Help => "/help",
            Command::ListRooms => "/rooms",
            Command::ReachEstimate => "/reach",
            Command::TestSend(_) => "/test",
            Command::Send(_) => "/send",
            Command::Unrecognized => "unrecognized",
        }
    }
}

/// Remove `token` and at most one following space.
fn strip_token<'a>(text: &'a str, token: &str) -> &'a str {
    let rest = text.strip_prefix(token).unwrap_or(text);
    rest.strip_prefix(' ').unwrap_or(rest)
}

pub fn word_count(body: &str) -> usize {
    body.split_whitespace().count()
}

/// Broadcast body too short to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TooFewWords {
    pub words: usize,
    pub minimum: usize,
}

impl TooFewWords {
    pub fn message(&self) -> String {
        format!(
            "👎🏻 The word count is at {} words, and below minimum count of {}; I will not send this.",
            self.words, self.minimum
        )
    }
}

pub fn check_word_count(body: &str, minimum: usize) -> Result<(), TooFewWords> {
    let words = word_count(body);
    if words < minimum {
        Err(TooFewWords { words, minimum })
    } else {
        Ok(())
    }
}

/// Body for a `/test` broadcast: disclaimer line, then the message.
pub fn test_body(body: &str) -> String {
    format!("{}\n{}", TEST_DISCLAIMER, body)
}

pub fn help_text() -> String {
    let lines: Vec<String> = COMMANDS
        .iter()
        .map(|(name, about)| format!("* `{}` - {}", name, about))
        .collect();
    format!("🤖 These are the commands I know:\n{}", lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_only_commands() {
        assert_eq!(Command::parse("/help"), Command::Help);
        assert_eq!(Command::parse("/help me"), Command::Help);
        assert_eq!(Command::parse("/rooms"), Command::ListRooms);
        assert_eq!(Command::parse("/spaces"), Command::ListRooms);
        assert_eq!(Command::parse("/reach"), Command::ReachEstimate);
    }

    #[test]
    fn send_strips_token_and_one_space() {
        assert_eq!(
            Command::parse("/send one two three four"),
            Command::Send("one two three four".to_string())
        );
        assert_eq!(
            Command::parse("/send  indented"),
            Command::Send(" indented".to_string())
        );
        assert_eq!(Command::parse("/send"), Command::Send(String::new()));
    }

    #[test]
    fn test_strips_token() {
        assert_eq!(
            Command::parse("/test hello there all"),
            Command::TestSend("hello there all".to_string())
        );
    }

    #[test]
    fn matching_is_case_sensitive_and_anchored() {
        assert_eq!(Command::parse("/HELP"), Command::Unrecognized);
        assert_eq!(Command::parse("please /send this"), Command::Unrecognized);
        assert_eq!(Command::parse(""), Command::Unrecognized);
        assert_eq!(Command::parse("hello"), Command::Unrecognized);
    }

    #[test]
    fn gate_applies_to_stripped_body() {
        let Command::Send(body) = Command::parse("/send hi") else {
            panic!("expected send");
        };
        assert_eq!(
            check_word_count(&body, DEFAULT_MINIMUM_WORD_COUNT),
            Err(TooFewWords {
                words: 1,
                minimum: 3
            })
        );
        let Command::Send(body) = Command::parse("/send one two three four") else {
            panic!("expected send");
        };
        assert_eq!(check_word_count(&body, DEFAULT_MINIMUM_WORD_COUNT), Ok(()));
        assert_eq!(check_word_count("a b c", 3), Ok(()));
    }

    #[test]
    fn word_count_ignores_extra_whitespace() {
        assert_eq!(word_count("  one\ttwo\n\nthree  "), 3);
        assert_eq!(word_count(""), 0);
    }

    #[test]
    fn test_body_leads_with_disclaimer() {
        let body = test_body("hello world again");
        assert!(body.starts_with(TEST_DISCLAIMER));
        assert!(body.ends_with("\nhello world again"));
    }

    #[test]
    fn help_lists_every_command() {
        let help = help_text();
        for (name, _) in COMMANDS {
            assert!(help.contains(&format!("`{}`", name)));
        }
    }
}
