// Messages between the client event loop and the presentation layer.

use serde::Serialize;

use crate::draft::{Role, SessionRecord, TurnStatus};

/// Intents sent from the presentation layer into the event loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    /// Stage a god locally. Nothing is written until `Confirm`.
    Select(String),
    /// Submit the staged god as this turn's ban or pick.
    Confirm,
    /// Drop the staged god.
    Cancel,
    /// Poll now instead of waiting for the next interval.
    Refresh,
    Quit,
}

impl UserCommand {
    /// Parse one line of console input.
    ///
    /// `select <god name>` keeps everything after the verb, so multi-word
    /// names like `select Baron Samedi` work.
    pub fn parse(line: &str) -> Option<UserCommand> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };
        match verb.to_ascii_lowercase().as_str() {
            "select" | "s" if !rest.is_empty() => Some(UserCommand::Select(rest.to_string())),
            "confirm" | "c" => Some(UserCommand::Confirm),
            "cancel" | "x" => Some(UserCommand::Cancel),
            "refresh" | "r" => Some(UserCommand::Refresh),
            "quit" | "q" | "exit" => Some(UserCommand::Quit),
            _ => None,
        }
    }
}

/// Render-ready state of a session from one role's point of view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DraftSnapshot {
    pub record: SessionRecord,
    pub role: Role,
    /// Banner for this client: the captain's team, or spectator.
    pub role_label: String,
    pub turn: TurnStatus,
    pub is_my_turn: bool,
    pub can_interact: bool,
    pub staged: Option<String>,
    pub remaining_secs: u32,
    /// The countdown ran out. Display only; the turn stays open.
    pub turn_expired: bool,
    /// Banned and picked gods, bans first.
    pub unavailable: Vec<String>,
    /// Gods still open, in catalog order.
    pub available: Vec<String>,
}

/// Updates pushed from the event loop to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiUpdate {
    Snapshot(Box<DraftSnapshot>),
    Timer { remaining_secs: u32 },
    Rejected { message: String, needs_refresh: bool },
    SessionMissing { lobby_id: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_commands() {
        assert_eq!(
            UserCommand::parse("select Zeus"),
            Some(UserCommand::Select("Zeus".into()))
        );
        assert_eq!(
            UserCommand::parse("  select   Baron Samedi  "),
            Some(UserCommand::Select("Baron Samedi".into()))
        );
        assert_eq!(UserCommand::parse("CONFIRM"), Some(UserCommand::Confirm));
        assert_eq!(UserCommand::parse("c"), Some(UserCommand::Confirm));
        assert_eq!(UserCommand::parse("cancel"), Some(UserCommand::Cancel));
        assert_eq!(UserCommand::parse("r"), Some(UserCommand::Refresh));
        assert_eq!(UserCommand::parse("quit"), Some(UserCommand::Quit));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(UserCommand::parse(""), None);
        assert_eq!(UserCommand::parse("select"), None);
        assert_eq!(UserCommand::parse("select   "), None);
        assert_eq!(UserCommand::parse("dance"), None);
    }
}
