// Turn order table and whose-turn-is-it resolution.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Number of turns in a draft.
pub const TOTAL_TURNS: usize = 20;

/// Maximum entries in any one team's ban or pick list.
pub const MAX_PER_LIST: usize = 5;

/// One of the two drafting teams. Serialized as `1` or `2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Team {
    One,
    Two,
}

impl Team {
    pub fn number(self) -> u8 {
        match self {
            Team::One => 1,
            Team::Two => 2,
        }
    }
}

impl From<Team> for u8 {
    fn from(team: Team) -> u8 {
        team.number()
    }
}

impl TryFrom<u8> for Team {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Team::One),
            2 => Ok(Team::Two),
            other => Err(format!("invalid team number {other}")),
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "team {}", self.number())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftAction {
    Ban,
    Pick,
}

impl DraftAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            DraftAction::Ban => "ban",
            DraftAction::Pick => "pick",
        }
    }
}

impl fmt::Display for DraftAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who is acting in a session. The tag is carried alongside every intent and
/// trusted as given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Captain1,
    Captain2,
    Spectator,
}

impl Role {
    /// Parse a role tag (`captain1`, `captain2`, `spectator`).
    ///
    /// Unrecognized or missing tags degrade to `Spectator`: the client can
    /// watch but never act.
    pub fn from_tag(tag: &str) -> Role {
        Role::parse_tag(tag).unwrap_or_else(|| {
            warn!("Unknown role tag '{}', treating as spectator", tag.trim());
            Role::Spectator
        })
    }

    /// Strict form of [`Role::from_tag`]: `None` for anything unrecognized.
    pub fn parse_tag(tag: &str) -> Option<Role> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "captain1" => Some(Role::Captain1),
            "captain2" => Some(Role::Captain2),
            "spectator" => Some(Role::Spectator),
            _ => None,
        }
    }

    pub fn as_tag(&self) -> &'static str {
        match self {
            Role::Captain1 => "captain1",
            Role::Captain2 => "captain2",
            Role::Spectator => "spectator",
        }
    }

    /// The team this role captains, if any.
    pub fn team(&self) -> Option<Team> {
        match self {
            Role::Captain1 => Some(Team::One),
            Role::Captain2 => Some(Team::Two),
            Role::Spectator => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// The acting team and action kind for one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnDescriptor {
    pub team: Team,
    pub action: DraftAction,
}

impl TurnDescriptor {
    const fn new(team: Team, action: DraftAction) -> Self {
        TurnDescriptor { team, action }
    }

    /// Whether `role` is the captain who acts on this turn.
    pub fn is_actor(&self, role: Role) -> bool {
        role.team() == Some(self.team)
    }
}

/// Result of resolving a turn cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TurnStatus {
    Active(TurnDescriptor),
    Complete,
}

impl TurnStatus {
    pub fn active(&self) -> Option<TurnDescriptor> {
        match self {
            TurnStatus::Active(turn) => Some(*turn),
            TurnStatus::Complete => None,
        }
    }
}

use DraftAction::{Ban, Pick};
use Team::{One, Two};

/// The fixed snake order: six bans, six picks, four bans, four picks.
///
/// Existing recorded sessions depend on this exact table.
pub const DRAFT_ORDER: [TurnDescriptor; TOTAL_TURNS] = [
    TurnDescriptor::new(One, Ban),
    TurnDescriptor::new(Two, Ban),
    TurnDescriptor::new(One, Ban),
    TurnDescriptor::new(Two, Ban),
    TurnDescriptor::new(One, Ban),
    TurnDescriptor::new(Two, Ban),
    TurnDescriptor::new(One, Pick),
    TurnDescriptor::new(Two, Pick),
    TurnDescriptor::new(Two, Pick),
    TurnDescriptor::new(One, Pick),
    TurnDescriptor::new(One, Pick),
    TurnDescriptor::new(Two, Pick),
    TurnDescriptor::new(Two, Ban),
    TurnDescriptor::new(One, Ban),
    TurnDescriptor::new(Two, Ban),
    TurnDescriptor::new(One, Ban),
    TurnDescriptor::new(Two, Pick),
    TurnDescriptor::new(One, Pick),
    TurnDescriptor::new(One, Pick),
    TurnDescriptor::new(Two, Pick),
];

/// Resolve the turn at `cursor`.
pub fn resolve_turn(cursor: usize) -> TurnStatus {
    match DRAFT_ORDER.get(cursor) {
        Some(turn) => TurnStatus::Active(*turn),
        None => TurnStatus::Complete,
    }
}
