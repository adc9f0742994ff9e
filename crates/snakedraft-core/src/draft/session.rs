// The shared session record and the single transition that may change it.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::sequence::{
    resolve_turn, DraftAction, Role, Team, TurnStatus, DRAFT_ORDER, MAX_PER_LIST, TOTAL_TURNS,
};
use crate::error::DraftError;

/// The authoritative state of one draft, as held by the store.
///
/// Field names on the wire match the recorded lobby format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(rename = "lobby_id")]
    pub id: String,
    pub team1_name: String,
    pub team2_name: String,
    #[serde(default)]
    pub team1_bans: Vec<String>,
    #[serde(default)]
    pub team2_bans: Vec<String>,
    #[serde(default)]
    pub team1_picks: Vec<String>,
    #[serde(default)]
    pub team2_picks: Vec<String>,
    #[serde(rename = "current_turn", default)]
    pub turn_cursor: usize,
    #[serde(default)]
    pub turn_start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub draft_complete: bool,
}

/// One confirmed action, reconstructed from the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionLogEntry {
    pub turn: usize,
    pub team: Team,
    pub action: DraftAction,
    pub god: String,
}

impl SessionRecord {
    /// A fresh record: cursor 0, empty lists, start time unset.
    pub fn new(id: &str, team1_name: &str, team2_name: &str) -> Self {
        SessionRecord {
            id: id.to_string(),
            team1_name: team1_name.to_string(),
            team2_name: team2_name.to_string(),
            team1_bans: Vec::new(),
            team2_bans: Vec::new(),
            team1_picks: Vec::new(),
            team2_picks: Vec::new(),
            turn_cursor: 0,
            turn_start_time: None,
            draft_complete: false,
        }
    }

    pub fn current_turn(&self) -> TurnStatus {
        if self.draft_complete {
            return TurnStatus::Complete;
        }
        resolve_turn(self.turn_cursor)
    }

    pub fn team_name(&self, team: Team) -> &str {
        match team {
            Team::One => &self.team1_name,
            Team::Two => &self.team2_name,
        }
    }

    pub fn bans(&self, team: Team) -> &[String] {
        match team {
            Team::One => &self.team1_bans,
            Team::Two => &self.team2_bans,
        }
    }

    pub fn picks(&self, team: Team) -> &[String] {
        match team {
            Team::One => &self.team1_picks,
            Team::Two => &self.team2_picks,
        }
    }

    fn list_mut(&mut self, team: Team, action: DraftAction) -> &mut Vec<String> {
        match (team, action) {
            (Team::One, DraftAction::Ban) => &mut self.team1_bans,
            (Team::Two, DraftAction::Ban) => &mut self.team2_bans,
            (Team::One, DraftAction::Pick) => &mut self.team1_picks,
            (Team::Two, DraftAction::Pick) => &mut self.team2_picks,
        }
    }

    /// Every banned god, team 1 first.
    pub fn all_bans(&self) -> impl Iterator<Item = &str> {
        self.team1_bans
            .iter()
            .chain(self.team2_bans.iter())
            .map(String::as_str)
    }

    /// Every picked god, team 1 first.
    pub fn all_picks(&self) -> impl Iterator<Item = &str> {
        self.team1_picks
            .iter()
            .chain(self.team2_picks.iter())
            .map(String::as_str)
    }

    /// Gods that can no longer be banned or picked.
    pub fn unavailable(&self) -> impl Iterator<Item = &str> {
        self.all_bans().chain(self.all_picks())
    }

    pub fn is_unavailable(&self, god: &str) -> bool {
        self.unavailable().any(|g| g == god)
    }

    pub fn entry_count(&self) -> usize {
        self.team1_bans.len() + self.team2_bans.len() + self.team1_picks.len() + self.team2_picks.len()
    }

    /// Verify the structural invariants of a record read from a store.
    pub fn check_invariants(&self) -> Result<(), DraftError> {
        let corrupt = |reason: String| DraftError::CorruptRecord {
            id: self.id.clone(),
            reason,
        };

        if self.turn_cursor > TOTAL_TURNS {
            return Err(corrupt(format!(
                "cursor {} exceeds {TOTAL_TURNS}",
                self.turn_cursor
            )));
        }
        if self.draft_complete != (self.turn_cursor == TOTAL_TURNS) {
            return Err(corrupt(format!(
                "draft_complete={} at cursor {}",
                self.draft_complete, self.turn_cursor
            )));
        }
        if self.entry_count() != self.turn_cursor {
            return Err(corrupt(format!(
                "{} entries recorded at cursor {}",
                self.entry_count(),
                self.turn_cursor
            )));
        }
        for team in [Team::One, Team::Two] {
            if self.bans(team).len() > MAX_PER_LIST || self.picks(team).len() > MAX_PER_LIST {
                return Err(corrupt(format!("{team} has more than {MAX_PER_LIST} entries in a list")));
            }
        }

        let mut seen = HashSet::new();
        for god in self.unavailable() {
            if !seen.insert(god) {
                return Err(corrupt(format!("god `{god}` appears more than once")));
            }
        }
        Ok(())
    }

    /// Ordered history of confirmed actions, rebuilt by replaying the turn
    /// table against the four lists.
    pub fn action_log(&self) -> Vec<ActionLogEntry> {
        let mut offsets = [[0usize; 2]; 2];
        let mut log = Vec::with_capacity(self.turn_cursor);

        for (turn, descriptor) in DRAFT_ORDER.iter().enumerate().take(self.turn_cursor) {
            let team_idx = usize::from(descriptor.team.number() - 1);
            let action_idx = match descriptor.action {
                DraftAction::Ban => 0,
                DraftAction::Pick => 1,
            };
            let list = match descriptor.action {
                DraftAction::Ban => self.bans(descriptor.team),
                DraftAction::Pick => self.picks(descriptor.team),
            };
            let offset = &mut offsets[team_idx][action_idx];
            let Some(god) = list.get(*offset) else {
                break;
            };
            *offset += 1;
            log.push(ActionLogEntry {
                turn,
                team: descriptor.team,
                action: descriptor.action,
                god: god.clone(),
            });
        }
        log
    }
}

/// Apply one confirmed ban or pick.
///
/// Checks, in order: the draft is still running, `role` captains the team
/// whose turn it is, and `god` is not already banned or picked. On success
/// returns the next record with the god appended, the cursor advanced and the
/// turn clock restarted at `now`. The input record is never modified.
pub fn apply_action(
    record: &SessionRecord,
    role: Role,
    god: &str,
    now: DateTime<Utc>,
) -> Result<SessionRecord, DraftError> {
    if record.draft_complete {
        return Err(DraftError::DraftAlreadyComplete);
    }
    let turn = match resolve_turn(record.turn_cursor) {
        TurnStatus::Active(turn) => turn,
        TurnStatus::Complete => return Err(DraftError::DraftAlreadyComplete),
    };
    if !turn.is_actor(role) {
        return Err(DraftError::NotYourTurn);
    }
    if record.is_unavailable(god) {
        return Err(DraftError::GodUnavailable {
            god: god.to_string(),
        });
    }

    let mut next = record.clone();
    next.list_mut(turn.team, turn.action).push(god.to_string());
    next.turn_cursor += 1;
    next.turn_start_time = Some(now);
    if next.turn_cursor == TOTAL_TURNS {
        next.draft_complete = true;
    }
    Ok(next)
}
