// Turn countdown derived from the record's turn start timestamp.
//
// Nothing here stores countdown state; consumers recompute on every tick. A
// countdown reaching zero is display-only and never advances the draft.

use chrono::{DateTime, Utc};

use super::session::SessionRecord;

/// Default length of one turn.
pub const DEFAULT_TURN_SECONDS: u32 = 60;

/// Whole seconds left in a turn that started at `turn_start`, clamped to
/// `[0, duration_secs]`.
///
/// Elapsed time is floored to whole seconds. A `now` earlier than the start
/// (client clock behind the writer's) reports the full duration.
pub fn remaining(now: DateTime<Utc>, turn_start: DateTime<Utc>, duration_secs: u32) -> u32 {
    let elapsed_ms = (now - turn_start).num_milliseconds();
    let elapsed_secs = elapsed_ms.div_euclid(1000);
    let left = i64::from(duration_secs) - elapsed_secs;
    left.clamp(0, i64::from(duration_secs)) as u32
}

/// Per-session view of the countdown with a configured turn length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnTimer {
    pub duration_secs: u32,
}

impl Default for TurnTimer {
    fn default() -> Self {
        TurnTimer {
            duration_secs: DEFAULT_TURN_SECONDS,
        }
    }
}

impl TurnTimer {
    pub fn new(duration_secs: u32) -> Self {
        TurnTimer { duration_secs }
    }

    /// Seconds left on the record's current turn.
    ///
    /// A completed draft has nothing left. An unset start time (nobody has
    /// initialized it yet) counts as a turn that started at `now`.
    pub fn remaining_for(&self, record: &SessionRecord, now: DateTime<Utc>) -> u32 {
        if record.draft_complete {
            return 0;
        }
        let start = record.turn_start_time.unwrap_or(now);
        remaining(now, start, self.duration_secs)
    }

    pub fn is_expired(&self, record: &SessionRecord, now: DateTime<Utc>) -> bool {
        !record.draft_complete && self.remaining_for(record, now) == 0
    }
}
