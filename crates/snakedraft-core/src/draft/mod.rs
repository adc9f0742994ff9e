// Draft domain: turn order, timer math, the session record and its transition.

pub mod sequence;
pub mod session;
pub mod timer;

pub use sequence::{resolve_turn, DraftAction, Role, Team, TurnDescriptor, TurnStatus};
pub use session::{apply_action, ActionLogEntry, SessionRecord};
