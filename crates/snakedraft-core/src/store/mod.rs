// Record store abstraction: the only place session records live.
//
// Every mutation is conditional. Submits are compare-and-swap on the turn
// cursor, and lazy start-time initialization is set-if-absent, so concurrent
// clients can never both land a write for the same turn.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nanoid::nanoid;
use tracing::info;

use crate::draft::SessionRecord;
use crate::error::DraftError;

pub use memory::MemoryStore;

/// Narrows [`SessionStore::query`]. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionFilter {
    pub lobby_id: Option<String>,
    pub draft_complete: Option<bool>,
}

impl SessionFilter {
    pub fn by_id(id: &str) -> Self {
        SessionFilter {
            lobby_id: Some(id.to_string()),
            ..Default::default()
        }
    }

    pub fn open() -> Self {
        SessionFilter {
            draft_complete: Some(false),
            ..Default::default()
        }
    }

    pub fn matches(&self, record: &SessionRecord) -> bool {
        self.lobby_id.as_ref().map_or(true, |id| *id == record.id)
            && self
                .draft_complete
                .map_or(true, |complete| complete == record.draft_complete)
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert a new record and return its id. Fails if the id is taken.
    async fn create(&self, record: &SessionRecord) -> Result<String, DraftError>;

    async fn read_by_id(&self, id: &str) -> Result<SessionRecord, DraftError>;

    /// Replace the mutable fields of `next.id` with those of `next`, but only
    /// if the stored cursor still equals `expected_cursor` and the draft is
    /// not complete. Otherwise returns `StaleWrite` and writes nothing.
    async fn update_if_cursor(
        &self,
        expected_cursor: usize,
        next: &SessionRecord,
    ) -> Result<(), DraftError>;

    /// Set the turn start time if it is unset and the draft is running.
    /// Returns whether this call performed the write.
    async fn init_turn_start(&self, id: &str, at: DateTime<Utc>) -> Result<bool, DraftError>;

    async fn query(&self, filter: &SessionFilter) -> Result<Vec<SessionRecord>, DraftError>;
}

const ID_ALPHABET: [char; 36] = [
    'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r',
    's', 't', 'u', 'v', 'w', 'x', 'y', 'z', '0', '1', '2', '3', '4', '5', '6', '7', '8', '9',
];

/// Generate a lobby id: `lobby_<unix millis>_<9 random lowercase alphanumerics>`.
pub fn generate_lobby_id() -> String {
    let millis = Utc::now().timestamp_millis();
    format!("lobby_{millis}_{}", nanoid!(9, &ID_ALPHABET))
}

/// Create a fresh session and return its record.
pub async fn create_session(
    store: &dyn SessionStore,
    team1_name: &str,
    team2_name: &str,
) -> Result<SessionRecord, DraftError> {
    let record = SessionRecord::new(&generate_lobby_id(), team1_name, team2_name);
    store.create(&record).await?;
    info!(
        "Created session {} ({} vs {})",
        record.id, record.team1_name, record.team2_name
    );
    Ok(record)
}
