// In-process record store. Each operation holds the map lock for its whole
// check-and-write, which gives the same linearizable conditional writes a
// database row update would.

use std::collections::HashMap;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::{SessionFilter, SessionStore};
use crate::draft::SessionRecord;
use crate::error::DraftError;

#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, SessionRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create(&self, record: &SessionRecord) -> Result<String, DraftError> {
        let mut records = self.records.lock().await;
        if records.contains_key(&record.id) {
            return Err(anyhow!("session {} already exists", record.id).into());
        }
        records.insert(record.id.clone(), record.clone());
        Ok(record.id.clone())
    }

    async fn read_by_id(&self, id: &str) -> Result<SessionRecord, DraftError> {
        self.records
            .lock()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| DraftError::RecordNotFound { id: id.to_string() })
    }

    async fn update_if_cursor(
        &self,
        expected_cursor: usize,
        next: &SessionRecord,
    ) -> Result<(), DraftError> {
        let mut records = self.records.lock().await;
        let stored = records
            .get_mut(&next.id)
            .ok_or_else(|| DraftError::RecordNotFound {
                id: next.id.clone(),
            })?;

        if stored.turn_cursor != expected_cursor || stored.draft_complete {
            return Err(DraftError::StaleWrite {
                id: next.id.clone(),
                expected_cursor,
                actual_cursor: stored.turn_cursor,
            });
        }

        stored.team1_bans = next.team1_bans.clone();
        stored.team2_bans = next.team2_bans.clone();
        stored.team1_picks = next.team1_picks.clone();
        stored.team2_picks = next.team2_picks.clone();
        stored.turn_cursor = next.turn_cursor;
        stored.turn_start_time = next.turn_start_time;
        stored.draft_complete = next.draft_complete;
        Ok(())
    }

    async fn init_turn_start(&self, id: &str, at: DateTime<Utc>) -> Result<bool, DraftError> {
        let mut records = self.records.lock().await;
        let stored = records
            .get_mut(id)
            .ok_or_else(|| DraftError::RecordNotFound { id: id.to_string() })?;

        if stored.turn_start_time.is_some() || stored.draft_complete {
            return Ok(false);
        }
        stored.turn_start_time = Some(at);
        Ok(true)
    }

    async fn query(&self, filter: &SessionFilter) -> Result<Vec<SessionRecord>, DraftError> {
        let records = self.records.lock().await;
        let mut matched: Vec<SessionRecord> = records
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(matched)
    }
}
