// Synchronization layer: one client's cached view of a session, reconciled
// against the store by polling, and optimistic submission of transitions.
//
// There is no coordinator. Every client computes transitions itself and the
// store's conditional write decides which one lands. A submit is always
// conditioned on the cursor the caller validated against; losing a race
// surfaces as `StaleWrite` and is never retried here.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::draft::{apply_action, Role, SessionRecord};
use crate::error::DraftError;
use crate::store::SessionStore;

/// What a single poll observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollReport {
    /// Cursor held in the cache before this poll, if there was a cache.
    pub previous_cursor: Option<usize>,
    /// Cursor after reconciling.
    pub cursor: usize,
    /// This client performed the lazy turn-start initialization.
    pub initialized_start: bool,
}

impl PollReport {
    /// Whether another client's transition became visible on this poll.
    pub fn advanced(&self) -> bool {
        self.previous_cursor.is_some_and(|prev| self.cursor > prev)
    }
}

pub struct SyncClient {
    store: Arc<dyn SessionStore>,
    session_id: String,
    cached: Option<SessionRecord>,
    start_init_attempted: bool,
}

impl SyncClient {
    pub fn new(store: Arc<dyn SessionStore>, session_id: &str) -> Self {
        SyncClient {
            store,
            session_id: session_id.to_string(),
            cached: None,
            start_init_attempted: false,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// The locally cached record, if any poll has succeeded.
    pub fn record(&self) -> Option<&SessionRecord> {
        self.cached.as_ref()
    }

    pub fn last_known_cursor(&self) -> Option<usize> {
        self.cached.as_ref().map(|r| r.turn_cursor)
    }

    /// Read the authoritative record and fold it into the cache.
    ///
    /// The first time this client sees an unset turn start on a running
    /// draft, it issues one set-if-absent write with `now`.
    pub async fn poll(&mut self, now: DateTime<Utc>) -> Result<PollReport, DraftError> {
        let previous_cursor = self.last_known_cursor();
        let fresh = self.store.read_by_id(&self.session_id).await?;
        self.reconcile(fresh);

        let mut initialized_start = false;
        if self.needs_start_init() {
            initialized_start = self.store.init_turn_start(&self.session_id, now).await?;
            // Only a completed attempt counts; a failed one is retried next poll.
            self.start_init_attempted = true;
            if initialized_start {
                info!("Initialized turn start for session {}", self.session_id);
                if let Some(cached) = self.cached.as_mut() {
                    cached.turn_start_time = Some(now);
                }
            } else {
                // Someone else got there first; pick up their value.
                let fresh = self.store.read_by_id(&self.session_id).await?;
                self.reconcile(fresh);
            }
        }

        let cursor = self.last_known_cursor().unwrap_or_default();
        debug!(
            "Polled session {}: cursor {:?} -> {}",
            self.session_id, previous_cursor, cursor
        );
        Ok(PollReport {
            previous_cursor,
            cursor,
            initialized_start,
        })
    }

    fn needs_start_init(&self) -> bool {
        !self.start_init_attempted
            && self
                .cached
                .as_ref()
                .is_some_and(|r| r.turn_start_time.is_none() && !r.draft_complete)
    }

    /// Replace the cache with `fresh` unless it is older than what we hold.
    fn reconcile(&mut self, fresh: SessionRecord) {
        if let Err(e) = fresh.check_invariants() {
            warn!("{}", e);
        }
        match &self.cached {
            Some(cached) if fresh.turn_cursor < cached.turn_cursor => {
                warn!(
                    "Session {} read at cursor {} behind cached cursor {}, keeping cache",
                    self.session_id, fresh.turn_cursor, cached.turn_cursor
                );
            }
            Some(cached) if fresh.turn_cursor > cached.turn_cursor => {
                info!(
                    "Session {} advanced {} -> {}",
                    self.session_id, cached.turn_cursor, fresh.turn_cursor
                );
                self.cached = Some(fresh);
            }
            _ => self.cached = Some(fresh),
        }
    }

    /// Attempt one ban or pick for `role`.
    ///
    /// The caller decided on this action while looking at the cached cursor.
    /// The record is re-read; if the cursor has moved since, the action is
    /// rejected as stale. Otherwise it is validated against the fresh record
    /// and written conditionally on that record's cursor.
    pub async fn submit(
        &mut self,
        role: Role,
        god: &str,
        now: DateTime<Utc>,
    ) -> Result<SessionRecord, DraftError> {
        let fresh = self.store.read_by_id(&self.session_id).await?;
        let validated_cursor = self.last_known_cursor().unwrap_or(fresh.turn_cursor);
        self.reconcile(fresh.clone());

        if fresh.turn_cursor != validated_cursor {
            warn!(
                "Rejecting {} `{}` on session {}: validated at cursor {}, store is at {}",
                role, god, self.session_id, validated_cursor, fresh.turn_cursor
            );
            return Err(DraftError::StaleWrite {
                id: self.session_id.clone(),
                expected_cursor: validated_cursor,
                actual_cursor: fresh.turn_cursor,
            });
        }

        let next = apply_action(&fresh, role, god, now)?;
        match self.store.update_if_cursor(fresh.turn_cursor, &next).await {
            Ok(()) => {
                info!(
                    "Session {}: {} confirmed `{}` at turn {}",
                    self.session_id, role, god, fresh.turn_cursor
                );
                self.cached = Some(next.clone());
                Ok(next)
            }
            Err(err @ DraftError::StaleWrite { .. }) => {
                warn!("Lost race on session {}: {}", self.session_id, err);
                if let Ok(latest) = self.store.read_by_id(&self.session_id).await {
                    self.reconcile(latest);
                }
                Err(err)
            }
            Err(err) => Err(err),
        }
    }
}
