// Client intent surface: staged selection, confirm and cancel for one role.
//
// The staged god lives only here. It is never written to the store and is
// dropped on cancel, on a successful confirm, or when a poll shows the turn
// has moved on.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::draft::timer::TurnTimer;
use crate::draft::{Role, SessionRecord, TurnStatus};
use crate::error::DraftError;
use crate::gods::{GodPool, GodStatus};
use crate::protocol::DraftSnapshot;
use crate::sync::{PollReport, SyncClient};

pub struct DraftClient {
    sync: SyncClient,
    role: Role,
    pool: GodPool,
    timer: TurnTimer,
    staged: Option<String>,
}

impl DraftClient {
    pub fn new(sync: SyncClient, role: Role, pool: GodPool, timer: TurnTimer) -> Self {
        DraftClient {
            sync,
            role,
            pool,
            timer,
            staged: None,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn session_id(&self) -> &str {
        self.sync.session_id()
    }

    pub fn staged(&self) -> Option<&str> {
        self.staged.as_deref()
    }

    pub fn record(&self) -> Option<&SessionRecord> {
        self.sync.record()
    }

    /// Poll the store. A staged god does not survive a turn change.
    pub async fn refresh(&mut self, now: DateTime<Utc>) -> Result<PollReport, DraftError> {
        let report = self.sync.poll(now).await?;
        if report.advanced() {
            if let Some(god) = self.staged.take() {
                debug!("Turn moved to {}, dropping staged `{}`", report.cursor, god);
            }
        }
        Ok(report)
    }

    pub fn is_my_turn(&self) -> bool {
        self.record()
            .and_then(|r| r.current_turn().active())
            .is_some_and(|turn| turn.is_actor(self.role))
    }

    pub fn can_interact(&self) -> bool {
        self.role != Role::Spectator && self.is_my_turn()
    }

    /// Stage `god` for this role's current turn.
    pub fn select_god(&mut self, god: &str) -> Result<(), DraftError> {
        if self.record().is_some_and(|r| r.draft_complete) {
            return Err(DraftError::DraftAlreadyComplete);
        }
        if !self.can_interact() {
            return Err(DraftError::NotYourTurn);
        }
        if !self.pool.contains(god) {
            return Err(DraftError::UnknownGod {
                god: god.to_string(),
            });
        }
        if let Some(record) = self.record() {
            let status = self.pool.status(god, record);
            if status != GodStatus::Available {
                debug!("`{}` rejected, already {:?}", god, status);
                return Err(DraftError::GodUnavailable {
                    god: god.to_string(),
                });
            }
        }
        debug!("{} staged `{}`", self.role, god);
        self.staged = Some(god.to_string());
        Ok(())
    }

    pub fn cancel_selection(&mut self) {
        if let Some(god) = self.staged.take() {
            debug!("{} cancelled `{}`", self.role, god);
        }
    }

    /// Submit the staged god. Returns `Ok(None)` when nothing is staged.
    ///
    /// On a stale write the selection is kept so the user can look at the
    /// refreshed state and decide again; validation failures drop it.
    pub async fn confirm_selection(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<Option<SessionRecord>, DraftError> {
        let Some(god) = self.staged.clone() else {
            return Ok(None);
        };
        match self.sync.submit(self.role, &god, now).await {
            Ok(next) => {
                info!("{} locked in `{}`", self.role, god);
                self.staged = None;
                Ok(Some(next))
            }
            Err(err) => {
                if err.is_validation() {
                    self.staged = None;
                }
                Err(err)
            }
        }
    }

    pub fn remaining_secs(&self, now: DateTime<Utc>) -> u32 {
        self.record()
            .map(|r| self.timer.remaining_for(r, now))
            .unwrap_or(self.timer.duration_secs)
    }

    /// Label shown for this client's role.
    pub fn role_label(&self) -> String {
        match (self.role.team(), self.record()) {
            (Some(team), Some(record)) => format!("{} Captain", record.team_name(team)),
            (Some(team), None) => format!("Team {} Captain", team.number()),
            (None, _) => "Spectator Mode".to_string(),
        }
    }

    /// Render-ready view of the cached state, if any poll has succeeded.
    pub fn snapshot(&self, now: DateTime<Utc>) -> Option<DraftSnapshot> {
        let record = self.record()?;
        let turn: TurnStatus = record.current_turn();
        Some(DraftSnapshot {
            record: record.clone(),
            role: self.role,
            role_label: self.role_label(),
            turn,
            is_my_turn: self.is_my_turn(),
            can_interact: self.can_interact(),
            staged: self.staged.clone(),
            remaining_secs: self.remaining_secs(now),
            turn_expired: self.timer.is_expired(record, now),
            unavailable: record.unavailable().map(str::to_string).collect(),
            available: self
                .pool
                .available(record)
                .into_iter()
                .map(str::to_string)
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, SessionStore};
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 18, 0, 0).unwrap()
    }

    fn client_for(store: &Arc<MemoryStore>, role: Role) -> DraftClient {
        DraftClient::new(
            SyncClient::new(store.clone(), "lobby_client"),
            role,
            GodPool::default(),
            TurnTimer::default(),
        )
    }

    async fn clients() -> (Arc<MemoryStore>, DraftClient, DraftClient, DraftClient) {
        let store = Arc::new(MemoryStore::new());
        let record = SessionRecord::new("lobby_client", "Order Side", "Chaos Side");
        store.create(&record).await.unwrap();

        let mut c1 = client_for(&store, Role::Captain1);
        let mut c2 = client_for(&store, Role::Captain2);
        let mut spec = client_for(&store, Role::Spectator);
        c1.refresh(t0()).await.unwrap();
        c2.refresh(t0()).await.unwrap();
        spec.refresh(t0()).await.unwrap();
        (store, c1, c2, spec)
    }

    #[tokio::test]
    async fn select_confirm_flow() {
        let (store, mut c1, mut c2, _) = clients().await;

        c1.select_god("Zeus").unwrap();
        assert_eq!(c1.staged(), Some("Zeus"));
        let next = c1.confirm_selection(t0()).await.unwrap().unwrap();
        assert_eq!(next.team1_bans, vec!["Zeus"]);
        assert_eq!(c1.staged(), None);
        assert!(!c1.can_interact());

        c2.refresh(t0()).await.unwrap();
        assert!(c2.can_interact());
        let err = c2.select_god("Zeus").unwrap_err();
        assert!(matches!(err, DraftError::GodUnavailable { .. }));
        c2.select_god("Loki").unwrap();
        c2.confirm_selection(t0()).await.unwrap();

        assert_eq!(store.read_by_id("lobby_client").await.unwrap().turn_cursor, 2);
    }

    #[tokio::test]
    async fn confirm_without_selection_is_noop() {
        let (store, mut c1, _, _) = clients().await;
        assert_eq!(c1.confirm_selection(t0()).await.unwrap(), None);
        assert_eq!(store.read_by_id("lobby_client").await.unwrap().turn_cursor, 0);
    }

    #[tokio::test]
    async fn cancel_discards_without_writing() {
        let (store, mut c1, _, _) = clients().await;
        c1.select_god("Ra").unwrap();
        c1.cancel_selection();
        assert_eq!(c1.staged(), None);
        assert_eq!(c1.confirm_selection(t0()).await.unwrap(), None);
        assert_eq!(store.read_by_id("lobby_client").await.unwrap().entry_count(), 0);
    }

    #[tokio::test]
    async fn spectator_and_idle_captain_cannot_select() {
        let (_, _, mut c2, mut spec) = clients().await;
        assert!(matches!(spec.select_god("Zeus"), Err(DraftError::NotYourTurn)));
        assert!(matches!(c2.select_god("Zeus"), Err(DraftError::NotYourTurn)));
    }

    #[tokio::test]
    async fn unknown_god_rejected() {
        let (_, mut c1, _, _) = clients().await;
        assert!(matches!(
            c1.select_god("Pikachu"),
            Err(DraftError::UnknownGod { .. })
        ));
    }

    #[tokio::test]
    async fn stale_confirm_keeps_selection() {
        let (store, mut c1, _, _) = clients().await;
        // A second device for captain 1 confirms first.
        let mut other_device = client_for(&store, Role::Captain1);
        other_device.refresh(t0()).await.unwrap();
        other_device.select_god("Thor").unwrap();
        c1.select_god("Zeus").unwrap();
        other_device.confirm_selection(t0()).await.unwrap();

        let err = c1.confirm_selection(t0()).await.unwrap_err();
        assert!(err.needs_refresh());
        assert_eq!(c1.staged(), Some("Zeus"));
        // The refreshed cache shows it is now team 2's turn.
        assert!(!c1.can_interact());
    }

    #[tokio::test]
    async fn poll_advance_drops_staged_selection() {
        let (store, mut c1, _, _) = clients().await;
        let mut other_device = client_for(&store, Role::Captain1);
        other_device.refresh(t0()).await.unwrap();

        c1.select_god("Zeus").unwrap();
        // A poll with no change keeps the staged god.
        c1.refresh(t0()).await.unwrap();
        assert_eq!(c1.staged(), Some("Zeus"));

        other_device.select_god("Thor").unwrap();
        other_device.confirm_selection(t0()).await.unwrap();

        let report = c1.refresh(t0()).await.unwrap();
        assert!(report.advanced());
        assert_eq!(c1.staged(), None);
    }

    #[tokio::test]
    async fn snapshot_splits_gods_and_flags_overrun_turn() {
        let (_, mut c1, mut c2, _) = clients().await;
        c1.select_god("Zeus").unwrap();
        c1.confirm_selection(t0()).await.unwrap();
        c2.refresh(t0()).await.unwrap();

        let late = t0() + Duration::seconds(75);
        let snap = c2.snapshot(late).unwrap();
        assert_eq!(snap.unavailable, vec!["Zeus"]);
        assert_eq!(snap.available.len(), 71);
        assert!(!snap.available.iter().any(|g| g == "Zeus"));
        assert_eq!(snap.remaining_secs, 0);
        assert!(snap.turn_expired);
        // The turn stays open after the countdown runs out.
        assert!(snap.can_interact);
    }

    #[tokio::test]
    async fn snapshot_reflects_role() {
        let (_, c1, c2, spec) = clients().await;
        let now = t0() + Duration::seconds(20);

        let s1 = c1.snapshot(now).unwrap();
        assert!(s1.is_my_turn);
        assert!(s1.can_interact);
        assert_eq!(s1.role_label, "Order Side Captain");
        assert_eq!(s1.remaining_secs, 40);
        assert!(!s1.turn_expired);
        assert_eq!(s1.available.len(), 72);
        assert!(s1.unavailable.is_empty());

        let s2 = c2.snapshot(now).unwrap();
        assert!(!s2.is_my_turn);
        assert_eq!(s2.role_label, "Chaos Side Captain");

        let ss = spec.snapshot(now).unwrap();
        assert!(!ss.can_interact);
        assert_eq!(ss.role_label, "Spectator Mode");
    }
}
