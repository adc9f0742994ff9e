// Integration tests for the snake draft core.
//
// These drive whole sessions through the public API against the SQLite
// backend: several clients sharing one store, each polling and submitting on
// its own, with the store's conditional writes as the only coordination.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use snakedraft_core::client::DraftClient;
use snakedraft_core::db::Database;
use snakedraft_core::draft::sequence::{DRAFT_ORDER, TOTAL_TURNS};
use snakedraft_core::draft::timer::TurnTimer;
use snakedraft_core::draft::{DraftAction, Role, SessionRecord, Team, TurnStatus};
use snakedraft_core::error::DraftError;
use snakedraft_core::gods::{GodPool, SMITE2_GODS};
use snakedraft_core::store::{create_session, SessionFilter, SessionStore};
use snakedraft_core::sync::SyncClient;

// ===========================================================================
// Test helpers
// ===========================================================================

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 18, 0, 0).unwrap()
}

fn open_db() -> Arc<Database> {
    Arc::new(Database::open(":memory:").expect("in-memory database"))
}

fn draft_client(db: &Arc<Database>, lobby_id: &str, role: Role) -> DraftClient {
    DraftClient::new(
        SyncClient::new(db.clone(), lobby_id),
        role,
        GodPool::default(),
        TurnTimer::default(),
    )
}

/// SQLite store that yields after each read, so clients running
/// concurrently on one task both see the same cursor before either writes.
struct InterleavingDb {
    db: Database,
    conditional_writes: AtomicUsize,
}

#[async_trait]
impl SessionStore for InterleavingDb {
    async fn create(&self, record: &SessionRecord) -> Result<String, DraftError> {
        self.db.create(record).await
    }

    async fn read_by_id(&self, id: &str) -> Result<SessionRecord, DraftError> {
        let record = self.db.read_by_id(id).await;
        tokio::task::yield_now().await;
        record
    }

    async fn update_if_cursor(
        &self,
        expected_cursor: usize,
        next: &SessionRecord,
    ) -> Result<(), DraftError> {
        self.conditional_writes.fetch_add(1, Ordering::SeqCst);
        self.db.update_if_cursor(expected_cursor, next).await
    }

    async fn init_turn_start(&self, id: &str, at: DateTime<Utc>) -> Result<bool, DraftError> {
        self.db.init_turn_start(id, at).await
    }

    async fn query(&self, filter: &SessionFilter) -> Result<Vec<SessionRecord>, DraftError> {
        self.db.query(filter).await
    }
}

// ===========================================================================
// Full session
// ===========================================================================

#[tokio::test]
async fn full_draft_two_captains_and_spectator() {
    let db = open_db();
    let record = create_session(db.as_ref(), "Order Side", "Chaos Side")
        .await
        .unwrap();

    let mut captain1 = draft_client(&db, &record.id, Role::Captain1);
    let mut captain2 = draft_client(&db, &record.id, Role::Captain2);
    let mut spectator = draft_client(&db, &record.id, Role::Spectator);

    for turn in 0..TOTAL_TURNS {
        let now = t0() + Duration::seconds(turn as i64 * 10);
        captain1.refresh(now).await.unwrap();
        captain2.refresh(now).await.unwrap();
        spectator.refresh(now).await.unwrap();
        assert!(!spectator.can_interact());

        let expected = DRAFT_ORDER[turn];
        let (actor, idle) = match expected.team {
            Team::One => (&mut captain1, &mut captain2),
            Team::Two => (&mut captain2, &mut captain1),
        };
        assert!(actor.can_interact(), "turn {turn}");
        assert!(!idle.can_interact(), "turn {turn}");

        let god = SMITE2_GODS[turn];
        actor.select_god(god).unwrap();
        let next = actor.confirm_selection(now).await.unwrap().unwrap();
        assert_eq!(next.turn_cursor, turn + 1);
        next.check_invariants().unwrap();
    }

    spectator.refresh(t0()).await.unwrap();
    let finished = spectator.record().unwrap().clone();
    assert!(finished.draft_complete);
    assert_eq!(finished.turn_cursor, TOTAL_TURNS);
    assert_eq!(finished.current_turn(), TurnStatus::Complete);
    assert_eq!(finished.entry_count(), TOTAL_TURNS);
    for team in [Team::One, Team::Two] {
        assert_eq!(finished.bans(team).len(), 5);
        assert_eq!(finished.picks(team).len(), 5);
    }

    let log = finished.action_log();
    assert_eq!(log.len(), TOTAL_TURNS);
    for (i, entry) in log.iter().enumerate() {
        assert_eq!(entry.turn, i);
        assert_eq!(entry.team, DRAFT_ORDER[i].team);
        assert_eq!(entry.action, DRAFT_ORDER[i].action);
        assert_eq!(entry.god, SMITE2_GODS[i]);
    }

    // Nobody can act any more.
    captain1.refresh(t0()).await.unwrap();
    assert!(matches!(
        captain1.select_god("Zeus"),
        Err(DraftError::DraftAlreadyComplete)
    ));
    assert_eq!(captain1.remaining_secs(t0()), 0);

    let open = db.query(&SessionFilter::open()).await.unwrap();
    assert!(open.is_empty());
}

#[tokio::test]
async fn ban_conflict_across_teams() {
    let db = open_db();
    let record = create_session(db.as_ref(), "Order Side", "Chaos Side")
        .await
        .unwrap();
    let mut captain1 = draft_client(&db, &record.id, Role::Captain1);
    let mut captain2 = draft_client(&db, &record.id, Role::Captain2);
    captain1.refresh(t0()).await.unwrap();
    captain2.refresh(t0()).await.unwrap();

    captain1.select_god("Zeus").unwrap();
    captain1.confirm_selection(t0()).await.unwrap();

    captain2.refresh(t0()).await.unwrap();
    assert!(matches!(
        captain2.select_god("Zeus"),
        Err(DraftError::GodUnavailable { .. })
    ));
    captain2.select_god("Loki").unwrap();
    captain2.confirm_selection(t0()).await.unwrap();

    let stored = db.read_by_id(&record.id).await.unwrap();
    assert_eq!(stored.team1_bans, vec!["Zeus"]);
    assert_eq!(stored.team2_bans, vec!["Loki"]);
    assert_eq!(stored.turn_cursor, 2);
    assert_eq!(
        stored.current_turn().active().map(|t| (t.team, t.action)),
        Some((Team::One, DraftAction::Ban))
    );
}

// ===========================================================================
// Concurrency
// ===========================================================================

#[tokio::test]
async fn same_captain_on_two_devices_only_one_lands() {
    let db = open_db();
    let record = create_session(db.as_ref(), "Order Side", "Chaos Side")
        .await
        .unwrap();
    let mut desk = SyncClient::new(db.clone(), &record.id);
    let mut phone = SyncClient::new(db.clone(), &record.id);
    desk.poll(t0()).await.unwrap();
    phone.poll(t0()).await.unwrap();

    let (a, b) = tokio::join!(
        desk.submit(Role::Captain1, "Zeus", t0()),
        phone.submit(Role::Captain1, "Thor", t0())
    );
    let stale = [&a, &b]
        .iter()
        .filter(|r| matches!(r, Err(DraftError::StaleWrite { .. })))
        .count();
    assert_eq!(stale, 1);
    assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);

    let stored = db.read_by_id(&record.id).await.unwrap();
    assert_eq!(stored.turn_cursor, 1);
    assert_eq!(stored.team1_bans.len(), 1);
    assert!(stored.team2_bans.is_empty());

    // Both devices converge on the stored state.
    desk.poll(t0()).await.unwrap();
    phone.poll(t0()).await.unwrap();
    assert_eq!(desk.record(), Some(&stored));
    assert_eq!(phone.record(), Some(&stored));
}

#[tokio::test]
async fn racing_captains_resolved_by_sqlite_conditional_update() {
    let store = Arc::new(InterleavingDb {
        db: Database::open(":memory:").expect("in-memory database"),
        conditional_writes: AtomicUsize::new(0),
    });
    let record = create_session(store.as_ref(), "Order Side", "Chaos Side")
        .await
        .unwrap();
    let mut desk = SyncClient::new(store.clone(), &record.id);
    let mut phone = SyncClient::new(store.clone(), &record.id);
    desk.poll(t0()).await.unwrap();
    phone.poll(t0()).await.unwrap();

    let (a, b) = tokio::join!(
        desk.submit(Role::Captain1, "Zeus", t0()),
        phone.submit(Role::Captain1, "Thor", t0())
    );

    // Both passed validation at cursor 0 and reached the store.
    assert_eq!(store.conditional_writes.load(Ordering::SeqCst), 2);
    assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
    assert!([&a, &b]
        .iter()
        .any(|r| matches!(r, Err(DraftError::StaleWrite { actual_cursor: 1, .. }))));

    let stored = store.read_by_id(&record.id).await.unwrap();
    assert_eq!(stored.turn_cursor, 1);
    assert_eq!(stored.team1_bans.len(), 1);
    assert_eq!(desk.last_known_cursor(), Some(1));
    assert_eq!(phone.last_known_cursor(), Some(1));
}

#[tokio::test]
async fn late_joiner_does_not_reset_turn_start() {
    let db = open_db();
    let record = create_session(db.as_ref(), "Order Side", "Chaos Side")
        .await
        .unwrap();

    let mut first = draft_client(&db, &record.id, Role::Captain1);
    first.refresh(t0()).await.unwrap();

    let later = t0() + Duration::seconds(25);
    let mut late = draft_client(&db, &record.id, Role::Spectator);
    let report = late.refresh(later).await.unwrap();
    assert!(!report.initialized_start);
    assert_eq!(late.record().unwrap().turn_start_time, Some(t0()));
    assert_eq!(late.remaining_secs(later), 35);
    assert_eq!(first.remaining_secs(later), 35);
}

// ===========================================================================
// Lifecycle
// ===========================================================================

#[tokio::test]
async fn deleted_session_is_fatal() {
    let db = open_db();
    let mut client = draft_client(&db, "lobby_0_missing00", Role::Captain1);
    let err = client.refresh(t0()).await.unwrap_err();
    assert!(matches!(err, DraftError::RecordNotFound { .. }));
    assert!(err.is_fatal());
}

#[tokio::test]
async fn record_wire_format() {
    let db = open_db();
    let record = create_session(db.as_ref(), "Order Side", "Chaos Side")
        .await
        .unwrap();
    let mut captain1 = draft_client(&db, &record.id, Role::Captain1);
    captain1.refresh(t0()).await.unwrap();
    captain1.select_god("Zeus").unwrap();
    let next = captain1.confirm_selection(t0()).await.unwrap().unwrap();

    let json = serde_json::to_value(&next).unwrap();
    assert_eq!(json["lobby_id"], record.id.as_str());
    assert_eq!(json["current_turn"], 1);
    assert_eq!(json["team1_bans"], serde_json::json!(["Zeus"]));
    assert_eq!(json["draft_complete"], false);
    assert!(json["turn_start_time"].is_string());
}
