// SQLite-backed session store.

use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::draft::SessionRecord;
use crate::error::DraftError;
use crate::store::{SessionFilter, SessionStore};

/// SQLite persistence for session records and client-local key-value state.
pub struct Database {
    conn: Mutex<Connection>,
}

const SELECT_LOBBY: &str = "SELECT lobby_id, team1_name, team2_name, team1_bans, team2_bans,
        team1_picks, team2_picks, current_turn, turn_start_time, draft_complete
     FROM lobbies";

/// Raw column values of one `lobbies` row, before JSON/timestamp decoding.
struct LobbyRow {
    lobby_id: String,
    team1_name: String,
    team2_name: String,
    team1_bans: String,
    team2_bans: String,
    team1_picks: String,
    team2_picks: String,
    current_turn: i64,
    turn_start_time: Option<String>,
    draft_complete: bool,
}

impl LobbyRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(LobbyRow {
            lobby_id: row.get(0)?,
            team1_name: row.get(1)?,
            team2_name: row.get(2)?,
            team1_bans: row.get(3)?,
            team2_bans: row.get(4)?,
            team1_picks: row.get(5)?,
            team2_picks: row.get(6)?,
            current_turn: row.get(7)?,
            turn_start_time: row.get(8)?,
            draft_complete: row.get(9)?,
        })
    }

    fn into_record(self) -> Result<SessionRecord> {
        let list = |json: &str, column: &str| -> Result<Vec<String>> {
            serde_json::from_str(json)
                .with_context(|| format!("failed to decode {column} for {}", self.lobby_id))
        };
        let turn_start_time = self
            .turn_start_time
            .as_deref()
            .map(parse_timestamp)
            .transpose()?;
        let turn_cursor = usize::try_from(self.current_turn)
            .with_context(|| format!("negative current_turn for {}", self.lobby_id))?;

        Ok(SessionRecord {
            team1_bans: list(&self.team1_bans, "team1_bans")?,
            team2_bans: list(&self.team2_bans, "team2_bans")?,
            team1_picks: list(&self.team1_picks, "team1_picks")?,
            team2_picks: list(&self.team2_picks, "team2_picks")?,
            turn_cursor,
            turn_start_time,
            draft_complete: self.draft_complete,
            team1_name: self.team1_name,
            team2_name: self.team2_name,
            id: self.lobby_id,
        })
    }
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("invalid turn_start_time `{s}`"))
}

fn encode_list(list: &[String]) -> Result<String> {
    serde_json::to_string(list).context("failed to encode god list")
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database (useful
    /// for tests).
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS lobbies (
                lobby_id        TEXT PRIMARY KEY,
                team1_name      TEXT NOT NULL,
                team2_name      TEXT NOT NULL,
                team1_bans      TEXT NOT NULL DEFAULT '[]',
                team2_bans      TEXT NOT NULL DEFAULT '[]',
                team1_picks     TEXT NOT NULL DEFAULT '[]',
                team2_picks     TEXT NOT NULL DEFAULT '[]',
                current_turn    INTEGER NOT NULL DEFAULT 0,
                turn_start_time TEXT,
                draft_complete  INTEGER NOT NULL DEFAULT 0,
                created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX IF NOT EXISTS idx_lobbies_complete ON lobbies(draft_complete);

            CREATE TABLE IF NOT EXISTS client_state (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the database connection.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock).
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    fn read_lobby(conn: &Connection, id: &str) -> Result<Option<SessionRecord>> {
        let row = conn
            .query_row(
                &format!("{SELECT_LOBBY} WHERE lobby_id = ?1"),
                params![id],
                LobbyRow::from_row,
            )
            .optional()
            .context("failed to read lobby")?;
        row.map(LobbyRow::into_record).transpose()
    }

    fn current_turn(conn: &Connection, id: &str) -> Result<Option<usize>> {
        let turn: Option<i64> = conn
            .query_row(
                "SELECT current_turn FROM lobbies WHERE lobby_id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()
            .context("failed to read current_turn")?;
        Ok(turn.map(|t| t.max(0) as usize))
    }

    /// Persist an arbitrary JSON value under `key`. Uses INSERT OR REPLACE so
    /// repeated saves overwrite the previous value.
    pub fn save_state(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        let conn = self.conn();
        let json_str =
            serde_json::to_string(value).context("failed to serialize state value")?;
        conn.execute(
            "INSERT OR REPLACE INTO client_state (key, value) VALUES (?1, ?2)",
            params![key, json_str],
        )
        .context("failed to save state")?;
        Ok(())
    }

    /// Load a previously saved JSON value by `key`. Returns `None` if the key
    /// does not exist.
    pub fn load_state(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let conn = self.conn();
        let json_str: Option<String> = conn
            .query_row(
                "SELECT value FROM client_state WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .context("failed to query client state")?;

        json_str
            .map(|s| serde_json::from_str(&s).context("failed to deserialize state value"))
            .transpose()
    }
}

#[async_trait]
impl SessionStore for Database {
    async fn create(&self, record: &SessionRecord) -> Result<String, DraftError> {
        let conn = self.conn();
        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO lobbies
                    (lobby_id, team1_name, team2_name, team1_bans, team2_bans, team1_picks,
                     team2_picks, current_turn, turn_start_time, draft_complete)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    record.id,
                    record.team1_name,
                    record.team2_name,
                    encode_list(&record.team1_bans)?,
                    encode_list(&record.team2_bans)?,
                    encode_list(&record.team1_picks)?,
                    encode_list(&record.team2_picks)?,
                    record.turn_cursor as i64,
                    record.turn_start_time.map(format_timestamp),
                    record.draft_complete,
                ],
            )
            .context("failed to insert lobby")?;
        if inserted == 0 {
            return Err(anyhow!("session {} already exists", record.id).into());
        }
        Ok(record.id.clone())
    }

    async fn read_by_id(&self, id: &str) -> Result<SessionRecord, DraftError> {
        let conn = self.conn();
        Self::read_lobby(&conn, id)?.ok_or_else(|| DraftError::RecordNotFound { id: id.to_string() })
    }

    async fn update_if_cursor(
        &self,
        expected_cursor: usize,
        next: &SessionRecord,
    ) -> Result<(), DraftError> {
        let conn = self.conn();
        let changed = conn
            .execute(
                "UPDATE lobbies SET
                    team1_bans = ?1, team2_bans = ?2, team1_picks = ?3, team2_picks = ?4,
                    current_turn = ?5, turn_start_time = ?6, draft_complete = ?7
                 WHERE lobby_id = ?8 AND current_turn = ?9 AND draft_complete = 0",
                params![
                    encode_list(&next.team1_bans)?,
                    encode_list(&next.team2_bans)?,
                    encode_list(&next.team1_picks)?,
                    encode_list(&next.team2_picks)?,
                    next.turn_cursor as i64,
                    next.turn_start_time.map(format_timestamp),
                    next.draft_complete,
                    next.id,
                    expected_cursor as i64,
                ],
            )
            .context("failed to update lobby")?;

        if changed == 1 {
            return Ok(());
        }
        match Self::current_turn(&conn, &next.id)? {
            None => Err(DraftError::RecordNotFound {
                id: next.id.clone(),
            }),
            Some(actual_cursor) => Err(DraftError::StaleWrite {
                id: next.id.clone(),
                expected_cursor,
                actual_cursor,
            }),
        }
    }

    async fn init_turn_start(&self, id: &str, at: DateTime<Utc>) -> Result<bool, DraftError> {
        let conn = self.conn();
        let changed = conn
            .execute(
                "UPDATE lobbies SET turn_start_time = ?1
                 WHERE lobby_id = ?2 AND turn_start_time IS NULL AND draft_complete = 0",
                params![format_timestamp(at), id],
            )
            .context("failed to initialize turn_start_time")?;

        if changed == 0 && Self::current_turn(&conn, id)?.is_none() {
            return Err(DraftError::RecordNotFound { id: id.to_string() });
        }
        Ok(changed == 1)
    }

    async fn query(&self, filter: &SessionFilter) -> Result<Vec<SessionRecord>, DraftError> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!(
                "{SELECT_LOBBY}
                 WHERE (?1 IS NULL OR lobby_id = ?1) AND (?2 IS NULL OR draft_complete = ?2)
                 ORDER BY lobby_id"
            ))
            .context("failed to prepare lobby query")?;

        let rows = stmt
            .query_map(
                params![filter.lobby_id, filter.draft_complete],
                LobbyRow::from_row,
            )
            .context("failed to query lobbies")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map lobby rows")?;

        let records = rows
            .into_iter()
            .map(LobbyRow::into_record)
            .collect::<Result<Vec<_>>>()?;
        Ok(records)
    }
}
