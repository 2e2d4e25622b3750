//! SQLite persistence for spots and their check history.
//!
//! # Storage layout
//!
//! Two tables are created (if they do not already exist):
//!
//! `spots`
//!
//! | column           | type    | description                              |
//! |------------------|---------|------------------------------------------|
//! | id               | INTEGER | autoincrement primary key                |
//! | name             | TEXT    | display name                             |
//! | description      | TEXT    | target state judged by the analyzer      |
//! | camera_entity_id | TEXT    | Home Assistant camera entity             |
//! | spot_type        | TEXT    | lowercase [`SpotType`] id                |
//! | voice_id         | TEXT    | snake_case [`Voice`] id                  |
//! | created_at       | TEXT    | RFC-3339 UTC                             |
//! | updated_at       | TEXT    | RFC-3339 UTC, bumped on edit and check   |
//! | snoozed_until    | TEXT    | RFC-3339 UTC or NULL                     |
//!
//! `checks`
//!
//! | column        | type    | description                                 |
//! |---------------|---------|---------------------------------------------|
//! | id            | INTEGER | autoincrement primary key                   |
//! | spot_id       | INTEGER | owning spot, cascades on delete             |
//! | timestamp     | TEXT    | RFC-3339 UTC, fixed width                   |
//! | status        | TEXT    | `pass` / `fail` / `unknown`                 |
//! | score         | INTEGER | 0–100                                       |
//! | feedback      | TEXT    | model feedback                              |
//! | items_to_sort | TEXT    | JSON array of `{name, location, suggestion}`|
//!
//! Timestamps are written with microsecond precision and a `Z` suffix so that
//! lexical `ORDER BY` is chronological.  Rows are decoded into strongly typed
//! values here; a malformed row is reported as a [`StoreError`] and never
//! reaches the pattern engine.
//!
//! # Example
//!
//! ```rust
//! use chrono::Utc;
//! use twinsync_memory::store::SpotStore;
//! use twinsync_types::{CheckRecord, NewSpot, SpotStatus, SpotType, Voice};
//!
//! let store = SpotStore::open_in_memory().unwrap();
//! let id = store
//!     .create_spot(&NewSpot {
//!         name: "Kitchen Sink".into(),
//!         description: "Empty sink with no dirty dishes".into(),
//!         camera_entity_id: "camera.kitchen".into(),
//!         spot_type: SpotType::Sink,
//!         voice: Voice::Direct,
//!     })
//!     .unwrap();
//!
//! store
//!     .add_check(id, &CheckRecord {
//!         timestamp: Utc::now(),
//!         status: SpotStatus::Pass,
//!         score: 92,
//!         feedback: "Spotless.".into(),
//!         items_to_sort: vec![],
//!     })
//!     .unwrap();
//!
//! let summary = store.get_spot(id).unwrap().unwrap();
//! assert_eq!(summary.memory.unwrap().total_checks, 1);
//! ```

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Local, SecondsFormat, TimeZone, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};
use twinsync_types::{
    CheckRecord, CheckResult, NewSpot, Spot, SpotError, SpotStatus, SpotType, SpotUpdate,
    StoredCheck, ToSortItem, Voice,
};

use crate::memory::{MemoryAggregator, SpotMemory};

/// Number of most recent checks that feed a spot's memory.
pub const MEMORY_WINDOW: usize = 100;

/// Number of most recent checks returned for display.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can arise from store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Spot not found: {0}")]
    SpotNotFound(i64),
    #[error("Failed to encode items: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("Store connection lock poisoned")]
    Poisoned,
    #[error("Store task did not complete: {0}")]
    Interrupted(String),
}

impl From<StoreError> for SpotError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::SpotNotFound(id) => SpotError::NotFound(id),
            other => SpotError::Storage(other.to_string()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SpotSummary
// ─────────────────────────────────────────────────────────────────────────────

/// A spot together with its latest check and derived memory.
#[derive(Debug, Clone, Serialize)]
pub struct SpotSummary {
    #[serde(flatten)]
    pub spot: Spot,
    pub last_check: Option<CheckRecord>,
    pub memory: Option<SpotMemory>,
}

// ─────────────────────────────────────────────────────────────────────────────
// SpotStore
// ─────────────────────────────────────────────────────────────────────────────

/// SQLite-backed store for spots and checks.
///
/// Access to the connection is serialised, so one store can be shared across
/// request handlers behind an `Arc`.  `Tz` is the calendar used for the
/// best/worst weekday of each summary; see [`SpotStore::with_aggregator`].
pub struct SpotStore<Tz: TimeZone = Local> {
    conn: Mutex<Connection>,
    aggregator: MemoryAggregator<Tz>,
}

impl SpotStore {
    /// Open (or create) a persistent SQLite database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        info!(path = %path.display(), "opened spot database");
        Self::with_connection(conn)
    }

    /// Open a temporary in-memory database (useful for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            aggregator: MemoryAggregator::local(),
        })
    }
}

impl<Tz: TimeZone> SpotStore<Tz> {
    /// Replace the memory aggregator, e.g. to bucket weekdays in a fixed
    /// zone instead of the host's.
    pub fn with_aggregator<T: TimeZone>(self, aggregator: MemoryAggregator<T>) -> SpotStore<T> {
        SpotStore {
            conn: self.conn,
            aggregator,
        }
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    // ── spots ────────────────────────────────────────────────────────────────

    /// Insert a new spot and return its id.
    pub fn create_spot(&self, spot: &NewSpot) -> Result<i64, StoreError> {
        let conn = self.conn()?;
        let now = to_sql_time(Utc::now());
        conn.execute(
            "INSERT INTO spots
                 (name, description, camera_entity_id, spot_type, voice_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![
                spot.name,
                spot.description,
                spot.camera_entity_id,
                spot.spot_type.as_str(),
                spot.voice.as_str(),
                now,
            ],
        )?;
        let id = conn.last_insert_rowid();
        debug!(spot_id = id, name = %spot.name, "spot created");
        Ok(id)
    }

    /// Fetch a spot with its last check and memory, or `None` if it does not
    /// exist.
    pub fn get_spot(&self, spot_id: i64) -> Result<Option<SpotSummary>, StoreError> {
        let conn = self.conn()?;
        match fetch_spot(&conn, spot_id)? {
            Some(spot) => Ok(Some(self.summarise(&conn, spot)?)),
            None => Ok(None),
        }
    }

    /// All spots, most recently updated first.
    pub fn list_spots(&self) -> Result<Vec<SpotSummary>, StoreError> {
        let conn = self.conn()?;
        let spots = {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SPOT_COLUMNS} FROM spots ORDER BY updated_at DESC, id DESC"
            ))?;
            let rows = stmt.query_map([], row_to_spot)?;
            rows.collect::<Result<Vec<_>, _>>()?
        };
        spots
            .into_iter()
            .map(|spot| self.summarise(&conn, spot))
            .collect()
    }

    /// Apply a partial update and return the resulting spot.
    ///
    /// An empty update leaves the row (including `updated_at`) untouched.
    pub fn update_spot(&self, spot_id: i64, update: &SpotUpdate) -> Result<Spot, StoreError> {
        let conn = self.conn()?;
        let mut spot = fetch_spot(&conn, spot_id)?.ok_or(StoreError::SpotNotFound(spot_id))?;
        if update.is_empty() {
            return Ok(spot);
        }

        if let Some(name) = &update.name {
            spot.name = name.clone();
        }
        if let Some(description) = &update.description {
            spot.description = description.clone();
        }
        if let Some(camera) = &update.camera_entity_id {
            spot.camera_entity_id = camera.clone();
        }
        if let Some(spot_type) = update.spot_type {
            spot.spot_type = spot_type;
        }
        if let Some(voice) = update.voice {
            spot.voice = voice;
        }
        spot.updated_at = Utc::now();

        conn.execute(
            "UPDATE spots
             SET name = ?1, description = ?2, camera_entity_id = ?3,
                 spot_type = ?4, voice_id = ?5, updated_at = ?6
             WHERE id = ?7",
            params![
                spot.name,
                spot.description,
                spot.camera_entity_id,
                spot.spot_type.as_str(),
                spot.voice.as_str(),
                to_sql_time(spot.updated_at),
                spot_id,
            ],
        )?;
        Ok(spot)
    }

    /// Delete a spot together with all of its checks.
    pub fn delete_spot(&self, spot_id: i64) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM spots WHERE id = ?1", params![spot_id])?;
        if deleted == 0 {
            return Err(StoreError::SpotNotFound(spot_id));
        }
        info!(spot_id, "spot deleted");
        Ok(())
    }

    /// Exclude the spot from checks until `until`.
    pub fn snooze_spot(&self, spot_id: i64, until: DateTime<Utc>) -> Result<(), StoreError> {
        self.set_snooze(spot_id, Some(to_sql_time(until)))
    }

    /// Clear any snooze on the spot.
    pub fn unsnooze_spot(&self, spot_id: i64) -> Result<(), StoreError> {
        self.set_snooze(spot_id, None)
    }

    fn set_snooze(&self, spot_id: i64, until: Option<String>) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE spots SET snoozed_until = ?1 WHERE id = ?2",
            params![until, spot_id],
        )?;
        if changed == 0 {
            return Err(StoreError::SpotNotFound(spot_id));
        }
        Ok(())
    }

    // ── checks ───────────────────────────────────────────────────────────────

    /// Persist a check result for `spot_id` and return the new check id.
    ///
    /// Also bumps the spot's `updated_at`.
    pub fn add_check(&self, spot_id: i64, result: &CheckResult) -> Result<i64, StoreError> {
        let items = serde_json::to_string(&result.items_to_sort)?;
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let touched = tx.execute(
            "UPDATE spots SET updated_at = ?1 WHERE id = ?2",
            params![to_sql_time(Utc::now()), spot_id],
        )?;
        if touched == 0 {
            return Err(StoreError::SpotNotFound(spot_id));
        }

        tx.execute(
            "INSERT INTO checks (spot_id, timestamp, status, score, feedback, items_to_sort)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                spot_id,
                to_sql_time(result.timestamp),
                result.status.as_str(),
                result.score,
                result.feedback,
                items,
            ],
        )?;
        let check_id = tx.last_insert_rowid();
        tx.commit()?;

        debug!(spot_id, check_id, status = %result.status, score = result.score, "check stored");
        Ok(check_id)
    }

    /// Up to `limit` checks for display, most recent first.
    pub fn history(&self, spot_id: i64, limit: usize) -> Result<Vec<StoredCheck>, StoreError> {
        let conn = self.conn()?;
        recent_checks(&conn, spot_id, limit)
    }

    /// The bounded window of records that feeds the spot's memory, most
    /// recent first.
    pub fn memory_window(&self, spot_id: i64) -> Result<Vec<CheckRecord>, StoreError> {
        let conn = self.conn()?;
        memory_window(&conn, spot_id)
    }

    /// Delete every check of the spot, returning how many were removed.
    pub fn reset_spot(&self, spot_id: i64) -> Result<usize, StoreError> {
        let conn = self.conn()?;
        if fetch_spot(&conn, spot_id)?.is_none() {
            return Err(StoreError::SpotNotFound(spot_id));
        }
        let removed = conn.execute("DELETE FROM checks WHERE spot_id = ?1", params![spot_id])?;
        info!(spot_id, removed, "spot history reset");
        Ok(removed)
    }

    fn summarise(&self, conn: &Connection, spot: Spot) -> Result<SpotSummary, StoreError> {
        let window = memory_window(conn, spot.id)?;
        Ok(SpotSummary {
            last_check: window.first().cloned(),
            memory: self.aggregator.aggregate(&window),
            spot,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Schema & queries
// ─────────────────────────────────────────────────────────────────────────────

const SPOT_COLUMNS: &str = "id, name, description, camera_entity_id, spot_type, voice_id, \
                            created_at, updated_at, snoozed_until";

const CHECK_COLUMNS: &str = "id, spot_id, timestamp, status, score, feedback, items_to_sort";

fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;
         CREATE TABLE IF NOT EXISTS spots (
             id               INTEGER PRIMARY KEY AUTOINCREMENT,
             name             TEXT NOT NULL,
             description      TEXT NOT NULL,
             camera_entity_id TEXT NOT NULL,
             spot_type        TEXT NOT NULL,
             voice_id         TEXT NOT NULL,
             created_at       TEXT NOT NULL,
             updated_at       TEXT NOT NULL,
             snoozed_until    TEXT
         );
         CREATE TABLE IF NOT EXISTS checks (
             id            INTEGER PRIMARY KEY AUTOINCREMENT,
             spot_id       INTEGER NOT NULL REFERENCES spots (id) ON DELETE CASCADE,
             timestamp     TEXT NOT NULL,
             status        TEXT NOT NULL,
             score         INTEGER NOT NULL,
             feedback      TEXT NOT NULL,
             items_to_sort TEXT
         );
         CREATE INDEX IF NOT EXISTS idx_checks_spot_time ON checks (spot_id, timestamp);",
    )?;
    Ok(())
}

fn fetch_spot(conn: &Connection, spot_id: i64) -> Result<Option<Spot>, StoreError> {
    let spot = conn
        .query_row(
            &format!("SELECT {SPOT_COLUMNS} FROM spots WHERE id = ?1"),
            params![spot_id],
            row_to_spot,
        )
        .optional()?;
    Ok(spot)
}

fn recent_checks(conn: &Connection, spot_id: i64, limit: usize) -> Result<Vec<StoredCheck>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CHECK_COLUMNS} FROM checks
         WHERE spot_id = ?1
         ORDER BY timestamp DESC, id DESC
         LIMIT ?2"
    ))?;
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let rows = stmt.query_map(params![spot_id, limit], row_to_check)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::Sqlite)
}

fn memory_window(conn: &Connection, spot_id: i64) -> Result<Vec<CheckRecord>, StoreError> {
    Ok(recent_checks(conn, spot_id, MEMORY_WINDOW)?
        .into_iter()
        .map(|c| c.record)
        .collect())
}

// ─────────────────────────────────────────────────────────────────────────────
// Row decoding
// ─────────────────────────────────────────────────────────────────────────────

fn to_sql_time(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn time_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn row_to_spot(row: &rusqlite::Row<'_>) -> rusqlite::Result<Spot> {
    let spot_type: String = row.get(4)?;
    let voice: String = row.get(5)?;
    let snoozed_until = match row.get::<_, Option<String>>(8)? {
        Some(_) => Some(time_column(row, 8)?),
        None => None,
    };
    Ok(Spot {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        camera_entity_id: row.get(3)?,
        spot_type: spot_type
            .parse::<SpotType>()
            .map_err(|e| conversion_error(4, e))?,
        voice: voice.parse::<Voice>().map_err(|e| conversion_error(5, e))?,
        created_at: time_column(row, 6)?,
        updated_at: time_column(row, 7)?,
        snoozed_until,
    })
}

fn row_to_check(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredCheck> {
    let status: String = row.get(3)?;
    let score: i64 = row.get(4)?;
    let items: Option<String> = row.get(6)?;

    let score = u8::try_from(score)
        .ok()
        .filter(|s| *s <= 100)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(4, score))?;
    let items_to_sort: Vec<ToSortItem> = match items.as_deref() {
        Some(raw) if !raw.is_empty() => {
            serde_json::from_str(raw).map_err(|e| conversion_error(6, e))?
        }
        _ => Vec::new(),
    };

    Ok(StoredCheck {
        id: row.get(0)?,
        spot_id: row.get(1)?,
        record: CheckRecord {
            timestamp: time_column(row, 2)?,
            status: status
                .parse::<SpotStatus>()
                .map_err(|e| conversion_error(3, e))?,
            score,
            feedback: row.get(5)?,
            items_to_sort,
        },
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn make_store() -> SpotStore {
        SpotStore::open_in_memory().unwrap()
    }

    fn new_spot(name: &str) -> NewSpot {
        NewSpot {
            name: name.to_string(),
            description: "Clear counter with no dishes, clutter, or food items".into(),
            camera_entity_id: "camera.kitchen".into(),
            spot_type: SpotType::Counter,
            voice: Voice::Supportive,
        }
    }

    fn check(ts: DateTime<Utc>, status: SpotStatus, score: u8, items: &[&str]) -> CheckRecord {
        CheckRecord {
            timestamp: ts,
            status,
            score,
            feedback: format!("{status} at {score}"),
            items_to_sort: items
                .iter()
                .map(|n| ToSortItem {
                    name: n.to_string(),
                    location: "by the kettle".into(),
                    suggestion: "put it away".into(),
                })
                .collect(),
        }
    }

    // ── spots ────────────────────────────────────────────────────────────────

    #[test]
    fn create_and_get_spot() {
        let store = make_store();
        let id = store.create_spot(&new_spot("Counter")).unwrap();
        let summary = store.get_spot(id).unwrap().unwrap();
        assert_eq!(summary.spot.id, id);
        assert_eq!(summary.spot.name, "Counter");
        assert_eq!(summary.spot.spot_type, SpotType::Counter);
        assert_eq!(summary.spot.voice, Voice::Supportive);
        assert!(summary.spot.snoozed_until.is_none());
        assert!(summary.last_check.is_none());
        assert!(summary.memory.is_none());
    }

    #[test]
    fn summaries_use_the_aggregator_time_zone() {
        use crate::patterns::PatternAnalyzer;
        use chrono::{FixedOffset, Weekday};

        fn best_and_worst<Tz: TimeZone>(store: SpotStore<Tz>) -> (Option<Weekday>, Option<Weekday>) {
            // Monday 20:00 UTC is Tuesday 06:00 at UTC+10.
            let monday_evening = Utc.with_ymd_and_hms(2024, 6, 3, 20, 0, 0).unwrap();
            let id = store.create_spot(&new_spot("Counter")).unwrap();
            store
                .add_check(id, &check(monday_evening, SpotStatus::Pass, 90, &[]))
                .unwrap();
            store
                .add_check(id, &check(monday_evening + Duration::days(1), SpotStatus::Fail, 10, &[]))
                .unwrap();
            let memory = store.get_spot(id).unwrap().unwrap().memory.unwrap();
            (memory.patterns.best_day, memory.patterns.worst_day)
        }

        let utc = make_store().with_aggregator(MemoryAggregator::new(PatternAnalyzer::new(Utc)));
        assert_eq!(best_and_worst(utc), (Some(Weekday::Mon), Some(Weekday::Tue)));

        let plus_ten = FixedOffset::east_opt(10 * 3600).unwrap();
        let far = make_store().with_aggregator(MemoryAggregator::new(PatternAnalyzer::new(plus_ten)));
        assert_eq!(best_and_worst(far), (Some(Weekday::Tue), Some(Weekday::Wed)));
    }

    #[test]
    fn get_missing_spot_is_none() {
        assert!(make_store().get_spot(42).unwrap().is_none());
    }

    #[test]
    fn list_spots_orders_by_latest_activity() {
        let store = make_store();
        let first = store.create_spot(&new_spot("First")).unwrap();
        let second = store.create_spot(&new_spot("Second")).unwrap();
        // A check on the older spot moves it to the front.
        std::thread::sleep(std::time::Duration::from_millis(2));
        store
            .add_check(first, &check(Utc::now(), SpotStatus::Pass, 90, &[]))
            .unwrap();

        let ids: Vec<i64> = store.list_spots().unwrap().iter().map(|s| s.spot.id).collect();
        assert_eq!(ids, vec![first, second]);
    }

    #[test]
    fn update_spot_changes_only_given_fields() {
        let store = make_store();
        let id = store.create_spot(&new_spot("Desk")).unwrap();
        let before = store.get_spot(id).unwrap().unwrap().spot;

        let updated = store
            .update_spot(
                id,
                &SpotUpdate {
                    description: Some("Clean desk ready for work".into()),
                    voice: Some(Voice::Minimal),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.name, "Desk");
        assert_eq!(updated.description, "Clean desk ready for work");
        assert_eq!(updated.voice, Voice::Minimal);
        assert!(updated.updated_at >= before.updated_at);

        let reloaded = store.get_spot(id).unwrap().unwrap().spot;
        assert_eq!(reloaded.voice, Voice::Minimal);
        assert_eq!(reloaded.description, "Clean desk ready for work");
    }

    #[test]
    fn empty_update_is_a_no_op() {
        let store = make_store();
        let id = store.create_spot(&new_spot("Shelf")).unwrap();
        let before = store.get_spot(id).unwrap().unwrap().spot;
        let after = store.update_spot(id, &SpotUpdate::default()).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn update_missing_spot_is_not_found() {
        let err = make_store()
            .update_spot(9, &SpotUpdate {
                name: Some("x".into()),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::SpotNotFound(9)));
    }

    #[test]
    fn delete_spot_removes_its_checks() {
        let store = make_store();
        let id = store.create_spot(&new_spot("Sink")).unwrap();
        store
            .add_check(id, &check(Utc::now(), SpotStatus::Fail, 20, &["plate"]))
            .unwrap();
        store.delete_spot(id).unwrap();

        assert!(store.get_spot(id).unwrap().is_none());
        assert!(store.history(id, DEFAULT_HISTORY_LIMIT).unwrap().is_empty());
        assert!(matches!(store.delete_spot(id), Err(StoreError::SpotNotFound(_))));
    }

    #[test]
    fn snooze_and_unsnooze() {
        let store = make_store();
        let id = store.create_spot(&new_spot("Floor")).unwrap();
        let until = Utc::now() + Duration::hours(3);
        store.snooze_spot(id, until).unwrap();

        let spot = store.get_spot(id).unwrap().unwrap().spot;
        let stored = spot.snoozed_until.unwrap();
        assert!((stored - until).num_milliseconds().abs() < 1);
        assert!(spot.is_snoozed_at(Utc::now()));

        store.unsnooze_spot(id).unwrap();
        assert!(store.get_spot(id).unwrap().unwrap().spot.snoozed_until.is_none());
        assert!(matches!(store.snooze_spot(77, until), Err(StoreError::SpotNotFound(77))));
    }

    // ── checks ───────────────────────────────────────────────────────────────

    #[test]
    fn stored_check_round_trips() {
        let store = make_store();
        let id = store.create_spot(&new_spot("Table")).unwrap();
        let original = check(Utc::now(), SpotStatus::Fail, 35, &["mug", "Newspaper", "keys"]);
        let check_id = store.add_check(id, &original).unwrap();

        let history = store.history(id, DEFAULT_HISTORY_LIMIT).unwrap();
        assert_eq!(history.len(), 1);
        let stored = &history[0];
        assert_eq!(stored.id, check_id);
        assert_eq!(stored.spot_id, id);
        assert_eq!(stored.record.status, original.status);
        assert_eq!(stored.record.score, original.score);
        assert_eq!(stored.record.feedback, original.feedback);
        assert_eq!(stored.record.items_to_sort, original.items_to_sort);
        assert!((stored.record.timestamp - original.timestamp).num_microseconds() == Some(0));
    }

    #[test]
    fn add_check_to_missing_spot_is_not_found() {
        let err = make_store()
            .add_check(5, &check(Utc::now(), SpotStatus::Pass, 100, &[]))
            .unwrap_err();
        assert!(matches!(err, StoreError::SpotNotFound(5)));
    }

    #[test]
    fn history_is_most_recent_first_and_limited() {
        let store = make_store();
        let id = store.create_spot(&new_spot("Counter")).unwrap();
        let start = Utc::now() - Duration::days(10);
        for i in 0..8 {
            store
                .add_check(id, &check(start + Duration::hours(i), SpotStatus::Pass, i as u8, &[]))
                .unwrap();
        }
        let history = store.history(id, 5).unwrap();
        let scores: Vec<u8> = history.iter().map(|c| c.record.score).collect();
        assert_eq!(scores, vec![7, 6, 5, 4, 3]);
    }

    #[test]
    fn memory_window_is_bounded() {
        let store = make_store();
        let id = store.create_spot(&new_spot("Counter")).unwrap();
        let start = Utc::now() - Duration::days(30);
        // The oldest 20 checks fail, the newest 100 pass.
        for i in 0..120 {
            let status = if i < 20 { SpotStatus::Fail } else { SpotStatus::Pass };
            store
                .add_check(id, &check(start + Duration::minutes(i), status, 50, &[]))
                .unwrap();
        }
        let window = store.memory_window(id).unwrap();
        assert_eq!(window.len(), MEMORY_WINDOW);
        assert!(window[0].timestamp > window[MEMORY_WINDOW - 1].timestamp);

        let memory = store.get_spot(id).unwrap().unwrap().memory.unwrap();
        assert_eq!(memory.total_checks, MEMORY_WINDOW);
        assert!((memory.pass_rate - 100.0).abs() < 1e-9);
        assert_eq!(memory.patterns.best_streak, 100);
    }

    #[test]
    fn summary_carries_last_check_and_memory() {
        let store = make_store();
        let id = store.create_spot(&new_spot("Counter")).unwrap();
        let now = Utc::now();
        store
            .add_check(id, &check(now - Duration::hours(2), SpotStatus::Fail, 30, &["sponge"]))
            .unwrap();
        store
            .add_check(id, &check(now - Duration::hours(1), SpotStatus::Pass, 85, &["Sponge"]))
            .unwrap();

        let summary = store.get_spot(id).unwrap().unwrap();
        assert_eq!(summary.last_check.unwrap().score, 85);
        let memory = summary.memory.unwrap();
        assert_eq!(memory.total_checks, 2);
        assert_eq!(memory.patterns.recurring_items, vec!["sponge"]);
        assert_eq!(memory.patterns.current_streak, 1);
    }

    #[test]
    fn reset_clears_history_and_memory() {
        let store = make_store();
        let id = store.create_spot(&new_spot("Counter")).unwrap();
        for _ in 0..3 {
            store
                .add_check(id, &check(Utc::now(), SpotStatus::Pass, 90, &[]))
                .unwrap();
        }
        assert_eq!(store.reset_spot(id).unwrap(), 3);
        let summary = store.get_spot(id).unwrap().unwrap();
        assert!(summary.memory.is_none());
        assert!(summary.last_check.is_none());
        assert!(matches!(store.reset_spot(404), Err(StoreError::SpotNotFound(404))));
    }

    #[test]
    fn malformed_status_row_is_rejected_at_the_boundary() {
        let store = make_store();
        let id = store.create_spot(&new_spot("Counter")).unwrap();
        store
            .conn()
            .unwrap()
            .execute(
                "INSERT INTO checks (spot_id, timestamp, status, score, feedback, items_to_sort)
                 VALUES (?1, '2024-01-01T00:00:00.000000Z', 'PASSED', 10, '', '[]')",
                params![id],
            )
            .unwrap();
        let err = store.memory_window(id).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Sqlite(rusqlite::Error::FromSqlConversionFailure(3, _, _))
        ));
    }

    #[test]
    fn out_of_range_score_row_is_rejected() {
        let store = make_store();
        let id = store.create_spot(&new_spot("Counter")).unwrap();
        store
            .conn()
            .unwrap()
            .execute(
                "INSERT INTO checks (spot_id, timestamp, status, score, feedback, items_to_sort)
                 VALUES (?1, '2024-01-01T00:00:00.000000Z', 'pass', 250, '', NULL)",
                params![id],
            )
            .unwrap();
        assert!(store.history(id, 10).is_err());
    }

    #[test]
    fn persistent_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spots.db");

        let id = {
            let store = SpotStore::open(&path).unwrap();
            let id = store.create_spot(&new_spot("Persistent")).unwrap();
            store
                .add_check(id, &check(Utc::now(), SpotStatus::Pass, 77, &[]))
                .unwrap();
            id
        };

        let store = SpotStore::open(&path).unwrap();
        let summary = store.get_spot(id).unwrap().unwrap();
        assert_eq!(summary.spot.name, "Persistent");
        assert_eq!(summary.last_check.unwrap().score, 77);
    }

    #[test]
    fn store_error_maps_to_spot_error() {
        let err: SpotError = StoreError::SpotNotFound(3).into();
        assert_eq!(err, SpotError::NotFound(3));
        let err: SpotError = StoreError::Poisoned.into();
        assert!(matches!(err, SpotError::Storage(_)));
    }
}
