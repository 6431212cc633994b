//! # SQLite Position Store
//!
//! A durable [`PositionStore`] for hosts that do not bring their own database.
//!
//! Timestamps are stored as integer milliseconds since the Unix epoch, so
//! sub-millisecond precision is dropped on insert. Samples sharing a
//! timestamp come back in insertion order.

use chrono::{DateTime, Utc};
use log::{debug, info};
use rusqlite::{params, Connection, Row};

use crate::error::{OptionExt, Result, TrackError};
use crate::store::{PositionStore, RangeQuery, SortOrder};
use crate::{Position, Sample};

/// SQLite-backed position storage.
pub struct SqlitePositionStore {
    db: Connection,
}

/// Columns in the order [`read_row`] expects them.
const COLUMNS: &str =
    "track_id, timestamp_ms, latitude, longitude, heading, altitude, precision_meters";

struct RawRow {
    track_id: String,
    timestamp_ms: i64,
    latitude: f64,
    longitude: f64,
    heading: Option<f64>,
    altitude: Option<f64>,
    precision_meters: Option<f64>,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    Ok(RawRow {
        track_id: row.get(0)?,
        timestamp_ms: row.get(1)?,
        latitude: row.get(2)?,
        longitude: row.get(3)?,
        heading: row.get(4)?,
        altitude: row.get(5)?,
        precision_meters: row.get(6)?,
    })
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or_store("stored timestamp out of range")
}

impl RawRow {
    fn into_position(self) -> Result<Position> {
        Ok(Position {
            track_id: self.track_id,
            timestamp: from_millis(self.timestamp_ms)?,
            latitude: self.latitude,
            longitude: self.longitude,
            heading: self.heading,
            altitude: self.altitude,
            precision_meters: self.precision_meters,
        })
    }
}

fn check_sample<S: Sample + ?Sized>(sample: &S) -> Result<()> {
    if sample.point().is_valid() {
        return Ok(());
    }
    Err(TrackError::InvalidSample {
        track_id: sample.track_id().to_string(),
        message: format!(
            "coordinates ({}, {}) out of range",
            sample.latitude(),
            sample.longitude()
        ),
    })
}

const INSERT_SQL: &str = "INSERT INTO positions \
     (track_id, timestamp_ms, latitude, longitude, heading, altitude, precision_meters) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)";

impl SqlitePositionStore {
    // ========================================================================
    // Initialization
    // ========================================================================

    /// Open (or create) a store at the given database path.
    pub fn new(db_path: &str) -> Result<Self> {
        let db = Connection::open(db_path)?;
        Self::init_schema(&db)?;
        info!("[SqliteStore] Opened database: {}", db_path);
        Ok(Self { db })
    }

    /// A store that lives only as long as this value.
    pub fn in_memory() -> Result<Self> {
        Self::new(":memory:")
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS positions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                track_id TEXT NOT NULL,
                timestamp_ms INTEGER NOT NULL,
                latitude REAL NOT NULL,
                longitude REAL NOT NULL,
                heading REAL,
                altitude REAL,
                precision_meters REAL
            );

            CREATE INDEX IF NOT EXISTS idx_positions_track_time
                ON positions(track_id, timestamp_ms);
        "#,
        )?;
        Ok(())
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Insert one sample.
    pub fn insert<S: Sample + ?Sized>(&self, sample: &S) -> Result<()> {
        check_sample(sample)?;
        self.db.execute(
            INSERT_SQL,
            params![
                sample.track_id(),
                sample.timestamp().timestamp_millis(),
                sample.latitude(),
                sample.longitude(),
                sample.heading(),
                sample.altitude(),
                sample.precision_meters(),
            ],
        )?;
        Ok(())
    }

    /// Insert many samples in one transaction. Nothing is written if any
    /// sample is invalid.
    pub fn insert_batch<S: Sample>(&mut self, samples: &[S]) -> Result<usize> {
        for sample in samples {
            check_sample(sample)?;
        }

        let tx = self.db.transaction()?;
        {
            let mut stmt = tx.prepare(INSERT_SQL)?;
            for sample in samples {
                stmt.execute(params![
                    sample.track_id(),
                    sample.timestamp().timestamp_millis(),
                    sample.latitude(),
                    sample.longitude(),
                    sample.heading(),
                    sample.altitude(),
                    sample.precision_meters(),
                ])?;
            }
        }
        tx.commit()?;

        debug!("[SqliteStore] Inserted {} samples", samples.len());
        Ok(samples.len())
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Ids of all tracks with at least one sample, sorted.
    pub fn track_ids(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .db
            .prepare("SELECT DISTINCT track_id FROM positions ORDER BY track_id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }

    /// Number of samples stored for a track.
    pub fn count(&self, track_id: &str) -> Result<usize> {
        let n: i64 = self.db.query_row(
            "SELECT COUNT(*) FROM positions WHERE track_id = ?1",
            params![track_id],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }

    fn extreme_timestamp(&self, aggregate: &str, track_id: &str) -> Result<Option<DateTime<Utc>>> {
        let sql = format!(
            "SELECT {}(timestamp_ms) FROM positions WHERE track_id = ?1",
            aggregate
        );
        let ms: Option<i64> = self.db.query_row(&sql, params![track_id], |row| row.get(0))?;
        ms.map(from_millis).transpose()
    }
}

impl PositionStore for SqlitePositionStore {
    type Sample = Position;

    fn range_query(&self, track_id: &str, query: &RangeQuery) -> Result<Vec<Position>> {
        let direction = match query.order {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        };
        let sql = format!(
            "SELECT {} FROM positions \
             WHERE track_id = ?1 AND timestamp_ms >= ?2 AND timestamp_ms <= ?3 \
             ORDER BY timestamp_ms {dir}, id {dir} LIMIT ?4",
            COLUMNS,
            dir = direction
        );

        let from = query.from.map_or(i64::MIN, |t| t.timestamp_millis());
        let to = query.to.map_or(i64::MAX, |t| t.timestamp_millis());
        // negative LIMIT means no limit in SQLite
        let limit = query.limit.map_or(-1, |n| n.min(i64::MAX as usize) as i64);

        let mut stmt = self.db.prepare(&sql)?;
        let rows = stmt
            .query_map(params![track_id, from, to, limit], read_row)?
            .collect::<rusqlite::Result<Vec<RawRow>>>()?;

        rows.into_iter().map(RawRow::into_position).collect()
    }

    fn min_timestamp(&self, track_id: &str) -> Result<Option<DateTime<Utc>>> {
        self.extreme_timestamp("MIN", track_id)
    }

    fn max_timestamp(&self, track_id: &str) -> Result<Option<DateTime<Utc>>> {
        self.extreme_timestamp("MAX", track_id)
    }

    fn count_in_range(
        &self,
        track_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<usize> {
        let n: i64 = self.db.query_row(
            "SELECT COUNT(*) FROM positions \
             WHERE track_id = ?1 AND timestamp_ms >= ?2 AND timestamp_ms <= ?3",
            params![track_id, from.timestamp_millis(), to.timestamp_millis()],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap() + Duration::seconds(secs)
    }

    #[test]
    fn test_insert_and_range() {
        let store = SqlitePositionStore::in_memory().unwrap();
        for s in [20, 0, 10] {
            store
                .insert(&Position::new("rover", t(s), 1.0, s as f64 * 1e-4).with_heading(45.0))
                .unwrap();
        }

        let all = store.positions_for_track("rover").unwrap();
        let times: Vec<_> = all.iter().map(|p| p.timestamp).collect();
        assert_eq!(times, vec![t(0), t(10), t(20)]);
        assert_eq!(all[0].heading, Some(45.0));
        assert_eq!(all[0].altitude, None);

        let latest = store
            .range_query("rover", &RangeQuery::descending().to(t(15)).limit(1))
            .unwrap();
        assert_eq!(latest[0].timestamp, t(10));

        assert_eq!(store.min_timestamp("rover").unwrap(), Some(t(0)));
        assert_eq!(store.max_timestamp("rover").unwrap(), Some(t(20)));
        assert_eq!(store.min_timestamp("nobody").unwrap(), None);

        assert_eq!(store.count_in_range("rover", t(0), t(10)).unwrap(), 2);
        assert_eq!(store.count_in_range("rover", t(21), t(99)).unwrap(), 0);
    }

    #[test]
    fn test_batch_is_all_or_nothing() {
        let mut store = SqlitePositionStore::in_memory().unwrap();
        let batch = vec![
            Position::new("rover", t(0), 0.0, 0.0),
            Position::new("rover", t(1), 100.0, 0.0),
        ];
        assert!(matches!(
            store.insert_batch(&batch),
            Err(TrackError::InvalidSample { .. })
        ));
        assert_eq!(store.count("rover").unwrap(), 0);

        let written = store.insert_batch(&batch[..1]).unwrap();
        assert_eq!(written, 1);
        assert_eq!(store.track_ids().unwrap(), vec!["rover".to_string()]);
    }
}
