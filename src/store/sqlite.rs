//! SQLite-backed detection store.

use super::DetectionSink;
use super::migrations::run_migrations;
use crate::detection::{AudioDetection, CorrelatedSighting, DetectionRecord, VisualDetection};
use crate::error::{Error, Result};
use crate::stats::{DailyStats, SpeciesDayStats, StatUpdate};
use crate::utils::date::{date_key, day_bounds, from_storage, parse_date, to_storage};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, Row, Transaction, params};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const VISUAL_COLUMNS: &str = "id, timestamp, species, confidence, image_path";
const AUDIO_COLUMNS: &str =
    "id, timestamp, common_name, scientific_name, confidence, audio_path, source";
const SIGHTING_COLUMNS: &str = "id, visual_id, audio_id, timestamp, species, common_name, \
     scientific_name, confidence, visual_confidence, audio_confidence, image_path, audio_path, \
     time_diff";

/// Rows removed by a retention sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PruneSummary {
    /// Visual detections removed.
    pub visual: usize,
    /// Audio detections removed.
    pub audio: usize,
    /// Correlated sightings removed.
    pub sightings: usize,
    /// Daily statistic rows removed.
    pub stats: usize,
}

impl PruneSummary {
    /// Total rows removed.
    pub fn total(&self) -> usize {
        self.visual + self.audio + self.sightings + self.stats
    }
}

/// Detection store on a single SQLite connection.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and migrate it.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path).map_err(|source| Error::DatabaseOpen {
            path: path.to_path_buf(),
            source,
        })?;

        if let Err(e) = conn.pragma_update(None, "journal_mode", "WAL") {
            warn!("Failed to enable WAL mode: {e}");
        }
        conn.busy_timeout(BUSY_TIMEOUT)?;

        let store = Self::init(conn, Some(path.to_path_buf()))?;
        info!("Database opened at {}", path.display());
        Ok(store)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(mut conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        run_migrations(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// Database file, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a row and its rollup change atomically.
    fn insert_with_stats<F>(&self, update: Option<StatUpdate>, insert: F) -> Result<bool>
    where
        F: FnOnce(&Transaction<'_>) -> rusqlite::Result<usize>,
    {
        let mut conn = self.lock();
        let tx = conn.transaction()?;

        let inserted = insert(&tx)? > 0;
        if inserted && let Some(update) = update {
            apply_stat_update(&tx, &update)?;
        }

        tx.commit()?;
        Ok(inserted)
    }

    /// Species statistics of one UTC date.
    pub fn stats_for(&self, date: NaiveDate) -> Result<BTreeMap<String, SpeciesDayStats>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT species, visual_count, audio_count, correlated_count, first_seen, last_seen \
             FROM daily_stats WHERE date = ?1",
        )?;

        let rows = stmt.query_map(params![date_key(date)], |row| {
            Ok((row.get::<_, String>(0)?, species_stats_from_row(row, 1)?))
        })?;

        let mut stats = BTreeMap::new();
        for row in rows {
            let (species, entry) = row?;
            stats.insert(species, entry);
        }
        Ok(stats)
    }

    /// Statistics of every date from `since` onward, newest date first.
    pub fn daily_stats_since(&self, since: NaiveDate) -> Result<Vec<DailyStats>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT date, species, visual_count, audio_count, correlated_count, first_seen, last_seen \
             FROM daily_stats WHERE date >= ?1 ORDER BY date DESC, species ASC",
        )?;

        let rows = stmt.query_map(params![date_key(since)], |row| {
            Ok((
                date_column(row, 0)?,
                row.get::<_, String>(1)?,
                species_stats_from_row(row, 2)?,
            ))
        })?;

        let mut days: Vec<DailyStats> = Vec::new();
        for row in rows {
            let (date, species, entry) = row?;
            match days.last_mut() {
                Some(day) if day.date == date => {
                    day.species.insert(species, entry);
                }
                _ => days.push(DailyStats {
                    date,
                    species: BTreeMap::from([(species, entry)]),
                }),
            }
        }
        Ok(days)
    }

    /// Every stored record of one UTC date, oldest first.
    pub fn detections_on(&self, date: NaiveDate) -> Result<Vec<DetectionRecord>> {
        let (start, end) = day_bounds(date);
        let (start, end) = (to_storage(start), to_storage(end));
        let conn = self.lock();

        let mut records = Vec::new();

        let mut stmt = conn.prepare(&format!(
            "SELECT {VISUAL_COLUMNS} FROM visual_detections \
             WHERE timestamp >= ?1 AND timestamp < ?2"
        ))?;
        for row in stmt.query_map(params![start, end], visual_from_row)? {
            records.push(DetectionRecord::Visual(row?));
        }

        let mut stmt = conn.prepare(&format!(
            "SELECT {AUDIO_COLUMNS} FROM audio_detections \
             WHERE timestamp >= ?1 AND timestamp < ?2"
        ))?;
        for row in stmt.query_map(params![start, end], audio_from_row)? {
            records.push(DetectionRecord::Audio(row?));
        }

        let mut stmt = conn.prepare(&format!(
            "SELECT {SIGHTING_COLUMNS} FROM correlated_sightings \
             WHERE timestamp >= ?1 AND timestamp < ?2"
        ))?;
        for row in stmt.query_map(params![start, end], sighting_from_row)? {
            records.push(DetectionRecord::Correlated(row?));
        }

        records.sort_by_key(DetectionRecord::timestamp);
        Ok(records)
    }

    /// The most recent correlated sightings, newest first.
    pub fn recent_sightings(&self, limit: usize) -> Result<Vec<CorrelatedSighting>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SIGHTING_COLUMNS} FROM correlated_sightings \
             ORDER BY timestamp DESC, id DESC LIMIT ?1"
        ))?;
        let sightings = stmt
            .query_map(params![limit], sighting_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(sightings)
    }

    /// Correlated sightings in `[start, end)`, oldest first.
    pub fn sightings_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CorrelatedSighting>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SIGHTING_COLUMNS} FROM correlated_sightings \
             WHERE timestamp >= ?1 AND timestamp < ?2 ORDER BY timestamp ASC, id ASC"
        ))?;
        let sightings = stmt
            .query_map(
                params![to_storage(start), to_storage(end)],
                sighting_from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(sightings)
    }

    /// Remove every record and rollup dated before `date`.
    pub fn prune_before(&self, date: NaiveDate) -> Result<PruneSummary> {
        let (cutoff, _) = day_bounds(date);
        let cutoff = to_storage(cutoff);

        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let summary = PruneSummary {
            visual: tx.execute(
                "DELETE FROM visual_detections WHERE timestamp < ?1",
                params![cutoff],
            )?,
            audio: tx.execute(
                "DELETE FROM audio_detections WHERE timestamp < ?1",
                params![cutoff],
            )?,
            sightings: tx.execute(
                "DELETE FROM correlated_sightings WHERE timestamp < ?1",
                params![cutoff],
            )?,
            stats: tx.execute(
                "DELETE FROM daily_stats WHERE date < ?1",
                params![date_key(date)],
            )?,
        };
        tx.commit()?;

        debug!("Pruned {} rows before {date}", summary.total());
        Ok(summary)
    }
}

impl DetectionSink for SqliteStore {
    fn insert_visual(&self, detection: &VisualDetection) -> Result<bool> {
        self.insert_with_stats(StatUpdate::for_visual(detection), |tx| {
            tx.execute(
                &format!("INSERT OR IGNORE INTO visual_detections ({VISUAL_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5)"),
                params![
                    detection.id,
                    to_storage(detection.timestamp),
                    detection.species,
                    detection.confidence,
                    detection.image_path,
                ],
            )
        })
    }

    fn insert_audio(&self, detection: &AudioDetection) -> Result<bool> {
        self.insert_with_stats(StatUpdate::for_audio(detection), |tx| {
            tx.execute(
                &format!("INSERT OR IGNORE INTO audio_detections ({AUDIO_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
                params![
                    detection.id,
                    to_storage(detection.timestamp),
                    detection.common_name,
                    detection.scientific_name,
                    detection.confidence,
                    detection.audio_path,
                    detection.source,
                ],
            )
        })
    }

    fn insert_sighting(&self, sighting: &CorrelatedSighting) -> Result<bool> {
        self.insert_with_stats(StatUpdate::for_sighting(sighting), |tx| {
            tx.execute(
                &format!(
                    "INSERT OR IGNORE INTO correlated_sightings ({SIGHTING_COLUMNS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
                ),
                params![
                    sighting.id,
                    sighting.visual_id,
                    sighting.audio_id,
                    to_storage(sighting.timestamp),
                    sighting.species,
                    sighting.common_name,
                    sighting.scientific_name,
                    sighting.confidence,
                    sighting.visual_confidence,
                    sighting.audio_confidence,
                    sighting.image_path,
                    sighting.audio_path,
                    sighting.time_diff,
                ],
            )
        })
    }
}

fn apply_stat_update(tx: &Transaction<'_>, update: &StatUpdate) -> rusqlite::Result<usize> {
    let column = update.column.column();
    let seen = to_storage(update.timestamp);
    tx.execute(
        &format!(
            "INSERT INTO daily_stats (date, species, {column}, first_seen, last_seen) \
             VALUES (?1, ?2, 1, ?3, ?3) \
             ON CONFLICT(date, species) DO UPDATE SET \
             {column} = {column} + 1, \
             first_seen = min(first_seen, excluded.first_seen), \
             last_seen = max(last_seen, excluded.last_seen)"
        ),
        params![date_key(update.date), update.species, seen],
    )
}

fn conversion_error(idx: usize, value: &str, what: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        format!("invalid {what} '{value}'").into(),
    )
}

fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    from_storage(&text).ok_or_else(|| conversion_error(idx, &text, "timestamp"))
}

fn date_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let text: String = row.get(idx)?;
    parse_date(&text).ok_or_else(|| conversion_error(idx, &text, "date"))
}

fn count_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    let value: i64 = row.get(idx)?;
    u64::try_from(value).map_err(|_| rusqlite::Error::IntegralValueOutOfRange(idx, value))
}

fn species_stats_from_row(row: &Row<'_>, first: usize) -> rusqlite::Result<SpeciesDayStats> {
    Ok(SpeciesDayStats {
        visual_count: count_column(row, first)?,
        audio_count: count_column(row, first + 1)?,
        correlated_count: count_column(row, first + 2)?,
        first_seen: timestamp_column(row, first + 3)?,
        last_seen: timestamp_column(row, first + 4)?,
    })
}

fn visual_from_row(row: &Row<'_>) -> rusqlite::Result<VisualDetection> {
    Ok(VisualDetection {
        id: row.get(0)?,
        timestamp: timestamp_column(row, 1)?,
        species: row.get(2)?,
        confidence: row.get(3)?,
        image_path: row.get(4)?,
    })
}

fn audio_from_row(row: &Row<'_>) -> rusqlite::Result<AudioDetection> {
    Ok(AudioDetection {
        id: row.get(0)?,
        timestamp: timestamp_column(row, 1)?,
        common_name: row.get(2)?,
        scientific_name: row.get(3)?,
        confidence: row.get(4)?,
        audio_path: row.get(5)?,
        source: row.get(6)?,
    })
}

fn sighting_from_row(row: &Row<'_>) -> rusqlite::Result<CorrelatedSighting> {
    Ok(CorrelatedSighting {
        id: row.get(0)?,
        visual_id: row.get(1)?,
        audio_id: row.get(2)?,
        timestamp: timestamp_column(row, 3)?,
        species: row.get(4)?,
        common_name: row.get(5)?,
        scientific_name: row.get(6)?,
        confidence: row.get(7)?,
        visual_confidence: row.get(8)?,
        audio_confidence: row.get(9)?,
        image_path: row.get(10)?,
        audio_path: row.get(11)?,
        time_diff: row.get(12)?,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 1, h, m, s).unwrap()
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, 1).unwrap()
    }

    fn visual(id: &str, at: DateTime<Utc>, species: &str) -> VisualDetection {
        VisualDetection {
            id: id.to_string(),
            timestamp: at,
            species: species.to_string(),
            confidence: 0.9,
            image_path: Some(format!("/snapshots/{id}.jpg")),
        }
    }

    fn audio(id: &str, at: DateTime<Utc>) -> AudioDetection {
        AudioDetection {
            id: id.to_string(),
            timestamp: at,
            common_name: "Blue Jay".to_string(),
            scientific_name: "Cyanocitta cristata".to_string(),
            confidence: 0.78,
            audio_path: None,
            source: Some("birdnet".to_string()),
        }
    }

    fn sighting(id: &str, visual_id: &str, audio_id: &str, at: DateTime<Utc>) -> CorrelatedSighting {
        CorrelatedSighting {
            id: id.to_string(),
            visual_id: visual_id.to_string(),
            audio_id: audio_id.to_string(),
            timestamp: at,
            species: "Cyanocitta cristata (Blue Jay)".to_string(),
            common_name: "Blue Jay".to_string(),
            scientific_name: "Cyanocitta cristata".to_string(),
            confidence: 0.95,
            visual_confidence: 0.95,
            audio_confidence: 0.78,
            image_path: None,
            audio_path: None,
            time_diff: 2.0,
        }
    }

    #[test]
    fn test_insert_updates_stats() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.insert_visual(&visual("v1", ts(8, 0, 0), "Cyanocitta cristata (Blue Jay)")).unwrap());
        assert!(store.insert_audio(&audio("a1", ts(7, 0, 0))).unwrap());
        assert!(store.insert_sighting(&sighting("s1", "v1", "a1", ts(8, 0, 0))).unwrap());

        let stats = store.stats_for(day()).unwrap();
        let jay = &stats["Blue Jay"];
        assert_eq!(jay.visual_count, 1);
        assert_eq!(jay.audio_count, 1);
        assert_eq!(jay.correlated_count, 1);
        assert_eq!(jay.first_seen, ts(7, 0, 0));
        assert_eq!(jay.last_seen, ts(8, 0, 0));
    }

    #[test]
    fn test_failed_rollup_rolls_back_row() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .lock()
            .execute_batch(
                "CREATE TRIGGER reject_stats BEFORE INSERT ON daily_stats \
                 BEGIN SELECT RAISE(ABORT, 'rollup rejected'); END;",
            )
            .unwrap();

        let result = store.insert_visual(&visual("v1", ts(8, 0, 0), "Parus major (Great Tit)"));
        assert!(matches!(result, Err(Error::Database(_))));
        assert!(store.detections_on(day()).unwrap().is_empty());
        assert!(store.stats_for(day()).unwrap().is_empty());

        // background rows need no rollup and still go through
        assert!(store.insert_visual(&visual("v2", ts(8, 1, 0), "background")).unwrap());
        assert_eq!(store.detections_on(day()).unwrap().len(), 1);
    }

    #[test]
    fn test_duplicate_insert_is_ignored() {
        let store = SqliteStore::open_in_memory().unwrap();
        let detection = visual("v1", ts(8, 0, 0), "Parus major (Great Tit)");
        assert!(store.insert_visual(&detection).unwrap());
        assert!(!store.insert_visual(&detection).unwrap());

        let stats = store.stats_for(day()).unwrap();
        assert_eq!(stats["Great Tit"].visual_count, 1);
    }

    #[test]
    fn test_audio_consumed_once_in_storage() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.insert_sighting(&sighting("s1", "v1", "a1", ts(8, 0, 0))).unwrap());
        assert!(!store.insert_sighting(&sighting("s2", "v2", "a1", ts(8, 0, 5))).unwrap());

        let stats = store.stats_for(day()).unwrap();
        assert_eq!(stats["Blue Jay"].correlated_count, 1);
    }

    #[test]
    fn test_background_persisted_but_not_counted() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.insert_visual(&visual("v1", ts(8, 0, 0), "background")).unwrap());

        assert!(store.stats_for(day()).unwrap().is_empty());
        assert_eq!(store.detections_on(day()).unwrap().len(), 1);
    }

    #[test]
    fn test_detections_on_is_chronological_and_day_bounded() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_visual(&visual("v1", ts(9, 0, 0), "Parus major (Great Tit)")).unwrap();
        store.insert_audio(&audio("a1", ts(6, 0, 0))).unwrap();
        store.insert_sighting(&sighting("s1", "v0", "a0", ts(7, 30, 0))).unwrap();
        let next_day = Utc.with_ymd_and_hms(2025, 5, 2, 0, 0, 0).unwrap();
        store.insert_audio(&audio("a2", next_day)).unwrap();

        let records = store.detections_on(day()).unwrap();
        let kinds: Vec<_> = records.iter().map(DetectionRecord::kind).collect();
        assert_eq!(kinds, vec!["audio", "correlated", "visual"]);
    }

    #[test]
    fn test_recent_sightings_newest_first() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_sighting(&sighting("s1", "v1", "a1", ts(8, 0, 0))).unwrap();
        store.insert_sighting(&sighting("s2", "v2", "a2", ts(9, 0, 0))).unwrap();
        store.insert_sighting(&sighting("s3", "v3", "a3", ts(7, 0, 0))).unwrap();

        let recent = store.recent_sightings(2).unwrap();
        let ids: Vec<_> = recent.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["s2", "s1"]);
        assert_eq!(recent[0].time_diff, 2.0);
    }

    #[test]
    fn test_sightings_between_half_open() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_sighting(&sighting("s1", "v1", "a1", ts(8, 0, 0))).unwrap();
        store.insert_sighting(&sighting("s2", "v2", "a2", ts(9, 0, 0))).unwrap();

        let found = store.sightings_between(ts(8, 0, 0), ts(9, 0, 0)).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "s1");
    }

    #[test]
    fn test_daily_stats_since_groups_by_date() {
        let store = SqliteStore::open_in_memory().unwrap();
        let yesterday = Utc.with_ymd_and_hms(2025, 4, 30, 12, 0, 0).unwrap();
        store.insert_audio(&audio("a1", yesterday)).unwrap();
        store.insert_audio(&audio("a2", ts(8, 0, 0))).unwrap();
        store.insert_visual(&visual("v1", ts(8, 0, 0), "Parus major (Great Tit)")).unwrap();

        let days = store
            .daily_stats_since(NaiveDate::from_ymd_opt(2025, 4, 30).unwrap())
            .unwrap();
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date, day());
        assert_eq!(days[0].species.len(), 2);
        assert_eq!(days[1].audio_total(), 1);
    }

    #[test]
    fn test_prune_before_removes_old_rows_and_stats() {
        let store = SqliteStore::open_in_memory().unwrap();
        let old = Utc.with_ymd_and_hms(2025, 4, 1, 12, 0, 0).unwrap();
        store.insert_audio(&audio("a1", old)).unwrap();
        store.insert_audio(&audio("a2", ts(8, 0, 0))).unwrap();

        let summary = store.prune_before(day()).unwrap();
        assert_eq!(summary.audio, 1);
        assert_eq!(summary.stats, 1);
        assert_eq!(store.detections_on(day()).unwrap().len(), 1);
    }

    #[test]
    fn test_open_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("birdfuse.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.insert_audio(&audio("a1", ts(8, 0, 0))).unwrap();
            assert_eq!(store.path(), Some(path.as_path()));
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.stats_for(day()).unwrap()["Blue Jay"].audio_count, 1);
    }
}
