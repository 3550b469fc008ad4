use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OpenFlags, OptionalExtension};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::audio::features::{FeatureStats, TrackFeatures};
use crate::error::StoreError;
use crate::model::{Track, TrackMetadata};

const INSERT_TRACK_SQL: &str = "INSERT OR IGNORE INTO tracks \
     (path, title, artist, album, year, duration_seconds, sample_rate, total_samples, frame_count) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)";

const SELECT_TRACK_ID_SQL: &str = "SELECT id FROM tracks WHERE path = ?1";

/// `<metric>_<stat>` for every metric and stat, in storage order.
fn feature_columns() -> Vec<String> {
    TrackFeatures::METRICS
        .iter()
        .flat_map(|metric| {
            FeatureStats::FIELDS
                .iter()
                .map(move |field| format!("{metric}_{field}"))
        })
        .collect()
}

fn create_schema_sql() -> String {
    let columns: String = feature_columns()
        .iter()
        .map(|c| format!("            {c} REAL NOT NULL,\n"))
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS tracks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            path TEXT NOT NULL UNIQUE,
            title TEXT,
            artist TEXT,
            album TEXT,
            year INTEGER,
            duration_seconds REAL NOT NULL,
            sample_rate INTEGER NOT NULL,
            total_samples INTEGER NOT NULL,
            frame_count INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS track_features (
            track_id INTEGER PRIMARY KEY,
{columns}            FOREIGN KEY(track_id) REFERENCES tracks(id)
        );"
    )
}

fn insert_features_sql() -> String {
    let columns = feature_columns();
    let placeholders = vec!["?"; columns.len() + 1].join(", ");
    format!(
        "INSERT OR REPLACE INTO track_features (track_id, {}) VALUES ({})",
        columns.join(", "),
        placeholders
    )
}

fn select_features_sql() -> String {
    format!(
        "SELECT {} FROM track_features WHERE track_id = ?1",
        feature_columns().join(", ")
    )
}

/// A track row read back from the store.
#[derive(Debug, Serialize)]
pub struct StoredTrack {
    pub id: i64,
    pub metadata: TrackMetadata,
    pub features: Option<TrackFeatures>,
}

/// SQLite catalog of analysed tracks.
///
/// Batching is explicit: callers bracket inserts with [`begin`](Self::begin)
/// and [`commit`](Self::commit). Reinserting a known path keeps the original
/// `tracks` row and replaces its `track_features` row.
pub struct TrackDatabase {
    conn: Connection,
    insert_features_sql: String,
}

impl TrackDatabase {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;",
        )?;
        Self::with_connection(conn)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(&create_schema_sql())?;
        Ok(Self {
            conn,
            insert_features_sql: insert_features_sql(),
        })
    }

    pub fn begin(&self) -> Result<(), StoreError> {
        self.conn.execute_batch("BEGIN TRANSACTION;")?;
        Ok(())
    }

    pub fn commit(&self) -> Result<(), StoreError> {
        self.conn.execute_batch("COMMIT;")?;
        Ok(())
    }

    /// No-op outside a transaction.
    pub fn rollback(&self) -> Result<(), StoreError> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("ROLLBACK;")?;
        }
        Ok(())
    }

    /// Returns the track id the features were stored under.
    pub fn insert_track(&self, track: &Track) -> Result<i64, StoreError> {
        let meta = track.metadata();
        let path = meta.path.to_string_lossy();

        self.conn.prepare_cached(INSERT_TRACK_SQL)?.execute(params![
            path,
            meta.title,
            meta.artist,
            meta.album,
            meta.year,
            meta.duration_seconds,
            meta.sample_rate,
            meta.total_samples as i64,
            meta.frame_count as i64,
        ])?;

        // last_insert_rowid is stale when the insert was ignored.
        let track_id: i64 = self
            .conn
            .prepare_cached(SELECT_TRACK_ID_SQL)?
            .query_row([&path], |row| row.get(0))?;

        let values = std::iter::once(Value::Integer(track_id)).chain(
            track
                .features()
                .metrics()
                .into_iter()
                .flat_map(|stats| stats.values())
                .map(Value::Real),
        );
        self.conn
            .prepare_cached(&self.insert_features_sql)?
            .execute(params_from_iter(values))?;

        Ok(track_id)
    }

    pub fn track_count(&self) -> Result<usize, StoreError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM tracks", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn load_track(&self, path: &Path) -> Result<Option<StoredTrack>, StoreError> {
        let stored = self
            .conn
            .query_row(
                "SELECT id, path, title, artist, album, year, duration_seconds, \
                 sample_rate, total_samples, frame_count FROM tracks WHERE path = ?1",
                [path.to_string_lossy()],
                |row| {
                    let path: String = row.get(1)?;
                    Ok(StoredTrack {
                        id: row.get(0)?,
                        metadata: TrackMetadata {
                            path: PathBuf::from(path),
                            title: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                            artist: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                            album: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                            year: row.get::<_, Option<u32>>(5)?.unwrap_or(0),
                            duration_seconds: row.get(6)?,
                            sample_rate: row.get(7)?,
                            total_samples: row.get::<_, i64>(8)? as usize,
                            frame_count: row.get::<_, i64>(9)? as usize,
                        },
                        features: None,
                    })
                },
            )
            .optional()?;

        let Some(mut stored) = stored else {
            return Ok(None);
        };

        stored.features = self
            .conn
            .query_row(&select_features_sql(), [stored.id], |row| {
                let mut metrics = [FeatureStats::default(); 7];
                for (m, stats) in metrics.iter_mut().enumerate() {
                    let mut values = [0.0; 8];
                    for (f, value) in values.iter_mut().enumerate() {
                        *value = row.get(m * 8 + f)?;
                    }
                    *stats = FeatureStats::from_values(values);
                }
                Ok(TrackFeatures::from_metrics(metrics))
            })
            .optional()?;

        Ok(Some(stored))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_track(path: &str, centroid_mean: f64) -> Track {
        let mut meta = TrackMetadata::new(PathBuf::from(path), 44100, 88200, 337);
        meta.title = "Title".into();
        meta.artist = "Artist".into();
        meta.year = 1994;
        let mut features = TrackFeatures::default();
        features.spectral_centroid.mean = centroid_mean;
        features.hf_ratio.p95 = 3.5;
        Track::new(meta, features)
    }

    #[test]
    fn track_features_table_has_57_columns() {
        assert_eq!(feature_columns().len(), 56);
        let db = TrackDatabase::open_in_memory().unwrap();
        let count: i64 = db
            .conn
            .query_row(
                "SELECT COUNT(*) FROM pragma_table_info('track_features')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 57);
    }

    #[test]
    fn insert_and_load_round_trip() {
        let db = TrackDatabase::open_in_memory().unwrap();
        let track = sample_track("/music/a/b/song.mp3", 1234.5);
        db.begin().unwrap();
        let id = db.insert_track(&track).unwrap();
        db.commit().unwrap();

        let stored = db.load_track(Path::new("/music/a/b/song.mp3")).unwrap().unwrap();
        assert_eq!(stored.id, id);
        assert_eq!(&stored.metadata, track.metadata());
        assert_eq!(stored.features.as_ref(), Some(track.features()));
        assert!(db.load_track(Path::new("/nope.mp3")).unwrap().is_none());
    }

    #[test]
    fn reinserting_a_path_keeps_one_row_and_latest_features() {
        let db = TrackDatabase::open_in_memory().unwrap();
        db.begin().unwrap();
        let first = db.insert_track(&sample_track("/x.mp3", 100.0)).unwrap();
        let second = db.insert_track(&sample_track("/x.mp3", 200.0)).unwrap();
        db.commit().unwrap();

        assert_eq!(first, second);
        assert_eq!(db.track_count().unwrap(), 1);
        let features_rows: i64 = db
            .conn
            .query_row("SELECT COUNT(*) FROM track_features", [], |row| row.get(0))
            .unwrap();
        assert_eq!(features_rows, 1);
        let stored = db.load_track(Path::new("/x.mp3")).unwrap().unwrap();
        assert_eq!(stored.features.unwrap().spectral_centroid.mean, 200.0);
    }

    #[test]
    fn rollback_discards_uncommitted_batch() {
        let db = TrackDatabase::open_in_memory().unwrap();
        db.begin().unwrap();
        db.insert_track(&sample_track("/kept.mp3", 1.0)).unwrap();
        db.commit().unwrap();

        db.begin().unwrap();
        db.insert_track(&sample_track("/dropped.mp3", 1.0)).unwrap();
        db.rollback().unwrap();
        db.rollback().unwrap();

        assert_eq!(db.track_count().unwrap(), 1);
    }

    #[test]
    fn open_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("audit.db");
        let db = TrackDatabase::open(&path).unwrap();
        assert_eq!(db.track_count().unwrap(), 0);
        assert!(path.exists());
    }
}
