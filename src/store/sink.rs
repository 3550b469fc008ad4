use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use super::database::TrackDatabase;
use crate::error::{StoreError, TrackError};
use crate::model::Track;
use crate::queue::{BoundedQueue, CloseOnDrop};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SinkSummary {
    pub committed: usize,
    pub batches: usize,
}

/// Destination for finished tracks.
///
/// `consume` is called concurrently by every worker. `close` is called once,
/// after the last worker has exited, and must not return before everything
/// accepted by `consume` is durable (or report why it is not).
pub trait TrackSink: Sync {
    fn consume(&self, track: Track) -> Result<(), TrackError>;

    fn close(self) -> Result<SinkSummary, StoreError>
    where
        Self: Sized;
}

/// Writes tracks to SQLite from a dedicated thread, committing every
/// `batch_size` records.
pub struct SqliteTrackSink {
    queue: Arc<BoundedQueue<Track>>,
    handle: Option<JoinHandle<Result<SinkSummary, StoreError>>>,
}

impl SqliteTrackSink {
    pub fn open(path: &Path, batch_size: usize, capacity: usize) -> Result<Self, StoreError> {
        let db = TrackDatabase::open(path)?;
        Self::spawn(db, batch_size, capacity)
    }

    pub fn spawn(db: TrackDatabase, batch_size: usize, capacity: usize) -> Result<Self, StoreError> {
        let queue = Arc::new(BoundedQueue::new(capacity));
        let batch_size = batch_size.max(1);

        let handle = {
            let queue = Arc::clone(&queue);
            thread::Builder::new()
                .name("track-sink".into())
                .spawn(move || {
                    let _close = CloseOnDrop(&*queue);
                    run_sink(db, &queue, batch_size)
                })
                .map_err(StoreError::Spawn)?
        };

        log::debug!(
            "Track sink started (batch size {}, queue capacity {})",
            batch_size,
            queue.capacity()
        );

        Ok(Self {
            queue,
            handle: Some(handle),
        })
    }

    fn finish(&mut self) -> Result<SinkSummary, StoreError> {
        self.queue.close();
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| StoreError::SinkPanicked)?,
            None => Ok(SinkSummary::default()),
        }
    }
}

impl TrackSink for SqliteTrackSink {
    fn consume(&self, track: Track) -> Result<(), TrackError> {
        if self.queue.push(track) {
            Ok(())
        } else {
            Err(TrackError::SinkClosed)
        }
    }

    fn close(mut self) -> Result<SinkSummary, StoreError> {
        self.finish()
    }
}

impl Drop for SqliteTrackSink {
    fn drop(&mut self) {
        if self.handle.is_some() {
            if let Err(e) = self.finish() {
                log::error!("Track sink failed while shutting down: {}", e);
            }
        }
    }
}

fn run_sink(
    db: TrackDatabase,
    queue: &BoundedQueue<Track>,
    batch_size: usize,
) -> Result<SinkSummary, StoreError> {
    let mut open_batch = Vec::new();
    let source = match drain(&db, queue, batch_size, &mut open_batch) {
        Ok(summary) => return Ok(summary),
        Err(e) => e,
    };

    log::error!("Track sink stopped: {}", source);
    // Refuse new work, roll back the open batch and name every track
    // that will not be stored.
    queue.close();
    if let Err(rollback) = db.rollback() {
        log::error!("Rollback failed: {}", rollback);
    }

    let mut lost = 0usize;
    for path in &open_batch {
        log::error!("Not persisted: {}", path.display());
        lost += 1;
    }
    while let Some(track) = queue.pop() {
        log::error!("Not persisted: {}", track.metadata().path.display());
        lost += 1;
    }
    log::error!("{} tracks were not persisted", lost);

    Err(StoreError::NotPersisted {
        lost,
        source: Box::new(source),
    })
}

/// Inserts and commits until the queue is closed and drained.
/// `open_batch` holds the paths written since the last commit, including
/// the one being inserted, so a failure can name them.
fn drain(
    db: &TrackDatabase,
    queue: &BoundedQueue<Track>,
    batch_size: usize,
    open_batch: &mut Vec<PathBuf>,
) -> Result<SinkSummary, StoreError> {
    let mut summary = SinkSummary::default();

    db.begin()?;
    while let Some(track) = queue.pop() {
        open_batch.push(track.metadata().path.clone());
        db.insert_track(&track)?;

        if open_batch.len() >= batch_size {
            db.commit()?;
            summary.committed += open_batch.len();
            summary.batches += 1;
            log::debug!("Committed batch {} ({} tracks)", summary.batches, open_batch.len());
            open_batch.clear();
            db.begin()?;
        }
    }
    db.commit()?;

    if !open_batch.is_empty() {
        summary.committed += open_batch.len();
        summary.batches += 1;
        log::debug!("Committed final batch ({} tracks)", open_batch.len());
        open_batch.clear();
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::features::TrackFeatures;
    use crate::model::TrackMetadata;
    use std::path::PathBuf;

    fn track(path: &str, rms_mean: f64) -> Track {
        let meta = TrackMetadata::new(PathBuf::from(path), 44100, 44100, 165);
        let mut features = TrackFeatures::default();
        features.pcm_rms.mean = rms_mean;
        Track::new(meta, features)
    }

    #[test]
    fn close_commits_partial_batch() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("audit.db");
        let sink = SqliteTrackSink::open(&db_path, 4, 2).unwrap();
        for i in 0..10 {
            sink.consume(track(&format!("/lib/{i}.mp3"), i as f64)).unwrap();
        }
        let summary = sink.close().unwrap();
        assert_eq!(summary, SinkSummary { committed: 10, batches: 3 });

        let db = TrackDatabase::open(&db_path).unwrap();
        assert_eq!(db.track_count().unwrap(), 10);
    }

    #[test]
    fn empty_run_commits_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("audit.db");
        let sink = SqliteTrackSink::open(&db_path, 500, 8).unwrap();
        assert_eq!(sink.close().unwrap(), SinkSummary::default());
        assert_eq!(TrackDatabase::open(&db_path).unwrap().track_count().unwrap(), 0);
    }

    #[test]
    fn duplicate_paths_are_upserted() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("audit.db");
        let sink = SqliteTrackSink::open(&db_path, 500, 8).unwrap();
        sink.consume(track("/lib/same.mp3", 0.1)).unwrap();
        sink.consume(track("/lib/same.mp3", 0.7)).unwrap();
        sink.close().unwrap();

        let db = TrackDatabase::open(&db_path).unwrap();
        assert_eq!(db.track_count().unwrap(), 1);
        let stored = db.load_track(Path::new("/lib/same.mp3")).unwrap().unwrap();
        assert_eq!(stored.features.unwrap().pcm_rms.mean, 0.7);
    }

    #[test]
    fn store_failure_surfaces_from_close_and_rejects_new_tracks() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("audit.db");
        let db = TrackDatabase::open(&db_path).unwrap();
        // Break the schema behind the sink's back so the first insert fails.
        rusqlite::Connection::open(&db_path)
            .unwrap()
            .execute_batch("DROP TABLE track_features;")
            .unwrap();

        let sink = SqliteTrackSink::spawn(db, 10, 1).unwrap();
        sink.consume(track("/lib/a.mp3", 0.0)).unwrap();

        // Once the sink thread has failed, the queue is closed.
        let mut rejected = false;
        for i in 0..1000 {
            if sink.consume(track(&format!("/lib/{i}.mp3"), 0.0)).is_err() {
                rejected = true;
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        assert!(rejected);
        match sink.close() {
            Err(StoreError::NotPersisted { lost, source }) => {
                assert!(lost >= 1);
                assert!(matches!(*source, StoreError::Sqlite(_)));
            }
            other => panic!("expected NotPersisted, got {other:?}"),
        }
    }

    #[test]
    fn rolled_back_batch_is_counted_as_lost() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("audit.db");
        let db = TrackDatabase::open(&db_path).unwrap();
        rusqlite::Connection::open(&db_path)
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER reject_bad BEFORE INSERT ON tracks
                 WHEN NEW.path = '/lib/bad.mp3'
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();

        let sink = SqliteTrackSink::spawn(db, 10, 8).unwrap();
        sink.consume(track("/lib/good1.mp3", 0.1)).unwrap();
        sink.consume(track("/lib/good2.mp3", 0.2)).unwrap();
        sink.consume(track("/lib/bad.mp3", 0.3)).unwrap();

        // Both good tracks shared the failed transaction, so all three are lost.
        match sink.close() {
            Err(StoreError::NotPersisted { lost, .. }) => assert_eq!(lost, 3),
            other => panic!("expected NotPersisted, got {other:?}"),
        }
        assert_eq!(TrackDatabase::open(&db_path).unwrap().track_count().unwrap(), 0);
    }

    #[test]
    fn dropping_the_sink_flushes() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("audit.db");
        {
            let sink = SqliteTrackSink::open(&db_path, 500, 8).unwrap();
            sink.consume(track("/lib/dropped.mp3", 0.2)).unwrap();
        }
        assert_eq!(TrackDatabase::open(&db_path).unwrap().track_count().unwrap(), 1);
    }
}
