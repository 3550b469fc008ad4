use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use super::metrics::PipelineMetrics;
use super::TrackStage;
use crate::audio::analysis::{TrackAnalysis, TrackAnalyzer};
use crate::audio::decode::{DecodedAudio, Decoder};
use crate::audio::tags::{AudioTags, TagReader};
use crate::error::TrackError;
use crate::model::{Track, TrackMetadata};
use crate::queue::BoundedQueue;
use crate::store::TrackSink;

/// One pool thread. Owns its analyzer; everything else is borrowed from
/// the pipeline for the duration of the run.
pub(super) struct Worker<'a> {
    id: usize,
    analyzer: TrackAnalyzer,
    decoder: &'a dyn Decoder,
    tags: &'a dyn TagReader,
    metrics: &'a PipelineMetrics,
    last_group: Option<PathBuf>,
}

impl<'a> Worker<'a> {
    pub fn new(
        id: usize,
        analyzer: TrackAnalyzer,
        decoder: &'a dyn Decoder,
        tags: &'a dyn TagReader,
        metrics: &'a PipelineMetrics,
    ) -> Self {
        Self {
            id,
            analyzer,
            decoder,
            tags,
            metrics,
            last_group: None,
        }
    }

    pub fn run<S: TrackSink>(mut self, queue: &BoundedQueue<PathBuf>, sink: &S) {
        while let Some(path) = queue.pop() {
            self.log_group_change(&path);

            let mut stage = TrackStage::Queued;
            let outcome = self.process_guarded(&path, &mut stage).and_then(|track| {
                stage = TrackStage::Emitted;
                sink.consume(track)
            });

            match outcome {
                Ok(()) => {
                    log::trace!("worker {}: emitted {}", self.id, path.display());
                    self.metrics.record_processed();
                }
                Err(e) => self.metrics.record_failed(&path, stage, &e),
            }
        }
        log::debug!("worker {} finished", self.id);
    }

    /// Any panic inside one track's processing becomes that track's failure.
    fn process_guarded(&mut self, path: &Path, stage: &mut TrackStage) -> Result<Track, TrackError> {
        panic::catch_unwind(AssertUnwindSafe(|| self.process(path, stage)))
            .unwrap_or_else(|payload| Err(TrackError::Panicked(panic_message(payload))))
    }

    fn process(&mut self, path: &Path, stage: &mut TrackStage) -> Result<Track, TrackError> {
        *stage = TrackStage::Decoding;
        let audio = self.decoder.decode(path)?;
        let window_size = self.analyzer.window_size();
        if audio.samples.len() < window_size {
            return Err(TrackError::TooShort {
                samples: audio.samples.len(),
                window_size,
            });
        }

        *stage = TrackStage::Analyzing;
        let frames = self.analyzer.frame_features(&audio);

        *stage = TrackStage::Aggregating;
        let analysis = TrackAnalysis::from_frames(&frames);

        Ok(build_track(path, &audio, analysis, self.tags.extract(path)))
    }

    /// Logs when the artist/album directory changes between consecutive
    /// tracks of this worker.
    fn log_group_change(&mut self, path: &Path) {
        let group = path.parent().and_then(Path::parent);
        if group == self.last_group.as_deref() {
            return;
        }
        if let Some(group) = group {
            log::info!("=== {} ===", group.display());
        }
        self.last_group = group.map(Path::to_path_buf);
    }
}

pub(super) fn build_track(
    path: &Path,
    audio: &DecodedAudio,
    analysis: TrackAnalysis,
    tags: Option<AudioTags>,
) -> Track {
    let mut metadata = TrackMetadata::new(
        path.to_path_buf(),
        audio.sample_rate,
        audio.samples.len(),
        analysis.frame_count,
    );

    if let Some(tags) = tags {
        metadata.artist = tags.artist;
        metadata.title = tags.title;
        metadata.album = tags.album;
        metadata.year = tags.year;
    }

    Track::new(metadata, analysis.features)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
