pub mod metrics;
mod producer;
mod worker;

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use crate::audio::analysis::TrackAnalyzer;
use crate::audio::decode::Decoder;
use crate::audio::tags::TagReader;
use crate::config::{AnalysisConfig, PipelineConfig};
use crate::error::{ConfigError, PipelineError};
use crate::queue::BoundedQueue;
use crate::store::TrackSink;
use metrics::PipelineMetrics;
use worker::Worker;

/// Where a single track was when it left the pipeline. A failure is
/// reported against the last stage entered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackStage {
    Queued,
    Decoding,
    Analyzing,
    Aggregating,
    Emitted,
}

impl fmt::Display for TrackStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TrackStage::Queued => "queued",
            TrackStage::Decoding => "decoding",
            TrackStage::Analyzing => "analyzing",
            TrackStage::Aggregating => "aggregating",
            TrackStage::Emitted => "emitting",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct PipelineReport {
    pub tracks_processed: usize,
    pub tracks_failed: usize,
    pub paths_enqueued: usize,
    pub tracks_committed: usize,
    pub batches_committed: usize,
    /// False when the directory walk stopped on a filesystem error.
    pub walk_completed: bool,
    pub analysis_seconds: f64,
    pub store_seconds: f64,
    pub total_seconds: f64,
}

/// Producer thread, worker pool and sink hand-off for one input directory.
pub struct BatchPipeline {
    input_dir: PathBuf,
    analysis: AnalysisConfig,
    config: PipelineConfig,
    decoder: Box<dyn Decoder>,
    tags: Box<dyn TagReader>,
    metrics: PipelineMetrics,
}

impl BatchPipeline {
    pub fn new(
        input_dir: impl Into<PathBuf>,
        analysis: AnalysisConfig,
        config: PipelineConfig,
        decoder: Box<dyn Decoder>,
        tags: Box<dyn TagReader>,
        metrics: PipelineMetrics,
    ) -> Result<Self, ConfigError> {
        analysis.validate()?;
        config.validate()?;
        Ok(Self {
            input_dir: input_dir.into(),
            analysis,
            config,
            decoder,
            tags,
            metrics,
        })
    }

    /// Runs to completion: walks the input, analyses every queued path,
    /// then closes `sink`. Per-track failures are counted, not returned;
    /// only a failing sink makes the run itself fail.
    pub fn run<S: TrackSink>(&self, sink: S) -> Result<PipelineReport, PipelineError> {
        let start = Instant::now();
        let worker_count = self.config.worker_count();

        // Every analyzer is built before any thread starts, so a bad
        // parameter can never leave a half-started pool behind.
        let analyzers = (0..worker_count)
            .map(|_| TrackAnalyzer::new(&self.analysis))
            .collect::<Result<Vec<_>, _>>()?;

        log::info!(
            "Analyzing {} with {} workers (window {}, hop {})",
            self.input_dir.display(),
            worker_count,
            self.analysis.window_size,
            self.analysis.hop_size
        );

        let paths: BoundedQueue<PathBuf> = BoundedQueue::new(self.config.queue_capacity);

        let walk_completed = thread::scope(|scope| {
            let producer = scope.spawn(|| {
                producer::walk(&self.input_dir, &self.config, &paths, &self.metrics)
            });

            for (id, analyzer) in analyzers.into_iter().enumerate() {
                let worker = Worker::new(
                    id,
                    analyzer,
                    self.decoder.as_ref(),
                    self.tags.as_ref(),
                    &self.metrics,
                );
                let paths = &paths;
                let sink = &sink;
                scope.spawn(move || worker.run(paths, sink));
            }

            producer.join().unwrap_or_else(|_| {
                log::error!("Directory walk panicked");
                paths.close();
                false
            })
        });
        debug_assert!(paths.is_closed());
        let analysis_time = start.elapsed();

        let store_start = Instant::now();
        let sink_result = sink.close();
        let store_time = store_start.elapsed();

        self.metrics.finish();
        let counts = self.metrics.counts();
        log::info!(
            "Processed: {}, Failed: {}, Enqueued: {}",
            counts.processed,
            counts.failed,
            counts.enqueued
        );
        log::info!("Analysis time: {}", format_duration(analysis_time));
        log::info!("DB write time: {}", format_duration(store_time));

        let summary = sink_result?;
        let total_time = start.elapsed();
        log::info!("Total time: {}", format_duration(total_time));

        Ok(PipelineReport {
            tracks_processed: counts.processed,
            tracks_failed: counts.failed,
            paths_enqueued: counts.enqueued,
            tracks_committed: summary.committed,
            batches_committed: summary.batches,
            walk_completed,
            analysis_seconds: analysis_time.as_secs_f64(),
            store_seconds: store_time.as_secs_f64(),
            total_seconds: total_time.as_secs_f64(),
        })
    }
}

/// `HH:MM:SS.mmm`
pub fn format_duration(d: Duration) -> String {
    let ms = d.as_millis();
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        ms / 3_600_000,
        (ms / 60_000) % 60,
        (ms / 1000) % 60,
        ms % 1000
    )
}
