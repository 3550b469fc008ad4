use indicatif::{ProgressBar, ProgressStyle};
use std::fmt::Display;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::TrackStage;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Counts {
    pub processed: usize,
    pub failed: usize,
    pub enqueued: usize,
}

/// Shared run counters plus the progress bar. Safe to call from every
/// pipeline thread.
pub struct PipelineMetrics {
    processed: AtomicUsize,
    failed: AtomicUsize,
    enqueued: AtomicUsize,
    progress: ProgressBar,
}

impl PipelineMetrics {
    pub fn new(show_progress: bool) -> Self {
        let progress = if show_progress {
            let pb = ProgressBar::new(0);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} tracks ({per_sec}) {msg}")
            {
                pb.set_style(style.progress_chars("=>-"));
            }
            pb
        } else {
            ProgressBar::hidden()
        };

        Self {
            processed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            enqueued: AtomicUsize::new(0),
            progress,
        }
    }

    pub fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
        self.progress.inc_length(1);
    }

    pub fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        self.progress.inc(1);
    }

    pub fn record_failed(&self, path: &Path, stage: TrackStage, reason: &dyn Display) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        self.progress.inc(1);
        log::warn!("Failed while {} {}: {}", stage, path.display(), reason);
    }

    pub fn counts(&self) -> Counts {
        Counts {
            processed: self.processed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            enqueued: self.enqueued.load(Ordering::Relaxed),
        }
    }

    pub fn finish(&self) {
        self.progress.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_across_threads() {
        let metrics = PipelineMetrics::new(false);
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..100 {
                        metrics.record_enqueued();
                        metrics.record_processed();
                    }
                    metrics.record_failed(Path::new("x.mp3"), TrackStage::Decoding, &"bad");
                });
            }
        });
        assert_eq!(
            metrics.counts(),
            Counts {
                processed: 800,
                failed: 8,
                enqueued: 800
            }
        );
        metrics.finish();
    }
}
