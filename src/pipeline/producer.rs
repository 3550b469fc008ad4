use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::metrics::PipelineMetrics;
use crate::config::PipelineConfig;
use crate::queue::{BoundedQueue, CloseOnDrop};

/// Walks `root` and enqueues every file with a wanted extension.
///
/// Returns `false` if the walk was cut short by a filesystem error. The
/// queue is closed on every exit path.
pub(super) fn walk(
    root: &Path,
    config: &PipelineConfig,
    queue: &BoundedQueue<PathBuf>,
    metrics: &PipelineMetrics,
) -> bool {
    let _close = CloseOnDrop(queue);

    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::error!("Filesystem error: {}", e);
                return false;
            }
        };

        if !entry.file_type().is_file() || !config.matches_extension(entry.path()) {
            continue;
        }

        if !queue.push(entry.into_path()) {
            log::debug!("Path queue closed, stopping walk");
            break;
        }
        metrics.record_enqueued();
    }

    true
}
