use lofty::file::TaggedFileExt;
use lofty::prelude::*;
use lofty::probe::Probe;
use std::path::Path;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AudioTags {
    pub artist: String,
    pub title: String,
    pub album: String,
    pub year: u32,
}

/// Reads descriptive tags. A file without readable tags yields `None`;
/// that is never a processing failure.
pub trait TagReader: Send + Sync {
    fn extract(&self, path: &Path) -> Option<AudioTags>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct LoftyTagReader;

impl TagReader for LoftyTagReader {
    fn extract(&self, path: &Path) -> Option<AudioTags> {
        let tagged_file = match Probe::open(path).and_then(|probe| probe.read()) {
            Ok(file) => file,
            Err(e) => {
                log::debug!("No tags for {}: {}", path.display(), e);
                return None;
            }
        };

        let tag = tagged_file.primary_tag().or_else(|| tagged_file.first_tag())?;

        Some(AudioTags {
            artist: tag.artist().map(|s| s.to_string()).unwrap_or_default(),
            title: tag.title().map(|s| s.to_string()).unwrap_or_default(),
            album: tag.album().map(|s| s.to_string()).unwrap_or_default(),
            year: tag.year().unwrap_or(0),
        })
    }
}
