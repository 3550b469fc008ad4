use serde::Serialize;
use std::path::PathBuf;

use crate::audio::features::TrackFeatures;

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TrackMetadata {
    pub path: PathBuf,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub year: u32,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub total_samples: usize,
    pub frame_count: usize,
}

impl TrackMetadata {
    pub fn new(path: PathBuf, sample_rate: u32, total_samples: usize, frame_count: usize) -> Self {
        let duration_seconds = if sample_rate > 0 {
            total_samples as f64 / sample_rate as f64
        } else {
            0.0
        };
        Self {
            path,
            duration_seconds,
            sample_rate,
            total_samples,
            frame_count,
            ..Default::default()
        }
    }
}

/// A fully analysed track, the unit handed to the persistence sink.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Track {
    metadata: TrackMetadata,
    features: TrackFeatures,
}

impl Track {
    pub fn new(metadata: TrackMetadata, features: TrackFeatures) -> Self {
        Self { metadata, features }
    }

    pub fn metadata(&self) -> &TrackMetadata {
        &self.metadata
    }

    pub fn features(&self) -> &TrackFeatures {
        &self.features
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_from_samples() {
        let meta = TrackMetadata::new(PathBuf::from("a.mp3"), 44100, 88200, 337);
        assert_eq!(meta.duration_seconds, 2.0);
        assert_eq!(meta.frame_count, 337);
        assert!(meta.title.is_empty());
        assert_eq!(meta.year, 0);
    }

    #[test]
    fn zero_sample_rate_has_zero_duration() {
        let meta = TrackMetadata::new(PathBuf::from("a.mp3"), 0, 1000, 0);
        assert_eq!(meta.duration_seconds, 0.0);
    }
}
