use super::decode::DecodedAudio;
use super::features::{FrameFeatures, TrackFeatures};
use super::spectral::SpectralExtractor;
use super::stats;
use super::stft::StftProcessor;
use crate::config::AnalysisConfig;
use crate::error::ConfigError;

pub struct TrackAnalysis {
    pub features: TrackFeatures,
    pub frame_count: usize,
}

impl TrackAnalysis {
    pub fn from_frames(frames: &[FrameFeatures]) -> Self {
        Self {
            features: stats::aggregate(frames),
            frame_count: frames.len(),
        }
    }
}

/// Per-worker analysis state. Not shared between threads: each worker
/// builds one and keeps reusing its FFT plan.
pub struct TrackAnalyzer {
    stft: StftProcessor,
    hf_split_hz: f64,
}

impl TrackAnalyzer {
    pub fn new(config: &AnalysisConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            stft: StftProcessor::new(config.window_size, config.hop_size)?,
            hf_split_hz: config.hf_split_hz,
        })
    }

    pub fn window_size(&self) -> usize {
        self.stft.window_size()
    }

    /// Spectral features of every frame, with the time-domain RMS and peak
    /// of the same window merged in.
    pub fn frame_features(&mut self, audio: &DecodedAudio) -> Vec<FrameFeatures> {
        let samples = &audio.samples;
        let window_size = self.stft.window_size();
        let hop_size = self.stft.hop_size();
        if samples.len() < window_size {
            return Vec::new();
        }

        let magnitudes = self.stft.compute_magnitudes(samples);
        let extractor = SpectralExtractor::new(audio.sample_rate, self.hf_split_hz);

        magnitudes
            .iter()
            .enumerate()
            .map(|(frame_idx, spectrum)| {
                let offset = frame_idx * hop_size;
                let (pcm_rms, peak) = pcm_window_stats(&samples[offset..offset + window_size]);
                FrameFeatures {
                    pcm_rms,
                    peak,
                    ..extractor.extract(spectrum)
                }
            })
            .collect()
    }
}

/// Time-domain (RMS, peak |x|) of one window.
fn pcm_window_stats(window: &[f32]) -> (f64, f64) {
    if window.is_empty() {
        return (0.0, 0.0);
    }
    let mut sum_sq = 0.0f64;
    let mut peak = 0.0f64;
    for &s in window {
        let s = s as f64;
        sum_sq += s * s;
        peak = peak.max(s.abs());
    }
    ((sum_sq / window.len() as f64).sqrt(), peak)
}
