use serde::Serialize;

/// Features of one STFT frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameFeatures {
    /// Time-domain RMS of the window
    pub pcm_rms: f64,
    /// Time-domain peak |sample| of the window
    pub peak: f64,
    /// RMS of the magnitude spectrum
    pub spectral_rms: f64,
    /// Magnitude-weighted mean frequency (Hz)
    pub spectral_centroid: f64,
    /// Frequency below which 85% of the spectral energy lies (Hz)
    pub spectral_rolloff85: f64,
    /// Geometric / arithmetic mean of magnitudes, in (0, 1]
    pub spectral_flatness: f64,
    /// Energy above the split frequency over energy below it
    pub hf_ratio: f64,
}

/// Distribution of one metric over all frames of a track.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct FeatureStats {
    pub mean: f64,
    pub median: f64,
    pub stddev: f64,
    pub p05: f64,
    pub p50: f64,
    pub p95: f64,
    pub min: f64,
    pub max: f64,
}

impl FeatureStats {
    /// Column suffixes, in storage order.
    pub const FIELDS: [&'static str; 8] =
        ["mean", "median", "stddev", "p05", "p50", "p95", "min", "max"];

    pub fn values(&self) -> [f64; 8] {
        [
            self.mean,
            self.median,
            self.stddev,
            self.p05,
            self.p50,
            self.p95,
            self.min,
            self.max,
        ]
    }

    pub fn from_values(v: [f64; 8]) -> Self {
        Self {
            mean: v[0],
            median: v[1],
            stddev: v[2],
            p05: v[3],
            p50: v[4],
            p95: v[5],
            min: v[6],
            max: v[7],
        }
    }
}

/// Summary of one track: one [`FeatureStats`] per frame metric.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct TrackFeatures {
    pub pcm_rms: FeatureStats,
    pub peak: FeatureStats,
    pub spectral_rms: FeatureStats,
    pub spectral_centroid: FeatureStats,
    pub spectral_rolloff85: FeatureStats,
    pub spectral_flatness: FeatureStats,
    pub hf_ratio: FeatureStats,
}

impl TrackFeatures {
    /// Metric names, in storage order. Also the column prefixes.
    pub const METRICS: [&'static str; 7] = [
        "pcm_rms",
        "peak",
        "spectral_rms",
        "spectral_centroid",
        "spectral_rolloff85",
        "spectral_flatness",
        "hf_ratio",
    ];

    pub fn metrics(&self) -> [&FeatureStats; 7] {
        [
            &self.pcm_rms,
            &self.peak,
            &self.spectral_rms,
            &self.spectral_centroid,
            &self.spectral_rolloff85,
            &self.spectral_flatness,
            &self.hf_ratio,
        ]
    }

    pub fn from_metrics(m: [FeatureStats; 7]) -> Self {
        Self {
            pcm_rms: m[0],
            peak: m[1],
            spectral_rms: m[2],
            spectral_centroid: m[3],
            spectral_rolloff85: m[4],
            spectral_flatness: m[5],
            hf_ratio: m[6],
        }
    }
}
