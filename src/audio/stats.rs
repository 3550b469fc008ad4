use super::features::{FeatureStats, FrameFeatures, TrackFeatures};

/// Reduce per-frame features to per-track distributions, metric by metric.
/// No frames means all-default stats.
pub fn aggregate(frames: &[FrameFeatures]) -> TrackFeatures {
    let column = |get: fn(&FrameFeatures) -> f64| -> FeatureStats {
        let mut values: Vec<f64> = frames.iter().map(get).collect();
        compute_stats(&mut values)
    };

    TrackFeatures {
        pcm_rms: column(|f| f.pcm_rms),
        peak: column(|f| f.peak),
        spectral_rms: column(|f| f.spectral_rms),
        spectral_centroid: column(|f| f.spectral_centroid),
        spectral_rolloff85: column(|f| f.spectral_rolloff85),
        spectral_flatness: column(|f| f.spectral_flatness),
        hf_ratio: column(|f| f.hf_ratio),
    }
}

/// Sorts `values` in place. Standard deviation is the population one.
pub fn compute_stats(values: &mut [f64]) -> FeatureStats {
    let n = values.len();
    if n == 0 {
        return FeatureStats::default();
    }

    values.sort_by(|a, b| a.total_cmp(b));

    let mean = values.iter().sum::<f64>() / n as f64;
    let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n as f64;
    let median = if n % 2 == 0 {
        (values[n / 2 - 1] + values[n / 2]) * 0.5
    } else {
        values[n / 2]
    };

    FeatureStats {
        mean,
        median,
        stddev: variance.sqrt(),
        p05: percentile(values, 0.05),
        p50: percentile(values, 0.50),
        p95: percentile(values, 0.95),
        min: values[0],
        max: values[n - 1],
    }
}

/// Linear interpolation between order statistics at `fraction * (n - 1)`.
/// `sorted` must be non-empty.
fn percentile(sorted: &[f64], fraction: f64) -> f64 {
    let idx = fraction * (sorted.len() - 1) as f64;
    let lower = idx.floor() as usize;
    let frac = idx - lower as f64;
    match sorted.get(lower + 1) {
        Some(&upper) => sorted[lower] * (1.0 - frac) + upper * frac,
        None => sorted[lower],
    }
}
