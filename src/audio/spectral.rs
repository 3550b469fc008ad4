use super::features::FrameFeatures;

/// Keeps silent frames finite: every ratio below divides by `x + EPS`.
pub const EPS: f64 = 1e-12;

pub const DEFAULT_HF_SPLIT_HZ: f64 = 2000.0;

const ROLLOFF_FRACTION: f64 = 0.85;

/// Derives per-frame spectral features from one magnitude spectrum.
///
/// Bins are spread evenly over `[0, nyquist]`, so bin `i` sits at
/// `i * nyquist / (bins - 1)` Hz and the last bin is exactly Nyquist.
/// A bin belongs to the high band when its frequency is at or above the
/// split frequency.
#[derive(Clone, Copy, Debug)]
pub struct SpectralExtractor {
    sample_rate: u32,
    hf_split_hz: f64,
}

impl SpectralExtractor {
    pub fn new(sample_rate: u32, hf_split_hz: f64) -> Self {
        Self {
            sample_rate,
            hf_split_hz,
        }
    }

    pub fn bin_hz(&self, bins: usize) -> f64 {
        if bins < 2 {
            return 0.0;
        }
        self.sample_rate as f64 * 0.5 / (bins - 1) as f64
    }

    /// `pcm_rms` is left at zero and `peak` holds the spectral peak; the
    /// analyzer overwrites both with the time-domain values of the window.
    pub fn extract(&self, magnitudes: &[f64]) -> FrameFeatures {
        let bins = magnitudes.len();
        if bins == 0 || self.sample_rate == 0 {
            return FrameFeatures::default();
        }

        let bin_hz = self.bin_hz(bins);

        let mut energy_sum = 0.0;
        let mut weighted_freq_sum = 0.0;
        let mut mag_sum = 0.0;
        let mut log_sum = 0.0;
        let mut peak = 0.0f64;
        let mut low_energy = 0.0;
        let mut high_energy = 0.0;

        for (i, &mag) in magnitudes.iter().enumerate() {
            let freq = i as f64 * bin_hz;
            let mag2 = mag * mag;

            energy_sum += mag2;
            mag_sum += mag;
            log_sum += (mag + EPS).ln();
            peak = peak.max(mag);
            weighted_freq_sum += freq * mag;

            if freq < self.hf_split_hz {
                low_energy += mag2;
            } else {
                high_energy += mag2;
            }
        }

        let n = bins as f64;
        let geo_mean = (log_sum / n).exp();
        let arith_mean = mag_sum / n;

        FrameFeatures {
            pcm_rms: 0.0,
            peak,
            spectral_rms: (energy_sum / n).sqrt(),
            spectral_centroid: weighted_freq_sum / (mag_sum + EPS),
            spectral_rolloff85: rolloff(magnitudes, energy_sum, bin_hz),
            spectral_flatness: (geo_mean / (arith_mean + EPS)).min(1.0),
            hf_ratio: (high_energy + EPS) / (low_energy + EPS),
        }
    }
}

fn rolloff(magnitudes: &[f64], energy_sum: f64, bin_hz: f64) -> f64 {
    let target = energy_sum * ROLLOFF_FRACTION;
    let mut cumulative = 0.0;
    for (i, &mag) in magnitudes.iter().enumerate() {
        cumulative += mag * mag;
        if cumulative >= target {
            return i as f64 * bin_hz;
        }
    }
    (magnitudes.len() - 1) as f64 * bin_hz
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> SpectralExtractor {
        SpectralExtractor::new(44100, DEFAULT_HF_SPLIT_HZ)
    }

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    #[test]
    fn empty_spectrum_is_all_zero() {
        assert_eq!(extractor().extract(&[]), FrameFeatures::default());
    }

    #[test]
    fn zero_sample_rate_is_all_zero() {
        let ex = SpectralExtractor::new(0, DEFAULT_HF_SPLIT_HZ);
        assert_eq!(ex.extract(&[1.0, 2.0, 3.0]), FrameFeatures::default());
    }

    #[test]
    fn single_bin_spectrum_is_flat() {
        let f = extractor().extract(&[0.7]);
        assert!(close(f.spectral_flatness, 1.0, 1e-9));
        assert_eq!(f.spectral_centroid, 0.0);
        assert_eq!(f.spectral_rolloff85, 0.0);
        assert!(close(f.spectral_rms, 0.7, 1e-12));
    }

    #[test]
    fn silent_spectrum_is_finite() {
        let f = extractor().extract(&vec![0.0; 1025]);
        assert_eq!(f.peak, 0.0);
        assert_eq!(f.spectral_rms, 0.0);
        assert_eq!(f.spectral_centroid, 0.0);
        assert_eq!(f.spectral_rolloff85, 0.0);
        assert!(close(f.spectral_flatness, 1.0, 1e-9));
        assert!(close(f.hf_ratio, 1.0, 1e-9));
    }

    #[test]
    fn flat_spectrum_has_unit_flatness() {
        let f = extractor().extract(&vec![0.25; 1025]);
        assert!(close(f.spectral_flatness, 1.0, 1e-9));
        assert!(f.spectral_flatness <= 1.0);
        // Evenly spread magnitude puts the centroid at half Nyquist.
        assert!(close(f.spectral_centroid, 11025.0, 1e-6));
    }

    #[test]
    fn peaky_spectrum_has_low_flatness() {
        let mut mags = vec![0.0; 1025];
        mags[100] = 10.0;
        let f = extractor().extract(&mags);
        assert!(f.spectral_flatness > 0.0);
        assert!(f.spectral_flatness < 1e-3);
        assert_eq!(f.peak, 10.0);
    }

    #[test]
    fn top_bin_only_spectrum() {
        let mut mags = vec![0.0; 1025];
        mags[1024] = 1.0;
        let f = extractor().extract(&mags);
        assert!(f.hf_ratio > 1e9);
        assert_eq!(f.spectral_rolloff85, 22050.0);
        assert!(close(f.spectral_centroid, 22050.0, 1e-6));
    }

    #[test]
    fn rolloff_finds_85_percent_point() {
        // Unit energy in bins 0..=9; the running sum first reaches 8.5 at bin 8.
        let mut mags = vec![0.0; 11];
        for m in mags.iter_mut().take(10) {
            *m = 1.0;
        }
        let ex = SpectralExtractor::new(20, DEFAULT_HF_SPLIT_HZ);
        // nyquist 10 Hz over 10 intervals: 1 Hz per bin.
        assert_eq!(ex.bin_hz(11), 1.0);
        let f = ex.extract(&mags);
        assert_eq!(f.spectral_rolloff85, 8.0);
    }

    #[test]
    fn split_frequency_boundary_goes_high() {
        // 4 kHz sample rate, 3 bins: 0, 1000, 2000 Hz.
        let ex = SpectralExtractor::new(4000, 2000.0);
        let f = ex.extract(&[0.0, 1.0, 2.0]);
        assert!(close(f.hf_ratio, 4.0, 1e-9));
    }

    #[test]
    fn flatness_stays_in_unit_interval() {
        let mags: Vec<f64> = (0..513).map(|i| ((i * 37) % 11) as f64 * 0.1).collect();
        let f = extractor().extract(&mags);
        assert!(f.spectral_flatness > 0.0);
        assert!(f.spectral_flatness <= 1.0);
    }
}
