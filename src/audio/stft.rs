use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

use crate::error::ConfigError;

/// Short-time Fourier transform over a mono signal.
///
/// Owns its FFT plan and scratch buffers, so one instance is built per
/// worker thread and reused for every track that worker processes.
pub struct StftProcessor {
    window_size: usize,
    hop_size: usize,
    hann: Vec<f64>,
    fft: Arc<dyn Fft<f64>>,
    buffer: Vec<Complex<f64>>,
    scratch: Vec<Complex<f64>>,
}

impl StftProcessor {
    pub fn new(window_size: usize, hop_size: usize) -> Result<Self, ConfigError> {
        if window_size < 2 {
            return Err(ConfigError::WindowTooSmall(window_size));
        }
        if hop_size == 0 {
            return Err(ConfigError::ZeroHop);
        }

        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(window_size);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        Ok(Self {
            window_size,
            hop_size,
            hann: hann_window(window_size),
            fft,
            buffer: vec![Complex::new(0.0, 0.0); window_size],
            scratch,
        })
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn hop_size(&self) -> usize {
        self.hop_size
    }

    /// `W/2 + 1`: DC through Nyquist.
    pub fn frequency_bins(&self) -> usize {
        self.window_size / 2 + 1
    }

    pub fn frame_count(&self, total_samples: usize) -> usize {
        if total_samples < self.window_size {
            0
        } else {
            1 + (total_samples - self.window_size) / self.hop_size
        }
    }

    /// One magnitude spectrum per frame; frame `i` starts at sample `i * hop`.
    pub fn compute_magnitudes(&mut self, samples: &[f32]) -> Vec<Vec<f64>> {
        let frames = self.frame_count(samples.len());
        let bins = self.frequency_bins();
        let mut magnitudes = Vec::with_capacity(frames);

        for frame in 0..frames {
            let offset = frame * self.hop_size;
            let block = &samples[offset..offset + self.window_size];
            for ((slot, &s), &w) in self.buffer.iter_mut().zip(block).zip(&self.hann) {
                *slot = Complex::new(s as f64 * w, 0.0);
            }

            self.fft
                .process_with_scratch(&mut self.buffer, &mut self.scratch);

            magnitudes.push(self.buffer[..bins].iter().map(|c| c.norm()).collect());
        }

        magnitudes
    }
}

fn hann_window(size: usize) -> Vec<f64> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f64::consts::PI * i as f64 / (size - 1) as f64).cos()))
        .collect()
}
