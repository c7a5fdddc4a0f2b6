//! Signal analysis primitives
//!
//! Short-time spectra feed two independent estimators:
//! - [`key::KeyEstimator`]: pitch-class profile matched against Krumhansl-Kessler templates
//! - [`tempo::TempoEstimator`]: spectral-flux onset strength, autocorrelated
//!
//! Everything here is a pure function of `(samples, sample_rate)`; the planned
//! FFTs are read-only after construction and shared across threads.

pub mod key;
pub mod tempo;

pub use key::{KeyEstimate, KeyEstimator, Mode};
pub use tempo::TempoEstimator;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;
use thiserror::Error;

/// Analysis failures (degenerate input)
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    /// Zero-length sample sequence
    #[error("Audio sample sequence is empty")]
    Empty,

    /// Not enough samples for even one analysis window
    #[error("Audio too short for analysis: {samples} samples, need at least {required}")]
    TooShort { samples: usize, required: usize },

    /// NaN or infinite sample values
    #[error("Audio contains non-finite sample values")]
    NonFinite,

    /// Peak amplitude under the silence threshold
    #[error("Audio is silent (peak amplitude {peak:.2e})")]
    Silent { peak: f32 },

    /// Sample rate of zero
    #[error("Invalid sample rate: {0} Hz")]
    InvalidSampleRate(u32),

    /// No spectral energy inside the pitch band
    #[error("No tonal content found in audio")]
    NoTonalContent,
}

/// Short-time Fourier transform with a fixed Hann window
pub struct Stft {
    frame_size: usize,
    hop_size: usize,
    window: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
}

impl Stft {
    pub fn new(frame_size: usize, hop_size: usize) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(frame_size);

        Self {
            frame_size,
            hop_size,
            window: hann_window(frame_size),
            fft,
        }
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn hop_size(&self) -> usize {
        self.hop_size
    }

    /// Number of non-negative frequency bins per spectrum
    pub fn bin_count(&self) -> usize {
        self.frame_size / 2 + 1
    }

    /// Number of full frames that fit in `len` samples
    pub fn frame_count(&self, len: usize) -> usize {
        if len < self.frame_size {
            0
        } else {
            (len - self.frame_size) / self.hop_size + 1
        }
    }

    /// Call `f` with the magnitude spectrum of every full frame, in order
    pub fn for_each_magnitudes<F>(&self, samples: &[f32], mut f: F)
    where
        F: FnMut(&[f32]),
    {
        let bins = self.bin_count();
        let mut buffer = vec![Complex::new(0.0f32, 0.0); self.frame_size];
        let mut scratch = vec![Complex::new(0.0f32, 0.0); self.fft.get_inplace_scratch_len()];
        let mut magnitudes = vec![0.0f32; bins];

        for frame_idx in 0..self.frame_count(samples.len()) {
            let start = frame_idx * self.hop_size;
            let frame = &samples[start..start + self.frame_size];

            for ((dst, &s), &w) in buffer.iter_mut().zip(frame).zip(&self.window) {
                *dst = Complex::new(s * w, 0.0);
            }

            self.fft.process_with_scratch(&mut buffer, &mut scratch);

            for (m, c) in magnitudes.iter_mut().zip(&buffer[..bins]) {
                *m = c.norm();
            }

            f(&magnitudes);
        }
    }
}

/// Periodic Hann window
pub fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            let phase = 2.0 * std::f32::consts::PI * i as f32 / size as f32;
            0.5 * (1.0 - phase.cos())
        })
        .collect()
}

/// Autocorrelation via FFT (Wiener-Khinchin), lags `0..signal.len()`
pub fn autocorrelation(signal: &[f32]) -> Vec<f32> {
    if signal.is_empty() {
        return Vec::new();
    }

    // Zero-pad to avoid circular wrap-around
    let fft_len = (signal.len() * 2).next_power_of_two();

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(fft_len);
    let ifft = planner.plan_fft_inverse(fft_len);

    let mut buffer: Vec<Complex<f32>> = signal
        .iter()
        .map(|&s| Complex::new(s, 0.0))
        .chain(std::iter::repeat(Complex::new(0.0, 0.0)))
        .take(fft_len)
        .collect();

    fft.process(&mut buffer);
    for c in buffer.iter_mut() {
        *c = Complex::new(c.norm_sqr(), 0.0);
    }
    ifft.process(&mut buffer);

    let scale = 1.0 / fft_len as f32;
    buffer
        .iter()
        .take(signal.len())
        .map(|c| c.re * scale)
        .collect()
}
