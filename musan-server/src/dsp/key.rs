//! Musical key estimation
//!
//! Krumhansl-Schmuckler: spectral power is folded into a 12-bin pitch-class
//! profile, which is correlated against the 24 rotated Krumhansl-Kessler
//! major/minor profiles. The best-correlated rotation gives tonic and mode.
//!
//! # Reference
//!
//! Krumhansl, C. L., & Kessler, E. J. (1982). Tracing the Dynamic Changes in Perceived
//! Tonal Organization in a Spatial Representation of Musical Keys. *Psychological Review*,
//! 89(4), 334-368.

use super::{AnalysisError, Stft};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pitch-class names, sharps only, C = 0
pub const PITCH_CLASS_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Krumhansl-Kessler major profile (tonic first)
const MAJOR_PROFILE: [f32; 12] = [
    6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88,
];

/// Krumhansl-Kessler minor profile (tonic first)
const MINOR_PROFILE: [f32; 12] = [
    6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17,
];

/// Frequency band folded into the pitch-class profile
const MIN_PITCH_HZ: f32 = 55.0;
const MAX_PITCH_HZ: f32 = 5000.0;

/// Musical mode (scale)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Major,
    Minor,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Major => "major",
            Mode::Minor => "minor",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key estimation result
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyEstimate {
    /// Tonic pitch class (0 = C .. 11 = B)
    pub tonic: usize,
    pub mode: Mode,
    /// Pearson correlation of the winning template, in [-1, 1]
    pub correlation: f32,
}

impl KeyEstimate {
    /// Tonic name, e.g. `"F#"`
    pub fn key_name(&self) -> &'static str {
        PITCH_CLASS_NAMES[self.tonic % 12]
    }
}

/// Key estimator (stateless after construction)
pub struct KeyEstimator {
    stft: Stft,
}

impl KeyEstimator {
    pub fn new(frame_size: usize, hop_size: usize) -> Self {
        Self {
            stft: Stft::new(frame_size, hop_size),
        }
    }

    /// Estimate key and mode of a mono signal
    pub fn estimate(&self, samples: &[f32], sample_rate: u32) -> Result<KeyEstimate, AnalysisError> {
        let profile = self.pitch_class_profile(samples, sample_rate)?;
        let estimate = match_templates(&profile).ok_or(AnalysisError::NoTonalContent)?;

        tracing::debug!(
            key = estimate.key_name(),
            mode = %estimate.mode,
            correlation = estimate.correlation,
            "Key estimated"
        );

        Ok(estimate)
    }

    /// Accumulated spectral power per pitch class
    ///
    /// Each frame is normalised to unit sum first so loud passages do not
    /// outweigh the rest of the track.
    pub fn pitch_class_profile(
        &self,
        samples: &[f32],
        sample_rate: u32,
    ) -> Result<[f32; 12], AnalysisError> {
        if sample_rate == 0 {
            return Err(AnalysisError::InvalidSampleRate(sample_rate));
        }
        if self.stft.frame_count(samples.len()) == 0 {
            return Err(AnalysisError::TooShort {
                samples: samples.len(),
                required: self.stft.frame_size(),
            });
        }

        let bin_classes = bin_pitch_classes(self.stft.frame_size(), sample_rate);
        let mut profile = [0.0f32; 12];
        let mut frame_profile = [0.0f32; 12];

        self.stft.for_each_magnitudes(samples, |mags| {
            frame_profile = [0.0; 12];
            for (mag, class) in mags.iter().zip(&bin_classes) {
                if let Some(pc) = class {
                    frame_profile[*pc] += mag * mag;
                }
            }

            let total: f32 = frame_profile.iter().sum();
            if total > f32::EPSILON {
                for (acc, v) in profile.iter_mut().zip(&frame_profile) {
                    *acc += v / total;
                }
            }
        });

        if profile.iter().sum::<f32>() <= f32::EPSILON {
            return Err(AnalysisError::NoTonalContent);
        }

        Ok(profile)
    }
}

/// Pitch class of every FFT bin inside the pitch band (nearest semitone, A4 = 440 Hz)
fn bin_pitch_classes(frame_size: usize, sample_rate: u32) -> Vec<Option<usize>> {
    let bin_hz = sample_rate as f32 / frame_size as f32;

    (0..=frame_size / 2)
        .map(|bin| {
            let freq = bin as f32 * bin_hz;
            if !(MIN_PITCH_HZ..=MAX_PITCH_HZ).contains(&freq) {
                return None;
            }
            let midi = 69.0 + 12.0 * (freq / 440.0).log2();
            Some((midi.round() as i64).rem_euclid(12) as usize)
        })
        .collect()
}

/// Best-correlated of the 24 key templates
///
/// Ties resolve to the first candidate in C..B order, major before minor.
fn match_templates(profile: &[f32; 12]) -> Option<KeyEstimate> {
    let mut best: Option<KeyEstimate> = None;

    for tonic in 0..12 {
        for (mode, template) in [(Mode::Major, &MAJOR_PROFILE), (Mode::Minor, &MINOR_PROFILE)] {
            let rotated: [f32; 12] = std::array::from_fn(|pc| template[(pc + 12 - tonic) % 12]);
            let Some(correlation) = pearson(profile, &rotated) else {
                continue;
            };

            if best.map_or(true, |b| correlation > b.correlation) {
                best = Some(KeyEstimate {
                    tonic,
                    mode,
                    correlation,
                });
            }
        }
    }

    best
}

/// Pearson correlation; `None` when either side has zero variance
fn pearson(a: &[f32; 12], b: &[f32; 12]) -> Option<f32> {
    let mean_a = a.iter().sum::<f32>() / 12.0;
    let mean_b = b.iter().sum::<f32>() / 12.0;

    let (mut num, mut var_a, mut var_b) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        num += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    let denom = (var_a * var_b).sqrt();
    if denom <= f32::EPSILON {
        None
    } else {
        Some(num / denom)
    }
}
