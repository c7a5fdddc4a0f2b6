//! Tempo estimation
//!
//! 1. Onset strength: half-wave rectified log-magnitude spectral flux
//! 2. Autocorrelation of the mean-removed onset strength
//! 3. Strongest lag within the BPM range, weighted by a log-normal tempo prior
//! 4. Parabolic refinement of the winning lag

use super::{autocorrelation, AnalysisError, Stft};

/// Centre of the tempo prior
pub const PRIOR_CENTER_BPM: f32 = 120.0;

/// Width of the tempo prior in octaves
const PRIOR_WIDTH_OCTAVES: f32 = 1.0;

/// Log compression gain applied to magnitudes before differencing
const LOG_COMPRESSION: f32 = 100.0;

/// Tempo estimator (stateless after construction)
pub struct TempoEstimator {
    stft: Stft,
    min_bpm: f32,
    max_bpm: f32,
}

impl TempoEstimator {
    pub fn new(frame_size: usize, hop_size: usize, min_bpm: f32, max_bpm: f32) -> Self {
        Self {
            stft: Stft::new(frame_size, hop_size),
            min_bpm,
            max_bpm,
        }
    }

    /// Estimate tempo in beats per minute
    ///
    /// Always positive and within `[min_bpm, max_bpm]`. An onset envelope with
    /// no periodicity at all, or one shorter than the slowest beat period
    /// allowed by `max_bpm`, yields the prior centre. Only input shorter than
    /// one frame is an error.
    pub fn estimate(&self, samples: &[f32], sample_rate: u32) -> Result<f32, AnalysisError> {
        if sample_rate == 0 {
            return Err(AnalysisError::InvalidSampleRate(sample_rate));
        }

        let frame_rate = sample_rate as f32 / self.stft.hop_size() as f32;
        let min_lag = ((60.0 * frame_rate / self.max_bpm).floor() as usize).max(1);
        let wanted_max_lag = (60.0 * frame_rate / self.min_bpm).ceil() as usize;

        let odf = self.onset_strength(samples);
        if odf.is_empty() {
            return Err(AnalysisError::TooShort {
                samples: samples.len(),
                required: self.stft.frame_size(),
            });
        }

        // Need at least one lag past min_lag, plus a neighbour for refinement
        if odf.len() < min_lag + 3 {
            tracing::debug!(
                frames = odf.len(),
                required = min_lag + 3,
                "Clip too short for a full beat period, using prior tempo"
            );
            return Ok(self.prior_bpm());
        }
        let max_lag = wanted_max_lag.min(odf.len() - 2);

        let mean = odf.iter().sum::<f32>() / odf.len() as f32;
        let centred: Vec<f32> = odf.iter().map(|v| v - mean).collect();
        let acf = autocorrelation(&centred);

        let energy = acf[0];
        if !energy.is_finite() || energy <= f32::EPSILON {
            tracing::debug!("Onset envelope is flat, using prior tempo");
            return Ok(self.prior_bpm());
        }

        let mut best: Option<(usize, f32)> = None;
        for lag in min_lag..=max_lag {
            let normalised = acf[lag] / energy;
            if normalised <= 0.0 {
                continue;
            }
            let score = normalised * tempo_prior(lag_to_bpm(lag as f32, frame_rate));
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((lag, score));
            }
        }

        let Some((lag, score)) = best else {
            tracing::debug!("No positive autocorrelation in tempo range, using prior tempo");
            return Ok(self.prior_bpm());
        };

        let refined = refine_peak(&acf, lag);
        let bpm = lag_to_bpm(refined, frame_rate).clamp(self.min_bpm, self.max_bpm);

        tracing::debug!(lag, refined_lag = refined, score, bpm, "Tempo estimated");

        Ok(bpm)
    }

    fn prior_bpm(&self) -> f32 {
        PRIOR_CENTER_BPM.clamp(self.min_bpm, self.max_bpm)
    }

    /// Spectral-flux onset detection function, one value per frame
    pub fn onset_strength(&self, samples: &[f32]) -> Vec<f32> {
        let mut odf = Vec::with_capacity(self.stft.frame_count(samples.len()));
        let mut previous: Option<Vec<f32>> = None;

        self.stft.for_each_magnitudes(samples, |mags| {
            let compressed: Vec<f32> = mags.iter().map(|m| (1.0 + LOG_COMPRESSION * m).ln()).collect();

            let flux = match &previous {
                Some(prev) => compressed
                    .iter()
                    .zip(prev)
                    .map(|(cur, prev)| (cur - prev).max(0.0))
                    .sum(),
                None => 0.0,
            };

            odf.push(flux);
            previous = Some(compressed);
        });

        odf
    }
}

fn lag_to_bpm(lag: f32, frame_rate: f32) -> f32 {
    60.0 * frame_rate / lag
}

/// Log-normal tempo preference centred on [`PRIOR_CENTER_BPM`]
fn tempo_prior(bpm: f32) -> f32 {
    let octaves = (bpm / PRIOR_CENTER_BPM).log2() / PRIOR_WIDTH_OCTAVES;
    (-0.5 * octaves * octaves).exp()
}

/// Fractional peak position by parabolic interpolation around `lag`
fn refine_peak(acf: &[f32], lag: usize) -> f32 {
    if lag == 0 || lag + 1 >= acf.len() {
        return lag as f32;
    }

    let (left, centre, right) = (acf[lag - 1], acf[lag], acf[lag + 1]);
    let denom = left - 2.0 * centre + right;
    if denom.abs() <= f32::EPSILON {
        return lag as f32;
    }

    let delta = (0.5 * (left - right) / denom).clamp(-0.5, 0.5);
    lag as f32 + delta
}
