//! Feature analysis engine
//!
//! Built once at startup and shared read-only by every request. Each call
//! runs key/mode estimation and tempo estimation exactly once over the same
//! samples and returns their outputs unmodified.

use musan_common::AnalysisConfig;
use tracing::debug;

use crate::dsp::{AnalysisError, KeyEstimator, TempoEstimator};
use crate::models::AnalysisResult;
use crate::services::audio_decoder::DecodedAudio;

/// Key/mode and tempo analyzer
pub struct FeatureAnalyzer {
    key: KeyEstimator,
    tempo: TempoEstimator,
    silence_threshold: f32,
}

impl FeatureAnalyzer {
    /// Plan FFTs and set up estimators
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            key: KeyEstimator::new(config.key_frame_size, config.key_hop_size),
            tempo: TempoEstimator::new(
                config.tempo_frame_size,
                config.tempo_hop_size,
                config.min_bpm,
                config.max_bpm,
            ),
            silence_threshold: config.silence_threshold,
        }
    }

    /// Analyze decoded audio
    pub fn analyze(&self, audio: &DecodedAudio) -> Result<AnalysisResult, AnalysisError> {
        self.analyze_samples(&audio.samples, audio.sample_rate)
    }

    /// Analyze a raw sample sequence
    ///
    /// # Errors
    /// Empty, non-finite or silent input, a zero sample rate, or input too
    /// short for the analysis windows.
    pub fn analyze_samples(
        &self,
        samples: &[f32],
        sample_rate: u32,
    ) -> Result<AnalysisResult, AnalysisError> {
        self.check_input(samples, sample_rate)?;

        let key = self.key.estimate(samples, sample_rate)?;
        let bpm = self.tempo.estimate(samples, sample_rate)?;

        debug!(
            samples = samples.len(),
            sample_rate,
            key = key.key_name(),
            mode = %key.mode,
            bpm,
            "Feature analysis complete"
        );

        Ok(AnalysisResult {
            key: key.key_name().to_string(),
            mode: key.mode,
            bpm,
        })
    }

    fn check_input(&self, samples: &[f32], sample_rate: u32) -> Result<(), AnalysisError> {
        if samples.is_empty() {
            return Err(AnalysisError::Empty);
        }
        if sample_rate == 0 {
            return Err(AnalysisError::InvalidSampleRate(sample_rate));
        }

        let mut peak = 0.0f32;
        for s in samples {
            if !s.is_finite() {
                return Err(AnalysisError::NonFinite);
            }
            peak = peak.max(s.abs());
        }

        if peak < self.silence_threshold {
            return Err(AnalysisError::Silent { peak });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::Mode;

    const SR: u32 = 44100;

    fn analyzer() -> FeatureAnalyzer {
        FeatureAnalyzer::new(&AnalysisConfig::default())
    }

    fn sine(freq: f32, seconds: f32) -> Vec<f32> {
        (0..(seconds * SR as f32) as usize)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * freq * i as f32 / SR as f32).sin())
            .collect()
    }

    #[test]
    fn test_sine_gives_key_and_positive_bpm() {
        let result = analyzer().analyze_samples(&sine(440.0, 5.0), SR).unwrap();

        assert_eq!(result.key, "A");
        assert!(matches!(result.mode, Mode::Major | Mode::Minor));
        assert!(result.bpm > 0.0);
    }

    #[test]
    fn test_same_input_same_output() {
        let samples = sine(330.0, 4.0);
        let engine = analyzer();
        assert_eq!(
            engine.analyze_samples(&samples, SR).unwrap(),
            engine.analyze_samples(&samples, SR).unwrap()
        );
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(analyzer().analyze_samples(&[], SR), Err(AnalysisError::Empty));
    }

    #[test]
    fn test_silence_rejected() {
        let err = analyzer().analyze_samples(&vec![0.0; SR as usize * 2], SR).unwrap_err();
        assert!(matches!(err, AnalysisError::Silent { .. }));
    }

    #[test]
    fn test_non_finite_rejected() {
        let mut samples = sine(440.0, 1.0);
        samples[100] = f32::NAN;
        assert_eq!(analyzer().analyze_samples(&samples, SR), Err(AnalysisError::NonFinite));
    }

    #[test]
    fn test_short_input_rejected() {
        let err = analyzer().analyze_samples(&sine(440.0, 0.01), SR).unwrap_err();
        assert!(matches!(err, AnalysisError::TooShort { .. }));
    }

    #[test]
    fn test_sub_second_clip_is_analyzed() {
        let result = analyzer().analyze_samples(&sine(440.0, 0.3), SR).unwrap();

        assert_eq!(result.key, "A");
        assert!(result.bpm > 0.0);
    }

    #[test]
    fn test_engine_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<FeatureAnalyzer>();
    }
}
