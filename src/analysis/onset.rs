// OnsetDetector - spectral flux beat detection
//
// This module flags beats/transients by watching for sudden energy rises in
// the spectrum. Per block:
//
// 1. flux = sum of max(0, cur[i] - prev[i]) over the configured bin range
//    (positive-only differences capture energy increases, i.e. onsets, and
//    deliberately ignore decays)
// 2. prev := cur, full replacement every call - the detector must track
//    decay as well as growth for the next comparison
// 3. push flux into the rolling history, evicting the oldest entry at
//    capacity (the history spans roughly one second at the block rate)
// 4. beat iff flux > mean(history) + threshold
//
// The detector is the only stateful stage of the pipeline. It owns the
// previous spectrum and the flux history exclusively; construct one
// instance per independent audio stream.
//
// Warm-up: while the history holds fewer than `history_size` entries the
// average is computed over the entries present, so beats can fire earlier
// and easier than in steady state. Accepted behavior, not a bug.

use std::collections::VecDeque;

use crate::config::OnsetConfig;
use crate::error::AnalysisError;

/// Spectral-flux beat detector, stateful across blocks
pub struct OnsetDetector {
    /// None until the first spectrum arrives (Idle); Some thereafter (Armed)
    prev_spectrum: Option<Vec<f32>>,
    flux_history: VecDeque<f32>,
    history_size: usize,
    threshold: f32,
    low_bin: usize,
    high_bin: usize,
    spectrum_len: usize,
}

impl OnsetDetector {
    /// Build a detector for the given transform geometry
    ///
    /// # Arguments
    /// * `config` - Flux band in Hz, history capacity, beat threshold.
    ///   Callers wanting only low-end (kick-drum) detection pass a narrow
    ///   low-frequency band; there is no other low-frequency guard.
    /// * `sample_rate` - Capture sample rate in Hz
    /// * `fft_size` - Transform size; spectra must have `fft_size / 2` bins
    pub fn new(
        config: &OnsetConfig,
        sample_rate: u32,
        fft_size: usize,
    ) -> Result<Self, AnalysisError> {
        let nyquist = sample_rate as f32 / 2.0;
        if !(config.low_freq >= 0.0 && config.low_freq < config.high_freq) {
            return Err(AnalysisError::InvalidRange {
                parameter: "onset.low_freq/high_freq",
                details: format!(
                    "need 0 <= low_freq < high_freq, got {}..{}",
                    config.low_freq, config.high_freq
                ),
            });
        }
        if config.high_freq > nyquist {
            return Err(AnalysisError::InvalidRange {
                parameter: "onset.high_freq",
                details: format!("{} Hz exceeds Nyquist ({} Hz)", config.high_freq, nyquist),
            });
        }
        if config.history_size == 0 {
            return Err(AnalysisError::InvalidRange {
                parameter: "onset.history_size",
                details: "must be at least 1".to_string(),
            });
        }
        if config.flux_threshold < 0.0 {
            return Err(AnalysisError::InvalidRange {
                parameter: "onset.flux_threshold",
                details: format!("must be non-negative, got {}", config.flux_threshold),
            });
        }

        let half = fft_size / 2;
        let to_bin = |freq: f32| -> usize {
            let bin = (freq / sample_rate as f32 * fft_size as f32).round() as isize;
            bin.clamp(0, half as isize - 1) as usize
        };
        let low_bin = to_bin(config.low_freq);
        let high_bin = to_bin(config.high_freq).max(low_bin + 1);

        Ok(Self {
            prev_spectrum: None,
            flux_history: VecDeque::with_capacity(config.history_size),
            history_size: config.history_size,
            threshold: config.flux_threshold,
            low_bin,
            high_bin,
            spectrum_len: half,
        })
    }

    /// The `[low_bin, high_bin)` range flux is summed over
    pub fn bin_range(&self) -> (usize, usize) {
        (self.low_bin, self.high_bin)
    }

    /// The most recent flux value, 0.0 before the first block
    ///
    /// Useful for real-time threshold tuning against a live signal.
    pub fn last_flux(&self) -> f32 {
        self.flux_history.back().copied().unwrap_or(0.0)
    }

    /// The trailing average the next flux value will be compared against
    pub fn trailing_average(&self) -> f32 {
        if self.flux_history.is_empty() {
            0.0
        } else {
            self.flux_history.iter().sum::<f32>() / self.flux_history.len() as f32
        }
    }

    /// Process one spectrum, reporting whether it contains a beat
    ///
    /// The capture/FFT configuration must not change mid-run: a spectrum
    /// whose length differs from the first one fails with
    /// `DimensionMismatch`.
    pub fn detect(&mut self, spectrum: &[f32]) -> Result<bool, AnalysisError> {
        if spectrum.len() != self.spectrum_len {
            return Err(AnalysisError::DimensionMismatch {
                expected: self.spectrum_len,
                actual: spectrum.len(),
            });
        }

        // Idle -> Armed: compare the first spectrum against silence
        let prev = self
            .prev_spectrum
            .get_or_insert_with(|| vec![0.0; spectrum.len()]);

        let flux: f32 = spectrum[self.low_bin..self.high_bin]
            .iter()
            .zip(prev[self.low_bin..self.high_bin].iter())
            .map(|(cur, old)| (cur - old).max(0.0))
            .sum();

        // Full replacement every call, beat or not
        prev.copy_from_slice(spectrum);

        if self.flux_history.len() == self.history_size {
            self.flux_history.pop_front();
        }
        self.flux_history.push_back(flux);

        let avg = self.flux_history.iter().sum::<f32>() / self.flux_history.len() as f32;
        Ok(flux > avg + self.threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector(history_size: usize, threshold: f32) -> OnsetDetector {
        let config = OnsetConfig {
            low_freq: 0.0,
            high_freq: 22_050.0,
            history_size,
            flux_threshold: threshold,
        };
        OnsetDetector::new(&config, 44100, 1024).unwrap()
    }

    #[test]
    fn test_silence_never_beats() {
        let mut det = detector(43, 0.0);
        let silence = vec![0.0f32; 512];
        for _ in 0..200 {
            assert!(!det.detect(&silence).unwrap());
        }
        assert_eq!(det.last_flux(), 0.0);
        assert_eq!(det.trailing_average(), 0.0);
    }

    #[test]
    fn test_sharp_rise_beats_once() {
        let mut det = detector(43, 1.0);
        let quiet = vec![0.0f32; 512];
        for _ in 0..43 {
            assert!(!det.detect(&quiet).unwrap());
        }

        // Every bin jumps: flux = 512 * 10, far above the zero average
        let loud = vec![10.0f32; 512];
        assert!(det.detect(&loud).unwrap());

        // Identical spectrum again: prev == cur, flux drops back to zero
        assert!(!det.detect(&loud).unwrap());
    }

    #[test]
    fn test_prev_tracks_decay() {
        let mut det = detector(43, 1.0);
        let loud = vec![10.0f32; 512];
        let quiet = vec![0.0f32; 512];

        det.detect(&loud).unwrap();
        // Decay produces zero flux, not a beat
        assert!(!det.detect(&quiet).unwrap());
        // And the decayed spectrum became the new baseline, so the next
        // rise is measured from silence again
        assert!(det.detect(&loud).unwrap());
    }

    #[test]
    fn test_flux_restricted_to_bin_range() {
        let config = OnsetConfig {
            low_freq: 20.0,
            high_freq: 200.0,
            history_size: 43,
            flux_threshold: 0.5,
        };
        let mut det = OnsetDetector::new(&config, 44100, 1024).unwrap();
        let (low_bin, high_bin) = det.bin_range();
        assert!(low_bin < high_bin);
        assert!(high_bin <= 512);

        // Energy entirely above the watched band is invisible to flux
        let mut treble = vec![0.0f32; 512];
        for bin in treble.iter_mut().skip(high_bin) {
            *bin = 100.0;
        }
        det.detect(&vec![0.0f32; 512]).unwrap();
        assert!(!det.detect(&treble).unwrap());
        assert_eq!(det.last_flux(), 0.0);
    }

    #[test]
    fn test_history_eviction_is_fifo() {
        let mut det = detector(4, 0.0);

        // One huge spike, then silence: the spike dominates the average
        // until exactly history_size further blocks push it out
        let spike = vec![100.0f32; 512];
        let silence = vec![0.0f32; 512];

        det.detect(&spike).unwrap();
        assert!(det.trailing_average() > 0.0);

        for _ in 0..3 {
            det.detect(&silence).unwrap();
            assert!(det.trailing_average() > 0.0, "spike still inside window");
        }

        // history_size + 1 = 5th block evicts the spike
        det.detect(&silence).unwrap();
        assert_eq!(det.trailing_average(), 0.0);
    }

    #[test]
    fn test_warm_up_average_over_present_entries() {
        let mut det = detector(100, 0.0);
        let silence = vec![0.0f32; 512];
        let step = vec![4.0f32; 512];

        det.detect(&silence).unwrap();
        det.detect(&step).unwrap();
        // Two entries: [0, 2048]; average is half the last flux
        assert_eq!(det.last_flux(), 2048.0);
        assert_eq!(det.trailing_average(), 1024.0);
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let mut det = detector(43, 0.0);
        det.detect(&vec![0.0f32; 512]).unwrap();
        assert!(matches!(
            det.detect(&vec![0.0f32; 256]),
            Err(AnalysisError::DimensionMismatch {
                expected: 512,
                actual: 256
            })
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let bad = OnsetConfig {
            low_freq: 200.0,
            high_freq: 20.0,
            history_size: 43,
            flux_threshold: 0.5,
        };
        assert!(OnsetDetector::new(&bad, 44100, 1024).is_err());

        let bad = OnsetConfig {
            low_freq: 20.0,
            high_freq: 200.0,
            history_size: 0,
            flux_threshold: 0.5,
        };
        assert!(OnsetDetector::new(&bad, 44100, 1024).is_err());
    }
}
