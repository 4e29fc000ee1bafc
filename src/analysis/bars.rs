// BarMapper - logarithmic spectrum-to-bars mapping
//
// This module converts a dB half-spectrum into a small number of display
// bars. Bar edges are spaced logarithmically across the configured
// frequency range so each bar spans a fixed frequency *ratio* rather than a
// fixed span: musical perception and frequency content are logarithmic,
// unlike the spectrum's linear bin spacing, and a linear split would waste
// most bars on the top octave.
//
// Per bar the mapper averages the dB values of the covered bins, clamps to
// [db_min, db_max], normalizes to [0, 1] and scales to [0, display_height].
// Bars narrower than one bin (common for the lowest bars at small FFT
// sizes) always cover at least one bin; the averaging denominator can
// never be zero.

use serde::Serialize;

use crate::config::BarConfig;
use crate::error::AnalysisError;

/// One bar's slice of the spectrum
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarRange {
    /// Inclusive lower edge in Hz
    pub low_hz: f32,
    /// Exclusive upper edge in Hz
    pub high_hz: f32,
    /// First covered bin
    pub bin_start: usize,
    /// One past the last covered bin; always > bin_start
    pub bin_end: usize,
}

/// Normalized bar heights for one block, ready for the display sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BarSet {
    /// One height per bar, each in `0..=display_height`
    pub heights: Vec<usize>,
    /// The height the tallest possible bar reaches
    pub display_height: usize,
}

/// Maps dB spectra onto logarithmically-spaced display bars
///
/// Stateless after construction: `map` is a pure function of its input.
pub struct BarMapper {
    ranges: Vec<BarRange>,
    db_min: f32,
    db_max: f32,
    display_height: usize,
    spectrum_len: usize,
}

impl BarMapper {
    /// Build a mapper for the given display and transform geometry
    ///
    /// # Arguments
    /// * `config` - Frequency range, bar count, dB bounds, display height
    /// * `sample_rate` - Capture sample rate in Hz
    /// * `fft_size` - Transform size; spectra must have `fft_size / 2` bins
    pub fn new(
        config: &BarConfig,
        sample_rate: u32,
        fft_size: usize,
    ) -> Result<Self, AnalysisError> {
        let nyquist = sample_rate as f32 / 2.0;
        if !(config.freq_from > 0.0 && config.freq_from < config.freq_to) {
            return Err(AnalysisError::InvalidRange {
                parameter: "bars.freq_from/freq_to",
                details: format!(
                    "need 0 < freq_from < freq_to, got {}..{}",
                    config.freq_from, config.freq_to
                ),
            });
        }
        if config.freq_to > nyquist {
            return Err(AnalysisError::InvalidRange {
                parameter: "bars.freq_to",
                details: format!("{} Hz exceeds Nyquist ({} Hz)", config.freq_to, nyquist),
            });
        }
        if config.num_bars == 0 {
            return Err(AnalysisError::InvalidRange {
                parameter: "bars.num_bars",
                details: "must be at least 1".to_string(),
            });
        }
        if config.db_min >= config.db_max {
            return Err(AnalysisError::InvalidRange {
                parameter: "bars.db_min/db_max",
                details: format!(
                    "need db_min < db_max, got {}..{}",
                    config.db_min, config.db_max
                ),
            });
        }
        if config.display_height == 0 {
            return Err(AnalysisError::InvalidRange {
                parameter: "bars.display_height",
                details: "must be at least 1".to_string(),
            });
        }

        let half = fft_size / 2;
        let ratio = config.freq_to / config.freq_from;
        let to_bin = |freq: f32| -> usize {
            let bin = (freq / sample_rate as f32 * fft_size as f32).round() as isize;
            bin.clamp(0, half as isize - 1) as usize
        };

        let mut ranges = Vec::with_capacity(config.num_bars);
        for i in 0..config.num_bars {
            let low_hz = config.freq_from * ratio.powf(i as f32 / config.num_bars as f32);
            let high_hz = config.freq_from * ratio.powf((i + 1) as f32 / config.num_bars as f32);
            let bin_start = to_bin(low_hz);
            // A bar narrower than one bin still averages that one bin
            let bin_end = to_bin(high_hz).max(bin_start + 1);
            ranges.push(BarRange {
                low_hz,
                high_hz,
                bin_start,
                bin_end,
            });
        }

        Ok(Self {
            ranges,
            db_min: config.db_min,
            db_max: config.db_max,
            display_height: config.display_height,
            spectrum_len: half,
        })
    }

    /// The bin/frequency ranges backing each bar, in display order
    pub fn ranges(&self) -> &[BarRange] {
        &self.ranges
    }

    /// Map one dB spectrum onto bar heights
    ///
    /// Deterministic: identical spectra always produce identical BarSets.
    pub fn map(&self, spectrum: &[f32]) -> Result<BarSet, AnalysisError> {
        if spectrum.len() != self.spectrum_len {
            return Err(AnalysisError::DimensionMismatch {
                expected: self.spectrum_len,
                actual: spectrum.len(),
            });
        }

        let heights = self
            .ranges
            .iter()
            .map(|range| {
                let bins = &spectrum[range.bin_start..range.bin_end];
                let avg = bins.iter().sum::<f32>() / bins.len() as f32;
                let clamped = avg.clamp(self.db_min, self.db_max);
                let normalized = (clamped - self.db_min) / (self.db_max - self.db_min);
                (normalized * self.display_height as f32).round() as usize
            })
            .collect();

        Ok(BarSet {
            heights,
            display_height: self.display_height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> BarConfig {
        BarConfig {
            freq_from: 20.0,
            freq_to: 20_000.0,
            num_bars: 24,
            db_min: 80.0,
            db_max: 130.0,
            display_height: 32,
        }
    }

    #[test]
    fn test_edges_monotonic_and_non_empty() {
        let mapper = BarMapper::new(&test_config(), 44100, 1024).unwrap();
        let ranges = mapper.ranges();
        assert_eq!(ranges.len(), 24);

        for pair in ranges.windows(2) {
            assert!(pair[0].low_hz < pair[1].low_hz);
            assert!(pair[0].bin_start <= pair[1].bin_start);
        }
        for range in ranges {
            assert!(range.low_hz < range.high_hz);
            assert!(range.bin_end > range.bin_start, "zero-width bar: {:?}", range);
            assert!(range.bin_end <= 512);
        }
    }

    #[test]
    fn test_narrow_low_bars_cover_one_bin_at_small_fft() {
        // At 256 points the lowest bars are far narrower than one bin; the
        // unguarded version of this mapping divided by zero here
        let mut config = test_config();
        config.num_bars = 32;
        let mapper = BarMapper::new(&config, 44100, 256).unwrap();

        for range in mapper.ranges() {
            assert!(range.bin_end > range.bin_start);
        }

        // And mapping still produces a full BarSet
        let spectrum = vec![100.0f32; 128];
        let bars = mapper.map(&spectrum).unwrap();
        assert_eq!(bars.heights.len(), 32);
    }

    #[test]
    fn test_map_is_deterministic() {
        let mapper = BarMapper::new(&test_config(), 44100, 1024).unwrap();
        let spectrum: Vec<f32> = (0..512).map(|i| 80.0 + (i % 50) as f32).collect();
        assert_eq!(mapper.map(&spectrum).unwrap(), mapper.map(&spectrum).unwrap());
    }

    #[test]
    fn test_heights_clamped_for_extreme_db() {
        let mapper = BarMapper::new(&test_config(), 44100, 1024).unwrap();

        let blazing = vec![500.0f32; 512];
        let bars = mapper.map(&blazing).unwrap();
        assert!(bars.heights.iter().all(|&h| h == 32));

        let silent = vec![-200.0f32; 512];
        let bars = mapper.map(&silent).unwrap();
        assert!(bars.heights.iter().all(|&h| h == 0));
    }

    #[test]
    fn test_midpoint_db_maps_to_half_height() {
        // dbMin=80, dbMax=130: a bar averaging exactly 105 dB normalizes to
        // (105-80)/(130-80) = 0.5 of display height
        let mapper = BarMapper::new(&test_config(), 44100, 1024).unwrap();
        let spectrum = vec![105.0f32; 512];
        let bars = mapper.map(&spectrum).unwrap();
        assert!(bars.heights.iter().all(|&h| h == 16));
    }

    #[test]
    fn test_energy_at_bin_23_peaks_in_covering_bar() {
        let mapper = BarMapper::new(&test_config(), 44100, 1024).unwrap();

        // Quiet floor with a hot bin at 23 (1 kHz at 44100/1024)
        let mut spectrum = vec![80.0f32; 512];
        spectrum[23] = 130.0;

        let covering_bar = mapper
            .ranges()
            .iter()
            .position(|r| r.bin_start <= 23 && 23 < r.bin_end)
            .expect("some bar must cover bin 23");

        let bars = mapper.map(&spectrum).unwrap();
        let max_bar = bars
            .heights
            .iter()
            .enumerate()
            .max_by_key(|(_, &h)| h)
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(max_bar, covering_bar);
    }

    #[test]
    fn test_rejects_wrong_spectrum_length() {
        let mapper = BarMapper::new(&test_config(), 44100, 1024).unwrap();
        let spectrum = vec![100.0f32; 256];
        assert!(matches!(
            mapper.map(&spectrum),
            Err(AnalysisError::DimensionMismatch {
                expected: 512,
                actual: 256
            })
        ));
    }

    #[test]
    fn test_rejects_invalid_ranges() {
        let mut config = test_config();
        config.freq_from = 0.0;
        assert!(BarMapper::new(&config, 44100, 1024).is_err());

        let mut config = test_config();
        config.freq_to = 30_000.0;
        assert!(BarMapper::new(&config, 44100, 1024).is_err());

        let mut config = test_config();
        config.db_min = 130.0;
        config.db_max = 80.0;
        assert!(BarMapper::new(&config, 44100, 1024).is_err());
    }
}
