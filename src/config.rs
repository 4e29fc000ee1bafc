//! Configuration for the analysis pipeline
//!
//! This module provides runtime configuration loading from JSON files,
//! enabling parameter tuning without recompilation. Frequency ranges, dB
//! normalization bounds, and onset detection parameters vary per venue and
//! microphone gain, so all of them live here rather than in code.
//!
//! File loading is forgiving (a missing or unparsable file logs a warning
//! and falls back to defaults), but range validation is not: `validate()`
//! fails fast on any out-of-range value, since wrong bar or flux math
//! composed with wrong ranges produces visually-wrong output that is hard
//! to diagnose after the fact.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::analysis::transform::WindowFunction;
use crate::error::AnalysisError;
use crate::pipeline::RenderMode;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub transform: TransformConfig,
    pub bars: BarConfig,
    pub onset: OnsetConfig,
    /// Which outputs the pipeline produces per block
    pub mode: RenderMode,
    /// Log a pipeline summary every N blocks (0 disables)
    pub log_every_n_blocks: u64,
}

/// Transform stage parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformConfig {
    /// FFT size in samples (must be a power of two)
    pub size: usize,
    /// Capture sample rate in Hz
    pub sample_rate: u32,
    /// Analysis window applied before the FFT
    pub window: WindowFunction,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            // 44100 / 1024 = 43.07 Hz per bin, ~43 blocks per second
            size: 1024,
            sample_rate: 44100,
            window: WindowFunction::Hann,
        }
    }
}

/// Spectrum-to-bars mapping parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BarConfig {
    /// Lower edge of the displayed frequency range in Hz
    pub freq_from: f32,
    /// Upper edge of the displayed frequency range in Hz
    pub freq_to: f32,
    /// Number of display bars
    pub num_bars: usize,
    /// dB value mapped to bar height 0
    pub db_min: f32,
    /// dB value mapped to full bar height
    pub db_max: f32,
    /// Display height in pixels (bar heights land in 0..=display_height)
    pub display_height: usize,
}

impl Default for BarConfig {
    fn default() -> Self {
        Self {
            freq_from: 20.0,
            freq_to: 20_000.0,
            num_bars: 24,
            // i16-scale magnitudes land around 80-140 dB; re-tune per venue
            db_min: 80.0,
            db_max: 130.0,
            display_height: 32,
        }
    }
}

/// Onset detection parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnsetConfig {
    /// Lower edge of the flux bin range in Hz
    pub low_freq: f32,
    /// Upper edge of the flux bin range in Hz
    pub high_freq: f32,
    /// Flux history capacity in blocks (~1 second at the block rate)
    pub history_size: usize,
    /// Beat fires when flux exceeds the trailing average by this much,
    /// in the same dB units the spectrum uses
    pub flux_threshold: f32,
}

impl Default for OnsetConfig {
    fn default() -> Self {
        Self {
            // Kick-drum band; widen for broadband onset detection
            low_freq: 20.0,
            high_freq: 200.0,
            history_size: 43,
            // Starting point only, re-tune against the deployed mic gain
            flux_threshold: 6.0,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            transform: TransformConfig::default(),
            bars: BarConfig::default(),
            onset: OnsetConfig::default(),
            mode: RenderMode::Bars,
            log_every_n_blocks: 256,
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// Loaded configuration, or defaults if the file is missing or invalid.
    /// The result has not been range-checked; call `validate()` before
    /// building a pipeline from it.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Range-check every parameter, failing fast on the first violation
    ///
    /// The checks mirror what the component constructors enforce, so a
    /// validated config always builds a pipeline.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        let t = &self.transform;
        if t.size < 2 || !t.size.is_power_of_two() {
            return Err(AnalysisError::InvalidRange {
                parameter: "transform.size",
                details: format!("must be a power of two >= 2, got {}", t.size),
            });
        }
        if t.sample_rate == 0 {
            return Err(AnalysisError::InvalidRange {
                parameter: "transform.sample_rate",
                details: "must be positive".to_string(),
            });
        }

        let nyquist = t.sample_rate as f32 / 2.0;
        let b = &self.bars;
        if !(b.freq_from > 0.0 && b.freq_from < b.freq_to && b.freq_to <= nyquist) {
            return Err(AnalysisError::InvalidRange {
                parameter: "bars.freq_from/freq_to",
                details: format!(
                    "need 0 < freq_from < freq_to <= {} Hz, got {}..{}",
                    nyquist, b.freq_from, b.freq_to
                ),
            });
        }
        if b.num_bars == 0 {
            return Err(AnalysisError::InvalidRange {
                parameter: "bars.num_bars",
                details: "must be at least 1".to_string(),
            });
        }
        if b.db_min >= b.db_max {
            return Err(AnalysisError::InvalidRange {
                parameter: "bars.db_min/db_max",
                details: format!("need db_min < db_max, got {}..{}", b.db_min, b.db_max),
            });
        }
        if b.display_height == 0 {
            return Err(AnalysisError::InvalidRange {
                parameter: "bars.display_height",
                details: "must be at least 1".to_string(),
            });
        }

        let o = &self.onset;
        if !(o.low_freq >= 0.0 && o.low_freq < o.high_freq && o.high_freq <= nyquist) {
            return Err(AnalysisError::InvalidRange {
                parameter: "onset.low_freq/high_freq",
                details: format!(
                    "need 0 <= low_freq < high_freq <= {} Hz, got {}..{}",
                    nyquist, o.low_freq, o.high_freq
                ),
            });
        }
        if o.history_size == 0 {
            return Err(AnalysisError::InvalidRange {
                parameter: "onset.history_size",
                details: "must be at least 1".to_string(),
            });
        }
        if o.flux_threshold < 0.0 {
            return Err(AnalysisError::InvalidRange {
                parameter: "onset.flux_threshold",
                details: format!("must be non-negative, got {}", o.flux_threshold),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.transform.size, 1024);
        assert_eq!(config.bars.num_bars, 24);
        assert_eq!(config.onset.history_size, 43);
        config.validate().expect("defaults must validate");
    }

    #[test]
    fn test_json_roundtrip() {
        let config = AppConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.transform.size, config.transform.size);
        assert_eq!(parsed.bars.db_min, config.bars.db_min);
        assert_eq!(parsed.onset.flux_threshold, config.onset.flux_threshold);
    }

    #[test]
    fn test_validate_rejects_non_power_of_two_size() {
        let mut config = AppConfig::default();
        config.transform.size = 1000;
        assert!(matches!(
            config.validate(),
            Err(AnalysisError::InvalidRange { parameter, .. }) if parameter == "transform.size"
        ));
    }

    #[test]
    fn test_validate_rejects_inverted_freq_range() {
        let mut config = AppConfig::default();
        config.bars.freq_from = 5000.0;
        config.bars.freq_to = 100.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_freq_beyond_nyquist() {
        let mut config = AppConfig::default();
        config.bars.freq_to = 30_000.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_db_range() {
        let mut config = AppConfig::default();
        config.bars.db_min = 130.0;
        config.bars.db_max = 80.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_history() {
        let mut config = AppConfig::default();
        config.onset.history_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file_falls_back_to_defaults() {
        let config = AppConfig::load_from_file("/nonexistent/led_spectrum.json");
        assert_eq!(config.transform.size, AppConfig::default().transform.size);
    }
}
