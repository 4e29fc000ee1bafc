// WindowedTransform - windowed FFT magnitude spectrum
//
// This module turns a fixed-size block of signed 16-bit samples into a
// half-spectrum of magnitudes. A Hann window is applied before the FFT to
// reduce spectral leakage from the rectangular block boundary; the N-point
// forward FFT runs over the windowed real signal (imaginary input = 0) and
// only bins 0..N/2 are retained (Nyquist symmetry, the N/2 bin excluded).
//
// The transform is pure per call: same block, same output. All buffers are
// sized once at construction and reused, so the hot path never allocates.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::AnalysisError;

/// Floor added before log10 so silent bins stay finite
const DB_EPSILON: f32 = 1e-10;

/// Analysis window applied to each block before the FFT
///
/// `Rectangular` skips windowing entirely. It is a lower-fidelity fallback
/// (more leakage across bins) kept for comparison runs; a deployment picks
/// one window and holds it, never mixing the two in the same build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowFunction {
    Hann,
    Rectangular,
}

/// Output scale of the transform
///
/// Chosen once at construction and held for the life of the deployment:
/// a detector tuned for dB flux must never receive linear magnitudes and
/// vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpectralScale {
    /// Raw magnitudes `sqrt(re^2 + im^2)`, non-negative
    Linear,
    /// `20 * log10(magnitude + 1e-10)`
    Decibels,
}

/// Windowed FFT over fixed-size sample blocks
pub struct WindowedTransform {
    size: usize,
    fft: Arc<dyn Fft<f32>>,
    scale: SpectralScale,
    // Precomputed window coefficients (all ones for Rectangular)
    window: Vec<f32>,
    // Reused across calls; sized once at construction
    buffer: Vec<Complex<f32>>,
    fft_scratch: Vec<Complex<f32>>,
    output: Vec<f32>,
}

impl WindowedTransform {
    /// Create a transform for blocks of `size` samples
    ///
    /// # Arguments
    /// * `size` - FFT size in samples, must be a power of two >= 2
    /// * `window` - Analysis window applied before the FFT
    /// * `scale` - Output scale, held for the life of the transform
    pub fn new(
        size: usize,
        window: WindowFunction,
        scale: SpectralScale,
    ) -> Result<Self, AnalysisError> {
        if size < 2 || !size.is_power_of_two() {
            return Err(AnalysisError::InvalidRange {
                parameter: "transform.size",
                details: format!("must be a power of two >= 2, got {}", size),
            });
        }

        let coefficients = match window {
            WindowFunction::Hann => (0..size)
                .map(|i| {
                    0.5 * (1.0
                        - ((2.0 * std::f32::consts::PI * i as f32) / (size as f32 - 1.0)).cos())
                })
                .collect(),
            WindowFunction::Rectangular => vec![1.0; size],
        };

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(size);
        let fft_scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        Ok(Self {
            size,
            fft,
            scale,
            window: coefficients,
            buffer: vec![Complex::new(0.0, 0.0); size],
            fft_scratch,
            output: vec![0.0; size / 2],
        })
    }

    /// FFT size in samples
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of retained spectrum bins (`size / 2`)
    pub fn spectrum_len(&self) -> usize {
        self.size / 2
    }

    /// Transform one sample block into its magnitude half-spectrum
    ///
    /// # Arguments
    /// * `block` - Exactly `size` samples; anything else is a setup error
    ///
    /// # Returns
    /// The first `size / 2` bins, in the scale chosen at construction.
    /// The slice borrows the transform's reusable output buffer and is
    /// valid until the next call.
    pub fn transform(&mut self, block: &[i16]) -> Result<&[f32], AnalysisError> {
        if block.len() != self.size {
            return Err(AnalysisError::InvalidBlockSize {
                expected: self.size,
                actual: block.len(),
            });
        }

        for (dst, (&sample, &coeff)) in self
            .buffer
            .iter_mut()
            .zip(block.iter().zip(self.window.iter()))
        {
            *dst = Complex::new(sample as f32 * coeff, 0.0);
        }

        self.fft
            .process_with_scratch(&mut self.buffer, &mut self.fft_scratch);

        for (out, bin) in self.output.iter_mut().zip(self.buffer.iter()) {
            let magnitude = bin.norm();
            *out = match self.scale {
                SpectralScale::Linear => magnitude,
                SpectralScale::Decibels => 20.0 * (magnitude + DB_EPSILON).log10(),
            };
        }

        Ok(&self.output)
    }
}
