//! Fixture captures for tests and the CLI harness.
//!
//! Real deployments read blocks from a capture device; development and CI
//! read them from WAV files or synthesize them. Both paths go through the
//! same `CaptureSource` trait the pipeline consumes, so a fixture run
//! exercises exactly the code a live run does.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::audio::{CaptureSource, SampleBlock};
use crate::error::CaptureError;

/// One block of a sine at `freq_hz`, phase starting at zero
///
/// `amplitude` is a fraction of full scale (`1.0` = i16::MAX).
pub fn sine_block(size: usize, sample_rate: u32, freq_hz: f64, amplitude: f64) -> SampleBlock {
    let step = 2.0 * std::f64::consts::PI * freq_hz / sample_rate as f64;
    (0..size)
        .map(|i| ((step * i as f64).sin() * amplitude * i16::MAX as f64) as i16)
        .collect()
}

/// One all-zero block
pub fn silence_block(size: usize) -> SampleBlock {
    vec![0; size]
}

/// Endless (or block-limited) phase-continuous sine capture
pub struct SineCapture {
    phase: f64,
    step: f64,
    amplitude: f64,
    remaining: Option<usize>,
}

impl SineCapture {
    /// # Arguments
    /// * `freq_hz` - Tone frequency
    /// * `sample_rate` - Samples per second
    /// * `amplitude` - Fraction of full scale, `1.0` = i16::MAX
    pub fn new(freq_hz: f64, sample_rate: u32, amplitude: f64) -> Self {
        Self {
            phase: 0.0,
            step: 2.0 * std::f64::consts::PI * freq_hz / sample_rate as f64,
            amplitude,
            remaining: None,
        }
    }

    /// Close the stream after `blocks` reads instead of running forever
    pub fn with_block_limit(mut self, blocks: usize) -> Self {
        self.remaining = Some(blocks);
        self
    }
}

impl CaptureSource for SineCapture {
    fn read_block(&mut self, out: &mut [i16]) -> Result<(), CaptureError> {
        if let Some(remaining) = &mut self.remaining {
            if *remaining == 0 {
                return Err(CaptureError::StreamClosed);
            }
            *remaining -= 1;
        }

        for sample in out.iter_mut() {
            *sample = (self.phase.sin() * self.amplitude * i16::MAX as f64) as i16;
            self.phase += self.step;
        }
        // Keep the accumulator small over long runs
        self.phase %= 2.0 * std::f64::consts::PI;
        Ok(())
    }
}

/// Block-by-block capture over a 16-bit PCM WAV file
///
/// Multi-channel files are folded to mono by taking the first channel.
/// The final ragged tail (fewer samples than one block) surfaces as
/// `ShortRead`, matching what a device underrun looks like; an exact
/// end-of-file is a clean `StreamClosed`.
pub struct WavCapture {
    reader: hound::WavReader<BufReader<File>>,
    channels: usize,
    sample_rate: u32,
}

impl WavCapture {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CaptureError> {
        let reader = hound::WavReader::open(&path).map_err(|err| CaptureError::DeviceFault {
            details: format!("{}: {}", path.as_ref().display(), err),
        })?;

        let spec = reader.spec();
        if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
            return Err(CaptureError::DeviceFault {
                details: format!(
                    "{}: expected 16-bit PCM, got {:?} {} bit",
                    path.as_ref().display(),
                    spec.sample_format,
                    spec.bits_per_sample
                ),
            });
        }

        Ok(Self {
            reader,
            channels: spec.channels as usize,
            sample_rate: spec.sample_rate,
        })
    }

    /// Sample rate declared by the file
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl CaptureSource for WavCapture {
    fn read_block(&mut self, out: &mut [i16]) -> Result<(), CaptureError> {
        let channels = self.channels;
        let mut samples = self.reader.samples::<i16>();
        let mut filled = 0;

        while filled < out.len() {
            match samples.next() {
                Some(Ok(sample)) => {
                    out[filled] = sample;
                    filled += 1;
                    // Discard the remaining channels of this frame
                    for _ in 1..channels {
                        match samples.next() {
                            Some(Ok(_)) => {}
                            Some(Err(err)) => {
                                return Err(CaptureError::DeviceFault {
                                    details: err.to_string(),
                                })
                            }
                            None => break,
                        }
                    }
                }
                Some(Err(err)) => {
                    return Err(CaptureError::DeviceFault {
                        details: err.to_string(),
                    })
                }
                None => {
                    if filled == 0 {
                        return Err(CaptureError::StreamClosed);
                    }
                    return Err(CaptureError::ShortRead {
                        expected: out.len(),
                        got: filled,
                    });
                }
            }
        }

        Ok(())
    }
}
