// Pipeline - one analysis pass per sample block
//
// Drives the per-block flow: capture -> WindowedTransform -> BarMapper
// and/or OnsetDetector -> DisplaySink. Which outputs are produced is a
// configuration enum, not a separate program, so one loop serves every
// display mode.
//
// The pipeline itself holds no analysis state; everything persistent lives
// in the OnsetDetector. The loop is strictly sequential - it blocks on the
// capture collaborator, runs the full pass, renders, and only then asks
// for the next block. The interrupt flag is checked once per pass
// boundary, never mid-pass.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::analysis::{BarMapper, OnsetDetector, SpectralScale, WindowedTransform};
use crate::audio::{CaptureSource, SampleBlock};
use crate::config::AppConfig;
use crate::display::{DisplaySink, RenderFrame};
use crate::error::{AnalysisError, CaptureError, PipelineError};

/// Which outputs the pipeline produces per block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    /// Spectrum bars only
    Bars,
    /// Beat strobe only
    Strobe,
    /// Bars and strobe from the same spectrum
    Both,
}

/// The mode-dependent stages after the transform
enum Stages {
    Bars(BarMapper),
    Strobe(OnsetDetector),
    Both(BarMapper, OnsetDetector),
}

/// Per-block analysis pipeline
pub struct Pipeline {
    transform: WindowedTransform,
    stages: Stages,
    blocks_processed: u64,
    beats_detected: u64,
    log_every_n_blocks: u64,
}

impl Pipeline {
    /// Build a pipeline from a validated configuration
    ///
    /// Fails fast on any out-of-range parameter; nothing is defaulted or
    /// clamped here.
    pub fn new(config: &AppConfig) -> Result<Self, AnalysisError> {
        config.validate()?;

        let size = config.transform.size;
        let sample_rate = config.transform.sample_rate;
        // One scale for the whole deployment: the mapper's dB bounds and
        // the detector's flux threshold are both tuned against dB spectra
        let transform =
            WindowedTransform::new(size, config.transform.window, SpectralScale::Decibels)?;

        let stages = match config.mode {
            RenderMode::Bars => Stages::Bars(BarMapper::new(&config.bars, sample_rate, size)?),
            RenderMode::Strobe => {
                Stages::Strobe(OnsetDetector::new(&config.onset, sample_rate, size)?)
            }
            RenderMode::Both => Stages::Both(
                BarMapper::new(&config.bars, sample_rate, size)?,
                OnsetDetector::new(&config.onset, sample_rate, size)?,
            ),
        };

        log::info!(
            "[Pipeline] mode={:?}, fft={} @ {} Hz ({:.2} Hz/bin), window={:?}",
            config.mode,
            size,
            sample_rate,
            sample_rate as f32 / size as f32,
            config.transform.window,
        );

        Ok(Self {
            transform,
            stages,
            blocks_processed: 0,
            beats_detected: 0,
            log_every_n_blocks: config.log_every_n_blocks,
        })
    }

    /// FFT size, i.e. the required sample block length
    pub fn block_size(&self) -> usize {
        self.transform.size()
    }

    /// Total blocks processed since construction
    pub fn blocks_processed(&self) -> u64 {
        self.blocks_processed
    }

    /// Total beats reported since construction (0 in Bars mode)
    pub fn beats_detected(&self) -> u64 {
        self.beats_detected
    }

    /// Run one pass over a sample block
    pub fn process(&mut self, block: &[i16]) -> Result<RenderFrame, AnalysisError> {
        let spectrum = self.transform.transform(block)?;

        let frame = match &mut self.stages {
            Stages::Bars(mapper) => RenderFrame::Bars {
                bars: mapper.map(spectrum)?,
            },
            Stages::Strobe(detector) => RenderFrame::Strobe {
                beat: detector.detect(spectrum)?,
            },
            Stages::Both(mapper, detector) => RenderFrame::Both {
                bars: mapper.map(spectrum)?,
                beat: detector.detect(spectrum)?,
            },
        };

        self.blocks_processed += 1;
        match &frame {
            RenderFrame::Strobe { beat: true } | RenderFrame::Both { beat: true, .. } => {
                self.beats_detected += 1;
            }
            _ => {}
        }

        if self.log_every_n_blocks > 0 && self.blocks_processed % self.log_every_n_blocks == 0 {
            log::debug!(
                "[Pipeline] {} blocks processed, {} beats",
                self.blocks_processed,
                self.beats_detected
            );
        }

        Ok(frame)
    }

    /// Pull blocks from `capture` until the stream closes or `interrupt`
    /// is raised
    ///
    /// Returns cleanly on `CaptureError::StreamClosed`; every other error
    /// propagates. The interrupt flag is only consulted between passes.
    pub fn run(
        &mut self,
        capture: &mut dyn CaptureSource,
        sink: &mut dyn DisplaySink,
        interrupt: &AtomicBool,
    ) -> Result<(), PipelineError> {
        // Sized once per run, reused for every block
        let mut block: SampleBlock = vec![0; self.block_size()];

        loop {
            if interrupt.load(Ordering::Relaxed) {
                log::info!(
                    "[Pipeline] Interrupted after {} blocks",
                    self.blocks_processed
                );
                return Ok(());
            }

            match capture.read_block(&mut block) {
                Ok(()) => {}
                Err(CaptureError::StreamClosed) => {
                    log::info!(
                        "[Pipeline] Stream closed after {} blocks, {} beats",
                        self.blocks_processed,
                        self.beats_detected
                    );
                    return Ok(());
                }
                Err(err) => return Err(err.into()),
            }

            let frame = self.process(&block)?;
            sink.render(&frame);
        }
    }
}
