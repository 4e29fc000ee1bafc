// Error types for the spectral analysis pipeline
//
// This module defines custom error types for analysis and capture operations,
// providing structured error handling with numeric error codes suitable for
// logging and host integration.
//
// All errors here are fatal-by-default: a block-size mismatch or an
// out-of-range configuration indicates a setup error, not a transient
// condition, and is surfaced immediately rather than retried. The core never
// substitutes default values for out-of-range configuration.

use log::error;
use std::fmt;

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling at the
/// host boundary.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}

/// Log an analysis error with structured context
pub fn log_analysis_error(err: &AnalysisError, context: &str) {
    error!(
        "Analysis error in {}: code={}, component=Pipeline, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Analysis errors
///
/// These errors cover the transform, bar mapping, and onset detection
/// stages of the pipeline.
///
/// Error code ranges: 1001-1003
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    /// Input block length does not match the configured transform size
    InvalidBlockSize { expected: usize, actual: usize },

    /// A configured range or parameter is invalid
    InvalidRange {
        parameter: &'static str,
        details: String,
    },

    /// A spectrum's length differs from the one the component was built for
    DimensionMismatch { expected: usize, actual: usize },
}

impl ErrorCode for AnalysisError {
    fn code(&self) -> i32 {
        match self {
            AnalysisError::InvalidBlockSize { .. } => 1001,
            AnalysisError::InvalidRange { .. } => 1002,
            AnalysisError::DimensionMismatch { .. } => 1003,
        }
    }

    fn message(&self) -> String {
        match self {
            AnalysisError::InvalidBlockSize { expected, actual } => {
                format!(
                    "Sample block must contain {} samples (got {})",
                    expected, actual
                )
            }
            AnalysisError::InvalidRange { parameter, details } => {
                format!("Invalid value for {}: {}", parameter, details)
            }
            AnalysisError::DimensionMismatch { expected, actual } => {
                format!(
                    "Spectrum length changed mid-run: expected {} bins, got {}",
                    expected, actual
                )
            }
        }
    }
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AnalysisError (code {}): {}", self.code(), self.message())
    }
}

impl std::error::Error for AnalysisError {}

/// Capture errors
///
/// These errors cover the external capture collaborator. `StreamClosed` is
/// the one non-failure variant: file-backed captures use it to signal a
/// clean end of stream, and the pipeline run loop treats it as shutdown.
///
/// Error code ranges: 2001-2003
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// The capture device reported a fault
    DeviceFault { details: String },

    /// The device delivered fewer samples than one full block
    ShortRead { expected: usize, got: usize },

    /// The capture stream ended (end of file for fixture captures)
    StreamClosed,
}

impl ErrorCode for CaptureError {
    fn code(&self) -> i32 {
        match self {
            CaptureError::DeviceFault { .. } => 2001,
            CaptureError::ShortRead { .. } => 2002,
            CaptureError::StreamClosed => 2003,
        }
    }

    fn message(&self) -> String {
        match self {
            CaptureError::DeviceFault { details } => {
                format!("Capture device fault: {}", details)
            }
            CaptureError::ShortRead { expected, got } => {
                format!(
                    "Short read from capture device: expected {} samples, got {}",
                    expected, got
                )
            }
            CaptureError::StreamClosed => "Capture stream closed".to_string(),
        }
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CaptureError (code {}): {}", self.code(), self.message())
    }
}

impl std::error::Error for CaptureError {}

/// Convert from std::io::Error to CaptureError
impl From<std::io::Error> for CaptureError {
    fn from(err: std::io::Error) -> Self {
        CaptureError::DeviceFault {
            details: err.to_string(),
        }
    }
}

/// Combined error type for the pipeline run loop, which crosses both the
/// analysis core and the capture collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    Analysis(AnalysisError),
    Capture(CaptureError),
}

impl From<AnalysisError> for PipelineError {
    fn from(err: AnalysisError) -> Self {
        PipelineError::Analysis(err)
    }
}

impl From<CaptureError> for PipelineError {
    fn from(err: CaptureError) -> Self {
        PipelineError::Capture(err)
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Analysis(err) => write!(f, "{}", err),
            PipelineError::Capture(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipelineError::Analysis(err) => Some(err),
            PipelineError::Capture(err) => Some(err),
        }
    }
}
