// led_spectrum - real-time spectral analysis for LED music visualization
//
// Turns fixed-size audio sample blocks into a perceptually mapped bar
// height vector and a beat/transient signal via spectral-flux onset
// detection. Capture devices and LED panels are external collaborators
// behind the CaptureSource and DisplaySink traits.

pub mod analysis;
pub mod audio;
pub mod config;
pub mod display;
pub mod error;
pub mod fixtures;
pub mod pipeline;

pub use analysis::{BarMapper, BarSet, OnsetDetector, WindowedTransform};
pub use config::AppConfig;
pub use display::{DisplaySink, RenderFrame};
pub use error::{AnalysisError, CaptureError, ErrorCode, PipelineError};
pub use pipeline::{Pipeline, RenderMode};
