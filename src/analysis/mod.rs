// Analysis module - spectral analysis core
//
// One pass per incoming sample block, data flowing strictly one direction:
// raw samples -> spectrum -> (bars | beat flag). The transform and mapper
// are pure; all persistent analysis state lives in the OnsetDetector.

pub mod bars;
pub mod onset;
pub mod transform;

pub use bars::{BarMapper, BarRange, BarSet};
pub use onset::OnsetDetector;
pub use transform::{SpectralScale, WindowFunction, WindowedTransform};
