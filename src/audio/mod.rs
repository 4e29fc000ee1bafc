// Audio module - capture contracts and block handoff
//
// The core never talks to audio hardware. Capture is an abstract
// collaborator behind the CaptureSource trait; device configuration,
// retries and format negotiation all live on the other side of it.

pub mod block_pool;

pub use block_pool::{BlockPool, BlockPoolChannels, ThreadedCapture};

use crate::error::CaptureError;

/// One capture block: exactly `transform_size` signed 16-bit samples
pub type SampleBlock = Vec<i16>;

/// Blocking source of fixed-size sample blocks
///
/// `read_block` fills `out` completely or fails. A short read from the
/// device must surface as `CaptureError::ShortRead`, never as a silently
/// padded block: downstream dB math over a half-filled block looks like a
/// real signal and is impossible to diagnose visually.
///
/// `CaptureError::StreamClosed` means a clean end of stream (file-backed
/// captures); every other error is a device fault.
pub trait CaptureSource {
    fn read_block(&mut self, out: &mut [i16]) -> Result<(), CaptureError>;
}
