// BlockPool - lock-free block pool with dual SPSC queues
//
// Implements an object pool using two lock-free SPSC (Single Producer
// Single Consumer) ring buffers so that a pipelined deployment can run
// capture and analysis on separate threads without allocating per block.
//
// Block flow:
// 1. Capture thread pops an empty block from POOL_QUEUE
// 2. Capture thread fills it from the device
// 3. Capture thread pushes the filled block to DATA_QUEUE
// 4. Analysis thread pops the filled block, processes it
// 5. Analysis thread returns the empty block to POOL_QUEUE
//
// Handoff is ownership-transferring in both directions: a block is never
// visible to both threads at once, which is exactly the aliasing rule the
// analysis state (previous spectrum, flux history) relies on.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rtrb::{Consumer, PopError, Producer, RingBuffer};

use super::{CaptureSource, SampleBlock};
use crate::error::CaptureError;

/// Split block pool channels for producer/consumer separation
pub struct BlockPoolChannels {
    /// Producer for sending filled blocks to the analysis thread
    pub data_producer: Producer<SampleBlock>,
    /// Consumer for receiving filled blocks in the analysis thread
    pub data_consumer: Consumer<SampleBlock>,
    /// Producer for returning empty blocks from the analysis thread
    pub pool_producer: Producer<SampleBlock>,
    /// Consumer for retrieving empty blocks in the capture thread
    pub pool_consumer: Consumer<SampleBlock>,
}

/// Lock-free pool of preallocated sample blocks
///
/// All heap allocation happens in `new`; both queues only move ownership
/// of already-allocated blocks afterwards.
pub struct BlockPool;

impl BlockPool {
    /// Create a pool of `block_count` blocks of `block_size` samples
    ///
    /// # Panics
    /// Panics if `block_count` or `block_size` is 0.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(block_count: usize, block_size: usize) -> BlockPoolChannels {
        assert!(block_count > 0, "block_count must be greater than 0");
        assert!(block_size > 0, "block_size must be greater than 0");

        let (mut pool_producer, pool_consumer) = RingBuffer::new(block_count);
        let (data_producer, data_consumer) = RingBuffer::new(block_count);

        for _ in 0..block_count {
            let block = vec![0_i16; block_size];
            pool_producer
                .push(block)
                .expect("pool queue sized for block_count");
        }

        BlockPoolChannels {
            data_producer,
            data_consumer,
            pool_producer,
            pool_consumer,
        }
    }
}

/// Runs an inner CaptureSource on its own thread, handing blocks across a
/// BlockPool
///
/// The adapter itself implements CaptureSource, so a pipeline cannot tell
/// a threaded capture from a direct one. The capture thread stops on the
/// first error; `read_block` drains any blocks already queued, then
/// surfaces that error (StreamClosed included) to the caller.
pub struct ThreadedCapture {
    data_consumer: Consumer<SampleBlock>,
    pool_producer: Producer<SampleBlock>,
    handle: Option<JoinHandle<()>>,
    stop: Arc<AtomicBool>,
    terminal: Arc<Mutex<Option<CaptureError>>>,
    block_size: usize,
}

impl ThreadedCapture {
    /// Spawn the capture thread
    ///
    /// # Arguments
    /// * `inner` - The capture source to run on the spawned thread
    /// * `block_size` - Samples per block; must match the pipeline's
    /// * `depth` - Number of pooled blocks (the capture lead allowed
    ///   before the producer blocks waiting for returns)
    pub fn spawn<C>(mut inner: C, block_size: usize, depth: usize) -> Self
    where
        C: CaptureSource + Send + 'static,
    {
        let channels = BlockPool::new(depth, block_size);
        let BlockPoolChannels {
            mut data_producer,
            data_consumer,
            pool_producer,
            mut pool_consumer,
        } = channels;

        let stop = Arc::new(AtomicBool::new(false));
        let terminal: Arc<Mutex<Option<CaptureError>>> = Arc::new(Mutex::new(None));

        let thread_stop = Arc::clone(&stop);
        let thread_terminal = Arc::clone(&terminal);
        let handle = thread::Builder::new()
            .name("capture".to_string())
            .spawn(move || {
                while !thread_stop.load(Ordering::Relaxed) {
                    let mut block = match pool_consumer.pop() {
                        Ok(block) => block,
                        Err(PopError::Empty) => {
                            // Analysis is behind; wait for a returned block
                            thread::sleep(Duration::from_micros(200));
                            continue;
                        }
                    };

                    if let Err(err) = inner.read_block(&mut block) {
                        if let Ok(mut slot) = thread_terminal.lock() {
                            *slot = Some(err);
                        }
                        return;
                    }

                    if data_producer.push(block).is_err() {
                        // Full data queue cannot happen by pool accounting;
                        // treat it as shutdown rather than spin
                        return;
                    }
                }
            })
            .expect("failed to spawn capture thread");

        Self {
            data_consumer,
            pool_producer,
            handle: Some(handle),
            stop,
            terminal,
            block_size,
        }
    }

    fn terminal_error(&self) -> CaptureError {
        self.terminal
            .lock()
            .ok()
            .and_then(|slot| slot.clone())
            .unwrap_or(CaptureError::StreamClosed)
    }
}

impl CaptureSource for ThreadedCapture {
    fn read_block(&mut self, out: &mut [i16]) -> Result<(), CaptureError> {
        if out.len() != self.block_size {
            return Err(CaptureError::DeviceFault {
                details: format!(
                    "requested {} samples from a {}-sample threaded capture",
                    out.len(),
                    self.block_size
                ),
            });
        }

        loop {
            match self.data_consumer.pop() {
                Ok(block) => {
                    out.copy_from_slice(&block);
                    // Best effort return; a full pool just drops the block
                    let _ = self.pool_producer.push(block);
                    return Ok(());
                }
                Err(PopError::Empty) => {
                    let finished = self
                        .handle
                        .as_ref()
                        .map(|h| h.is_finished())
                        .unwrap_or(true);
                    if finished && self.data_consumer.is_empty() {
                        return Err(self.terminal_error());
                    }
                    thread::sleep(Duration::from_micros(200));
                }
            }
        }
    }
}

impl Drop for ThreadedCapture {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Capture source yielding `count` blocks of a constant value, then EOF
    struct CountingCapture {
        next: i16,
        remaining: usize,
    }

    impl CaptureSource for CountingCapture {
        fn read_block(&mut self, out: &mut [i16]) -> Result<(), CaptureError> {
            if self.remaining == 0 {
                return Err(CaptureError::StreamClosed);
            }
            out.fill(self.next);
            self.next += 1;
            self.remaining -= 1;
            Ok(())
        }
    }

    #[test]
    fn test_block_pool_creation() {
        let mut channels = BlockPool::new(8, 1024);

        let mut available = 0;
        while channels.pool_consumer.pop().is_ok() {
            available += 1;
        }
        assert_eq!(available, 8);
        assert!(channels.data_consumer.pop().is_err());
    }

    #[test]
    fn test_block_circulation() {
        let mut channels = BlockPool::new(4, 256);

        let mut block = channels.pool_consumer.pop().unwrap();
        block[0] = 42;
        channels.data_producer.push(block).unwrap();

        let block = channels.data_consumer.pop().unwrap();
        assert_eq!(block[0], 42);
        assert_eq!(block.len(), 256);
        channels.pool_producer.push(block).unwrap();

        assert!(channels.pool_consumer.pop().is_ok());
    }

    #[test]
    fn test_send() {
        fn assert_send<T: Send>() {}
        assert_send::<Producer<SampleBlock>>();
        assert_send::<Consumer<SampleBlock>>();
        assert_send::<BlockPoolChannels>();
        assert_send::<ThreadedCapture>();
    }

    #[test]
    #[should_panic(expected = "block_count must be greater than 0")]
    fn test_zero_block_count_panics() {
        BlockPool::new(0, 1024);
    }

    #[test]
    fn test_threaded_capture_preserves_order_and_eof() {
        let inner = CountingCapture {
            next: 1,
            remaining: 5,
        };
        let mut capture = ThreadedCapture::spawn(inner, 128, 2);

        let mut block = vec![0_i16; 128];
        for expected in 1..=5 {
            capture.read_block(&mut block).unwrap();
            assert!(block.iter().all(|&s| s == expected));
        }
        assert_eq!(
            capture.read_block(&mut block),
            Err(CaptureError::StreamClosed)
        );
    }

    #[test]
    fn test_threaded_capture_rejects_mismatched_block() {
        let inner = CountingCapture {
            next: 0,
            remaining: 1,
        };
        let mut capture = ThreadedCapture::spawn(inner, 128, 2);
        let mut wrong = vec![0_i16; 64];
        assert!(matches!(
            capture.read_block(&mut wrong),
            Err(CaptureError::DeviceFault { .. })
        ));
    }
}
