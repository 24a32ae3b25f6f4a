//! # Packet Queue
//!
//! Lock-free single-producer/single-consumer queue of decoded frame blocks,
//! handing ownership from the decode worker to the real-time consumer.
//!
//! ## Design
//!
//! - **Transport**: `rtrb` ring buffer, bounded to the configured capacity
//! - **Ordering**: strict FIFO, blocks are popped in production order
//! - **Blocking**: neither side ever blocks; `pop` returns `None` when empty
//! - **Discard**: every block carries the stream generation it was produced
//!   in. Closing or resetting the stream advances the generation and `pop`
//!   frees older blocks without handing them out.
//!
//! ## Usage
//!
//! ```rust
//! use core_decode::queue::{block_queue, DecodedFrameBlock};
//!
//! let (mut producer, mut consumer) = block_queue(4);
//! producer.push(DecodedFrameBlock::new(2, vec![0.1, -0.1])).ok();
//!
//! let block = consumer.pop().unwrap();
//! assert_eq!(block.frame_count(), 1);
//! assert!(consumer.pop().is_none());
//! ```

use rtrb::{Consumer, Producer, RingBuffer};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Interleaved PCM produced by one decode step.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFrameBlock {
    channels: u16,
    samples: Vec<f32>,
}

impl DecodedFrameBlock {
    /// Wrap interleaved samples. `samples.len()` must be a multiple of
    /// `channels`.
    pub fn new(channels: u16, samples: Vec<f32>) -> Self {
        debug_assert!(channels > 0 && samples.len() % channels as usize == 0);
        Self { channels, samples }
    }

    /// Block carrying no audio.
    pub fn silent(channels: u16) -> Self {
        Self {
            channels,
            samples: Vec::new(),
        }
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of frames (samples per channel).
    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Samples of one frame, one per channel.
    pub fn frame(&self, index: usize) -> Option<&[f32]> {
        let channels = self.channels as usize;
        self.samples.get(index * channels..(index + 1) * channels)
    }

    /// De-interleaved samples of one channel.
    pub fn channel(&self, channel: u16) -> Vec<f32> {
        self.samples
            .iter()
            .skip(channel as usize)
            .step_by(self.channels.max(1) as usize)
            .copied()
            .collect()
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }
}

/// State shared by both queue ends and the decoder instance.
#[derive(Debug, Default)]
pub(crate) struct StreamEpoch {
    generation: AtomicU64,
    end_of_stream: AtomicBool,
}

impl StreamEpoch {
    pub(crate) fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Invalidate every block produced so far and clear end of stream.
    pub(crate) fn advance(&self) -> u64 {
        self.end_of_stream.store(false, Ordering::Release);
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub(crate) fn is_end_of_stream(&self) -> bool {
        self.end_of_stream.load(Ordering::Acquire)
    }

    /// Returns `true` if this call set the flag.
    pub(crate) fn mark_end_of_stream(&self) -> bool {
        !self.end_of_stream.swap(true, Ordering::AcqRel)
    }
}

#[derive(Debug)]
struct TaggedBlock {
    generation: u64,
    block: DecodedFrameBlock,
}

/// Create a queue holding at most `capacity` blocks.
pub fn block_queue(capacity: usize) -> (BlockProducer, BlockConsumer) {
    block_queue_with_epoch(capacity, Arc::new(StreamEpoch::default()))
}

pub(crate) fn block_queue_with_epoch(
    capacity: usize,
    epoch: Arc<StreamEpoch>,
) -> (BlockProducer, BlockConsumer) {
    let (producer, consumer) = RingBuffer::new(capacity.max(1));
    (
        BlockProducer {
            producer,
            epoch: epoch.clone(),
        },
        BlockConsumer { consumer, epoch },
    )
}

/// Worker side of the queue.
pub struct BlockProducer {
    producer: Producer<TaggedBlock>,
    epoch: Arc<StreamEpoch>,
}

impl BlockProducer {
    /// Returns `true` if at least one block can be pushed.
    pub fn has_room(&self) -> bool {
        self.producer.slots() > 0
    }

    /// Number of blocks that can be pushed before the queue is full.
    pub fn free_slots(&self) -> usize {
        self.producer.slots()
    }

    /// Push a block tagged with the current generation.
    ///
    /// Hands the block back if the queue is full.
    pub fn push(&mut self, block: DecodedFrameBlock) -> Result<(), DecodedFrameBlock> {
        let tagged = TaggedBlock {
            generation: self.epoch.generation(),
            block,
        };
        self.producer
            .push(tagged)
            .map_err(|err| match err {
                rtrb::PushError::Full(tagged) => tagged.block,
            })
    }

    /// Signal that the current generation has no more data.
    pub fn mark_end_of_stream(&self) -> bool {
        self.epoch.mark_end_of_stream()
    }

    /// Returns `true` if the consumer end was dropped.
    pub fn is_abandoned(&self) -> bool {
        self.producer.is_abandoned()
    }
}

/// Real-time side of the queue.
pub struct BlockConsumer {
    consumer: Consumer<TaggedBlock>,
    epoch: Arc<StreamEpoch>,
}

impl BlockConsumer {
    /// Pop the oldest block of the current generation.
    ///
    /// Never blocks. Blocks left over from before a close or reset are freed
    /// here without being returned.
    pub fn pop(&mut self) -> Option<DecodedFrameBlock> {
        let current = self.epoch.generation();
        while let Ok(tagged) = self.consumer.pop() {
            // The generation may have advanced since it was loaded, so a
            // newer tag is current too.
            if tagged.generation >= current {
                return Some(tagged.block);
            }
        }
        None
    }

    /// Number of blocks waiting, stale ones included.
    pub fn pending(&self) -> usize {
        self.consumer.slots()
    }

    /// Returns `true` once the current generation reached the end of its
    /// data and the queue is empty.
    pub fn is_end_of_stream(&self) -> bool {
        self.epoch.is_end_of_stream() && self.consumer.is_empty()
    }

    /// Returns `true` once the decoder instance feeding this queue was
    /// released.
    pub fn is_abandoned(&self) -> bool {
        self.consumer.is_abandoned()
    }
}

impl std::fmt::Debug for BlockProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockProducer")
            .field("free_slots", &self.free_slots())
            .field("generation", &self.epoch.generation())
            .finish()
    }
}

impl std::fmt::Debug for BlockConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockConsumer")
            .field("pending", &self.pending())
            .field("generation", &self.epoch.generation())
            .field("end_of_stream", &self.epoch.is_end_of_stream())
            .finish()
    }
}
