//! # Packetized Audio File Decoding
//!
//! Turns a channel-separated, packetized compressed audio container into
//! interleaved PCM blocks for a real-time mixer, with decode work running on
//! background workers.
//!
//! ## Overview
//!
//! This crate handles:
//! - The container format (`format`) and its codec seam (`codec`)
//! - Buffered (memory resident) and streamed (read from disk) sources
//! - A lock-free block queue between decode workers and the real-time thread
//! - Delayed release of decoders dropped while work is still outstanding
//! - Stream reset, close and reopen
//!
//! ## Usage
//!
//! ```rust,no_run
//! use core_decode::{DecodeScheduler, FileDecoder, SchedulerConfig, SourceMode};
//!
//! # fn main() -> core_decode::Result<()> {
//! let scheduler = DecodeScheduler::new(SchedulerConfig::default())?;
//! let (mut decoder, mut blocks) =
//!     FileDecoder::open_default("music.zs", SourceMode::Buffered, &scheduler)?;
//!
//! // Owner thread: ask for blocks as the mixer drains them.
//! decoder.schedule_decode()?;
//!
//! // Real-time thread: never blocks.
//! if let Some(block) = blocks.pop() {
//!     let _ = block.samples();
//! }
//!
//! decoder.reset_stream()?;
//! # Ok(())
//! # }
//! ```

pub mod channels;
pub mod codec;
pub mod config;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod format;
pub mod lifetime;
pub mod packet_stream;
pub mod queue;
pub mod scheduler;
mod source;

pub use channels::ChannelBank;
pub use codec::{default_factory, ChannelDecoder, CodecFactory, DeltaCodec, DeltaEncoder};
pub use config::{DecoderConfig, DecoderStats, SourceMode};
pub use decoder::FileDecoder;
pub use encoder::FileEncoder;
pub use error::{DecodeError, Result};
pub use format::{FileHeader, PacketHeader};
pub use lifetime::{Disposal, LifetimeGuard, TaskCompletion};
pub use packet_stream::PacketStreamDecoder;
pub use queue::{block_queue, BlockConsumer, BlockProducer, DecodedFrameBlock};
pub use scheduler::{DecodeScheduler, SchedulerConfig};
