//! # Codec Seam
//!
//! The container treats its codec as an external capability: "decode one
//! packet of N bytes into up to F PCM samples". [`CodecFactory`] creates one
//! mono [`ChannelDecoder`] per channel; dropping the box destroys it.
//!
//! Decoders are history dependent. Packets for one channel must be fed in file
//! order, and after any jump in the read position every decoder has to be
//! recreated, because bitstream state cannot be rewound.
//!
//! The built-in implementation is [`DeltaCodec`], a DPCM codec whose decoder
//! carries its last sample across packets.

mod delta;

pub use delta::{DeltaCodec, DeltaDecoder, DeltaEncoder};

use crate::error::Result;
use std::sync::Arc;

/// One stateful mono decoder.
pub trait ChannelDecoder: Send {
    /// Decode one compressed packet into `out`.
    ///
    /// Returns the number of samples written, never more than `out.len()`.
    /// An error means the packet could not be decoded; callers treat it as
    /// silence and keep going.
    fn decode(&mut self, packet: &[u8], out: &mut [f32]) -> Result<usize>;
}

/// Creates channel decoders against a fixed output sample rate.
pub trait CodecFactory: Send + Sync {
    /// Short codec name for logs.
    fn name(&self) -> &str;

    /// Create a mono decoder.
    ///
    /// # Errors
    ///
    /// Returns [`crate::DecodeError::CodecCreation`] if the codec cannot run
    /// at `sample_rate`.
    fn create(&self, sample_rate: u32) -> Result<Box<dyn ChannelDecoder>>;
}

/// Factory used when the caller does not supply one.
pub fn default_factory() -> Arc<dyn CodecFactory> {
    Arc::new(DeltaCodec)
}
