//! # Channel Decoder Bank
//!
//! One mono decoder per channel, created and recreated as a unit, plus the
//! scratch buffers each channel decodes into before interleaving.

use crate::codec::{ChannelDecoder, CodecFactory};
use crate::error::Result;
use crate::format::FRAMES_PER_PACKET;
use crate::queue::DecodedFrameBlock;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct ChannelBank {
    factory: Arc<dyn CodecFactory>,
    sample_rate: u32,
    decoders: Vec<Box<dyn ChannelDecoder>>,
    scratch: Vec<Vec<f32>>,
}

impl ChannelBank {
    /// Create one decoder per channel. Fails without keeping any decoder if
    /// one of them cannot be created.
    pub fn new(factory: Arc<dyn CodecFactory>, sample_rate: u32, channels: u16) -> Result<Self> {
        let decoders = create_decoders(factory.as_ref(), sample_rate, channels)?;
        Ok(Self {
            factory,
            sample_rate,
            decoders,
            scratch: vec![vec![0.0; FRAMES_PER_PACKET]; channels as usize],
        })
    }

    pub fn channels(&self) -> u16 {
        self.decoders.len() as u16
    }

    pub fn codec_name(&self) -> &str {
        self.factory.name()
    }

    /// Destroy every decoder and create fresh ones.
    ///
    /// On failure the existing decoders are kept.
    pub fn recreate(&mut self) -> Result<()> {
        let decoders = create_decoders(self.factory.as_ref(), self.sample_rate, self.channels())?;
        self.decoders = decoders;
        debug!(
            channels = self.decoders.len(),
            codec = self.factory.name(),
            "Recreated channel decoders"
        );
        Ok(())
    }

    /// Decode one packet for `channel` into its scratch buffer.
    ///
    /// Returns the frame count, or 0 if the codec rejected the packet.
    pub fn decode(&mut self, channel: usize, packet: &[u8]) -> usize {
        let (Some(decoder), Some(out)) =
            (self.decoders.get_mut(channel), self.scratch.get_mut(channel))
        else {
            return 0;
        };

        match decoder.decode(packet, out) {
            Ok(frames) => frames.min(out.len()),
            Err(e) => {
                warn!(channel, bytes = packet.len(), "Packet decode failed: {}", e);
                0
            }
        }
    }

    /// Interleave the scratch buffers into one block.
    ///
    /// The block is as long as the longest channel. Shorter channels are
    /// padded with silence.
    pub fn interleave(&self, frames_per_channel: &[usize]) -> DecodedFrameBlock {
        let channels = self.decoders.len();
        let frames = frames_per_channel
            .iter()
            .take(channels)
            .copied()
            .max()
            .unwrap_or(0)
            .min(FRAMES_PER_PACKET);

        let mut samples = vec![0.0; frames * channels];
        let mut clamped = 0usize;
        for (channel, scratch) in self.scratch.iter().enumerate() {
            let available = frames_per_channel
                .get(channel)
                .copied()
                .unwrap_or(0)
                .min(frames);
            for (frame, &sample) in scratch[..available].iter().enumerate() {
                if !(-1.0..=1.0).contains(&sample) {
                    clamped += 1;
                }
                samples[frame * channels + channel] = sample.clamp(-1.0, 1.0);
            }
        }

        if clamped > 0 {
            debug!(clamped, "Clamped out-of-range samples");
        }

        DecodedFrameBlock::new(self.channels().max(1), samples)
    }
}

impl std::fmt::Debug for ChannelBank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelBank")
            .field("codec", &self.factory.name())
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.decoders.len())
            .finish()
    }
}

fn create_decoders(
    factory: &dyn CodecFactory,
    sample_rate: u32,
    channels: u16,
) -> Result<Vec<Box<dyn ChannelDecoder>>> {
    (0..channels).map(|_| factory.create(sample_rate)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{DeltaCodec, DeltaEncoder};
    use crate::error::DecodeError;

    /// Writes a fixed value into every frame it is asked for.
    struct ConstantDecoder(f32);

    impl ChannelDecoder for ConstantDecoder {
        fn decode(&mut self, packet: &[u8], out: &mut [f32]) -> Result<usize> {
            if packet.is_empty() {
                return Err(DecodeError::CodecError("empty".into()));
            }
            let frames = packet[0] as usize;
            out[..frames].fill(self.0);
            Ok(frames)
        }
    }

    struct ConstantFactory(f32);

    impl CodecFactory for ConstantFactory {
        fn name(&self) -> &str {
            "constant"
        }

        fn create(&self, _sample_rate: u32) -> Result<Box<dyn ChannelDecoder>> {
            Ok(Box::new(ConstantDecoder(self.0)))
        }
    }

    #[test]
    fn test_creates_one_decoder_per_channel() {
        let bank = ChannelBank::new(Arc::new(DeltaCodec), 48_000, 3).unwrap();
        assert_eq!(bank.channels(), 3);
        assert_eq!(bank.codec_name(), "delta");
    }

    #[test]
    fn test_creation_failure_is_reported() {
        let err = ChannelBank::new(Arc::new(DeltaCodec), 1_234, 2).unwrap_err();
        assert!(err.is_format_error());
    }

    #[test]
    fn test_interleave_preserves_channel_order() {
        let mut bank = ChannelBank::new(Arc::new(DeltaCodec), 48_000, 2).unwrap();
        let left = DeltaEncoder::new().encode_packet(&[0.5, 0.5, 0.5]).unwrap();
        let right = DeltaEncoder::new().encode_packet(&[-0.5, -0.5, -0.5]).unwrap();

        let frames = [bank.decode(0, &left), bank.decode(1, &right)];
        let block = bank.interleave(&frames);

        assert_eq!(block.frame_count(), 3);
        assert_eq!(block.samples(), &[0.5, -0.5, 0.5, -0.5, 0.5, -0.5]);
    }

    #[test]
    fn test_interleave_pads_short_channel() {
        let mut bank = ChannelBank::new(Arc::new(ConstantFactory(0.25)), 48_000, 2).unwrap();
        let frames = [bank.decode(0, &[4]), bank.decode(1, &[])];
        assert_eq!(frames, [4, 0]);

        let block = bank.interleave(&frames);
        assert_eq!(block.frame_count(), 4);
        assert_eq!(block.channel(0), vec![0.25; 4]);
        assert_eq!(block.channel(1), vec![0.0; 4]);
    }

    #[test]
    fn test_interleave_clamps() {
        let mut bank = ChannelBank::new(Arc::new(ConstantFactory(3.0)), 48_000, 1).unwrap();
        let frames = [bank.decode(0, &[2])];
        assert_eq!(bank.interleave(&frames).samples(), &[1.0, 1.0]);
    }

    #[test]
    fn test_all_silent_gives_empty_block() {
        let bank = ChannelBank::new(Arc::new(DeltaCodec), 48_000, 2).unwrap();
        let block = bank.interleave(&[0, 0]);
        assert!(block.is_empty());
        assert_eq!(block.channels(), 2);
    }

    #[test]
    fn test_recreate_resets_history() {
        let mut bank = ChannelBank::new(Arc::new(DeltaCodec), 48_000, 1).unwrap();
        let mut encoder = DeltaEncoder::new();
        let first = encoder.encode_packet(&[0.25]).unwrap();

        bank.decode(0, &first);
        // Same packet again continues from 0.25.
        bank.decode(0, &first);
        assert_eq!(bank.interleave(&[1]).samples(), &[0.5]);

        bank.recreate().unwrap();
        bank.decode(0, &first);
        assert_eq!(bank.interleave(&[1]).samples(), &[0.25]);
    }
}
