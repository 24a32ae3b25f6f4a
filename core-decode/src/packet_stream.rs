//! # Packet Stream Decoder
//!
//! Decodes standalone mono packets handed in by the host, for audio that does
//! not come from a container file (for example a live capture stream). The
//! codec is created on the first packet.

use crate::codec::{default_factory, ChannelDecoder, CodecFactory};
use crate::format::FRAMES_PER_PACKET;
use std::sync::Arc;
use tracing::warn;

pub struct PacketStreamDecoder {
    factory: Arc<dyn CodecFactory>,
    sample_rate: u32,
    decoder: Option<Box<dyn ChannelDecoder>>,
    scratch: Vec<f32>,
}

impl PacketStreamDecoder {
    pub fn new(factory: Arc<dyn CodecFactory>, sample_rate: u32) -> Self {
        Self {
            factory,
            sample_rate,
            decoder: None,
            scratch: vec![0.0; FRAMES_PER_PACKET],
        }
    }

    /// Decoder using the built-in codec.
    pub fn with_default_codec(sample_rate: u32) -> Self {
        Self::new(default_factory(), sample_rate)
    }

    /// Decode one packet into an owned buffer.
    ///
    /// A packet that cannot be decoded, or a codec that cannot be created,
    /// yields an empty buffer.
    pub fn decode_packet(&mut self, packet: &[u8]) -> Vec<f32> {
        if self.decoder.is_none() {
            match self.factory.create(self.sample_rate) {
                Ok(decoder) => self.decoder = Some(decoder),
                Err(e) => {
                    warn!(
                        sample_rate = self.sample_rate,
                        "Packet codec creation failed: {}", e
                    );
                    return Vec::new();
                }
            }
        }

        let Some(decoder) = self.decoder.as_mut() else {
            return Vec::new();
        };
        match decoder.decode(packet, &mut self.scratch) {
            Ok(frames) => self.scratch[..frames.min(self.scratch.len())].to_vec(),
            Err(e) => {
                warn!(bytes = packet.len(), "Packet decode failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Returns `true` once a codec has been created.
    pub fn is_initialized(&self) -> bool {
        self.decoder.is_some()
    }

    /// Forget the codec history. The next packet creates a fresh codec.
    pub fn reset(&mut self) {
        self.decoder = None;
    }
}

impl std::fmt::Debug for PacketStreamDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketStreamDecoder")
            .field("codec", &self.factory.name())
            .field("sample_rate", &self.sample_rate)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{DeltaCodec, DeltaEncoder};

    #[test]
    fn test_lazy_creation() {
        let mut decoder = PacketStreamDecoder::with_default_codec(48_000);
        assert!(!decoder.is_initialized());

        let packet = DeltaEncoder::new().encode_packet(&[0.5, -0.5]).unwrap();
        assert_eq!(decoder.decode_packet(&packet), vec![0.5, -0.5]);
        assert!(decoder.is_initialized());
    }

    #[test]
    fn test_bad_packet_yields_empty_buffer() {
        let mut decoder = PacketStreamDecoder::with_default_codec(16_000);
        assert!(decoder.decode_packet(&[0xff]).is_empty());
    }

    #[test]
    fn test_unsupported_rate_yields_empty_buffer() {
        let mut decoder = PacketStreamDecoder::new(Arc::new(DeltaCodec), 11_025);
        let packet = DeltaEncoder::new().encode_packet(&[0.5]).unwrap();
        assert!(decoder.decode_packet(&packet).is_empty());
        assert!(!decoder.is_initialized());
    }

    #[test]
    fn test_reset_forgets_history() {
        let mut encoder = DeltaEncoder::new();
        let first = encoder.encode_packet(&[0.25]).unwrap();
        let second = encoder.encode_packet(&[0.25]).unwrap();

        let mut decoder = PacketStreamDecoder::with_default_codec(48_000);
        decoder.decode_packet(&first);
        assert_eq!(decoder.decode_packet(&second), vec![0.25]);

        decoder.reset();
        // Delta of zero from a fresh codec decodes to silence.
        assert_eq!(decoder.decode_packet(&second), vec![0.0]);
    }
}
