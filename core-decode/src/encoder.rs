//! # File Encoder
//!
//! Writes interleaved PCM into the container format read by
//! [`FileDecoder`](crate::FileDecoder), one packet per channel for every
//! [`FRAMES_PER_PACKET`] frames.

use crate::codec::DeltaEncoder;
use crate::error::{DecodeError, Result};
use crate::format::{FileHeader, PacketHeader, FRAMES_PER_PACKET, MAX_CHANNELS};
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct FileEncoder {
    channels: u16,
}

impl FileEncoder {
    pub fn new(channels: u16) -> Result<Self> {
        if channels == 0 || channels > MAX_CHANNELS {
            return Err(DecodeError::InvalidConfig(format!(
                "channel count {} outside 1..={}",
                channels, MAX_CHANNELS
            )));
        }
        Ok(Self { channels })
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Encode interleaved samples into a complete container.
    pub fn encode(&self, interleaved: &[f32]) -> Result<Vec<u8>> {
        let channels = self.channels as usize;
        if interleaved.len() % channels != 0 {
            return Err(DecodeError::InvalidFormat(format!(
                "{} samples do not divide into {} channels",
                interleaved.len(),
                channels
            )));
        }

        let frames = interleaved.len() / channels;
        let samples_per_channel = u32::try_from(frames).map_err(|_| {
            DecodeError::InvalidFormat(format!("{} frames do not fit the header", frames))
        })?;

        let mut out = FileHeader::new(samples_per_channel, self.channels)
            .to_bytes()
            .to_vec();
        let mut encoders: Vec<DeltaEncoder> = (0..channels).map(|_| DeltaEncoder::new()).collect();
        let mut channel_buf = Vec::with_capacity(FRAMES_PER_PACKET);
        let mut packets = 0usize;

        for chunk in interleaved.chunks(FRAMES_PER_PACKET * channels) {
            for (channel, encoder) in encoders.iter_mut().enumerate() {
                channel_buf.clear();
                channel_buf.extend(chunk.iter().skip(channel).step_by(channels));

                let payload = encoder.encode_packet(&channel_buf)?;
                out.extend_from_slice(&PacketHeader::audio(payload.len() as u32).to_bytes());
                out.extend_from_slice(&payload);
                packets += 1;
            }
        }

        debug!(
            frames,
            channels,
            packets,
            bytes = out.len(),
            "Encoded audio container"
        );
        Ok(out)
    }

    /// Encode and write to `path`, replacing any existing file.
    pub fn write_to_path(&self, interleaved: &[f32], path: impl AsRef<Path>) -> Result<()> {
        let bytes = self.encode(interleaved)?;
        std::fs::write(path.as_ref(), bytes)?;
        Ok(())
    }
}
