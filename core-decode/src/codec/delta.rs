//! DPCM codec used by the container.
//!
//! Packet payload:
//!
//! ```text
//! [frame_count: u16 LE][varint zigzag(delta_0)]...[varint zigzag(delta_n-1)]
//! ```
//!
//! Samples are quantized to 16 bits. Each delta is the wrapping difference to
//! the previous quantized sample, and the previous sample carries over from
//! one packet to the next.

use super::{ChannelDecoder, CodecFactory};
use crate::config::SUPPORTED_SAMPLE_RATES;
use crate::error::{DecodeError, Result};
use crate::format::FRAMES_PER_PACKET;

const SCALE: f32 = 32768.0;
const MAX_VARINT_BYTES: usize = 3;

/// Factory for [`DeltaDecoder`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeltaCodec;

impl CodecFactory for DeltaCodec {
    fn name(&self) -> &str {
        "delta"
    }

    fn create(&self, sample_rate: u32) -> Result<Box<dyn ChannelDecoder>> {
        if !SUPPORTED_SAMPLE_RATES.contains(&sample_rate) {
            return Err(DecodeError::CodecCreation(format!(
                "unsupported sample rate {} Hz",
                sample_rate
            )));
        }
        Ok(Box::new(DeltaDecoder::new()))
    }
}

/// Stateful decoder for one channel.
#[derive(Debug, Default)]
pub struct DeltaDecoder {
    previous: i16,
}

impl DeltaDecoder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChannelDecoder for DeltaDecoder {
    fn decode(&mut self, packet: &[u8], out: &mut [f32]) -> Result<usize> {
        if packet.len() < 2 {
            return Err(DecodeError::CodecError(format!(
                "packet of {} bytes has no frame count",
                packet.len()
            )));
        }

        let frames = u16::from_le_bytes([packet[0], packet[1]]) as usize;
        if frames > out.len() {
            return Err(DecodeError::CodecError(format!(
                "packet holds {} frames, output fits {}",
                frames,
                out.len()
            )));
        }

        // State is only committed once the whole packet decoded.
        let mut previous = self.previous;
        let mut offset = 2;
        for sample in out.iter_mut().take(frames) {
            let (zigzag, used) = read_varint(&packet[offset..]).ok_or_else(|| {
                DecodeError::CodecError(format!("truncated delta at byte {}", offset))
            })?;
            offset += used;
            previous = previous.wrapping_add(unzigzag(zigzag));
            *sample = previous as f32 / SCALE;
        }

        if offset != packet.len() {
            return Err(DecodeError::CodecError(format!(
                "{} trailing bytes after {} frames",
                packet.len() - offset,
                frames
            )));
        }

        self.previous = previous;
        Ok(frames)
    }
}

/// Stateful encoder for one channel, the inverse of [`DeltaDecoder`].
#[derive(Debug, Default)]
pub struct DeltaEncoder {
    previous: i16,
}

impl DeltaEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode up to [`FRAMES_PER_PACKET`] samples into one packet payload.
    pub fn encode_packet(&mut self, samples: &[f32]) -> Result<Vec<u8>> {
        if samples.len() > FRAMES_PER_PACKET {
            return Err(DecodeError::CodecError(format!(
                "{} samples exceed the packet limit of {}",
                samples.len(),
                FRAMES_PER_PACKET
            )));
        }

        let mut payload = Vec::with_capacity(2 + samples.len() * 2);
        payload.extend_from_slice(&(samples.len() as u16).to_le_bytes());

        for &sample in samples {
            let quantized = quantize(sample);
            write_varint(&mut payload, zigzag(quantized.wrapping_sub(self.previous)));
            self.previous = quantized;
        }

        Ok(payload)
    }
}

fn quantize(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * SCALE)
        .round()
        .clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

fn zigzag(value: i16) -> u16 {
    ((value << 1) ^ (value >> 15)) as u16
}

fn unzigzag(value: u16) -> i16 {
    ((value >> 1) as i16) ^ -((value & 1) as i16)
}

fn write_varint(out: &mut Vec<u8>, mut value: u16) {
    while value >= 0x80 {
        out.push((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

fn read_varint(bytes: &[u8]) -> Option<(u16, usize)> {
    let mut value: u32 = 0;
    for (i, &byte) in bytes.iter().take(MAX_VARINT_BYTES).enumerate() {
        value |= ((byte & 0x7f) as u32) << (7 * i);
        if byte & 0x80 == 0 {
            return u16::try_from(value).ok().map(|v| (v, i + 1));
        }
    }
    None
}
