//! # Container Format
//!
//! Byte layout of the compressed audio container.
//!
//! ```text
//! [FileHeader][PacketHeader ch0][payload][PacketHeader ch1][payload]...
//!             └──────────── one decode step (all channels) ──────────┘
//! ```
//!
//! | Field                       | Type   |
//! |-----------------------------|--------|
//! | FileHeader.magic            | `b"ZE"`|
//! | FileHeader.samples_per_channel | u32 LE |
//! | FileHeader.channels         | u16 LE |
//! | PacketHeader.magic          | `b"pa"`|
//! | PacketHeader.payload_size   | u32 LE |

use crate::error::{DecodeError, Result};

pub const FILE_MAGIC: [u8; 2] = *b"ZE";
pub const PACKET_MAGIC: [u8; 2] = *b"pa";

/// Size of [`FileHeader`] on disk.
pub const FILE_HEADER_SIZE: usize = 8;
/// Size of [`PacketHeader`] on disk.
pub const PACKET_HEADER_SIZE: usize = 6;

/// Upper bound on channels per file; one decoder is created per channel.
pub const MAX_CHANNELS: u16 = 8;
/// Maximum frames a single packet decodes to (20ms at 48 kHz).
pub const FRAMES_PER_PACKET: usize = 960;
/// Largest payload the streamed reader keeps a scratch buffer for.
pub const MAX_PACKET_SIZE: usize = 4000;

/// Header at the start of every container file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    pub samples_per_channel: u32,
    pub channels: u16,
}

impl FileHeader {
    pub fn new(samples_per_channel: u32, channels: u16) -> Self {
        Self {
            samples_per_channel,
            channels,
        }
    }

    pub fn to_bytes(&self) -> [u8; FILE_HEADER_SIZE] {
        let mut bytes = [0u8; FILE_HEADER_SIZE];
        bytes[..2].copy_from_slice(&FILE_MAGIC);
        bytes[2..6].copy_from_slice(&self.samples_per_channel.to_le_bytes());
        bytes[6..8].copy_from_slice(&self.channels.to_le_bytes());
        bytes
    }
}

/// Parse and validate the file header.
///
/// # Errors
///
/// Fails with [`DecodeError::InvalidFormat`] if fewer than
/// [`FILE_HEADER_SIZE`] bytes are available, the magic tag does not match,
/// or the channel count is zero or above [`MAX_CHANNELS`].
pub fn parse_header(bytes: &[u8]) -> Result<FileHeader> {
    if bytes.len() < FILE_HEADER_SIZE {
        return Err(DecodeError::InvalidFormat(format!(
            "file header needs {} bytes, got {}",
            FILE_HEADER_SIZE,
            bytes.len()
        )));
    }

    if bytes[..2] != FILE_MAGIC {
        return Err(DecodeError::InvalidFormat(format!(
            "unexpected file tag {:?}",
            &bytes[..2]
        )));
    }

    let samples_per_channel = u32::from_le_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]);
    let channels = u16::from_le_bytes([bytes[6], bytes[7]]);

    if channels == 0 || channels > MAX_CHANNELS {
        return Err(DecodeError::InvalidFormat(format!(
            "channel count {} outside 1..={}",
            channels, MAX_CHANNELS
        )));
    }

    Ok(FileHeader {
        samples_per_channel,
        channels,
    })
}

/// Header in front of every per-channel packet payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub magic: [u8; 2],
    pub payload_size: u32,
}

impl PacketHeader {
    /// Header for an audio packet of `payload_size` bytes.
    pub fn audio(payload_size: u32) -> Self {
        Self {
            magic: PACKET_MAGIC,
            payload_size,
        }
    }

    /// `false` means the packet produces no audio; its payload is skipped.
    pub fn is_audio(&self) -> bool {
        self.magic == PACKET_MAGIC && self.payload_size > 0
    }

    pub fn payload_len(&self) -> usize {
        self.payload_size as usize
    }

    pub fn to_bytes(&self) -> [u8; PACKET_HEADER_SIZE] {
        let mut bytes = [0u8; PACKET_HEADER_SIZE];
        bytes[..2].copy_from_slice(&self.magic);
        bytes[2..6].copy_from_slice(&self.payload_size.to_le_bytes());
        bytes
    }
}

/// Parse a packet header.
///
/// Returns `None` only when fewer than [`PACKET_HEADER_SIZE`] bytes remain.
/// A wrong tag or a zero size is not an error: the header is returned and
/// [`PacketHeader::is_audio`] reports `false`.
pub fn parse_packet_header(bytes: &[u8]) -> Option<PacketHeader> {
    if bytes.len() < PACKET_HEADER_SIZE {
        return None;
    }

    Some(PacketHeader {
        magic: [bytes[0], bytes[1]],
        payload_size: u32::from_le_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_header() {
        let bytes = FileHeader::new(48_000, 2).to_bytes();
        assert_eq!(&bytes[..2], b"ZE");

        let header = parse_header(&bytes).unwrap();
        assert_eq!(header.samples_per_channel, 48_000);
        assert_eq!(header.channels, 2);
    }

    #[test]
    fn test_parse_header_ignores_trailing_data() {
        let mut bytes = FileHeader::new(10, 1).to_bytes().to_vec();
        bytes.extend_from_slice(&PacketHeader::audio(3).to_bytes());
        assert_eq!(parse_header(&bytes).unwrap(), FileHeader::new(10, 1));
    }

    #[test]
    fn test_parse_header_too_short() {
        let bytes = FileHeader::new(10, 1).to_bytes();
        let err = parse_header(&bytes[..FILE_HEADER_SIZE - 1]).unwrap_err();
        assert!(err.is_format_error());
    }

    #[test]
    fn test_parse_header_bad_magic() {
        let mut bytes = FileHeader::new(10, 1).to_bytes();
        bytes[0] = b'R';
        bytes[1] = b'I';
        assert!(matches!(
            parse_header(&bytes),
            Err(DecodeError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_parse_header_channel_bounds() {
        assert!(parse_header(&FileHeader::new(10, 0).to_bytes()).is_err());
        assert!(parse_header(&FileHeader::new(10, MAX_CHANNELS).to_bytes()).is_ok());
        assert!(parse_header(&FileHeader::new(10, MAX_CHANNELS + 1).to_bytes()).is_err());
    }

    #[test]
    fn test_packet_header_layout() {
        let bytes = PacketHeader::audio(0x0102_0304).to_bytes();
        assert_eq!(bytes, [b'p', b'a', 0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn test_parse_packet_header_soft_failures() {
        assert_eq!(parse_packet_header(&[b'p', b'a', 1]), None);

        let zero = parse_packet_header(&PacketHeader::audio(0).to_bytes()).unwrap();
        assert!(!zero.is_audio());

        let mut bytes = PacketHeader::audio(12).to_bytes();
        bytes[0] = b'x';
        let wrong_tag = parse_packet_header(&bytes).unwrap();
        assert!(!wrong_tag.is_audio());
        assert_eq!(wrong_tag.payload_len(), 12);

        let good = parse_packet_header(&PacketHeader::audio(12).to_bytes()).unwrap();
        assert!(good.is_audio());
    }

    #[test]
    fn test_sequential_walk_stays_in_bounds() {
        // Header followed by packets of assorted sizes, some not audio.
        let sizes = [5u32, 0, 17, 1, 40];
        let mut data = FileHeader::new(100, 1).to_bytes().to_vec();
        for (i, size) in sizes.iter().enumerate() {
            let mut header = PacketHeader::audio(*size);
            if i == 3 {
                header.magic = *b"??";
            }
            data.extend_from_slice(&header.to_bytes());
            data.extend(std::iter::repeat(0xAB).take(*size as usize));
        }

        parse_header(&data).unwrap();
        let mut offset = FILE_HEADER_SIZE;
        let mut seen = 0;
        while let Some(header) = parse_packet_header(&data[offset..]) {
            offset += PACKET_HEADER_SIZE;
            assert!(offset + header.payload_len() <= data.len());
            offset += header.payload_len();
            seen += 1;
        }

        assert_eq!(seen, sizes.len());
        assert_eq!(offset, data.len());
    }
}
