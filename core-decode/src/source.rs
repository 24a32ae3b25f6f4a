//! # Packet Source
//!
//! Where a decoder reads its packets from, in one of two modes:
//!
//! - **Buffered**: the whole file is read into memory when the decoder is
//!   opened. Packets are slices into that block and no file handle is kept.
//! - **Streamed**: the file stays open and every packet is read from disk
//!   into a scratch buffer sized for the largest packet.
//!
//! Both modes share one read cursor, an absolute byte offset into the file
//! that never moves past the end of the data.

use crate::config::SourceMode;
use crate::error::{DecodeError, Result};
use crate::format::{
    parse_header, parse_packet_header, FileHeader, FILE_HEADER_SIZE, MAX_PACKET_SIZE,
    PACKET_HEADER_SIZE,
};
use bytes::Bytes;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Outcome of reading one channel's packet.
#[derive(Debug)]
pub(crate) enum PacketRead<'a> {
    /// Compressed payload to hand to the channel decoder.
    Audio(&'a [u8]),
    /// Packet that carries no audio; its payload was stepped over.
    Skipped,
    /// Not enough data left for the packet. The cursor is at the end.
    Truncated,
}

enum SourceData {
    Buffered(Bytes),
    Streamed {
        file: Option<File>,
        scratch: Vec<u8>,
    },
}

pub(crate) struct PacketSource {
    path: PathBuf,
    header: FileHeader,
    data: SourceData,
    cursor: usize,
    end: usize,
    open: bool,
}

impl PacketSource {
    /// Open `path` and validate its header.
    pub(crate) fn open(path: &Path, mode: SourceMode) -> Result<Self> {
        match mode {
            SourceMode::Buffered => Self::open_buffered(path),
            SourceMode::Streamed => Self::open_streamed(path),
        }
    }

    fn open_buffered(path: &Path) -> Result<Self> {
        let bytes =
            std::fs::read(path).map_err(|e| DecodeError::source_error(path, e.to_string()))?;
        let header = parse_header(&bytes)?;
        let end = bytes.len();

        Ok(Self {
            path: path.to_path_buf(),
            header,
            data: SourceData::Buffered(Bytes::from(bytes)),
            cursor: FILE_HEADER_SIZE,
            end,
            open: true,
        })
    }

    fn open_streamed(path: &Path) -> Result<Self> {
        let (file, header, end) = open_file(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            header,
            data: SourceData::Streamed {
                file: Some(file),
                scratch: vec![0; MAX_PACKET_SIZE],
            },
            cursor: FILE_HEADER_SIZE,
            end,
            open: true,
        })
    }

    pub(crate) fn header(&self) -> FileHeader {
        self.header
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn mode(&self) -> SourceMode {
        match self.data {
            SourceData::Buffered(_) => SourceMode::Buffered,
            SourceData::Streamed { .. } => SourceMode::Streamed,
        }
    }

    pub(crate) fn position(&self) -> usize {
        self.cursor
    }

    /// Total file size; the cursor never moves past it.
    pub(crate) fn data_end(&self) -> usize {
        self.end
    }

    pub(crate) fn is_open(&self) -> bool {
        self.open
    }

    pub(crate) fn is_exhausted(&self) -> bool {
        self.cursor >= self.end
    }

    /// Read the next packet for one channel.
    pub(crate) fn next_packet(&mut self) -> PacketRead<'_> {
        let remaining = self.end - self.cursor;
        if remaining < PACKET_HEADER_SIZE {
            if remaining > 0 {
                debug!(remaining, "Trailing bytes too short for a packet header");
            }
            self.cursor = self.end;
            return PacketRead::Truncated;
        }

        let header = match &mut self.data {
            SourceData::Buffered(bytes) => parse_packet_header(&bytes[self.cursor..self.end]),
            SourceData::Streamed { file, .. } => {
                let mut raw = [0u8; PACKET_HEADER_SIZE];
                match file.as_mut().map(|f| f.read_exact(&mut raw)) {
                    Some(Ok(())) => parse_packet_header(&raw),
                    Some(Err(e)) => {
                        warn!(position = self.cursor, "Packet header read failed: {}", e);
                        None
                    }
                    None => None,
                }
            }
        };

        let Some(header) = header else {
            self.cursor = self.end;
            return PacketRead::Truncated;
        };
        self.cursor += PACKET_HEADER_SIZE;

        let len = header.payload_len();
        if len > self.end - self.cursor {
            warn!(
                position = self.cursor,
                payload = len,
                available = self.end - self.cursor,
                "Packet payload runs past the end of the data"
            );
            self.cursor = self.end;
            return PacketRead::Truncated;
        }

        if !header.is_audio() {
            debug!(
                position = self.cursor,
                payload = len,
                "Skipping packet without audio"
            );
            return self.skip_payload(len);
        }

        if self.mode().is_streamed() && len > MAX_PACKET_SIZE {
            warn!(
                payload = len,
                limit = MAX_PACKET_SIZE,
                "Skipping oversized packet"
            );
            return self.skip_payload(len);
        }

        match &mut self.data {
            SourceData::Buffered(bytes) => {
                let start = self.cursor;
                self.cursor += len;
                PacketRead::Audio(&bytes[start..start + len])
            }
            SourceData::Streamed { file, scratch } => {
                let Some(file) = file.as_mut() else {
                    self.cursor = self.end;
                    return PacketRead::Truncated;
                };
                match file.read_exact(&mut scratch[..len]) {
                    Ok(()) => {
                        self.cursor += len;
                        PacketRead::Audio(&scratch[..len])
                    }
                    Err(e) => {
                        warn!(position = self.cursor, "Packet read failed: {}", e);
                        self.cursor = self.end;
                        PacketRead::Truncated
                    }
                }
            }
        }
    }

    fn skip_payload(&mut self, len: usize) -> PacketRead<'_> {
        if let SourceData::Streamed {
            file: Some(file), ..
        } = &mut self.data
        {
            if let Err(e) = file.seek(SeekFrom::Current(len as i64)) {
                warn!(position = self.cursor, "Seek past packet failed: {}", e);
                self.cursor = self.end;
                return PacketRead::Truncated;
            }
        }
        self.cursor += len;
        PacketRead::Skipped
    }

    /// Move the cursor back to the first packet.
    pub(crate) fn rewind(&mut self) -> Result<()> {
        if !self.open {
            return Err(DecodeError::StreamClosed);
        }

        if let SourceData::Streamed { file, .. } = &mut self.data {
            let file = file.as_mut().ok_or(DecodeError::StreamClosed)?;
            file.seek(SeekFrom::Start(FILE_HEADER_SIZE as u64))?;
        }
        self.cursor = FILE_HEADER_SIZE;
        Ok(())
    }

    /// Release the file handle. Buffered data stays resident.
    pub(crate) fn close(&mut self) {
        if let SourceData::Streamed { file, .. } = &mut self.data {
            *file = None;
        }
        self.open = false;
    }

    /// Make the source readable again after [`close`](Self::close).
    ///
    /// A streamed file is reopened and its header must still match.
    pub(crate) fn reopen(&mut self) -> Result<()> {
        if let SourceData::Streamed { file, .. } = &mut self.data {
            if file.is_none() {
                let (reopened, header, end) = open_file(&self.path)?;
                if header != self.header {
                    return Err(DecodeError::InvalidFormat(format!(
                        "header of {} changed while closed",
                        self.path.display()
                    )));
                }
                *file = Some(reopened);
                self.end = end;
                self.cursor = FILE_HEADER_SIZE;
            }
        }
        self.open = true;
        Ok(())
    }
}

impl std::fmt::Debug for PacketSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketSource")
            .field("path", &self.path)
            .field("mode", &self.mode())
            .field("cursor", &self.cursor)
            .field("end", &self.end)
            .field("open", &self.open)
            .finish()
    }
}

/// Open a file and leave it positioned just past its header.
fn open_file(path: &Path) -> Result<(File, FileHeader, usize)> {
    let mut file = File::open(path).map_err(|e| DecodeError::source_error(path, e.to_string()))?;
    let end = file
        .metadata()
        .map_err(|e| DecodeError::source_error(path, e.to_string()))?
        .len() as usize;

    let mut raw = Vec::with_capacity(FILE_HEADER_SIZE);
    (&mut file)
        .take(FILE_HEADER_SIZE as u64)
        .read_to_end(&mut raw)
        .map_err(|e| DecodeError::source_error(path, e.to_string()))?;
    let header = parse_header(&raw)?;

    Ok((file, header, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::PacketHeader;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_file(bytes: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        file
    }

    fn container(packets: &[(&[u8; 2], &[u8])]) -> Vec<u8> {
        let mut data = FileHeader::new(0, 1).to_bytes().to_vec();
        for (magic, payload) in packets {
            let header = PacketHeader {
                magic: **magic,
                payload_size: payload.len() as u32,
            };
            data.extend_from_slice(&header.to_bytes());
            data.extend_from_slice(payload);
        }
        data
    }

    fn both_modes(bytes: &[u8], check: impl Fn(PacketSource)) {
        let file = write_file(bytes);
        check(PacketSource::open(file.path(), SourceMode::Buffered).unwrap());
        check(PacketSource::open(file.path(), SourceMode::Streamed).unwrap());
    }

    #[test]
    fn test_reads_packets_in_order() {
        let bytes = container(&[(b"pa", &[1, 2, 3]), (b"pa", &[4])]);
        both_modes(&bytes, |mut source| {
            assert!(matches!(source.next_packet(), PacketRead::Audio(&[1, 2, 3])));
            assert!(matches!(source.next_packet(), PacketRead::Audio(&[4])));
            assert!(source.is_exhausted());
            assert_eq!(source.position(), bytes.len());
        });
    }

    #[test]
    fn test_wrong_magic_skips_exactly_payload() {
        let bytes = container(&[(b"xx", &[9, 9, 9, 9]), (b"pa", &[7])]);
        both_modes(&bytes, |mut source| {
            assert!(matches!(source.next_packet(), PacketRead::Skipped));
            assert_eq!(source.position(), FILE_HEADER_SIZE + PACKET_HEADER_SIZE + 4);
            assert!(matches!(source.next_packet(), PacketRead::Audio(&[7])));
        });
    }

    #[test]
    fn test_oversized_payload_ends_stream() {
        let mut bytes = container(&[(b"pa", &[1, 2])]);
        // Declare more payload than the file holds.
        bytes[FILE_HEADER_SIZE + 2] = 200;
        both_modes(&bytes, |mut source| {
            assert!(matches!(source.next_packet(), PacketRead::Truncated));
            assert_eq!(source.position(), source.data_end());
        });
    }

    #[test]
    fn test_short_tail_is_truncation() {
        let mut bytes = container(&[(b"pa", &[5])]);
        bytes.extend_from_slice(b"pa");
        both_modes(&bytes, |mut source| {
            assert!(matches!(source.next_packet(), PacketRead::Audio(&[5])));
            assert!(matches!(source.next_packet(), PacketRead::Truncated));
            assert!(source.is_exhausted());
        });
    }

    #[test]
    fn test_streamed_skips_packet_larger_than_scratch() {
        let big = vec![0u8; MAX_PACKET_SIZE + 1];
        let bytes = container(&[(b"pa", &big), (b"pa", &[3])]);
        let file = write_file(&bytes);

        let mut source = PacketSource::open(file.path(), SourceMode::Streamed).unwrap();
        assert!(matches!(source.next_packet(), PacketRead::Skipped));
        assert!(matches!(source.next_packet(), PacketRead::Audio(&[3])));
    }

    #[test]
    fn test_rewind_and_reopen() {
        let bytes = container(&[(b"pa", &[1]), (b"pa", &[2])]);
        both_modes(&bytes, |mut source| {
            source.next_packet();
            source.rewind().unwrap();
            assert!(matches!(source.next_packet(), PacketRead::Audio(&[1])));

            source.close();
            assert!(!source.is_open());
            assert!(matches!(source.rewind(), Err(DecodeError::StreamClosed)));

            source.reopen().unwrap();
            source.rewind().unwrap();
            assert!(matches!(source.next_packet(), PacketRead::Audio(&[1])));
        });
    }

    #[test]
    fn test_open_failures() {
        let missing = PacketSource::open(Path::new("/nonexistent/file.zs"), SourceMode::Buffered);
        assert!(matches!(missing, Err(DecodeError::SourceError { .. })));

        let short = write_file(b"ZE\x01");
        for mode in [SourceMode::Buffered, SourceMode::Streamed] {
            let err = PacketSource::open(short.path(), mode).unwrap_err();
            assert!(err.is_format_error());
        }
    }
}
