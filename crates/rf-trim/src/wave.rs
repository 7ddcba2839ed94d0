//! RIFF/WAVE header parsing
//!
//! Reads the canonical 44-byte PCM header and, when metadata chunks sit
//! between `fmt ` and `data`, walks the chunk list forward to the `data`
//! chunk within a bounded window.
//!
//! ```text
//! offset  size  field
//!  0      4     "RIFF"
//!  4      4     file size - 8
//!  8      4     "WAVE"
//! 12      4     "fmt "
//! 16      4     fmt chunk length (16)
//! 20      2     format code (1 = PCM)
//! 22      2     channels
//! 24      4     sample rate
//! 28      4     byte rate
//! 32      2     frame size (block align)
//! 34      2     bits per sample
//! 36      4     "data"
//! 40      4     data size
//! ```

use std::io::{Read, Seek, SeekFrom, Write};

use crate::error::{TrimError, TrimResult};

// ═══════════════════════════════════════════════════════════════════════════════
// CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

pub const RIFF_MAGIC: [u8; 4] = *b"RIFF";
pub const WAVE_MAGIC: [u8; 4] = *b"WAVE";
pub const FMT_CHUNK_ID: [u8; 4] = *b"fmt ";
pub const DATA_CHUNK_ID: [u8; 4] = *b"data";

/// PCM format code
pub const WAV_FORMAT_PCM: u16 = 1;

/// Length of the canonical header
pub const CANONICAL_HEADER_LEN: usize = 44;

/// Offset of the first chunk after the `WAVE` tag
const CHUNKS_OFFSET: u64 = 12;

/// Offset of the data tag in the canonical layout
const DATA_TAG_OFFSET: u64 = 36;

/// Length of a PCM fmt chunk body
const PCM_FMT_LEN: u32 = 16;

// ═══════════════════════════════════════════════════════════════════════════════
// WAVE HEADER
// ═══════════════════════════════════════════════════════════════════════════════

/// WAVE header fields, in file order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaveHeader {
    pub riff: [u8; 4],
    /// Total file bytes minus 8
    pub file_size: u32,
    pub wave: [u8; 4],
    pub fmt_tag: [u8; 4],
    pub fmt_len: u32,
    pub audio_format: u16,
    pub channels: u16,
    pub sample_rate: u32,
    /// Bytes per second of audio
    pub byte_rate: u32,
    /// Bytes per sample frame (all channels)
    pub frame_size: u16,
    pub bits_per_sample: u16,
    pub data_tag: [u8; 4],
    pub data_size: u32,
}

/// Parsed header plus the absolute offset of the first PCM byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocatedHeader {
    pub header: WaveHeader,
    pub data_offset: u64,
}

impl WaveHeader {
    /// Well-formed PCM header for the given format and payload size
    pub fn canonical(
        sample_rate: u32,
        channels: u16,
        bits_per_sample: u16,
        data_size: u32,
    ) -> TrimResult<Self> {
        let overflow = || TrimError::Format("header field overflows".into());
        let frame_size = channels
            .checked_mul(bits_per_sample.div_ceil(8))
            .ok_or_else(overflow)?;
        let byte_rate = sample_rate
            .checked_mul(u32::from(frame_size))
            .ok_or_else(overflow)?;
        let file_size = data_size.checked_add(36).ok_or_else(overflow)?;

        Ok(Self {
            riff: RIFF_MAGIC,
            file_size,
            wave: WAVE_MAGIC,
            fmt_tag: FMT_CHUNK_ID,
            fmt_len: PCM_FMT_LEN,
            audio_format: WAV_FORMAT_PCM,
            channels,
            sample_rate,
            byte_rate,
            frame_size,
            bits_per_sample,
            data_tag: DATA_CHUNK_ID,
            data_size,
        })
    }

    /// Decode the fixed 44-byte layout without validating it
    pub fn from_bytes(raw: &[u8; CANONICAL_HEADER_LEN]) -> Self {
        let tag = |at: usize| -> [u8; 4] { [raw[at], raw[at + 1], raw[at + 2], raw[at + 3]] };
        let u32_at = |at: usize| u32::from_le_bytes(tag(at));
        let u16_at = |at: usize| u16::from_le_bytes([raw[at], raw[at + 1]]);

        Self {
            riff: tag(0),
            file_size: u32_at(4),
            wave: tag(8),
            fmt_tag: tag(12),
            fmt_len: u32_at(16),
            audio_format: u16_at(20),
            channels: u16_at(22),
            sample_rate: u32_at(24),
            byte_rate: u32_at(28),
            frame_size: u16_at(32),
            bits_per_sample: u16_at(34),
            data_tag: tag(36),
            data_size: u32_at(40),
        }
    }

    /// Encode as the fixed 44-byte little-endian layout
    pub fn to_bytes(&self) -> [u8; CANONICAL_HEADER_LEN] {
        let mut buf = [0u8; CANONICAL_HEADER_LEN];
        buf[0..4].copy_from_slice(&self.riff);
        buf[4..8].copy_from_slice(&self.file_size.to_le_bytes());
        buf[8..12].copy_from_slice(&self.wave);
        buf[12..16].copy_from_slice(&self.fmt_tag);
        buf[16..20].copy_from_slice(&self.fmt_len.to_le_bytes());
        buf[20..22].copy_from_slice(&self.audio_format.to_le_bytes());
        buf[22..24].copy_from_slice(&self.channels.to_le_bytes());
        buf[24..28].copy_from_slice(&self.sample_rate.to_le_bytes());
        buf[28..32].copy_from_slice(&self.byte_rate.to_le_bytes());
        buf[32..34].copy_from_slice(&self.frame_size.to_le_bytes());
        buf[34..36].copy_from_slice(&self.bits_per_sample.to_le_bytes());
        buf[36..40].copy_from_slice(&self.data_tag);
        buf[40..44].copy_from_slice(&self.data_size.to_le_bytes());
        buf
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(&self.to_bytes())
    }

    /// Duration of the data chunk in seconds
    pub fn duration_secs(&self) -> f64 {
        if self.byte_rate == 0 {
            0.0
        } else {
            self.data_size as f64 / self.byte_rate as f64
        }
    }

    /// Frame size used for alignment; never zero
    pub fn frame_bytes(&self) -> u64 {
        u64::from(self.frame_size.max(1))
    }

    /// Parse a header from the start of `reader` and find the data chunk.
    ///
    /// On success the reader is positioned at `data_offset`.
    pub fn locate<R: Read + Seek>(reader: &mut R, scan_limit: u64) -> TrimResult<LocatedHeader> {
        reader.seek(SeekFrom::Start(0))?;

        let mut raw = [0u8; CANONICAL_HEADER_LEN];
        reader.read_exact(&mut raw)?;
        let mut header = Self::from_bytes(&raw);

        if header.riff != RIFF_MAGIC {
            return Err(TrimError::Format("not a RIFF file".into()));
        }
        if header.wave != WAVE_MAGIC {
            return Err(TrimError::Format("not a WAVE file".into()));
        }

        let data_offset = if header.fmt_len == PCM_FMT_LEN && header.data_tag == DATA_CHUNK_ID {
            CANONICAL_HEADER_LEN as u64
        } else {
            let (data_size, offset) = scan_for_data(reader, scan_limit)?;
            header.data_tag = DATA_CHUNK_ID;
            header.data_size = data_size;
            reader.seek(SeekFrom::Start(offset))?;
            log::debug!("data chunk found at offset {} after non-canonical chunks", offset);
            offset
        };

        if header.byte_rate == 0 {
            return Err(TrimError::Format("byte rate is zero".into()));
        }

        Ok(LocatedHeader {
            header,
            data_offset,
        })
    }
}

/// Where a chunk walk over the region starting at `CHUNKS_OFFSET` ended
enum ChunkWalk {
    /// Region offset of the data chunk header and its declared size
    Found(u64, u32),
    /// Next chunk starts past the scan limit
    OutOfRange,
    /// A chunk size points past the end of the file
    Malformed,
}

/// Find the data chunk behind non-canonical chunks.
///
/// Chunk headers are walked from the first chunk after `WAVE` (id + LE size,
/// odd sizes padded). Only when a chunk size is inconsistent with the file
/// does it fall back to sliding a 4-byte window for the `data` tag.
///
/// Returns the data size and the offset right after the size field.
fn scan_for_data<R: Read + Seek>(reader: &mut R, scan_limit: u64) -> TrimResult<(u32, u64)> {
    let file_len = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(CHUNKS_OFFSET))?;

    // a chunk header may start anywhere up to DATA_TAG_OFFSET + scan_limit
    let last_start = (DATA_TAG_OFFSET - CHUNKS_OFFSET).saturating_add(scan_limit);
    let mut region = Vec::new();
    reader
        .by_ref()
        .take(last_start.saturating_add(8))
        .read_to_end(&mut region)?;

    let (pos, data_size) = match walk_chunks(&region, last_start, file_len - CHUNKS_OFFSET) {
        ChunkWalk::Found(pos, size) => (pos, size),
        ChunkWalk::OutOfRange => {
            return Err(TrimError::Format(format!(
                "no data chunk within {} bytes of the header",
                scan_limit
            )));
        }
        ChunkWalk::Malformed => {
            log::debug!("inconsistent chunk sizes, searching for the data tag");
            window_scan(&region, last_start)?
        }
    };

    Ok((data_size, CHUNKS_OFFSET + pos + 8))
}

fn walk_chunks(region: &[u8], last_start: u64, region_len: u64) -> ChunkWalk {
    let mut pos = 0u64;
    while pos <= last_start {
        let at = pos as usize;
        let Some(head) = region.get(at..at + 8) else {
            return ChunkWalk::Malformed;
        };
        let size = u32::from_le_bytes([head[4], head[5], head[6], head[7]]);
        if head[..4] == DATA_CHUNK_ID {
            return ChunkWalk::Found(pos, size);
        }

        let body = u64::from(size) + u64::from(size & 1);
        pos += 8 + body;
        if pos > region_len {
            return ChunkWalk::Malformed;
        }
    }
    ChunkWalk::OutOfRange
}

/// Byte-wise search for the data tag from the canonical tag position
fn window_scan(region: &[u8], last_start: u64) -> TrimResult<(u64, u32)> {
    let first = (DATA_TAG_OFFSET - CHUNKS_OFFSET) as usize;
    let found = region
        .get(first..)
        .unwrap_or_default()
        .windows(DATA_CHUNK_ID.len())
        .position(|window| window == DATA_CHUNK_ID)
        .map(|p| (first + p) as u64)
        .filter(|&pos| pos <= last_start);

    let pos = found.ok_or_else(|| TrimError::Format("no data chunk found".into()))?;
    let at = pos as usize;
    let size_bytes = region
        .get(at + 4..at + 8)
        .ok_or_else(|| TrimError::Format("data chunk header truncated".into()))?;
    let data_size = u32::from_le_bytes([size_bytes[0], size_bytes[1], size_bytes[2], size_bytes[3]]);

    Ok((pos, data_size))
}
