//! Time-to-byte trim arithmetic
//!
//! Converts a `[start, end]` window in seconds into a byte range inside the
//! source data chunk and a corrected header for the shortened output.
//!
//! Both boundaries are rounded to the nearest whole sample frame
//! (`f64::round`, ties away from zero). The end cut is derived from the
//! rounded end position, so cutting `[a, m]` and `[m, b]` yields outputs
//! whose lengths sum exactly to the cut of `[a, b]`.

use crate::error::{TrimError, TrimResult};
use crate::wave::{CANONICAL_HEADER_LEN, DATA_CHUNK_ID, LocatedHeader, WaveHeader};

/// Byte-level plan for one cut
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrimPlan {
    /// Header to write in front of the trimmed data
    pub header: WaveHeader,
    /// Absolute source offset of the first byte to copy
    pub copy_start: u64,
    /// Number of data bytes to copy
    pub copy_len: u32,
    /// Data bytes dropped before the window
    pub cut_front: u64,
    /// Data bytes dropped after the window
    pub cut_end: u64,
}

impl TrimPlan {
    pub fn compute(located: &LocatedHeader, start: f64, end: f64) -> TrimResult<Self> {
        if !start.is_finite() || !end.is_finite() {
            return Err(TrimError::Range(format!(
                "non-finite window [{}, {}]",
                start, end
            )));
        }
        if start < 0.0 {
            return Err(TrimError::Range(format!("start {:.6}s is negative", start)));
        }

        let source = located.header;
        let data_size = u64::from(source.data_size);
        let byte_rate = f64::from(source.byte_rate);
        let duration = source.duration_secs();

        if end > duration {
            return Err(TrimError::Range(format!(
                "end {:.6}s beyond source duration {:.6}s",
                end, duration
            )));
        }

        if start >= end {
            return Err(TrimError::Range(format!(
                "start {:.6}s is not before end {:.6}s",
                start, end
            )));
        }

        let frame = source.frame_bytes();
        let cut_front = round_to_frame(byte_rate * start, frame).min(data_size);
        let end_pos = round_to_frame(byte_rate * end, frame).min(data_size);
        let cut_end = data_size - end_pos;
        let total_cut = cut_front.saturating_add(cut_end);

        if total_cut >= data_size {
            return Err(TrimError::Range(format!(
                "start {:.6}s beyond end {:.6}s, nothing left to cut",
                start, end
            )));
        }

        let new_size = data_size - total_cut;

        // Chunks between fmt and data are not carried into the canonical output
        let dropped_chunks = located
            .data_offset
            .saturating_sub(CANONICAL_HEADER_LEN as u64);
        let file_size = u64::from(source.file_size).saturating_sub(total_cut + dropped_chunks);

        let mut header = source;
        header.fmt_len = 16;
        header.data_tag = DATA_CHUNK_ID;
        header.data_size = new_size as u32;
        header.file_size = file_size as u32;

        Ok(Self {
            header,
            copy_start: located.data_offset + cut_front,
            copy_len: new_size as u32,
            cut_front,
            cut_end,
        })
    }

    /// Audio bytes removed from the source data chunk
    pub fn bytes_removed(&self) -> u64 {
        self.cut_front + self.cut_end
    }

    /// One past the last byte to copy
    pub fn copy_end(&self) -> u64 {
        self.copy_start + u64::from(self.copy_len)
    }
}

fn round_to_frame(bytes: f64, frame: u64) -> u64 {
    let frames = (bytes / frame as f64).round();
    if frames <= 0.0 {
        0
    } else {
        // float-to-int casts saturate
        (frames as u64).saturating_mul(frame)
    }
}
