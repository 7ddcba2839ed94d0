//! Single-cut execution
//!
//! Opens a source, plans the cut, copies the trimmed range through a
//! reusable scratch buffer and publishes the result atomically: data goes
//! to a temp file in the destination directory which is renamed onto the
//! final name only after every write succeeded.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::TrimConfig;
use crate::error::{TrimError, TrimResult};
use crate::trim::TrimPlan;
use crate::wave::WaveHeader;

/// One cut: source window to destination file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrimRequest {
    pub source: PathBuf,
    pub dest: PathBuf,
    /// Window start in seconds (offsets already applied)
    pub start: f64,
    /// Window end in seconds (offsets already applied)
    pub end: f64,
}

/// Successful cut summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CutReport {
    pub dest: PathBuf,
    /// Data chunk size of the output
    pub data_size: u32,
    /// Audio bytes dropped from the source data chunk
    pub bytes_removed: u64,
    /// Output duration in seconds
    pub duration_secs: f64,
}

/// Stateless cutter apart from its scratch buffer; one per worker
#[derive(Debug)]
pub struct WavCutter {
    scratch: Vec<u8>,
    max_output_bytes: u64,
    header_scan_limit: u64,
}

impl WavCutter {
    pub fn new(max_output_bytes: u64, header_scan_limit: u64) -> Self {
        Self {
            scratch: Vec::new(),
            max_output_bytes,
            header_scan_limit,
        }
    }

    pub fn from_config(config: &TrimConfig) -> Self {
        Self::new(config.max_output_bytes, config.header_scan_limit)
    }

    /// Bytes currently reserved by the scratch buffer
    pub fn scratch_capacity(&self) -> usize {
        self.scratch.capacity()
    }

    /// Perform one cut. The source is only ever read.
    pub fn cut(&mut self, request: &TrimRequest) -> TrimResult<CutReport> {
        let file = File::open(&request.source)?;
        let mut reader = BufReader::new(file);

        let located = WaveHeader::locate(&mut reader, self.header_scan_limit)?;
        let plan = TrimPlan::compute(&located, request.start, request.end)?;

        let required = u64::from(plan.copy_len);
        if required > self.max_output_bytes {
            return Err(TrimError::ResourceLimit {
                required,
                limit: self.max_output_bytes,
            });
        }

        let len = plan.copy_len as usize;
        if self.scratch.len() < len {
            self.scratch.resize(len, 0);
        }
        let data = &mut self.scratch[..len];

        reader.seek(SeekFrom::Start(plan.copy_start))?;
        reader.read_exact(data)?;

        write_atomic(&request.dest, &plan.header, data)?;

        log::debug!(
            "cut {} [{:.3}s, {:.3}s] -> {} ({} bytes)",
            request.source.display(),
            request.start,
            request.end,
            request.dest.display(),
            plan.copy_len
        );

        Ok(CutReport {
            dest: request.dest.clone(),
            data_size: plan.copy_len,
            bytes_removed: plan.bytes_removed(),
            duration_secs: plan.header.duration_secs(),
        })
    }
}

/// Write header + data next to `dest`, then rename into place
fn write_atomic(dest: &Path, header: &WaveHeader, data: &[u8]) -> TrimResult<()> {
    let dir = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut builder = tempfile::Builder::new();
    builder.prefix(".rftrim-").suffix(".part");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o644));
    }
    let mut tmp = builder.tempfile_in(dir)?;

    let file = tmp.as_file_mut();
    header.write_to(file)?;
    file.write_all(data)?;
    file.sync_all()?;

    // On failure the temp file is removed when `PersistError::file` drops
    tmp.persist(dest).map_err(|e| e.error)?;
    Ok(())
}
