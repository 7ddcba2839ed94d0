//! Configuration types for batch trimming
//!
//! A [`TrimConfig`] is built once (from CLI flags, a JSON file, or both),
//! validated, and then shared read-only with every worker.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{TrimError, TrimResult};

/// Default number of worker threads
pub const DEFAULT_WORKERS: usize = 10;

/// Default cap on the data size of a single trimmed output (bytes)
pub const DEFAULT_MAX_OUTPUT_BYTES: u64 = 5_000_000;

/// Default forward search window for the `data` tag (bytes)
pub const DEFAULT_HEADER_SCAN_LIMIT: u64 = 1 << 20;

/// Column positions inside a job record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnLayout {
    pub source: usize,
    pub start: usize,
    pub end: usize,
    pub output: usize,
    /// Optional diff-error column
    pub diff_error: usize,
    /// Optional ratio column (ratio error is derived as |1 - ratio|)
    pub ratio: usize,
}

impl Default for ColumnLayout {
    fn default() -> Self {
        Self {
            source: 0,
            start: 1,
            end: 2,
            output: 3,
            diff_error: 4,
            ratio: 5,
        }
    }
}

/// Batch trimming configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrimConfig {
    /// Directory source file names are resolved against
    pub source_dir: PathBuf,

    /// Directory output file names are resolved against
    pub dest_dir: PathBuf,

    /// Skip jobs whose diff error exceeds this (active only when > 0)
    pub max_diff_error: Option<f64>,

    /// Skip jobs whose ratio error exceeds this (active only when > 0)
    pub max_ratio_error: Option<f64>,

    /// Seconds added to every requested start time
    pub offset_start: f64,

    /// Seconds added to every requested end time
    pub offset_end: f64,

    /// Delete the source when its diff error is at most this
    pub delete_diff_threshold: Option<f64>,

    /// Delete the source when its ratio error is at most this
    pub delete_ratio_threshold: Option<f64>,

    /// Surface per-job and deletion failures at warn level
    pub verbose: bool,

    /// Cut every job into two halves
    pub split_in_half: bool,

    /// File name prefixes for the first and second half in split mode
    pub split_prefixes: (String, String),

    /// Column positions inside each job record
    pub columns: ColumnLayout,

    /// Number of worker threads
    pub workers: usize,

    /// Depth of the job queue between producer and workers
    pub queue_capacity: usize,

    /// Largest data chunk a single output may carry (bytes)
    pub max_output_bytes: u64,

    /// How far past the canonical header to search for the data chunk (bytes)
    pub header_scan_limit: u64,

    /// Log progress every N submitted records (0 = never)
    pub progress_interval: u64,
}

impl Default for TrimConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::new(),
            dest_dir: PathBuf::new(),
            max_diff_error: None,
            max_ratio_error: None,
            offset_start: 0.0,
            offset_end: 0.0,
            delete_diff_threshold: None,
            delete_ratio_threshold: None,
            verbose: false,
            split_in_half: false,
            split_prefixes: ("a_".to_string(), "b_".to_string()),
            columns: ColumnLayout::default(),
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_WORKERS,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            header_scan_limit: DEFAULT_HEADER_SCAN_LIMIT,
            progress_interval: 1000,
        }
    }
}

impl TrimConfig {
    /// Create config for the given source and destination directories
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(source_dir: P, dest_dir: Q) -> Self {
        Self {
            source_dir: source_dir.into(),
            dest_dir: dest_dir.into(),
            ..Default::default()
        }
    }

    /// Load a config bundle from a JSON file; missing keys keep their defaults
    pub fn from_json_file(path: &Path) -> TrimResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            TrimError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Set worker count; the queue depth follows it
    pub fn with_workers(mut self, count: usize) -> Self {
        self.workers = count;
        self.queue_capacity = count;
        self
    }

    /// Set quality gate thresholds
    pub fn with_quality_gate(mut self, max_diff: Option<f64>, max_ratio: Option<f64>) -> Self {
        self.max_diff_error = max_diff;
        self.max_ratio_error = max_ratio;
        self
    }

    /// Set source deletion thresholds
    pub fn with_deletion(mut self, diff: Option<f64>, ratio: Option<f64>) -> Self {
        self.delete_diff_threshold = diff;
        self.delete_ratio_threshold = ratio;
        self
    }

    /// Set global start/end offsets in seconds
    pub fn with_offsets(mut self, start: f64, end: f64) -> Self {
        self.offset_start = start;
        self.offset_end = end;
        self
    }

    /// Enable or disable split-in-half mode
    pub fn with_split(mut self, split: bool) -> Self {
        self.split_in_half = split;
        self
    }

    /// Set output size cap
    pub fn with_max_output_bytes(mut self, bytes: u64) -> Self {
        self.max_output_bytes = bytes;
        self
    }

    /// Set column layout
    pub fn with_columns(mut self, columns: ColumnLayout) -> Self {
        self.columns = columns;
        self
    }

    /// Enable verbose failure reporting
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn source_path(&self, name: &str) -> PathBuf {
        self.source_dir.join(name)
    }

    pub fn dest_path(&self, name: &str) -> PathBuf {
        self.dest_dir.join(name)
    }

    /// Check the bundle before any worker starts
    pub fn validate(&self) -> TrimResult<()> {
        if self.workers == 0 {
            return Err(TrimError::Config("workers must be at least 1".into()));
        }
        if self.queue_capacity == 0 {
            return Err(TrimError::Config("queue capacity must be at least 1".into()));
        }
        if self.max_output_bytes == 0 {
            return Err(TrimError::Config("max output bytes must be greater than zero".into()));
        }
        if self.max_output_bytes > u64::from(u32::MAX) {
            return Err(TrimError::Config(format!(
                "max output bytes {} exceeds the WAV data size limit",
                self.max_output_bytes
            )));
        }
        if !self.offset_start.is_finite() || !self.offset_end.is_finite() {
            return Err(TrimError::Config("offsets must be finite".into()));
        }

        let thresholds = [
            ("max diff error", self.max_diff_error),
            ("max ratio error", self.max_ratio_error),
            ("delete diff threshold", self.delete_diff_threshold),
            ("delete ratio threshold", self.delete_ratio_threshold),
        ];
        for (name, value) in thresholds {
            if let Some(v) = value {
                if v.is_nan() || v < 0.0 {
                    return Err(TrimError::Config(format!("{} must be >= 0, got {}", name, v)));
                }
            }
        }

        let (a, b) = &self.split_prefixes;
        if self.split_in_half && a == b {
            return Err(TrimError::Config("split prefixes must differ".into()));
        }

        Ok(())
    }
}
