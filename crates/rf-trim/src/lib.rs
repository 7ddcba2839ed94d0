//! RF-Trim — Batch PCM WAV Trimming
//!
//! Cuts time windows out of PCM WAV files driven by a job list:
//! - Locate the `data` chunk behind arbitrary intervening chunks
//! - Frame-aligned window computation with global offsets
//! - Optional split of each window into two halves
//! - Quality gate on per-job diff / ratio error signals
//! - Source deletion once a verified cut succeeded
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        BatchScheduler                           │
//! │                                                                 │
//! │  ┌──────────┐   ┌──────────────────────────────────────────┐    │
//! │  │ CsvJob   │ → │        bounded queue (crossbeam)         │    │
//! │  │ Source   │   │  [Rec1] [Rec2] ... [RecN] → N workers    │    │
//! │  └──────────┘   └──────────────────────────────────────────┘    │
//! │                                    │                            │
//! │  per worker:                       ▼                            │
//! │  ┌────────┐   ┌──────────┐   ┌──────────┐   ┌───────────────┐   │
//! │  │ Parse  │ → │ Quality  │ → │ WavCutter│ → │ Deletion      │   │
//! │  │ record │   │ gate     │   │ (atomic) │   │ policy        │   │
//! │  └────────┘   └──────────┘   └──────────┘   └───────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use rf_trim::{CsvJobSource, TrimConfig, run_batch};
//!
//! let config = TrimConfig::new("/data/raw", "/data/trimmed")
//!     .with_quality_gate(Some(0.5), None)
//!     .with_workers(8);
//!
//! let summary = run_batch(Arc::new(config), CsvJobSource::open("jobs.csv")?)?;
//! println!("{} cuts written", summary.cuts_ok);
//! ```

mod batch;
mod config;
mod cutter;
mod error;
mod gate;
mod job;
mod source;
mod trim;
mod wave;

#[cfg(test)]
mod test_support;

pub use batch::*;
pub use config::*;
pub use cutter::*;
pub use error::*;
pub use gate::*;
pub use job::*;
pub use source::*;
pub use trim::*;
pub use wave::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
