//! rftrim: cut WAV windows listed in a CSV job file
//!
//! Usage:
//!   rftrim --csv jobs.csv --from raw/ --to trimmed/ [--max-error 0.5] [--split-in-half]
//!
//! Exit codes: 0 success, 1 some jobs failed, 2 job file unreadable,
//! 3 invalid configuration.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use rf_trim::{CsvJobSource, DeletionPolicy, ErrorKind, TrimConfig, VERSION, run_batch};

const EXIT_JOB_FAILURES: u8 = 1;
const EXIT_JOB_FILE: u8 = 2;
const EXIT_CONFIG: u8 = 3;

#[derive(Parser, Debug)]
#[command(name = "rftrim", version, about = "Batch PCM WAV trimming")]
struct Cli {
    /// CSV job file (no header row)
    #[arg(long)]
    csv: PathBuf,

    /// Source directory
    #[arg(long)]
    from: Option<PathBuf>,

    /// Destination directory
    #[arg(long)]
    to: Option<PathBuf>,

    /// Skip jobs whose |1 - ratio| exceeds this (negative disables)
    #[arg(long, allow_negative_numbers = true)]
    max_ratio_error: Option<f64>,

    /// Skip jobs whose diff error exceeds this (negative disables)
    #[arg(long, allow_negative_numbers = true)]
    max_error: Option<f64>,

    /// Seconds added to every start time
    #[arg(long, allow_negative_numbers = true)]
    offset_start: Option<f64>,

    /// Seconds added to every end time
    #[arg(long, allow_negative_numbers = true)]
    offset_end: Option<f64>,

    /// Delete the source when diff error is at most this (negative disables)
    #[arg(long, allow_negative_numbers = true)]
    delete_source_error: Option<f64>,

    /// Delete the source when |1 - ratio| is at most this (negative disables)
    #[arg(long, allow_negative_numbers = true)]
    delete_source_ratio_error: Option<f64>,

    /// Report per-job failures
    #[arg(short, long)]
    verbose: bool,

    /// Write each window as two halves
    #[arg(long)]
    split_in_half: bool,

    #[arg(long)]
    src_file_index: Option<usize>,

    #[arg(long)]
    start_s_index: Option<usize>,

    #[arg(long)]
    end_s_index: Option<usize>,

    #[arg(long)]
    out_file_index: Option<usize>,

    #[arg(long)]
    error_index: Option<usize>,

    #[arg(long)]
    ratio_error_index: Option<usize>,

    /// Worker threads
    #[arg(short, long)]
    workers: Option<usize>,

    /// Largest trimmed data chunk a job may produce
    #[arg(long)]
    max_output_bytes: Option<u64>,

    /// CSV field delimiter
    #[arg(long)]
    delimiter: Option<char>,

    /// JSON config bundle; command line flags override it
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let (config, delimiter) = match build_config(&cli) {
        Ok(built) => built,
        Err(err) => {
            log::error!("{:#}", err);
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let jobs = match CsvJobSource::open_with_delimiter(&cli.csv, delimiter)
        .with_context(|| format!("cannot open job file {}", cli.csv.display()))
    {
        Ok(jobs) => jobs,
        Err(err) => {
            log::error!("{:#}", err);
            return ExitCode::from(EXIT_JOB_FILE);
        }
    };

    log_thresholds(&config);

    let summary = match run_batch(Arc::new(config), jobs) {
        Ok(summary) => summary,
        Err(err) => {
            log::error!("batch aborted: {}", err);
            return match err.kind() {
                ErrorKind::Config => ExitCode::from(EXIT_CONFIG),
                _ => ExitCode::from(EXIT_JOB_FAILURES),
            };
        }
    };

    println!("done");

    if summary.has_failures() {
        log::warn!(
            "{} malformed rows, {} unparsable jobs, {} failed cuts",
            summary.malformed_records,
            summary.skipped_parse,
            summary.cuts_failed
        );
        ExitCode::from(EXIT_JOB_FAILURES)
    } else {
        ExitCode::SUCCESS
    }
}

/// Config file (if any) overlaid with command line flags
fn build_config(cli: &Cli) -> Result<(TrimConfig, u8)> {
    let mut config = match &cli.config {
        Some(path) => TrimConfig::from_json_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => TrimConfig::default(),
    };

    if let Some(from) = &cli.from {
        config.source_dir = from.clone();
    }
    if let Some(to) = &cli.to {
        config.dest_dir = to.clone();
    }
    if config.dest_dir.as_os_str().is_empty() {
        bail!("no destination directory given (--to)");
    }

    if let Some(v) = cli.max_error {
        config.max_diff_error = threshold(v);
    }
    if let Some(v) = cli.max_ratio_error {
        config.max_ratio_error = threshold(v);
    }
    if let Some(v) = cli.delete_source_error {
        config.delete_diff_threshold = threshold(v);
    }
    if let Some(v) = cli.delete_source_ratio_error {
        config.delete_ratio_threshold = threshold(v);
    }
    if let Some(v) = cli.offset_start {
        config.offset_start = v;
    }
    if let Some(v) = cli.offset_end {
        config.offset_end = v;
    }

    config.verbose |= cli.verbose;
    config.split_in_half |= cli.split_in_half;

    let columns = &mut config.columns;
    let overrides = [
        (&mut columns.source, cli.src_file_index),
        (&mut columns.start, cli.start_s_index),
        (&mut columns.end, cli.end_s_index),
        (&mut columns.output, cli.out_file_index),
        (&mut columns.diff_error, cli.error_index),
        (&mut columns.ratio, cli.ratio_error_index),
    ];
    for (slot, value) in overrides {
        if let Some(index) = value {
            *slot = index;
        }
    }

    if let Some(workers) = cli.workers {
        config = config.with_workers(workers);
    }
    if let Some(bytes) = cli.max_output_bytes {
        config = config.with_max_output_bytes(bytes);
    }

    let delimiter = match cli.delimiter {
        None => b',',
        Some(c) if c.is_ascii() => c as u8,
        Some(c) => bail!("delimiter {:?} is not a single-byte character", c),
    };

    config.validate().context("invalid configuration")?;
    Ok((config, delimiter))
}

/// Negative values mean "not configured"
fn threshold(value: f64) -> Option<f64> {
    (value >= 0.0).then_some(value)
}

fn log_thresholds(config: &TrimConfig) {
    log::info!("rftrim {}", VERSION);
    let show = |v: Option<f64>| v.map_or_else(|| "off".to_string(), |v| v.to_string());
    log::info!("max error: {}", show(config.max_diff_error));
    log::info!("max ratio error: {}", show(config.max_ratio_error));
    log::info!("delete source error: {}", show(config.delete_diff_threshold));
    log::info!("delete source ratio error: {}", show(config.delete_ratio_threshold));
    if !DeletionPolicy::from_config(config).is_enabled()
        && (config.delete_diff_threshold.is_some() || config.delete_ratio_threshold.is_some())
    {
        log::warn!("source deletion needs both delete thresholds; no sources will be deleted");
    }
    log::info!(
        "offsets: start {:+}s, end {:+}s",
        config.offset_start,
        config.offset_end
    );
    if config.split_in_half {
        log::info!("splitting each window in half");
    }
}
