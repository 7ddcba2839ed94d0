//! Batch scheduler
//!
//! A fixed pool of named worker threads pulls [`JobRecord`]s from a bounded
//! queue. Each worker owns its own [`WavCutter`] (and therefore its own
//! scratch buffer), so the copy path needs no locking.
//!
//! Close/drain protocol:
//! 1. the producer calls [`BatchScheduler::submit`], which blocks while the
//!    queue is full;
//! 2. [`BatchScheduler::finish`] drops the only sender, closing the queue;
//! 3. workers keep receiving until the queue is both closed and empty, then
//!    return their per-worker stats;
//! 4. `finish` joins every worker and merges the stats.
//!
//! Jobs are never retried or cancelled. A failed job affects nothing but
//! its own outcome.
//!
//! Two jobs naming the same source file may race: one worker can delete
//! the source while another is still reading it. Job lists that reuse a
//! source must not enable deletion.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, bounded};
use serde::{Deserialize, Serialize};

use crate::config::TrimConfig;
use crate::cutter::{TrimRequest, WavCutter};
use crate::error::{ErrorKind, TrimError, TrimResult};
use crate::gate::{DeletionPolicy, QualityGate};
use crate::job::{DeletionOutcome, HalfOutcome, JobOutcome, JobRecord, JobState, ParsedJob, SkipReason};

// ═══════════════════════════════════════════════════════════════════════════════
// PER-JOB PROCESSING
// ═══════════════════════════════════════════════════════════════════════════════

/// Run one job through validation, gating, cutting and deletion
pub fn process_job(record: &JobRecord, config: &TrimConfig, cutter: &mut WavCutter) -> JobOutcome {
    let mut trail = vec![JobState::Queued, JobState::Validating];

    let job = match ParsedJob::parse(record, &config.columns) {
        Ok(job) => job,
        Err(err) => {
            report(config, format_args!("skipping {}: {}", record.label(), err));
            return JobOutcome::skipped(record.line, trail, SkipReason::Parse(err));
        }
    };

    if let Some(reason) = QualityGate::from_config(config).check(&job) {
        log::debug!("skipping {}: {}", record.label(), reason);
        return JobOutcome::skipped(record.line, trail, reason);
    }
    trail.push(JobState::FilterPassed);

    let source = config.source_path(&job.source_file);
    let start = job.start + config.offset_start;
    let end = job.end + config.offset_end;

    trail.push(JobState::Cutting);
    let cuts: Vec<HalfOutcome> = trim_requests(config, &job, &source, start, end)
        .iter()
        .map(|request| {
            let result = cutter.cut(request);
            if let Err(err) = &result {
                report(
                    config,
                    format_args!(
                        "cut failed for {} -> {}: {}",
                        record.label(),
                        request.dest.display(),
                        err
                    ),
                );
            }
            result
        })
        .collect();

    let mut outcome = JobOutcome {
        line: record.line,
        source: Some(source.clone()),
        trail,
        skip: None,
        cuts,
        deletion: DeletionOutcome::NotEligible,
    };

    if outcome.succeeded_cuts() == 0 {
        outcome.trail.push(JobState::CutFailed);
        return outcome;
    }
    outcome.trail.push(JobState::CutSucceeded);

    // a partially failed split job never deletes its source
    if outcome.all_cuts_succeeded() {
        if let Some(delete) = DeletionPolicy::from_config(config).evaluate(&job) {
            outcome.deletion = if delete {
                outcome.trail.push(JobState::DeleteAttempted);
                delete_source(config, &source, record)
            } else {
                DeletionOutcome::Kept
            };
        }
    }

    outcome.trail.push(JobState::Done);
    outcome
}

/// One request, or two halves meeting at the midpoint in split mode
fn trim_requests(
    config: &TrimConfig,
    job: &ParsedJob,
    source: &Path,
    start: f64,
    end: f64,
) -> Vec<TrimRequest> {
    if !config.split_in_half {
        return vec![TrimRequest {
            source: source.to_path_buf(),
            dest: config.dest_path(&job.output_file),
            start,
            end,
        }];
    }

    let mid = start + (end - start) / 2.0;
    let (prefix_a, prefix_b) = &config.split_prefixes;
    vec![
        TrimRequest {
            source: source.to_path_buf(),
            dest: config.dest_path(&format!("{}{}", prefix_a, job.output_file)),
            start,
            end: mid,
        },
        TrimRequest {
            source: source.to_path_buf(),
            dest: config.dest_path(&format!("{}{}", prefix_b, job.output_file)),
            start: mid,
            end,
        },
    ]
}

fn delete_source(config: &TrimConfig, path: &Path, record: &JobRecord) -> DeletionOutcome {
    match std::fs::remove_file(path) {
        Ok(()) => {
            log::debug!("deleted source {}", path.display());
            DeletionOutcome::Deleted
        }
        Err(err) => {
            report(
                config,
                format_args!("failed to delete {} for {}: {}", path.display(), record.label(), err),
            );
            DeletionOutcome::Failed(err.to_string())
        }
    }
}

/// Per-job failures are only surfaced loudly in verbose mode
fn report(config: &TrimConfig, message: std::fmt::Arguments<'_>) {
    if config.verbose {
        log::warn!("{}", message);
    } else {
        log::debug!("{}", message);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BATCH SUMMARY
// ═══════════════════════════════════════════════════════════════════════════════

/// Counters merged from every worker
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Records handed to the queue
    pub submitted: u64,
    /// Rows the job source could not decode
    pub malformed_records: u64,
    /// Jobs that reached a terminal state
    pub processed: u64,
    pub skipped_parse: u64,
    pub skipped_gate: u64,
    pub cuts_ok: u64,
    pub cuts_failed: u64,
    /// Jobs where every cut failed
    pub jobs_failed: u64,
    pub deleted: u64,
    pub delete_failed: u64,
    pub worker_panics: u64,
    pub failures_by_kind: BTreeMap<ErrorKind, u64>,
}

impl BatchSummary {
    pub fn record(&mut self, outcome: &JobOutcome) {
        self.processed += 1;

        match &outcome.skip {
            Some(SkipReason::Parse(err)) => {
                self.skipped_parse += 1;
                *self.failures_by_kind.entry(err.kind()).or_default() += 1;
            }
            Some(_) => self.skipped_gate += 1,
            None => {}
        }

        let ok = outcome.succeeded_cuts() as u64;
        self.cuts_ok += ok;
        self.cuts_failed += outcome.cuts.len() as u64 - ok;
        for err in outcome.failed_cuts() {
            *self.failures_by_kind.entry(err.kind()).or_default() += 1;
        }
        if outcome.state() == JobState::CutFailed {
            self.jobs_failed += 1;
        }

        match outcome.deletion {
            DeletionOutcome::Deleted => self.deleted += 1,
            DeletionOutcome::Failed(_) => self.delete_failed += 1,
            DeletionOutcome::NotEligible | DeletionOutcome::Kept => {}
        }
    }

    pub fn merge(&mut self, other: &BatchSummary) {
        self.submitted += other.submitted;
        self.malformed_records += other.malformed_records;
        self.processed += other.processed;
        self.skipped_parse += other.skipped_parse;
        self.skipped_gate += other.skipped_gate;
        self.cuts_ok += other.cuts_ok;
        self.cuts_failed += other.cuts_failed;
        self.jobs_failed += other.jobs_failed;
        self.deleted += other.deleted;
        self.delete_failed += other.delete_failed;
        self.worker_panics += other.worker_panics;
        for (kind, count) in &other.failures_by_kind {
            *self.failures_by_kind.entry(*kind).or_default() += count;
        }
    }

    /// Any job, row or worker failed. Gate skips and deletion failures don't count.
    pub fn has_failures(&self) -> bool {
        self.malformed_records > 0
            || self.skipped_parse > 0
            || self.cuts_failed > 0
            || self.worker_panics > 0
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// WORKER POOL
// ═══════════════════════════════════════════════════════════════════════════════

/// Fixed-size worker pool fed through a bounded queue
pub struct BatchScheduler {
    config: Arc<TrimConfig>,
    sender: Option<Sender<JobRecord>>,
    workers: Vec<JoinHandle<BatchSummary>>,
    submitted: u64,
    malformed: u64,
}

impl BatchScheduler {
    /// Validate the config and spawn `config.workers` threads
    pub fn start(config: Arc<TrimConfig>) -> TrimResult<Self> {
        config.validate()?;

        let (sender, receiver) = bounded::<JobRecord>(config.queue_capacity);
        let mut workers = Vec::with_capacity(config.workers);

        for index in 0..config.workers {
            let receiver = receiver.clone();
            let worker_config = Arc::clone(&config);
            let handle = thread::Builder::new()
                .name(format!("rf-trim-worker-{}", index))
                .spawn(move || worker_loop(index, receiver, worker_config))?;
            workers.push(handle);
        }

        log::info!(
            "started {} trim workers (queue capacity {})",
            workers.len(),
            config.queue_capacity
        );

        Ok(Self {
            config,
            sender: Some(sender),
            workers,
            submitted: 0,
            malformed: 0,
        })
    }

    /// Queue one record; blocks while the queue is full
    pub fn submit(&mut self, record: JobRecord) -> TrimResult<()> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| TrimError::Source("job queue already closed".into()))?;
        sender
            .send(record)
            .map_err(|_| TrimError::Source("no trim workers left to accept jobs".into()))?;

        self.submitted += 1;
        let interval = self.config.progress_interval;
        if interval > 0 && self.submitted % interval == 0 {
            log::info!("processing: {}", self.submitted);
        }
        Ok(())
    }

    /// Count a row the job source failed to decode
    pub fn note_malformed(&mut self) {
        self.malformed += 1;
    }

    /// Close the queue, wait for every worker, and merge their stats
    pub fn finish(mut self) -> BatchSummary {
        let mut summary = self.close_and_join();
        summary.submitted = self.submitted;
        summary.malformed_records = self.malformed;
        log::info!(
            "batch finished: {} submitted, {} cuts ok, {} cuts failed, {} skipped, {} deleted",
            summary.submitted,
            summary.cuts_ok,
            summary.cuts_failed,
            summary.skipped_parse + summary.skipped_gate,
            summary.deleted
        );
        summary
    }

    fn close_and_join(&mut self) -> BatchSummary {
        // dropping the only sender disconnects the queue once it drains
        drop(self.sender.take());

        let mut summary = BatchSummary::default();
        for (index, handle) in self.workers.drain(..).enumerate() {
            match handle.join() {
                Ok(stats) => summary.merge(&stats),
                Err(_) => {
                    log::error!("trim worker {} panicked", index);
                    summary.worker_panics += 1;
                }
            }
        }
        summary
    }
}

impl Drop for BatchScheduler {
    fn drop(&mut self) {
        if !self.workers.is_empty() {
            self.close_and_join();
        }
    }
}

fn worker_loop(index: usize, receiver: Receiver<JobRecord>, config: Arc<TrimConfig>) -> BatchSummary {
    let mut cutter = WavCutter::from_config(&config);
    let mut stats = BatchSummary::default();

    // iter() ends once the queue is closed and empty
    for record in receiver.iter() {
        let outcome = process_job(&record, &config, &mut cutter);
        stats.record(&outcome);
    }

    log::debug!("trim worker {} exiting after {} jobs", index, stats.processed);
    stats
}

/// Feed every record through a fresh pool and wait for completion.
///
/// Malformed rows are logged, counted and skipped; ingestion continues.
pub fn run_batch<I>(config: Arc<TrimConfig>, records: I) -> TrimResult<BatchSummary>
where
    I: IntoIterator<Item = TrimResult<JobRecord>>,
{
    let mut scheduler = BatchScheduler::start(config)?;

    for record in records {
        match record {
            Ok(record) => scheduler.submit(record)?,
            Err(err) => {
                log::warn!("skipping malformed job record: {}", err);
                scheduler.note_malformed();
            }
        }
    }

    Ok(scheduler.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::write_mono_wav;
    use tempfile::{TempDir, tempdir};

    const RATE: u32 = 8000;

    struct Fixture {
        src: TempDir,
        dst: TempDir,
    }

    impl Fixture {
        fn new(sources: &[&str], seconds: f64) -> Self {
            let src = tempdir().unwrap();
            let dst = tempdir().unwrap();
            for name in sources {
                write_mono_wav(&src.path().join(name), RATE, seconds);
            }
            Self { src, dst }
        }

        fn config(&self) -> TrimConfig {
            TrimConfig::new(self.src.path(), self.dst.path()).with_workers(3)
        }
    }

    fn record(line: u64, fields: &[&str]) -> JobRecord {
        JobRecord::new(line, fields.iter().copied())
    }

    #[test]
    fn test_process_job_single_cut() {
        let fx = Fixture::new(&["in.wav"], 4.0);
        let config = fx.config();
        let mut cutter = WavCutter::from_config(&config);

        let outcome = process_job(&record(1, &["in.wav", "1", "3", "out.wav"]), &config, &mut cutter);

        assert_eq!(outcome.state(), JobState::Done);
        assert_eq!(outcome.cuts.len(), 1);
        let report = outcome.cuts[0].as_ref().unwrap();
        assert_eq!(report.data_size, 2 * RATE * 2);
        assert!(fx.dst.path().join("out.wav").exists());
        assert_eq!(outcome.deletion, DeletionOutcome::NotEligible);
    }

    #[test]
    fn test_process_job_applies_offsets_once() {
        let fx = Fixture::new(&["in.wav"], 4.0);
        let config = fx.config().with_offsets(-0.5, 0.5);
        let mut cutter = WavCutter::from_config(&config);

        let outcome = process_job(&record(1, &["in.wav", "1", "2", "out.wav"]), &config, &mut cutter);

        // [0.5, 2.5]
        assert_eq!(outcome.cuts[0].as_ref().unwrap().data_size, 2 * RATE * 2);
    }

    #[test]
    fn test_process_job_parse_failure_is_skipped() {
        let fx = Fixture::new(&["in.wav"], 1.0);
        let config = fx.config();
        let mut cutter = WavCutter::from_config(&config);

        let outcome =
            process_job(&record(7, &["in.wav", "zero", "1", "out.wav"]), &config, &mut cutter);

        assert_eq!(outcome.state(), JobState::Skipped);
        assert!(matches!(outcome.skip, Some(SkipReason::Parse(_))));
        assert!(outcome.cuts.is_empty());
    }

    #[test]
    fn test_process_job_all_cuts_failed() {
        let fx = Fixture::new(&["in.wav"], 1.0);
        let config = fx.config();
        let mut cutter = WavCutter::from_config(&config);

        let outcome = process_job(&record(1, &["in.wav", "0", "5", "out.wav"]), &config, &mut cutter);

        assert_eq!(outcome.state(), JobState::CutFailed);
        assert!(outcome.state().is_terminal());
        assert_eq!(outcome.failed_cuts().next().map(|e| e.kind()), Some(ErrorKind::Range));
    }

    #[test]
    fn test_split_half_failure_keeps_other_half_and_source() {
        let fx = Fixture::new(&["in.wav"], 2.0);
        // second half [1.5, 3.0] ends past the source
        let config = fx
            .config()
            .with_split(true)
            .with_deletion(Some(1.0), Some(1.0));
        let mut cutter = WavCutter::from_config(&config);

        let outcome = process_job(
            &record(1, &["in.wav", "0", "3", "out.wav", "0.0", "1.0"]),
            &config,
            &mut cutter,
        );

        assert_eq!(outcome.state(), JobState::Done);
        assert_eq!(outcome.succeeded_cuts(), 1);
        assert!(fx.dst.path().join("a_out.wav").exists());
        assert!(!fx.dst.path().join("b_out.wav").exists());
        assert_eq!(outcome.deletion, DeletionOutcome::NotEligible);
        assert!(fx.src.path().join("in.wav").exists());
    }

    #[test]
    fn test_deleted_source_fails_later_job() {
        let fx = Fixture::new(&["in.wav"], 2.0);
        let config = fx.config().with_deletion(Some(1.0), Some(1.0));
        let mut cutter = WavCutter::from_config(&config);
        let job = record(1, &["in.wav", "0", "1", "out.wav", "0.1", "1.0"]);

        let first = process_job(&job, &config, &mut cutter);
        assert_eq!(first.deletion, DeletionOutcome::Deleted);
        assert_eq!(
            first.trail,
            vec![
                JobState::Queued,
                JobState::Validating,
                JobState::FilterPassed,
                JobState::Cutting,
                JobState::CutSucceeded,
                JobState::DeleteAttempted,
                JobState::Done,
            ]
        );
        assert!(!fx.src.path().join("in.wav").exists());

        // source already gone: the cut fails before deletion is considered
        let second = process_job(&job, &config, &mut cutter);
        assert_eq!(second.state(), JobState::CutFailed);
        assert_eq!(second.deletion, DeletionOutcome::NotEligible);
    }

    #[test]
    fn test_absolute_source_outside_source_dir_is_skipped() {
        let fx = Fixture::new(&[], 1.0);
        let outside = tempdir().unwrap();
        let victim = outside.path().join("victim.wav");
        write_mono_wav(&victim, RATE, 1.0);
        let config = fx.config().with_deletion(Some(1.0), Some(1.0));
        let mut cutter = WavCutter::from_config(&config);
        let name = victim.to_string_lossy().to_string();

        let outcome = process_job(
            &record(1, &[name.as_str(), "0", "0.5", "out.wav", "0.0", "1.0"]),
            &config,
            &mut cutter,
        );

        assert_eq!(outcome.state(), JobState::Skipped);
        assert_eq!(outcome.deletion, DeletionOutcome::NotEligible);
        assert!(victim.exists());
        assert!(!fx.dst.path().join("out.wav").exists());
    }

    #[test]
    fn test_scheduler_drains_queue_before_exit() {
        let names: Vec<String> = (0..12).map(|i| format!("in{}.wav", i)).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let fx = Fixture::new(&refs, 1.0);
        let config = Arc::new(fx.config());

        let mut scheduler = BatchScheduler::start(Arc::clone(&config)).unwrap();
        for (i, name) in names.iter().enumerate() {
            let out = format!("out{}.wav", i);
            scheduler
                .submit(record(i as u64 + 1, &[name.as_str(), "0", "0.5", out.as_str()]))
                .unwrap();
        }
        scheduler.submit(record(13, &["in0.wav", "bad", "1", "x.wav"])).unwrap();
        let summary = scheduler.finish();

        assert_eq!(summary.submitted, 13);
        assert_eq!(summary.processed, 13);
        assert_eq!(summary.cuts_ok, 12);
        assert_eq!(summary.skipped_parse, 1);
        assert_eq!(summary.failures_by_kind.get(&ErrorKind::Parse), Some(&1));
        assert!(summary.has_failures());
        for i in 0..12 {
            assert!(fx.dst.path().join(format!("out{}.wav", i)).exists());
        }
    }

    #[test]
    fn test_run_batch_counts_malformed_rows_and_continues() {
        let fx = Fixture::new(&["a.wav", "b.wav"], 1.0);
        let config = Arc::new(fx.config());

        let records = vec![
            Ok(record(1, &["a.wav", "0", "0.5", "a_out.wav"])),
            Err(TrimError::Source("bad quoting".into())),
            Ok(record(3, &["b.wav", "0", "0.5", "b_out.wav"])),
        ];
        let summary = run_batch(config, records).unwrap();

        assert_eq!(summary.malformed_records, 1);
        assert_eq!(summary.cuts_ok, 2);
        assert!(summary.has_failures());
    }

    #[test]
    fn test_start_rejects_invalid_config() {
        let config = Arc::new(TrimConfig::default().with_workers(0));
        assert!(matches!(
            BatchScheduler::start(config),
            Err(TrimError::Config(_))
        ));
    }

    #[test]
    fn test_summary_merge() {
        let mut a = BatchSummary {
            cuts_ok: 2,
            ..Default::default()
        };
        a.failures_by_kind.insert(ErrorKind::Io, 1);
        let mut b = BatchSummary {
            cuts_ok: 3,
            deleted: 1,
            ..Default::default()
        };
        b.failures_by_kind.insert(ErrorKind::Io, 2);

        a.merge(&b);
        assert_eq!(a.cuts_ok, 5);
        assert_eq!(a.deleted, 1);
        assert_eq!(a.failures_by_kind[&ErrorKind::Io], 3);
        assert!(!a.has_failures());
    }
}
