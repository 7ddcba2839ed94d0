//! Trim job definitions
//!
//! A [`JobRecord`] is the raw row handed over by a job source; parsing it
//! against a [`ColumnLayout`] yields a [`ParsedJob`]. Every job ends in a
//! [`JobOutcome`] describing which terminal [`JobState`] it reached.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::ColumnLayout;
use crate::cutter::CutReport;
use crate::error::{TrimError, TrimResult};

/// Raw job row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    /// 1-based position in the job source
    pub line: u64,
    pub fields: Vec<String>,
}

impl JobRecord {
    pub fn new<I, S>(line: u64, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            line,
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    fn field(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(|s| s.trim())
    }

    /// Best-effort label for log lines
    pub fn label(&self) -> String {
        match self.fields.first() {
            Some(first) => format!("line {} ({})", self.line, first.trim()),
            None => format!("line {}", self.line),
        }
    }
}

/// Validated job fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedJob {
    pub source_file: String,
    pub output_file: String,
    /// Requested start in seconds, before global offsets
    pub start: f64,
    /// Requested end in seconds, before global offsets
    pub end: f64,
    pub diff_error: Option<f64>,
    /// |1 - ratio|
    pub ratio_error: Option<f64>,
}

impl ParsedJob {
    pub fn parse(record: &JobRecord, columns: &ColumnLayout) -> TrimResult<Self> {
        let source_file = required(record, columns.source, "source file")?;
        let output_file = required(record, columns.output, "output file")?;
        check_relative(source_file, "source file")?;
        check_relative(output_file, "output file")?;

        let start = parse_float(required(record, columns.start, "start")?, "start")?;
        let end = parse_float(required(record, columns.end, "end")?, "end")?;

        let diff_error = record
            .field(columns.diff_error)
            .map(|v| parse_float(v, "diff error"))
            .transpose()?;
        let ratio_error = record
            .field(columns.ratio)
            .map(|v| parse_float(v, "ratio"))
            .transpose()?
            .map(|ratio| (1.0 - ratio).abs());

        Ok(Self {
            source_file: source_file.to_string(),
            output_file: output_file.to_string(),
            start,
            end,
            diff_error,
            ratio_error,
        })
    }
}

fn required<'a>(record: &'a JobRecord, index: usize, field: &'static str) -> TrimResult<&'a str> {
    record
        .field(index)
        .ok_or_else(|| TrimError::parse(field, format!("<missing column {}>", index)))
}

/// File names must stay inside the configured directory
fn check_relative(name: &str, field: &'static str) -> TrimResult<()> {
    let nested = Path::new(name)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if name.is_empty() || !nested {
        return Err(TrimError::parse(field, name));
    }
    Ok(())
}

fn parse_float(value: &str, field: &'static str) -> TrimResult<f64> {
    match value.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(TrimError::parse(field, value)),
    }
}

/// Per-job lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Queued,
    Validating,
    /// Parse failure or quality gate
    Skipped,
    FilterPassed,
    Cutting,
    CutSucceeded,
    /// Every cut of the job failed
    CutFailed,
    DeleteAttempted,
    Done,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Skipped | Self::CutFailed | Self::Done)
    }
}

/// Why a job never reached the cutter
#[derive(Debug)]
pub enum SkipReason {
    Parse(TrimError),
    DiffError { value: f64, max: f64 },
    RatioError { value: f64, max: f64 },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "{}", err),
            Self::DiffError { value, max } => write!(f, "diff error {} > {}", value, max),
            Self::RatioError { value, max } => write!(f, "ratio error {} > {}", value, max),
        }
    }
}

/// Source deletion result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletionOutcome {
    /// Policy not applicable (thresholds or fields missing, or a cut failed)
    NotEligible,
    /// Applicable but above a threshold
    Kept,
    Deleted,
    Failed(String),
}

/// Result of one cut (one half in split mode)
pub type HalfOutcome = Result<CutReport, TrimError>;

/// Final report for one job
#[derive(Debug)]
pub struct JobOutcome {
    pub line: u64,
    pub source: Option<PathBuf>,
    /// States visited, in order; the last one is terminal
    pub trail: Vec<JobState>,
    pub skip: Option<SkipReason>,
    pub cuts: Vec<HalfOutcome>,
    pub deletion: DeletionOutcome,
}

impl JobOutcome {
    pub(crate) fn skipped(line: u64, mut trail: Vec<JobState>, reason: SkipReason) -> Self {
        trail.push(JobState::Skipped);
        Self {
            line,
            source: None,
            trail,
            skip: Some(reason),
            cuts: Vec::new(),
            deletion: DeletionOutcome::NotEligible,
        }
    }

    pub fn state(&self) -> JobState {
        self.trail.last().copied().unwrap_or(JobState::Queued)
    }

    pub fn succeeded_cuts(&self) -> usize {
        self.cuts.iter().filter(|c| c.is_ok()).count()
    }

    pub fn failed_cuts(&self) -> impl Iterator<Item = &TrimError> {
        self.cuts.iter().filter_map(|c| c.as_ref().err())
    }

    pub fn all_cuts_succeeded(&self) -> bool {
        !self.cuts.is_empty() && self.cuts.iter().all(|c| c.is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(fields: &[&str]) -> JobRecord {
        JobRecord::new(1, fields.iter().copied())
    }

    #[test]
    fn test_parse_required_fields_only() {
        let job = ParsedJob::parse(&record(&["a.wav", "1.5", "3", "b.wav"]), &ColumnLayout::default())
            .unwrap();
        assert_eq!(job.source_file, "a.wav");
        assert_eq!(job.output_file, "b.wav");
        assert_eq!(job.start, 1.5);
        assert_eq!(job.end, 3.0);
        assert_eq!(job.diff_error, None);
        assert_eq!(job.ratio_error, None);
    }

    #[test]
    fn test_parse_optional_quality_fields() {
        let job = ParsedJob::parse(
            &record(&["a.wav", "0", "1", "b.wav", " 0.25 ", "1.1"]),
            &ColumnLayout::default(),
        )
        .unwrap();
        assert_eq!(job.diff_error, Some(0.25));
        approx::assert_abs_diff_eq!(job.ratio_error.unwrap(), 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_parse_diff_only() {
        let job = ParsedJob::parse(
            &record(&["a.wav", "0", "1", "b.wav", "0.4"]),
            &ColumnLayout::default(),
        )
        .unwrap();
        assert_eq!(job.diff_error, Some(0.4));
        assert_eq!(job.ratio_error, None);
    }

    #[test]
    fn test_parse_malformed_numbers() {
        let columns = ColumnLayout::default();
        let err = ParsedJob::parse(&record(&["a.wav", "x", "1", "b.wav"]), &columns).unwrap_err();
        assert!(matches!(err, TrimError::Parse { field: "start", .. }));

        let err =
            ParsedJob::parse(&record(&["a.wav", "0", "1", "b.wav", "0.1", "n/a"]), &columns)
                .unwrap_err();
        assert!(matches!(err, TrimError::Parse { field: "ratio", .. }));

        let err = ParsedJob::parse(&record(&["a.wav", "0", "inf", "b.wav"]), &columns).unwrap_err();
        assert!(matches!(err, TrimError::Parse { field: "end", .. }));
    }

    #[test]
    fn test_parse_missing_required_column() {
        let err = ParsedJob::parse(&record(&["a.wav", "0", "1"]), &ColumnLayout::default())
            .unwrap_err();
        assert!(matches!(err, TrimError::Parse { field: "output file", .. }));
    }

    #[test]
    fn test_parse_rejects_names_outside_base_dir() {
        let columns = ColumnLayout::default();
        for name in ["/tmp/victim.wav", "../victim.wav", "sub/../../victim.wav", ""] {
            let err = ParsedJob::parse(&record(&[name, "0", "1", "out.wav"]), &columns).unwrap_err();
            assert!(matches!(err, TrimError::Parse { field: "source file", .. }), "{}", name);

            let err = ParsedJob::parse(&record(&["in.wav", "0", "1", name]), &columns).unwrap_err();
            assert!(matches!(err, TrimError::Parse { field: "output file", .. }), "{}", name);
        }
    }

    #[test]
    fn test_parse_accepts_nested_names() {
        let job = ParsedJob::parse(
            &record(&["take1/in.wav", "0", "1", "./out/b.wav"]),
            &ColumnLayout::default(),
        )
        .unwrap();
        assert_eq!(job.source_file, "take1/in.wav");
        assert_eq!(job.output_file, "./out/b.wav");
    }

    #[test]
    fn test_parse_custom_layout() {
        let columns = ColumnLayout {
            source: 3,
            start: 0,
            end: 1,
            output: 2,
            diff_error: 5,
            ratio: 4,
        };
        let job = ParsedJob::parse(&record(&["2", "4", "out.wav", "in.wav", "0.9"]), &columns)
            .unwrap();
        assert_eq!(job.source_file, "in.wav");
        assert_eq!(job.start, 2.0);
        assert_eq!(job.diff_error, None);
        approx::assert_abs_diff_eq!(job.ratio_error.unwrap(), 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_terminal_states() {
        assert!(JobState::Skipped.is_terminal());
        assert!(JobState::CutFailed.is_terminal());
        assert!(JobState::Done.is_terminal());
        assert!(!JobState::Cutting.is_terminal());
        assert!(!JobState::FilterPassed.is_terminal());
    }
}
