//! Quality gate and source deletion policy
//!
//! Both read the optional diff-error / ratio-error signals carried by a job.
//! The gate decides whether a cut happens at all; the deletion policy
//! decides whether a successfully cut source may be removed afterwards.

use crate::config::TrimConfig;
use crate::job::{ParsedJob, SkipReason};

/// Skip thresholds; a gate is active only for a threshold > 0
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QualityGate {
    pub max_diff_error: Option<f64>,
    pub max_ratio_error: Option<f64>,
}

impl QualityGate {
    pub fn from_config(config: &TrimConfig) -> Self {
        Self {
            max_diff_error: config.max_diff_error,
            max_ratio_error: config.max_ratio_error,
        }
    }

    /// First failing gate, diff before ratio
    pub fn check(&self, job: &ParsedJob) -> Option<SkipReason> {
        if let (Some(value), Some(max)) = (job.diff_error, active(self.max_diff_error)) {
            if value > max {
                return Some(SkipReason::DiffError { value, max });
            }
        }

        if let (Some(value), Some(max)) = (job.ratio_error, active(self.max_ratio_error)) {
            if value > max {
                return Some(SkipReason::RatioError { value, max });
            }
        }

        None
    }
}

fn active(threshold: Option<f64>) -> Option<f64> {
    threshold.filter(|&t| t > 0.0)
}

/// Deletion thresholds.
///
/// A source is deleted only when both thresholds are configured, the job
/// carries both signals, and both signals are within their threshold.
/// Configuring a single threshold never deletes anything.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DeletionPolicy {
    pub diff_threshold: Option<f64>,
    pub ratio_threshold: Option<f64>,
}

impl DeletionPolicy {
    pub fn from_config(config: &TrimConfig) -> Self {
        Self {
            diff_threshold: config.delete_diff_threshold,
            ratio_threshold: config.delete_ratio_threshold,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.diff_threshold.is_some() && self.ratio_threshold.is_some()
    }

    /// `None` when the policy does not apply to this job
    pub fn evaluate(&self, job: &ParsedJob) -> Option<bool> {
        match (
            job.diff_error,
            job.ratio_error,
            self.diff_threshold,
            self.ratio_threshold,
        ) {
            (Some(diff), Some(ratio), Some(max_diff), Some(max_ratio)) => {
                Some(diff <= max_diff && ratio <= max_ratio)
            }
            _ => None,
        }
    }
}
