//! Error types for trimming

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Trimming errors
#[derive(Error, Debug)]
pub enum TrimError {
    #[error("Format error: {0}")]
    Format(String),

    #[error("Range error: {0}")]
    Range(String),

    #[error("Output too large: {required} bytes exceeds limit of {limit} bytes")]
    ResourceLimit { required: u64, limit: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse {field}: {value:?}")]
    Parse { field: &'static str, value: String },

    #[error("Job source error: {0}")]
    Source(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Error category, without payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ErrorKind {
    Format,
    Range,
    ResourceLimit,
    Io,
    Parse,
    Source,
    Config,
}

impl TrimError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Format(_) => ErrorKind::Format,
            Self::Range(_) => ErrorKind::Range,
            Self::ResourceLimit { .. } => ErrorKind::ResourceLimit,
            Self::Io(_) => ErrorKind::Io,
            Self::Parse { .. } => ErrorKind::Parse,
            Self::Source(_) => ErrorKind::Source,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    pub(crate) fn parse(field: &'static str, value: impl Into<String>) -> Self {
        Self::Parse {
            field,
            value: value.into(),
        }
    }
}

impl From<csv::Error> for TrimError {
    fn from(err: csv::Error) -> Self {
        TrimError::Source(err.to_string())
    }
}

impl From<serde_json::Error> for TrimError {
    fn from(err: serde_json::Error) -> Self {
        TrimError::Config(err.to_string())
    }
}

/// Result type for trim operations
pub type TrimResult<T> = Result<T, TrimError>;
