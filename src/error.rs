use std::path::PathBuf;

use thiserror::Error;

// ---------------------------------------------------------------------------
// PipelineError – everything a pipeline call can surface
// ---------------------------------------------------------------------------

/// Errors raised by the correction / analysis pipeline.
///
/// A nearest-match join that finds nothing within tolerance and a peak search
/// that runs out of samples are *not* errors; they show up as `None` matches and
/// short peak lists respectively.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A correction or mask source failed shape/type validation.
    #[error("malformed table '{source_name}': {reason}")]
    MalformedTable { source_name: String, reason: String },

    /// Non-numeric, zero or negative distance fed to the DCF formula.
    #[error("invalid distance '{value}': {reason}")]
    InvalidDistance { value: String, reason: String },

    /// The smoothing window is longer than the series it should smooth.
    #[error("smoothing window of {window} samples exceeds series length {available}")]
    InsufficientSamples { window: usize, available: usize },

    /// No trace is registered under that display name.
    #[error("unknown trace '{0}'")]
    UnknownTrace(String),

    /// A directional scan is only shown through its per-polarity sub-traces.
    #[error("'{name}' is a directional scan; use {}", .parts.join(" / "))]
    DirectionalScan { name: String, parts: Vec<String> },

    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type PipelineResult<T> = Result<T, PipelineError>;

impl PipelineError {
    pub fn malformed(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        PipelineError::MalformedTable {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_distance(value: impl Into<String>, reason: impl Into<String>) -> Self {
        PipelineError::InvalidDistance {
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }
}
