// src/error.rs
use std::path::PathBuf;

use crate::freshness::FreshnessError;

/// Every way a pipeline run can end in FAILED. No variant is retried.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("No capture tool available.\n{remediation}")]
    MissingDependency { remediation: String },

    #[error("{} has no fetched_at; the extraction step did not produce or update it", path.display())]
    MissingTimestamp { path: PathBuf },

    #[error("{} fetched_at unchanged ({fetched_at}); previous result was reused", path.display())]
    StaleReuse { path: PathBuf, fetched_at: String },

    #[error(
        "{} fetched_at {fetched_at} is {age_secs}s away from now, outside the {window_secs}s freshness window",
        path.display()
    )]
    FreshnessWindowExceeded {
        path: PathBuf,
        fetched_at: String,
        age_secs: i64,
        window_secs: i64,
    },

    #[error("Malformed capture tree: {0}")]
    MalformedTree(String),

    #[error("Step `{step}` failed: {detail}")]
    ExternalStepFailure { step: String, detail: String },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl PipelineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json { path: path.into(), source }
    }

    pub fn step(step: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::ExternalStepFailure { step: step.into(), detail: detail.into() }
    }

    /// Attach the envelope path to a gate verdict.
    pub fn from_freshness(err: FreshnessError, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match err {
            FreshnessError::MissingTimestamp => Self::MissingTimestamp { path },
            FreshnessError::StaleReuse { fetched_at } => Self::StaleReuse { path, fetched_at },
            FreshnessError::FreshnessWindowExceeded { fetched_at, age_secs, window_secs } => {
                Self::FreshnessWindowExceeded { path, fetched_at, age_secs, window_secs }
            }
        }
    }
}
