// core/src/error.rs
use thiserror::Error;

use crate::models::PhaseState;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("threshold multiplier must be finite and >= 0, got {0}")]
    InvalidMultiplier(f64),
    #[error("{0} must be finite and > 0, got {1}")]
    NonPositive(&'static str, f64),
    #[error("{0} is too large for a duration, got {1}")]
    OutOfRange(&'static str, f64),
}

#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("target column '{0}' not found in log columns {1:?}")]
    UnknownTargetColumn(String, Vec<String>),
    #[error("log has no metric columns")]
    NoMetricColumns,
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session not completed yet (state={0})")]
    NotCompleted(PhaseState),
    #[error(transparent)]
    Analyze(#[from] AnalyzeError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Feil ved lagring/innlesing. Påvirker aldri økten eller analysen i minnet.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("config parse error at {path}: {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("missing required column '{0}'")]
    MissingColumn(&'static str),
    #[error("no metric columns in header")]
    NoMetricColumns,
    #[error("cannot infer exercise from columns {0:?}")]
    UnknownLayout(Vec<String>),
    #[error("row {row}: unknown state '{value}'")]
    UnknownPhase { row: usize, value: String },
    #[error("row {row}: column '{column}' is not a number: '{value}'")]
    InvalidNumber {
        row: usize,
        column: String,
        value: String,
    },
    #[error("row {row}: time '{value}' is not finite")]
    NonFiniteTime { row: usize, value: String },
    #[error("row {row}: time {t} is not after previous {prev}")]
    NonMonotonicTime { row: usize, t: f64, prev: f64 },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<serde_path_to_error::Error<serde_json::Error>> for StorageError {
    fn from(e: serde_path_to_error::Error<serde_json::Error>) -> Self {
        StorageError::ConfigParse {
            path: e.path().to_string(),
            source: e.into_inner(),
        }
    }
}
