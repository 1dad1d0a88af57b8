//! Error taxonomy shared by every stage of the churn pipeline

use std::path::PathBuf;

use polars::error::PolarsError;
use thiserror::Error;

/// Errors surfaced by dataset handling, training and inference
#[derive(Debug, Error)]
pub enum ChurnError {
    #[error("the file {} was not found", path.display())]
    FileNotFound { path: PathBuf },

    #[error("the file {} is empty", path.display())]
    EmptyFile { path: PathBuf },

    #[error("the file {} could not be parsed: {source}", path.display())]
    ParseFile {
        path: PathBuf,
        #[source]
        source: PolarsError,
    },

    #[error("dataset does not contain all the required columns (missing: {})", missing.join(", "))]
    MissingColumns { missing: Vec<String> },

    #[error("invalid value {value:?} in column {column} at row {row}")]
    InvalidValue {
        column: String,
        row: usize,
        value: String,
    },

    #[error("column {column} has no numeric values to impute from")]
    NoNumericValues { column: String },

    #[error("test fraction must lie strictly between 0 and 1, got {0}")]
    InvalidFraction(f64),

    #[error("not enough rows to {purpose}: got {rows}")]
    NotEnoughRows { purpose: &'static str, rows: usize },

    #[error("invalid input for {field}: {value:?} is not a valid {expected}")]
    InvalidInput {
        field: String,
        value: String,
        expected: &'static str,
    },

    #[error("unknown category {value:?} for column {column}")]
    UnknownCategory { column: String, value: String },

    #[error("model file {} not found; run `churnforge train` first", path.display())]
    ModelNotFound { path: PathBuf },

    #[error("model file {} could not be decoded: {source}", path.display())]
    ModelCorrupt {
        path: PathBuf,
        #[source]
        source: bincode::Error,
    },

    #[error("classifier training failed: {0}")]
    Training(#[from] linfa_svm::SvmError),

    #[error("failed to write {}: {reason}", path.display())]
    WriteFile { path: PathBuf, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ChurnError {
    /// True for errors caused by a missing or unreadable model artifact
    pub fn is_model_error(&self) -> bool {
        matches!(self, Self::ModelNotFound { .. } | Self::ModelCorrupt { .. })
    }
}
