use chrono::NaiveDate;
use thiserror::Error;

/// Convenience result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Error type returned by ingestion, pipeline stages and exports.
///
/// Numeric edge cases (division by zero, missing population) are never errors: they resolve
/// to [`crate::types::Value::Null`] inside the stage that meets them. Everything here aborts
/// the run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Underlying I/O error (e.g. file not found, permission denied).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV read/write error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// The worker pool for per-location fan-out could not be created.
    #[error("thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// Configuration or reference JSON could not be decoded.
    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),

    /// The input does not have the shape a stage needs (missing key columns, wrong types, etc.).
    #[error("schema mismatch: {message}")]
    SchemaMismatch { message: String },

    /// A value could not be parsed into the required [`crate::types::DataType`].
    #[error("failed to parse value at row {row} column '{column}': {message} (raw='{raw}')")]
    ParseError {
        row: usize,
        column: String,
        raw: String,
        message: String,
    },

    /// A column requested by a stage or an export is absent from the table.
    #[error("missing column '{column}'")]
    MissingColumn { column: String },

    /// Two rows share the same `(location, date)` key.
    #[error("duplicate record for location '{location}' on {date}")]
    DuplicateRecord { location: String, date: NaiveDate },

    /// A pivot was requested for a date that has no `World` row.
    #[error("no 'World' row on {date} while pivoting '{measure}'")]
    MissingWorld { measure: String, date: NaiveDate },

    /// A manual correction entry is malformed.
    #[error("invalid correction entry: {message}")]
    InvalidCorrection { message: String },
}
