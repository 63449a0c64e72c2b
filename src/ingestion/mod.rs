//! Ingestion entrypoints.
//!
//! The pipeline itself never touches the filesystem; these helpers exist for callers (and
//! tests) that hold the raw case table or the population reference as CSV:
//!
//! - [`csv`]: schema-first CSV parsing into a [`crate::types::DataSet`]
//! - [`ingest_raw_csv`]: the raw case table, tolerating a missing `new_*`/`total_*` member

pub mod csv;

use std::path::Path;

use crate::error::PipelineResult;
use crate::types::{DataSet, DataType, Field, Schema};

/// Schema of the raw per-location daily table supplied by the acquisition layer.
pub fn raw_schema() -> Schema {
    Schema::new(vec![
        Field::new("date", DataType::Date),
        Field::new("location", DataType::Utf8),
        Field::new("new_cases", DataType::Int64),
        Field::new("new_deaths", DataType::Int64),
        Field::new("total_cases", DataType::Int64),
        Field::new("total_deaths", DataType::Int64),
    ])
}

/// Read the raw case table from a CSV file.
///
/// Columns of [`raw_schema`] absent from the header are skipped; the pipeline derives them.
pub fn ingest_raw_csv(path: impl AsRef<Path>) -> PipelineResult<DataSet> {
    let mut rdr = ::csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)?;
    csv::ingest_csv_lenient(&mut rdr, &raw_schema())
}
