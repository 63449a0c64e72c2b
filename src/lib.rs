//! `epi-series` turns a raw table of per-location daily case and death counts into an
//! enriched time series and a set of export tables.
//!
//! The primary entrypoint is [`pipeline::Pipeline`]: build it from a
//! [`config::PipelineConfig`] and the read-only [`reference::ReferenceData`], then call
//! [`pipeline::Pipeline::run`] and [`pipeline::Pipeline::export`].
//!
//! ## What a run adds
//!
//! Starting from `date, location, new_cases, new_deaths, total_cases, total_deaths`
//! (either member of each new/total pair may be missing):
//!
//! - anomaly corrections on the daily deltas (negatives, a curated override table, trailing
//!   zero runs that look like reporting lag)
//! - synthetic aggregate locations (World, continents, income groups, exclusion sets)
//! - weekly/biweekly totals and their growth, doubling days
//! - per-million columns, right-aligned 7-day averages, case-fatality ratios
//! - days-since-threshold indices and exemplar flags
//!
//! Every cell is a typed [`types::Value`]; [`types::Value::Null`] means "unknown" and is never
//! treated as zero.
//!
//! ## Quick example
//!
//! ```rust
//! use epi_series::config::PipelineConfig;
//! use epi_series::pipeline::Pipeline;
//! use epi_series::reference::ReferenceData;
//! use epi_series::types::{DataSet, DataType, Field, Schema, Value};
//! use chrono::NaiveDate;
//!
//! # fn main() -> Result<(), epi_series::PipelineError> {
//! let schema = Schema::new(vec![
//!     Field::new("date", DataType::Date),
//!     Field::new("location", DataType::Utf8),
//!     Field::new("new_cases", DataType::Int64),
//!     Field::new("new_deaths", DataType::Int64),
//! ]);
//! let day = |d| Value::Date(NaiveDate::from_ymd_opt(2020, 3, d).unwrap());
//! let raw = DataSet::new(
//!     schema,
//!     vec![
//!         vec![day(1), Value::Utf8("France".into()), Value::Int64(100), Value::Int64(0)],
//!         vec![day(2), Value::Utf8("France".into()), Value::Int64(-5), Value::Int64(1)],
//!         vec![day(3), Value::Utf8("France".into()), Value::Int64(50), Value::Int64(2)],
//!     ],
//! );
//!
//! let pipeline = Pipeline::new(PipelineConfig::default(), ReferenceData::default())?;
//! let enriched = pipeline.run(raw)?;
//!
//! let idx = enriched.schema.index_of("new_cases").unwrap();
//! let france: Vec<&Value> = enriched
//!     .rows
//!     .iter()
//!     .filter(|r| r[1].as_str() == Some("France"))
//!     .map(|r| &r[idx])
//!     .collect();
//! assert_eq!(france, vec![&Value::Int64(100), &Value::Null, &Value::Int64(50)]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`pipeline`]: the stage driver
//! - [`processing`]: the stages and their per-location helpers
//! - [`export`]: grapher, full-data and pivot layouts plus CSV output
//! - [`config`] / [`reference`]: configuration tables and reference inputs
//! - [`ingestion`]: CSV readers for the raw table and the population table
//! - [`execution`]: rayon fan-out, stage metrics and observer hooks
//! - [`types`] / [`error`]: the table model and the error type

pub mod config;
pub mod error;
pub mod execution;
pub mod export;
pub mod ingestion;
pub mod pipeline;
pub mod processing;
pub mod reference;
pub mod types;

pub use error::{PipelineError, PipelineResult};
