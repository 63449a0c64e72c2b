//! Table transformations.
//!
//! Row-level helpers ([`filter()`], [`map()`], [`reduce()`]) work on any
//! [`crate::types::DataSet`]. The stage modules build on them and on [`series`], which
//! partitions the table into per-location, date-ordered series:
//!
//! - [`raw`]: derive missing count columns
//! - [`correction`]: null anomalous daily deltas
//! - [`aggregate`]: synthesize World, continents, income groups and exclusion sets
//! - [`growth`]: weekly/biweekly totals and growth, rolling averages, CFR
//! - [`threshold`]: days-since indices and doubling days
//! - [`per_capita`]: per-million columns
//! - [`exemplar`]: exemplar flags
//!
//! ## Example: filter → map → reduce
//!
//! ```rust
//! use epi_series::processing::{filter, map, reduce, ReduceOp};
//! use epi_series::types::{DataSet, DataType, Field, Schema, Value};
//!
//! let schema = Schema::new(vec![
//!     Field::new("location", DataType::Utf8),
//!     Field::new("new_cases", DataType::Int64),
//! ]);
//! let ds = DataSet::new(
//!     schema,
//!     vec![
//!         vec![Value::Utf8("France".into()), Value::Int64(120)],
//!         vec![Value::Utf8("China".into()), Value::Int64(80)],
//!         vec![Value::Utf8("Chile".into()), Value::Int64(-4)],
//!     ],
//! );
//!
//! // Everything except China.
//! let rest = filter(&ds, |row| row[0].as_str() != Some("China"));
//!
//! // Negative deltas are unknown, not subtractions.
//! let cleaned = map(&rest, |row| {
//!     let mut out = row.to_vec();
//!     if matches!(out[1], Value::Int64(v) if v < 0) {
//!         out[1] = Value::Null;
//!     }
//!     out
//! });
//!
//! let total = reduce(&cleaned, "new_cases", ReduceOp::Sum).unwrap();
//! assert_eq!(total, Value::Int64(120));
//! ```

pub mod aggregate;
pub mod correction;
pub mod exemplar;
pub mod filter;
pub mod growth;
pub mod map;
pub mod per_capita;
pub mod raw;
pub mod reduce;
pub mod series;
pub mod threshold;
pub mod window;

pub use filter::filter;
pub use map::map;
pub use reduce::{ReduceOp, reduce, reduce_rows};
